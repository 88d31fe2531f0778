// src/state.rs
// Process-wide dependency wiring. Everything is injected through
// constructors so tests can substitute any seam.

use std::sync::Arc;

use crate::chat::ChatService;
use crate::config::Config;
use crate::graph::KnowledgeGraphClient;
use crate::jobs::{JobQueue, WorkerContext};
use crate::llm::{Embedder, LanguageModel};
use crate::memory::{Consolidator, FactExtractor, Retriever, VectorStore};
use crate::pipeline::{LifecycleCoordinator, Summarizer, TopicDetector};
use crate::session::SessionStore;

pub struct AppState {
    pub config: Config,
    pub sessions: Arc<SessionStore>,
    pub memories: Arc<dyn VectorStore>,
    pub chat: ChatService,
    pub queue: Arc<JobQueue>,
}

impl AppState {
    /// Wire the full pipeline from its seams and start the worker pool.
    /// Must run inside a tokio runtime.
    pub fn build(
        config: Config,
        llm: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
        memories: Arc<dyn VectorStore>,
        sessions: Arc<SessionStore>,
    ) -> Arc<Self> {
        let (queue, job_rx) = JobQueue::new(config.jobs.clone());

        let retriever = Arc::new(Retriever::new(embedder.clone(), memories.clone()));
        let detector = TopicDetector::new(llm.clone());
        let coordinator = Arc::new(LifecycleCoordinator::new(
            sessions.clone(),
            detector,
            queue.clone(),
            config.memory.clone(),
        ));

        let worker_ctx = Arc::new(WorkerContext {
            sessions: sessions.clone(),
            embedder: embedder.clone(),
            extractor: FactExtractor::new(llm.clone()),
            consolidator: Consolidator::new(
                llm.clone(),
                embedder.clone(),
                memories.clone(),
                config.memory.memory_search_limit,
            ),
            summarizer: Summarizer::new(llm.clone()),
            graph: config
                .sidecar
                .knowledge_graph_url
                .as_deref()
                .map(KnowledgeGraphClient::new),
            memory: config.memory.clone(),
        });
        queue.spawn_workers(job_rx, worker_ctx);

        let chat = ChatService::new(
            llm,
            sessions.clone(),
            retriever,
            coordinator,
            config.memory.memory_search_limit,
            config.memory.message_limit,
            config.server.max_message_chars,
        );

        Arc::new(Self {
            config,
            sessions,
            memories,
            chat,
            queue,
        })
    }
}
