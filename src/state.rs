use std::sync::Arc;

use crate::backend::{HttpCompletionBackend, HttpSearchBackend};
use crate::config::Config;
use crate::pipeline::QueryPipeline;
use crate::session::SessionRegistry;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pipeline: QueryPipeline,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;

        let pipeline = QueryPipeline::new(
            Arc::new(HttpSearchBackend::new(
                http_client.clone(),
                config.search.clone(),
            )),
            Arc::new(HttpCompletionBackend::new(http_client, config.llm.clone())),
        );

        Ok(Self::with_pipeline(config, pipeline))
    }

    /// State over caller-supplied backends.
    pub fn with_pipeline(config: Config, pipeline: QueryPipeline) -> Self {
        Self {
            config,
            pipeline,
            sessions: Arc::new(SessionRegistry::new()),
        }
    }
}
