//! Shared application state.

use std::sync::Arc;

use survey_ingest::IntakePipeline;

use crate::config::Config;

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Intake pipeline over the survey log.
    pub pipeline: Arc<IntakePipeline>,

    /// Application configuration.
    pub config: Arc<Config>,
}

impl AppState {
    /// Open the survey log and build the state.
    ///
    /// Fails if the log exists but cannot be read (index mode reads it here).
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let pipeline = IntakePipeline::open(config.pipeline())?;

        Ok(Self {
            pipeline: Arc::new(pipeline),
            config: Arc::new(config),
        })
    }
}
