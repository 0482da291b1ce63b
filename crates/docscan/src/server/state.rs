//! Application state for the extraction server

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ExtractConfig;
use crate::extract::Extractor;
use crate::ocr::EngineInfo;
use crate::processing::{JobRegistry, ProcessingWorker};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: ExtractConfig,
    /// OCR engine, rasteriser and preprocessing
    extractor: Extractor,
    /// Engine picked at startup
    engine_info: EngineInfo,
    /// Background PDF jobs
    registry: Arc<JobRegistry>,
    /// Ready state
    ready: RwLock<bool>,
}

impl AppState {
    /// Probe the OCR tooling and create the application state
    pub fn new(config: ExtractConfig) -> Self {
        tracing::info!("Initializing extraction service state...");
        let (extractor, engine_info) = Extractor::from_config(&config);
        Self::with_extractor(config, extractor, engine_info)
    }

    /// Create state around an existing extractor and start the job worker
    ///
    /// Must be called inside a tokio runtime.
    pub fn with_extractor(
        config: ExtractConfig,
        extractor: Extractor,
        engine_info: EngineInfo,
    ) -> Self {
        let jobs = &config.jobs;
        let (registry, receiver) = JobRegistry::new(
            jobs.queue_capacity,
            jobs.workers(),
            Duration::from_secs(jobs.result_ttl_secs),
        );
        let registry = Arc::new(registry);

        let worker = ProcessingWorker::new(Arc::clone(&registry), extractor.clone(), jobs);
        tokio::spawn(worker.run(receiver));
        registry.spawn_sweeper(Duration::from_secs(jobs.sweep_interval_secs));
        tracing::info!(
            "Job queue ready: {} engine, capacity {}, results kept {}s",
            extractor.engine_name(),
            jobs.queue_capacity,
            jobs.result_ttl_secs
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                extractor,
                engine_info,
                registry,
                ready: RwLock::new(true),
            }),
        }
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.inner.config
    }

    pub fn extractor(&self) -> &Extractor {
        &self.inner.extractor
    }

    pub fn engine_info(&self) -> &EngineInfo {
        &self.inner.engine_info
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.inner.registry
    }

    /// Check if the server is ready
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }
}
