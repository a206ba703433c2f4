//! Stage observer hooks.

use std::sync::{Arc, OnceLock, RwLock};
use std::time::{Duration, Instant};

use markup::MarkupError;
use writer::WriterError;

/// Metrics observer for pipeline stages.
pub trait PipelineMetrics: Send + Sync {
    /// Parse and classify of one document.
    fn record_parse(&self, latency: Duration, result: Result<(), MarkupError>);
    /// Detection and normalization of one document.
    fn record_detect(&self, latency: Duration, occurrences: usize);
    /// The corpus-wide reasoning pass.
    fn record_reason(&self, latency: Duration, planned: usize);
    /// Writing one document.
    fn record_write(&self, latency: Duration, result: Result<usize, WriterError>);
}

/// Install or clear the global pipeline metrics recorder.
pub fn set_pipeline_metrics(recorder: Option<Arc<dyn PipelineMetrics>>) {
    let mut guard = metrics_lock()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = recorder;
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn PipelineMetrics>>> {
    static METRICS: OnceLock<RwLock<Option<Arc<dyn PipelineMetrics>>>> = OnceLock::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

fn metrics_recorder() -> Option<Arc<dyn PipelineMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}

/// Times one stage invocation when a recorder is installed.
pub(crate) struct MetricsSpan {
    recorder: Arc<dyn PipelineMetrics>,
    start: Instant,
}

impl MetricsSpan {
    pub(crate) fn start() -> Option<Self> {
        metrics_recorder().map(|recorder| Self {
            recorder,
            start: Instant::now(),
        })
    }

    pub(crate) fn record_parse(self, result: Result<(), MarkupError>) {
        self.recorder.record_parse(self.start.elapsed(), result);
    }

    pub(crate) fn record_detect(self, occurrences: usize) {
        self.recorder.record_detect(self.start.elapsed(), occurrences);
    }

    pub(crate) fn record_reason(self, planned: usize) {
        self.recorder.record_reason(self.start.elapsed(), planned);
    }

    pub(crate) fn record_write(self, result: Result<usize, WriterError>) {
        self.recorder.record_write(self.start.elapsed(), result);
    }
}
