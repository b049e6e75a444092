//! Metrics sink that emits task timings as structured log events.

use std::time::Duration;

use async_trait::async_trait;

use crate::infrastructure::ports::{MetricsPort, SinkError, TaskStatus};

#[derive(Debug, Default)]
pub struct TracingMetrics;

impl TracingMetrics {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MetricsPort for TracingMetrics {
    async fn record_periodic_task(
        &self,
        name: &str,
        duration: Duration,
        status: TaskStatus,
    ) -> Result<(), SinkError> {
        let duration_ms = duration.as_secs_f64() * 1000.0;
        match status {
            TaskStatus::Success => tracing::debug!(
                task = name,
                duration_ms,
                status = status.as_str(),
                "Periodic task finished"
            ),
            TaskStatus::Failure => tracing::info!(
                task = name,
                duration_ms,
                status = status.as_str(),
                "Periodic task failed"
            ),
        }
        Ok(())
    }
}
