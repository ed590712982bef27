//! Audit sinks provided by the service.

use topup_core::{AuditEntry, AuditSink};

/// Emits audit entries as `tracing` events under the `topup::audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: AuditEntry) {
        tracing::info!(
            target: "topup::audit",
            user_id = %entry.user_id,
            category = entry.category.as_str(),
            recorded_at = %entry.recorded_at,
            "{}",
            entry.message
        );
    }
}

/// Forwards every entry to each wrapped sink in order.
pub struct FanoutAuditSink {
    sinks: Vec<std::sync::Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    /// Wrap `sinks`.
    #[must_use]
    pub fn new(sinks: Vec<std::sync::Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }
}

impl AuditSink for FanoutAuditSink {
    fn record(&self, entry: AuditEntry) {
        for sink in &self.sinks {
            sink.record(entry.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use topup_core::{LogCategory, RecordingAuditSink, UserId};

    #[test]
    fn fanout_reaches_every_sink() {
        let first = Arc::new(RecordingAuditSink::new());
        let second = Arc::new(RecordingAuditSink::new());
        let sinks: Vec<Arc<dyn AuditSink>> =
            vec![first.clone(), second.clone(), Arc::new(TracingAuditSink)];
        let fanout = FanoutAuditSink::new(sinks);

        fanout.record(AuditEntry::new(UserId::generate(), LogCategory::Topup, "credited"));

        assert_eq!(first.entries().len(), 1);
        assert_eq!(second.entries()[0].message, "credited");
    }
}
