//! Audit sink that keeps every event for assertions

use std::sync::Mutex;

use metasync_core::{AuditEvent, AuditSink};

#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Events with the given [`AuditEvent::name`]
    pub fn named(&self, name: &str) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.name() == name)
            .collect()
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, event: &AuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
