//! Where fatal load messages go.
use std::sync::{Arc, Mutex};

/// Receives one human-readable message per failed load.
pub trait DiagnosticSink {
    fn report(&self, message: &str);
}

/// Default sink: an `error` event on the `json_loader` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, message: &str) {
        tracing::error!(target: "json_loader", "{message}");
    }
}

/// Keeps every message; clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    messages: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self { Self::default() }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.to_string());
        }
    }
}
