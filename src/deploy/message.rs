use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Warning,
    Error,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Info => write!(f, "Info"),
            MessageKind::Warning => write!(f, "Warning"),
            MessageKind::Error => write!(f, "Error"),
        }
    }
}

/// A line of deployment output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticMessage {
    pub timestamp: DateTime<Utc>,
    pub kind: MessageKind,
    pub text: String,
}

impl DiagnosticMessage {
    pub fn new(kind: MessageKind, text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            text: text.into(),
        }
    }
}

impl fmt::Display for DiagnosticMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.text)
    }
}

type Subscriber = Arc<dyn Fn(&DiagnosticMessage) + Send + Sync>;

/// Synchronous, ordered fan-out of diagnostic messages.
///
/// Every subscriber sees each message in emission order, on the emitting task.
#[derive(Clone, Default)]
pub struct MessageChannel {
    subscribers: Vec<Subscriber>,
}

impl MessageChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: Fn(&DiagnosticMessage) + Send + Sync + 'static,
    {
        self.subscribers.push(Arc::new(callback));
    }

    pub fn emit(&self, kind: MessageKind, text: impl Into<String>) {
        let message = DiagnosticMessage::new(kind, text);
        for subscriber in &self.subscribers {
            subscriber(&message);
        }
    }

    pub fn info(&self, text: impl Into<String>) {
        self.emit(MessageKind::Info, text);
    }

    pub fn warning(&self, text: impl Into<String>) {
        self.emit(MessageKind::Warning, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.emit(MessageKind::Error, text);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl fmt::Debug for MessageChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageChannel")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
