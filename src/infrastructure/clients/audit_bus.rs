//! Audit bus
//!
//! Implements the audit-log port by writing each event to the tracing
//! sink and broadcasting it to in-process subscribers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::application::ports::{AuditLogClient, CollaboratorError};
use crate::domain::AuditEvent;

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct AuditBus {
    sender: broadcast::Sender<AuditEvent>,
    subscriber_count: Arc<AtomicUsize>,
}

impl AuditBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscriber_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn publish(&self, event: AuditEvent) {
        let kind = event.event.as_str();
        match self.sender.send(event) {
            Ok(count) => debug!(event = kind, subscribers = count, "audit event published"),
            Err(_) => debug!(event = kind, "audit event published (no subscribers)"),
        }
    }

    pub fn subscribe(&self) -> AuditSubscriber {
        let receiver = self.sender.subscribe();
        let count = self.subscriber_count.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(total = count, "new audit subscriber");
        AuditSubscriber {
            receiver,
            subscriber_count: self.subscriber_count.clone(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count.load(Ordering::SeqCst)
    }
}

impl Default for AuditBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditLogClient for AuditBus {
    async fn log(&self, event: AuditEvent) -> Result<(), CollaboratorError> {
        info!(
            target: "audit",
            event = event.event.as_str(),
            subject = %event.subject,
            object = %event.object,
            ip = %event.ip,
            old_value = event.old_value.as_deref().unwrap_or(""),
            new_value = event.new_value.as_deref().unwrap_or(""),
            "audit"
        );
        self.publish(event);
        Ok(())
    }
}

pub struct AuditSubscriber {
    receiver: broadcast::Receiver<AuditEvent>,
    subscriber_count: Arc<AtomicUsize>,
}

impl AuditSubscriber {
    pub async fn recv(&mut self) -> Option<AuditEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(missed = count, "audit subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Everything already published, without waiting.
    pub fn drain(&mut self) -> Vec<AuditEvent> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return events,
            }
        }
    }
}

impl Drop for AuditSubscriber {
    fn drop(&mut self) {
        self.subscriber_count.fetch_sub(1, Ordering::SeqCst);
    }
}
