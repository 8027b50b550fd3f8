//! Detached audit / notification pipeline
//!
//! Runs after a mutation has committed. Every task gets its own deadline;
//! failures and timeouts are logged and never reach the caller.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::application::context::Actor;
use crate::application::ports::{
    AuditLogClient, CollaboratorError, EmailCodeVerifier, NotificationClient,
};
use crate::domain::{AuditEvent, UserRepository};

/// Deadline for side effects that touch a `count`-sized batch of targets.
pub fn bulk_deadline(count: usize) -> Duration {
    Duration::from_secs((count as u64 + 1) * 5)
}

#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

struct InFlightGuard(Arc<InFlight>);

impl InFlightGuard {
    fn enter(tracker: &Arc<InFlight>) -> Self {
        tracker.count.fetch_add(1, Ordering::SeqCst);
        Self(tracker.clone())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

#[derive(Clone)]
pub struct SideEffects {
    audit: Arc<dyn AuditLogClient>,
    notifier: Arc<dyn NotificationClient>,
    codes: Arc<dyn EmailCodeVerifier>,
    in_flight: Arc<InFlight>,
}

impl SideEffects {
    pub fn new(
        audit: Arc<dyn AuditLogClient>,
        notifier: Arc<dyn NotificationClient>,
        codes: Arc<dyn EmailCodeVerifier>,
    ) -> Self {
        Self {
            audit,
            notifier,
            codes,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Detach `task` under `deadline`. Returns immediately.
    pub fn spawn<F>(&self, operation: &'static str, deadline: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = InFlightGuard::enter(&self.in_flight);
        tokio::spawn(async move {
            let _guard = guard;
            match tokio::time::timeout(deadline, task).await {
                Ok(()) => debug!(operation, "side effects finished"),
                Err(_) => warn!(
                    operation,
                    deadline_secs = deadline.as_secs(),
                    "side effects timed out"
                ),
            }
        });
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    /// Resolves once no detached task is running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.in_flight.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    pub async fn audit(&self, event: AuditEvent) {
        let kind = event.event.as_str();
        if let Err(e) = self.audit.log(event).await {
            warn!(event = kind, error = %e, "failed to write audit log");
        }
    }

    pub fn notifier(&self) -> &dyn NotificationClient {
        self.notifier.as_ref()
    }

    pub fn codes(&self) -> &dyn EmailCodeVerifier {
        self.codes.as_ref()
    }

    pub async fn remove_code(&self, email: &str) {
        if let Err(e) = self.codes.remove_code(email).await {
            warn!(error = %e, "failed to remove email code");
        }
    }
}

/// Who performed a mutation, as shown in notification mails
#[derive(Debug, Clone)]
pub struct Operator {
    pub cid: String,
    pub contact: String,
}

/// Load the acting user from inside a detached task. Falls back to the
/// token snapshot when the lookup fails.
pub async fn load_operator(users: &dyn UserRepository, actor: &Actor) -> Operator {
    match users.get_by_id(actor.uid).await {
        Ok(user) => Operator {
            cid: user.display_cid(),
            contact: user.email,
        },
        Err(e) => {
            warn!(uid = actor.uid, error = %e, "failed to load operator");
            Operator {
                cid: actor.subject(),
                contact: String::new(),
            }
        }
    }
}

/// Log a failed notification delivery.
pub fn report(what: &'static str, result: Result<(), CollaboratorError>) {
    if let Err(e) = result {
        warn!(notification = what, error = %e, "failed to send notification");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clients::{AuditBus, InMemoryEmailCodeStore, TracingMailer};

    fn side_effects() -> SideEffects {
        SideEffects::new(
            Arc::new(AuditBus::new()),
            Arc::new(TracingMailer::new(16)),
            Arc::new(InMemoryEmailCodeStore::new(chrono::Duration::minutes(5))),
        )
    }

    #[test]
    fn bulk_deadline_scales_with_targets() {
        assert_eq!(bulk_deadline(0), Duration::from_secs(5));
        assert_eq!(bulk_deadline(3), Duration::from_secs(20));
    }

    #[tokio::test]
    async fn timed_out_task_is_abandoned() {
        let fx = side_effects();
        fx.spawn("slow", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        tokio::time::timeout(Duration::from_secs(2), fx.wait_idle())
            .await
            .expect("deadline should cut the task short");
        assert_eq!(fx.in_flight(), 0);
    }

    #[tokio::test]
    async fn spawn_does_not_block_the_caller() {
        let fx = side_effects();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        fx.spawn("waiting", Duration::from_secs(5), async move {
            let _ = rx.await;
        });
        assert_eq!(fx.in_flight(), 1);
        let _ = tx.send(());
        fx.wait_idle().await;
        assert_eq!(fx.in_flight(), 0);
    }
}
