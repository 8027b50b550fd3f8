//! Notification adapter that renders mails into the log
//!
//! Keeps the most recent deliveries in a bounded outbox so operators (and
//! tests) can inspect what would have been sent.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::application::ports::{
    Banned, CollaboratorError, EmailChange, NotificationClient, PasswordNotice, PermissionChange,
    RoleChange, Unbanned, Welcome,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailKind {
    Welcome,
    PasswordReset,
    PasswordChange,
    EmailChange,
    PermissionChange,
    RoleChange,
    Banned,
    Unbanned,
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub kind: MailKind,
    pub recipients: Vec<String>,
    pub body: serde_json::Value,
}

pub struct TracingMailer {
    outbox: Mutex<VecDeque<SentMail>>,
    capacity: usize,
    offline: AtomicBool,
}

impl TracingMailer {
    pub fn new(capacity: usize) -> Self {
        Self {
            outbox: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            offline: AtomicBool::new(false),
        }
    }

    /// While offline every send fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMail> {
        match self.outbox.lock() {
            Ok(outbox) => outbox.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    pub fn sent_of(&self, kind: MailKind) -> Vec<SentMail> {
        self.sent().into_iter().filter(|m| m.kind == kind).collect()
    }

    fn deliver(
        &self,
        kind: MailKind,
        recipients: Vec<String>,
        payload: &impl Serialize,
    ) -> Result<(), CollaboratorError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable("mailer offline".into()));
        }
        let body = serde_json::to_value(payload)
            .map_err(|e| CollaboratorError::Rejected(e.to_string()))?;

        info!(target: "mail", kind = ?kind, to = ?recipients, "mail queued");

        let mut outbox = self
            .outbox
            .lock()
            .map_err(|_| CollaboratorError::Unavailable("outbox lock poisoned".into()))?;
        if outbox.len() == self.capacity {
            outbox.pop_front();
        }
        outbox.push_back(SentMail {
            kind,
            recipients,
            body,
        });
        Ok(())
    }
}

#[async_trait]
impl NotificationClient for TracingMailer {
    async fn send_welcome(&self, mail: Welcome) -> Result<(), CollaboratorError> {
        self.deliver(MailKind::Welcome, vec![mail.target_email.clone()], &mail)
    }

    async fn send_password_reset(&self, mail: PasswordNotice) -> Result<(), CollaboratorError> {
        self.deliver(MailKind::PasswordReset, vec![mail.target_email.clone()], &mail)
    }

    async fn send_password_change(&self, mail: PasswordNotice) -> Result<(), CollaboratorError> {
        self.deliver(MailKind::PasswordChange, vec![mail.target_email.clone()], &mail)
    }

    async fn send_email_change(&self, mail: EmailChange) -> Result<(), CollaboratorError> {
        self.deliver(MailKind::EmailChange, vec![mail.target_email.clone()], &mail)
    }

    async fn send_permission_change(&self, mail: PermissionChange) -> Result<(), CollaboratorError> {
        self.deliver(MailKind::PermissionChange, vec![mail.target_email.clone()], &mail)
    }

    async fn send_role_change(&self, mail: RoleChange) -> Result<(), CollaboratorError> {
        self.deliver(MailKind::RoleChange, mail.target_emails.clone(), &mail)
    }

    async fn send_banned(&self, mail: Banned) -> Result<(), CollaboratorError> {
        self.deliver(MailKind::Banned, vec![mail.target_email.clone()], &mail)
    }

    async fn send_unbanned(&self, mail: Unbanned) -> Result<(), CollaboratorError> {
        self.deliver(MailKind::Unbanned, vec![mail.target_email.clone()], &mail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn welcome(n: usize) -> Welcome {
        Welcome {
            target_email: format!("p{n}@example.com"),
            cid: format!("{:04}", n),
        }
    }

    #[tokio::test]
    async fn outbox_is_bounded() {
        let mailer = TracingMailer::new(2);
        for n in 0..3 {
            mailer.send_welcome(welcome(n)).await.unwrap();
        }
        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].recipients, vec!["p1@example.com".to_string()]);
        assert_eq!(sent[1].body["cid"], "0002");
    }

    #[tokio::test]
    async fn offline_mailer_fails() {
        let mailer = TracingMailer::new(2);
        mailer.set_offline(true);
        let err = mailer.send_welcome(welcome(1)).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Unavailable(_)));
        assert!(mailer.sent().is_empty());
    }
}
