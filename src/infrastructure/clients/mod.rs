//! Adapters for the engine's outbound collaborators

pub mod audit_bus;
pub mod email_code;
pub mod mailer;

pub use audit_bus::{AuditBus, AuditSubscriber};
pub use email_code::InMemoryEmailCodeStore;
pub use mailer::{MailKind, SentMail, TracingMailer};
