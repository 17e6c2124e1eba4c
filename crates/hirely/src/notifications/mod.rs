//! Outbound email: transports and the job listing digest template.

pub mod digest;
pub mod mailer;

pub use digest::{digest_email, DigestEntry, DigestRecipient, DIGEST_SUBJECT};
pub use mailer::{LogMailer, MailError, Mailer, OutboundEmail, ResendMailer};
