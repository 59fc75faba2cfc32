use std::sync::Mutex;

use serde::Serialize;

use crate::error::PortalError;

pub trait Notifier: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), PortalError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), PortalError> {
        tracing::info!(to, subject, body, "notification");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentMessage>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), PortalError> {
        if self.fail {
            return Err(PortalError::Notification(format!("delivery to {to} refused")));
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| PortalError::Notification("notifier lock poisoned".to_string()))?;
        sent.push(SentMessage {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

pub const APPROVAL_SUBJECT: &str = "Data Access Request Approved";
pub const NEW_REQUEST_SUBJECT: &str = "New Data Access Request";

pub fn approval_body() -> String {
    "Hello,\n\nYour request to access NCCR Marine Data has been APPROVED by the Admin.\n\
     You can now login and download the data.\n\nRegards,\nNCCR Admin Team"
        .to_string()
}

pub fn new_request_body(email: &str, purpose: &str) -> String {
    format!("User {email} requested data access.\nPurpose: {purpose}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_notifier_keeps_messages() {
        let notifier = RecordingNotifier::new();
        notifier.send("a@x.org", "hi", "body").unwrap();
        assert_eq!(notifier.sent().len(), 1);
        assert_eq!(notifier.sent()[0].to, "a@x.org");
    }

    #[test]
    fn failing_notifier_errors() {
        let notifier = RecordingNotifier::failing();
        assert!(notifier.send("a@x.org", "hi", "body").is_err());
        assert!(notifier.sent().is_empty());
    }

    #[test]
    fn request_body_mentions_purpose() {
        let body = new_request_body("a@x.org", "mangrove mapping");
        assert!(body.contains("a@x.org"));
        assert!(body.ends_with("Purpose: mangrove mapping"));
    }
}
