use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Email, Notifier, NotifyError};

/// Records every email instead of sending it. Can be told to fail.
#[derive(Default)]
pub struct MemoryOutbox {
    sent: Mutex<Vec<Email>>,
    failing: AtomicBool,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emails accepted so far, in send order.
    pub fn emails(&self) -> Vec<Email> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn emails_to(&self, to: &str) -> Vec<Email> {
        self.emails().into_iter().filter(|e| e.to == to).collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// While set, every send fails with a transport error and nothing is recorded.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for MemoryOutbox {
    async fn send(&self, email: &Email) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport("outbox unavailable".to_string()));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(email.clone());
        Ok(())
    }
}
