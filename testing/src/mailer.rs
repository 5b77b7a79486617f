//! Recording mailer.

#![allow(clippy::unwrap_used)] // Poisoned locks only happen after a test already panicked

use conference_runtime::mailer::{Mail, MailError, Mailer};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// [`Mailer`] that keeps sent messages in memory and can fail on demand.
#[derive(Clone, Debug, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<Mail>>>,
    failures: Arc<AtomicUsize>,
}

impl RecordingMailer {
    /// Create a mailer with no messages.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Mail> {
        self.sent.lock().unwrap().clone()
    }

    /// Make the next `n` sends fail.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, mail: Mail) -> Pin<Box<dyn Future<Output = Result<(), MailError>> + Send + '_>> {
        Box::pin(async move {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(MailError::Delivery("smtp down".to_string()));
            }
            self.sent.lock().unwrap().push(mail);
            Ok(())
        })
    }
}
