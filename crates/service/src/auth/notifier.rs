use async_trait::async_trait;
use tracing::info;

use super::errors::AuthError;

/// Delivery channel for out-of-band tokens (password reset links).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_password_reset(&self, email: &str, token: &str) -> Result<(), AuthError>;
}

/// Records that a reset was issued. The token itself is never logged.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_password_reset(&self, email: &str, _token: &str) -> Result<(), AuthError> {
        info!(email = %email, "password_reset_issued");
        Ok(())
    }
}

pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every delivered `(email, token)` pair for assertions.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingNotifier {
        pub fn last_token_for(&self, email: &str) -> Option<String> {
            self.sent.lock().unwrap().iter().rev().find(|(e, _)| e == email).map(|(_, t)| t.clone())
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_password_reset(&self, email: &str, token: &str) -> Result<(), AuthError> {
            self.sent.lock().unwrap().push((email.to_string(), token.to_string()));
            Ok(())
        }
    }
}
