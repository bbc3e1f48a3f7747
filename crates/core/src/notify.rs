//! Outbound channel announcements.
//!
//! A notification is sent after the state change it describes has been
//! committed. Delivery failures never undo that change; callers log them and
//! move on.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::cycle::CycleId;
use crate::phases::Phase;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub cycle_id: CycleId,
    pub phase: Phase,
    pub text: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),
    #[error("notification rejected by platform: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Drops every notification. Used when no channel is configured.
#[derive(Clone, Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    failing: Arc<Mutex<bool>>,
}

impl InMemoryNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Makes every following `notify` call fail without recording.
    pub fn fail_deliveries(&self, failing: bool) {
        match self.failing.lock() {
            Ok(mut flag) => *flag = failing,
            Err(poisoned) => *poisoned.into_inner() = failing,
        }
    }

    fn is_failing(&self) -> bool {
        match self.failing.lock() {
            Ok(flag) => *flag,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        if self.is_failing() {
            return Err(NotifyError::Transport("in-memory notifier set to fail".to_owned()));
        }
        match self.sent.lock() {
            Ok(mut sent) => sent.push(notification.clone()),
            Err(poisoned) => poisoned.into_inner().push(notification.clone()),
        }
        Ok(())
    }
}
