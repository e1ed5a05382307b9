//! The long-horizon daily quota window.

use crate::error::ClientError;
use crate::store::{LocalStore, QUOTA_RESET_KEY};
use chrono::Utc;
use std::time::Duration;

/// Length of a window, counted from the first quota exhaustion.
pub const QUOTA_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaWindow {
    pub reset_at_epoch_millis: i64,
}

impl QuotaWindow {
    /// A fresh window beginning at `now_millis`.
    pub fn starting_at(now_millis: i64) -> Self {
        Self {
            reset_at_epoch_millis: now_millis + QUOTA_WINDOW.as_millis() as i64,
        }
    }

    pub fn is_active(&self, now_millis: i64) -> bool {
        self.reset_at_epoch_millis > now_millis
    }

    /// Whole seconds left, rounded up; zero once the window has passed.
    pub fn remaining_seconds(&self, now_millis: i64) -> u64 {
        let remaining_ms = self.reset_at_epoch_millis - now_millis;
        if remaining_ms <= 0 {
            0
        } else {
            (remaining_ms as u64).div_ceil(1000)
        }
    }

    /// Read the persisted window. An unreadable value counts as none.
    pub fn load(store: &dyn LocalStore) -> Result<Option<Self>, ClientError> {
        let Some(raw) = store.get(QUOTA_RESET_KEY)? else {
            return Ok(None);
        };

        match raw.trim().parse::<i64>() {
            Ok(reset_at_epoch_millis) => Ok(Some(Self {
                reset_at_epoch_millis,
            })),
            Err(e) => {
                tracing::warn!(value = %raw, error = %e, "Ignoring unreadable quota reset time");
                Ok(None)
            }
        }
    }

    pub fn save(&self, store: &dyn LocalStore) -> Result<(), ClientError> {
        store.set(QUOTA_RESET_KEY, &self.reset_at_epoch_millis.to_string())
    }

    pub fn clear(store: &dyn LocalStore) -> Result<(), ClientError> {
        store.remove(QUOTA_RESET_KEY)
    }
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Render seconds as `HH:MM:SS`.
pub fn format_hms(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
