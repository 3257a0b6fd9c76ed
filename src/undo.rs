//! Single-slot holding area for the most recently deleted task.
//!
//! Every `hold` bumps a generation counter and hands back an [`UndoToken`].
//! Expiry callbacks must present the token they were scheduled with, so a
//! timer that fires late can never clear a newer hold.

use serde::Serialize;

use crate::models::{Task, Timestamp};

pub const DEFAULT_UNDO_TTL_MS: Timestamp = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct UndoToken(u64);

#[derive(Debug, Clone)]
struct Held {
    task: Task,
    token: UndoToken,
    expires_at: Timestamp,
}

#[derive(Debug, Default)]
pub struct UndoBuffer {
    held: Option<Held>,
    generation: u64,
}

impl UndoBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Holds `task` until `now + ttl_ms`. A previously held task is dropped for good.
    pub fn hold(&mut self, task: Task, now: Timestamp, ttl_ms: Timestamp) -> UndoToken {
        self.generation += 1;
        let token = UndoToken(self.generation);
        if let Some(previous) = self.held.take() {
            log::debug!(
                "undo slot replaced, task id={} is now permanently deleted",
                previous.task.id
            );
        }
        self.held = Some(Held {
            task,
            token,
            expires_at: now.saturating_add(ttl_ms),
        });
        token
    }

    /// Empties the slot and returns the held task if it has not expired at `now`.
    pub fn take(&mut self, now: Timestamp) -> Option<Task> {
        let held = self.held.take()?;
        if now >= held.expires_at {
            log::debug!("undo requested after expiry for task id={}", held.task.id);
            return None;
        }
        Some(held.task)
    }

    /// Timer callback. Clears the slot only when `token` is still the current hold.
    pub fn expire(&mut self, token: UndoToken) -> bool {
        match &self.held {
            Some(held) if held.token == token => {
                log::debug!("undo window closed for task id={}", held.task.id);
                self.held = None;
                true
            }
            _ => false,
        }
    }

    /// Clears the slot if its deadline has passed at `now`.
    pub fn expire_due(&mut self, now: Timestamp) -> Option<UndoToken> {
        let token = match &self.held {
            Some(held) if now >= held.expires_at => held.token,
            _ => return None,
        };
        self.expire(token);
        Some(token)
    }

    pub fn is_pending(&self, now: Timestamp) -> bool {
        self.held
            .as_ref()
            .map(|held| now < held.expires_at)
            .unwrap_or(false)
    }

    pub fn held_task(&self) -> Option<&Task> {
        self.held.as_ref().map(|held| &held.task)
    }

    pub fn current_token(&self) -> Option<UndoToken> {
        self.held.as_ref().map(|held| held.token)
    }
}
