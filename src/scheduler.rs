use std::time::Duration;

use tokio::task::JoinHandle;

use crate::commands::CommandCtx;
use crate::events::RemindersPayload;
use crate::models::{Task, Timestamp};
use crate::state::AppState;
use crate::undo::UndoToken;

/// Closes the undo window for `token` once `ttl_ms` has elapsed. A newer delete
/// replaces the token, so a stale timer is a no-op.
pub fn spawn_undo_expiry<C>(ctx: C, state: AppState, token: UndoToken, ttl_ms: Timestamp) -> JoinHandle<()>
where
    C: CommandCtx + Send + Sync + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(ttl_ms.max(0) as u64)).await;
        if state.expire_undo(token) {
            log::debug!("undo window closed token={token:?}");
            ctx.emit_state_updated(state.state_payload(ctx.now_ms()));
        }
    })
}

pub fn start_scheduler<C>(ctx: C, state: AppState, tick: Duration) -> JoinHandle<()>
where
    C: CommandCtx + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last = RemindersPayload::default();
        loop {
            interval.tick().await;
            let now = ctx.now_ms();
            if let Some(token) = state.expire_due_undo(now) {
                log::debug!("undo window lapsed token={token:?}");
                ctx.emit_state_updated(state.state_payload(now));
            }
            let current = collect_reminder_ids(&state.tasks(), now);
            if current != last {
                log::info!(
                    "reminders changed overdue={} critical={}",
                    current.overdue_ids.len(),
                    current.critical_ids.len()
                );
                ctx.emit_reminders_changed(current.clone());
                last = current;
            }
        }
    })
}

fn collect_reminder_ids(tasks: &[Task], now: Timestamp) -> RemindersPayload {
    let mut overdue_ids = Vec::new();
    let mut critical_ids = Vec::new();
    for task in tasks {
        if task.is_overdue_at(now) {
            overdue_ids.push(task.id.clone());
        }
        if task.is_critical_at(now) {
            critical_ids.push(task.id.clone());
        }
    }
    overdue_ids.sort();
    critical_ids.sort();
    RemindersPayload {
        overdue_ids,
        critical_ids,
    }
}
