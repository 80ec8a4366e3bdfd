// libs/booking-cell/src/services/scheduler.rs
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

struct ScheduledTask {
    task_id: Uuid,
    fire_at: DateTime<Utc>,
    handle: JoinHandle<()>,
}

/// Deferred notification tasks keyed by appointment id.
///
/// Every scheduled task keeps its join handle, so cancelling an
/// appointment can abort the pending reminder and follow-up instead
/// of letting orphaned timers fire for a visit that no longer exists.
/// A task that runs to completion removes its own entry, so the map
/// only ever holds genuinely pending work.
#[derive(Default)]
pub struct NotificationScheduler {
    pending: Arc<Mutex<HashMap<Uuid, Vec<ScheduledTask>>>>,
}

impl NotificationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` to run at `fire_at`. Past-due trigger times are
    /// skipped outright, never fired immediately; `None` marks the
    /// skip.
    pub async fn schedule<F>(
        &self,
        appointment_id: Uuid,
        fire_at: DateTime<Utc>,
        now: DateTime<Utc>,
        task: F,
    ) -> Option<Uuid>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = fire_at - now;
        let Ok(delay) = delay.to_std() else {
            debug!(
                "Skipping past-due notification for appointment {} (was due {})",
                appointment_id, fire_at
            );
            return None;
        };
        if delay.is_zero() {
            debug!(
                "Skipping notification due exactly now for appointment {}",
                appointment_id
            );
            return None;
        }

        let task_id = Uuid::new_v4();

        // Hold the lock across the spawn so the task's own cleanup
        // cannot run before its entry has been inserted.
        let mut pending = self.pending.lock().await;
        let reclaim = Arc::clone(&self.pending);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;

            let mut pending = reclaim.lock().await;
            if let Some(tasks) = pending.get_mut(&appointment_id) {
                tasks.retain(|t| t.task_id != task_id);
                if tasks.is_empty() {
                    pending.remove(&appointment_id);
                }
            }
        });

        pending.entry(appointment_id).or_default().push(ScheduledTask {
            task_id,
            fire_at,
            handle,
        });

        debug!(
            "Scheduled task {} for appointment {} at {}",
            task_id, appointment_id, fire_at
        );
        Some(task_id)
    }

    /// Abort every pending task for an appointment. Idempotent;
    /// returns how many tasks were cancelled.
    pub async fn cancel_for(&self, appointment_id: Uuid) -> usize {
        let Some(tasks) = self.pending.lock().await.remove(&appointment_id) else {
            return 0;
        };

        let count = tasks.len();
        for task in tasks {
            debug!(
                "Cancelling task {} (was due {}) for appointment {}",
                task.task_id, task.fire_at, appointment_id
            );
            task.handle.abort();
        }
        if count > 0 {
            info!(
                "Cancelled {} pending notifications for appointment {}",
                count, appointment_id
            );
        }
        count
    }

    /// Cancel a single task by its id.
    pub async fn cancel(&self, task_id: Uuid) -> bool {
        let mut pending = self.pending.lock().await;
        for tasks in pending.values_mut() {
            if let Some(index) = tasks.iter().position(|t| t.task_id == task_id) {
                let task = tasks.remove(index);
                task.handle.abort();
                return true;
            }
        }
        false
    }

    pub async fn pending_count(&self, appointment_id: Uuid) -> usize {
        self.pending
            .lock()
            .await
            .get(&appointment_id)
            .map_or(0, Vec::len)
    }
}

impl Drop for NotificationScheduler {
    fn drop(&mut self) {
        // Orphaned timers must not outlive their scheduler.
        if let Ok(pending) = self.pending.try_lock() {
            for tasks in pending.values() {
                for task in tasks {
                    task.handle.abort();
                }
            }
        }
    }
}
