// libs/booking-cell/tests/scheduler_test.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use booking_cell::services::scheduler::NotificationScheduler;

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

async fn count_task(fired: Arc<AtomicUsize>) {
    fired.fetch_add(1, Ordering::SeqCst);
}

#[tokio::test(start_paused = true)]
async fn scheduled_task_fires_once_the_delay_elapses() {
    let scheduler = NotificationScheduler::new();
    let fired = counter();
    let now = Utc::now();

    let task_id = scheduler
        .schedule(Uuid::new_v4(), now + Duration::hours(1), now, {
            let fired = fired.clone();
            async move { count_task(fired).await }
        })
        .await;
    assert!(task_id.is_some());

    // Paused time auto-advances to the pending timer.
    tokio::time::sleep(std::time::Duration::from_secs(3700)).await;
    tokio::task::yield_now().await;

    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn cancelling_an_appointment_aborts_its_pending_tasks() {
    let scheduler = NotificationScheduler::new();
    let fired = counter();
    let now = Utc::now();
    let appointment_id = Uuid::new_v4();

    for hours in [1, 25] {
        scheduler
            .schedule(appointment_id, now + Duration::hours(hours), now, {
                let fired = fired.clone();
                async move { count_task(fired).await }
            })
            .await;
    }
    assert_eq!(scheduler.pending_count(appointment_id).await, 2);

    assert_eq!(scheduler.cancel_for(appointment_id).await, 2);
    assert_eq!(scheduler.pending_count(appointment_id).await, 0);

    // Well past both trigger times: nothing fires.
    tokio::time::sleep(std::time::Duration::from_secs(26 * 3600)).await;
    tokio::task::yield_now().await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    // A second cancel finds nothing left.
    assert_eq!(scheduler.cancel_for(appointment_id).await, 0);
}

#[tokio::test(start_paused = true)]
async fn past_due_trigger_times_are_skipped_not_fired() {
    let scheduler = NotificationScheduler::new();
    let fired = counter();
    let now = Utc::now();
    let appointment_id = Uuid::new_v4();

    let overdue = scheduler
        .schedule(appointment_id, now - Duration::hours(1), now, {
            let fired = fired.clone();
            async move { count_task(fired).await }
        })
        .await;
    assert_eq!(overdue, None);

    let due_now = scheduler
        .schedule(appointment_id, now, now, {
            let fired = fired.clone();
            async move { count_task(fired).await }
        })
        .await;
    assert_eq!(due_now, None);

    assert_eq!(scheduler.pending_count(appointment_id).await, 0);

    tokio::time::sleep(std::time::Duration::from_secs(7200)).await;
    tokio::task::yield_now().await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn single_tasks_can_be_cancelled_by_id() {
    let scheduler = NotificationScheduler::new();
    let fired = counter();
    let now = Utc::now();
    let appointment_id = Uuid::new_v4();

    let keep = scheduler
        .schedule(appointment_id, now + Duration::hours(1), now, {
            let fired = fired.clone();
            async move { count_task(fired).await }
        })
        .await
        .unwrap();
    let drop = scheduler
        .schedule(appointment_id, now + Duration::hours(2), now, {
            let fired = fired.clone();
            async move { count_task(fired).await }
        })
        .await
        .unwrap();

    assert!(scheduler.cancel(drop).await);
    assert!(!scheduler.cancel(drop).await);
    assert_eq!(scheduler.pending_count(appointment_id).await, 1);

    tokio::time::sleep(std::time::Duration::from_secs(3 * 3600)).await;
    tokio::task::yield_now().await;

    // Only the kept task ran, and running removed its entry.
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(!scheduler.cancel(keep).await);
}

#[tokio::test(start_paused = true)]
async fn delivered_tasks_no_longer_count_as_pending() {
    let scheduler = NotificationScheduler::new();
    let fired = counter();
    let now = Utc::now();
    let appointment_id = Uuid::new_v4();

    scheduler
        .schedule(appointment_id, now + Duration::hours(1), now, {
            let fired = fired.clone();
            async move { count_task(fired).await }
        })
        .await
        .unwrap();
    assert_eq!(scheduler.pending_count(appointment_id).await, 1);

    tokio::time::sleep(std::time::Duration::from_secs(7200)).await;
    tokio::task::yield_now().await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    // The fired task reclaimed its own bookkeeping entry, so nothing
    // is left to report or to cancel.
    assert_eq!(scheduler.pending_count(appointment_id).await, 0);
    assert_eq!(scheduler.cancel_for(appointment_id).await, 0);
}
