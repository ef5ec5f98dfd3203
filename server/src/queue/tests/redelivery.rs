//! Visibility timeout, redelivery and the delivery limit.

use super::*;
use crate::queue::types::now_ms;

fn expired_at(qm: &QueueManager) -> u64 {
    now_ms() + qm.settings().visibility_timeout_ms + 1
}

#[tokio::test]
async fn test_unacked_job_is_redelivered() {
    let qm = setup();
    let ids = qm.push("Q", payloads(&["work"])).unwrap();
    let first = pop_now(&qm, &["Q"], 1).await;

    // Not yet expired
    assert_eq!(qm.sweep_expired(now_ms()), SweepOutcome::default());

    let outcome = qm.sweep_expired(expired_at(&qm));
    assert_eq!(outcome.redelivered, 1);
    assert_eq!(outcome.dropped, 0);
    assert_eq!(qm.info("Q").unwrap().in_flight, 0);

    let second = pop_now(&qm, &["Q"], 1).await;
    assert_eq!(second[0].id, ids[0]);
    assert_eq!(second[0].payload, first[0].payload);

    let queue = qm.registry.get("Q").unwrap();
    assert_eq!(
        queue.state.lock().in_flight.get(ids[0]).unwrap().job.deliveries,
        2
    );
    assert_eq!(qm.stats().redelivered, 1);
}

#[tokio::test]
async fn test_acked_job_is_not_redelivered() {
    let qm = setup();
    qm.push("Q", payloads(&["work"])).unwrap();
    let popped = pop_now(&qm, &["Q"], 1).await;
    assert!(qm.ack("Q", popped[0].id));

    let outcome = qm.sweep_expired(expired_at(&qm));
    assert_eq!(outcome, SweepOutcome::default());
    assert!(pop_now(&qm, &["Q"], 1).await.is_empty());
}

#[tokio::test]
async fn test_late_ack_after_redelivery_is_noop() {
    let qm = setup();
    qm.push("Q", payloads(&["work"])).unwrap();
    let popped = pop_now(&qm, &["Q"], 1).await;
    qm.sweep_expired(expired_at(&qm));

    // Back in the pending list, no longer in flight
    assert!(!qm.ack("Q", popped[0].id));
    assert_eq!(qm.info("Q").unwrap().pending, 1);
}

#[tokio::test]
async fn test_redelivered_job_goes_before_newer_jobs() {
    let qm = setup();
    qm.push("Q", payloads(&["old"])).unwrap();
    pop_now(&qm, &["Q"], 1).await;
    qm.push("Q", payloads(&["new"])).unwrap();

    qm.sweep_expired(expired_at(&qm));

    let popped = pop_now(&qm, &["Q"], 2).await;
    let order: Vec<String> = contents(&popped).into_iter().map(|(_, p)| p).collect();
    assert_eq!(order, vec!["old", "new"]);
}

#[tokio::test]
async fn test_max_deliveries_drops_job() {
    let qm = setup_with(QueueSettings {
        max_deliveries: 2,
        ..QueueSettings::default()
    });
    qm.push("Q", payloads(&["poison"])).unwrap();

    pop_now(&qm, &["Q"], 1).await;
    assert_eq!(qm.sweep_expired(expired_at(&qm)).redelivered, 1);

    pop_now(&qm, &["Q"], 1).await;
    let outcome = qm.sweep_expired(expired_at(&qm));
    assert_eq!(outcome.redelivered, 0);
    assert_eq!(outcome.dropped, 1);

    let info = qm.info("Q").unwrap();
    assert_eq!(info.pending, 0);
    assert_eq!(info.in_flight, 0);
    assert_eq!(qm.stats().dropped, 1);
}

#[tokio::test]
async fn test_unlimited_deliveries_by_default() {
    let qm = setup();
    qm.push("Q", payloads(&["retry"])).unwrap();

    for _ in 0..5 {
        assert_eq!(pop_now(&qm, &["Q"], 1).await.len(), 1);
        assert_eq!(qm.sweep_expired(expired_at(&qm)).redelivered, 1);
    }
    assert_eq!(qm.stats().dropped, 0);
}

#[tokio::test]
async fn test_sweep_wakes_blocked_pop() {
    let qm = setup();
    qm.push("Q", payloads(&["work"])).unwrap();
    pop_now(&qm, &["Q"], 1).await;

    let handle = {
        let qm = Arc::clone(&qm);
        tokio::spawn(async move {
            qm.pop(
                &keys(&["Q"]),
                1,
                BlockTimeout::For(Duration::from_secs(5)),
                BOB,
            )
            .await
            .unwrap()
        })
    };
    wait_for_waiters(&qm, "Q", 1).await;

    qm.sweep_expired(expired_at(&qm));
    let popped = handle.await.unwrap();
    assert_eq!(contents(&popped), vec![("Q".to_string(), "work".to_string())]);
}

#[tokio::test]
async fn test_background_sweeper_redelivers() {
    let qm = setup_with(QueueSettings {
        visibility_timeout_ms: 50,
        sweep_interval_ms: 10,
        ..QueueSettings::default()
    });
    let sweeper = tokio::spawn(Arc::clone(&qm).background_tasks());

    let ids = qm.push("Q", payloads(&["work"])).unwrap();
    pop_now(&qm, &["Q"], 1).await;

    let again = qm
        .pop(
            &keys(&["Q"]),
            1,
            BlockTimeout::For(Duration::from_secs(2)),
            BOB,
        )
        .await
        .unwrap();
    assert_eq!(again.len(), 1);
    assert_eq!(again[0].id, ids[0]);

    qm.shutdown();
    tokio::time::timeout(Duration::from_secs(1), sweeper)
        .await
        .unwrap()
        .unwrap();
}
