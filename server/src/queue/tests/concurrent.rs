//! Concurrent producers and consumers.

use super::*;
use rustc_hash::FxHashSet;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_consumers_never_share_a_job() {
    let qm = setup();
    const TOTAL: usize = 400;

    let consumers: Vec<_> = (0..4u64)
        .map(|consumer| {
            let qm = Arc::clone(&qm);
            tokio::spawn(async move {
                let names = keys(&["a", "b"]);
                let mut seen = Vec::new();
                loop {
                    let batch = qm
                        .pop(
                            &names,
                            5,
                            BlockTimeout::For(Duration::from_millis(300)),
                            consumer,
                        )
                        .await
                        .unwrap();
                    if batch.is_empty() {
                        break;
                    }
                    for d in batch {
                        assert!(qm.ack(&d.queue, d.id));
                        seen.push((d.queue.to_string(), d.id));
                    }
                }
                seen
            })
        })
        .collect();

    let producers: Vec<_> = ["a", "b"]
        .into_iter()
        .map(|queue| {
            let qm = Arc::clone(&qm);
            tokio::spawn(async move {
                for i in 0..(TOTAL / 2 / 10) {
                    let batch: Vec<Payload> =
                        (0..10).map(|j| Payload::from(format!("{}-{}", i, j))).collect();
                    qm.push(queue, batch).unwrap();
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    for p in producers {
        p.await.unwrap();
    }

    let mut all = FxHashSet::default();
    let mut total = 0;
    for c in consumers {
        for item in c.await.unwrap() {
            total += 1;
            assert!(all.insert(item), "job delivered twice");
        }
    }

    assert_eq!(total, TOTAL);
    let stats = qm.stats();
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.in_flight, 0);
    assert_eq!(stats.acked, TOTAL as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_waiters_do_not_deadlock() {
    let qm = setup();

    // Same keys, opposite priority: lock order must not follow caller order
    let waiters: Vec<_> = (0..8u64)
        .map(|i| {
            let qm = Arc::clone(&qm);
            let names = if i % 2 == 0 {
                keys(&["x", "y"])
            } else {
                keys(&["y", "x"])
            };
            tokio::spawn(async move {
                qm.pop(&names, 1, BlockTimeout::For(Duration::from_secs(5)), i)
                    .await
                    .unwrap()
            })
        })
        .collect();
    wait_for_waiters(&qm, "x", 8).await;

    let pushers: Vec<_> = (0..8)
        .map(|i| {
            let qm = Arc::clone(&qm);
            let queue = if i % 2 == 0 { "x" } else { "y" };
            tokio::spawn(async move { qm.push(queue, payloads(&["job"])).unwrap() })
        })
        .collect();
    for p in pushers {
        p.await.unwrap();
    }

    let all = async {
        let mut delivered = 0;
        for w in waiters {
            delivered += w.await.unwrap().len();
        }
        delivered
    };
    let delivered = tokio::time::timeout(Duration::from_secs(3), all)
        .await
        .expect("waiters deadlocked");
    assert_eq!(delivered, 8);
    assert_eq!(qm.stats().waiters, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancellation_racing_pushes_loses_nothing() {
    let qm = setup();
    const ROUNDS: usize = 50;

    for _ in 0..ROUNDS {
        let handle = {
            let qm = Arc::clone(&qm);
            tokio::spawn(async move {
                qm.pop(&keys(&["race"]), 1, BlockTimeout::Forever, ALICE)
                    .await
                    .unwrap()
            })
        };
        wait_for_waiters(&qm, "race", 1).await;

        let pusher = {
            let qm = Arc::clone(&qm);
            tokio::spawn(async move { qm.push("race", payloads(&["job"])).unwrap() })
        };
        handle.abort();
        let _ = handle.await;
        pusher.await.unwrap();
    }

    // Every job is either with a consumer that got it or back in the queue
    let info = qm.info("race").unwrap();
    assert_eq!(info.waiters, 0);
    let stats = qm.stats();
    assert_eq!(stats.pending + stats.in_flight, ROUNDS);
}
