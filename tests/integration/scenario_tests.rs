//! End-to-end scenarios against the library: submit, drain, inspect

use crate::common::{is_prime_naive, Fault, FlakyStore, Harness, Target};
use primecache::cache::{CacheOptions, PrimeCacheStore};
use primecache::error::PrimeError;
use primecache::ledger::RequestStatus;
use primecache::oracle::PrimeOracle;
use primecache::queue::TaskQueue;
use primecache::store::FileStore;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const FIRST_TEN: [u64; 10] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29];

#[tokio::test]
async fn single_prime() {
    let h = Harness::new(100);
    let id = h.service.submit(1).await.unwrap();

    h.drain(1).await;

    let request = h.service.status(&id).await.unwrap();
    assert_eq!(request.status, RequestStatus::Done);
    assert_eq!(request.result, Some(vec![2]));
    assert!(request.error.is_none());
}

#[tokio::test]
async fn first_ten_primes() {
    let h = Harness::new(4);
    let id = h.service.submit(10).await.unwrap();

    let stats = h.drain(2).await;
    assert_eq!(stats.done, 1);

    let request = h.service.status(&id).await.unwrap();
    assert_eq!(request.result.unwrap(), FIRST_TEN.to_vec());
}

#[tokio::test]
async fn results_are_complete() {
    let h = Harness::new(64);
    let id = h.service.submit(500).await.unwrap();
    h.drain(1).await;

    let primes = h.service.status(&id).await.unwrap().result.unwrap();
    let expected: Vec<u64> = (2..).filter(|&n| is_prime_naive(n)).take(500).collect();
    assert_eq!(primes, expected);
}

#[tokio::test]
async fn rejects_zero_and_negative() {
    let h = Harness::new(100);

    for n in [0, -5] {
        let err = h.service.submit(n).await.unwrap_err();
        assert!(matches!(err, PrimeError::InvalidCount(got) if got == n));
    }

    assert!(h.service.list().await.unwrap().is_empty());
    assert_eq!(h.queue.ready_count().await.unwrap(), 0);
    assert_eq!(h.drain(1).await.total(), 0);
}

#[tokio::test]
async fn concurrent_requests_share_one_extension() {
    let h = Harness::new(3);
    let a = h.service.submit(10).await.unwrap();
    let b = h.service.submit(10).await.unwrap();

    let stats = h.drain(2).await;
    assert_eq!(stats.done, 2);

    let ra = h.service.status(&a).await.unwrap().result.unwrap();
    let rb = h.service.status(&b).await.unwrap().result.unwrap();
    assert_eq!(ra, FIRST_TEN.to_vec());
    assert_eq!(ra, rb);

    // 2..=29 tested exactly once
    assert_eq!(h.cache.oracle().candidates_tested(), 28);
    assert_eq!(h.counters.snapshot().extensions_completed, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_extensions_over_one_directory_test_each_candidate_once() {
    let temp = TempDir::new().unwrap();
    let oracle = PrimeOracle::new();

    let mut handles = vec![];
    for _ in 0..4 {
        // a separate store handle per cache, as separate processes would have
        let kv = Arc::new(FileStore::open(temp.path()).await.unwrap());
        let cache = PrimeCacheStore::new(
            kv,
            CacheOptions {
                checkpoint_interval: 100,
                lock_timeout: Duration::from_secs(60),
                lock_lease: Duration::from_secs(60),
            },
        )
        .with_oracle(oracle.clone());
        handles.push(tokio::spawn(async move { cache.extend_to(2000).await }));
    }

    let mut results = vec![];
    for handle in handles {
        results.push(handle.await.unwrap().unwrap());
    }

    let first = &results[0];
    assert_eq!(first.len(), 2000);
    assert!(results.iter().all(|r| r[..2000] == first[..]));

    // 2..=largest, each tested by exactly one of the caches
    let largest = *first.last().unwrap();
    assert_eq!(oracle.candidates_tested(), largest - 1);
}

#[tokio::test]
async fn cache_hit_does_no_oracle_work() {
    let h = Harness::new(100);
    h.service.submit(10).await.unwrap();
    h.drain(1).await;
    let tested = h.cache.oracle().candidates_tested();

    let id = h.service.submit(5).await.unwrap();
    h.drain(1).await;

    let request = h.service.status(&id).await.unwrap();
    assert_eq!(request.result, Some(vec![2, 3, 5, 7, 11]));
    assert_eq!(h.cache.oracle().candidates_tested(), tested);
    assert_eq!(h.counters.snapshot().cache_hits, 1);
}

#[tokio::test]
async fn growth_is_prefix_stable() {
    let h = Harness::new(7);
    let small = h.service.submit(15).await.unwrap();
    h.drain(1).await;
    let large = h.service.submit(60).await.unwrap();
    h.drain(1).await;

    let small = h.service.status(&small).await.unwrap().result.unwrap();
    let large = h.service.status(&large).await.unwrap().result.unwrap();
    assert_eq!(small[..], large[..15]);
    assert_eq!(h.cache.snapshot().await.unwrap().primes, large);
}

#[tokio::test]
async fn checkpoint_survives_write_failure() {
    let kv = FlakyStore::new(2, 1, Fault::Persistence);
    let h = Harness::with_store(kv.clone(), 10);

    let err = h.cache.extend_to(50).await.unwrap_err();
    assert!(matches!(err, PrimeError::PersistenceWrite { .. }));

    // the first two batches were persisted, the third was lost
    let snapshot = h.cache.snapshot().await.unwrap();
    assert_eq!(snapshot.primes.len(), 20);
    assert_eq!(snapshot.largest(), Some(71));
    assert_eq!(h.counters.snapshot().extensions_failed, 1);
    assert!(h.cache.lock_holder().await.unwrap().is_none());

    let before = h.cache.oracle().candidates_tested();
    let primes = h.cache.extend_to(50).await.unwrap();
    assert_eq!(primes.len(), 50);
    assert_eq!(primes.last(), Some(&229));
    assert_eq!(primes[..20], snapshot.primes[..]);

    // resumed after 71 rather than starting over
    assert_eq!(h.cache.oracle().candidates_tested() - before, 229 - 71);
}

#[tokio::test]
async fn permanent_failure_fails_the_request() {
    let kv = FlakyStore::new(0, 1, Fault::Persistence);
    let h = Harness::with_store(kv, 5);
    let id = h.service.submit(12).await.unwrap();

    let stats = h.drain(1).await;
    assert_eq!(stats.failed, 1);

    let request = h.service.status(&id).await.unwrap();
    assert_eq!(request.status, RequestStatus::Failed);
    assert!(request.result.is_none());
    assert!(request.error.unwrap().contains("injected write failure"));
    assert!(h.cache.snapshot().await.unwrap().primes.is_empty());
}

#[tokio::test]
async fn transient_outage_is_retried() {
    let kv = FlakyStore::new(1, 2, Fault::Unavailable);
    let h = Harness::with_store(kv, 5);
    let id = h.service.submit(12).await.unwrap();

    let stats = h.drain(1).await;
    assert_eq!(stats.done, 1);

    let request = h.service.status(&id).await.unwrap();
    assert_eq!(request.result.unwrap().len(), 12);
    assert_eq!(h.counters.snapshot().extensions_failed, 2);
}

#[tokio::test]
async fn transient_outage_without_retries_fails() {
    let kv = FlakyStore::new(0, 1, Fault::Unavailable);
    let h = Harness::with_store(kv, 5).without_retries();
    let id = h.service.submit(3).await.unwrap();

    h.drain(1).await;
    assert_eq!(
        h.service.status(&id).await.unwrap().status,
        RequestStatus::Failed
    );
}

#[tokio::test]
async fn unrecorded_result_is_recorded_on_redelivery() {
    let kv = FlakyStore::targeting(Target::Status("done"), 0, 1, Fault::Persistence);
    let h = Harness::with_store(kv, 5);
    let id = h.service.submit(7).await.unwrap();

    let stats = h.drain(1).await;
    assert_eq!(stats.returned, 1);
    assert_eq!(stats.done, 1);

    let request = h.service.status(&id).await.unwrap();
    assert_eq!(request.status, RequestStatus::Done);
    assert_eq!(request.result.unwrap(), vec![2, 3, 5, 7, 11, 13, 17]);
    assert_eq!(h.queue.ready_count().await.unwrap(), 0);
    // the second delivery was served from the cache
    assert_eq!(h.counters.snapshot().extensions_completed, 1);
}

#[tokio::test]
async fn redelivery_is_idempotent() {
    let h = Harness::new(100);
    let id = h.service.submit(8).await.unwrap();
    h.queue.enqueue(&id).await.unwrap();
    h.queue.enqueue(&id).await.unwrap();

    let stats = h.drain(2).await;
    assert_eq!(stats.done, 1);
    assert_eq!(stats.skipped, 2);
    assert_eq!(h.counters.snapshot().tasks_started, 1);

    let request = h.service.status(&id).await.unwrap();
    assert_eq!(request.result.unwrap().len(), 8);
}

#[tokio::test]
async fn many_requests_many_workers() {
    let h = Harness::new(16);
    let mut ids = vec![];
    for n in [5, 100, 1, 37, 100, 64, 2, 80] {
        ids.push((n, h.service.submit(n).await.unwrap()));
    }

    let stats = h.drain(4).await;
    assert_eq!(stats.done, ids.len() as u64);

    let all = h.cache.snapshot().await.unwrap().primes;
    for (n, id) in ids {
        let result = h.service.status(&id).await.unwrap().result.unwrap();
        assert_eq!(result[..], all[..n as usize]);
    }
}
