use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::Mutex;

use examgate_core::{AppError, AppResult};
use examgate_domain::{AttemptRecord, MAX_POLICY_SECONDS, RateLimitDecision, RateLimitPolicy};

use super::{AttemptStore, Clock, RateLimitService};

struct TestClock {
    now: StdMutex<DateTime<Utc>>,
}

impl TestClock {
    fn new() -> Self {
        let start = Utc
            .timestamp_opt(1_700_000_000, 0)
            .single()
            .unwrap_or_else(|| unreachable!());
        Self {
            now: StdMutex::new(start),
        }
    }

    fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
            .lock()
            .map(|now| *now)
            .unwrap_or_else(|_| unreachable!())
    }
}

#[derive(Default)]
struct FakeAttemptStore {
    records: Mutex<HashMap<String, AttemptRecord>>,
}

impl FakeAttemptStore {
    async fn get(&self, key: &str) -> Option<AttemptRecord> {
        self.records.lock().await.get(key).cloned()
    }

    async fn len(&self) -> usize {
        self.records.lock().await.len()
    }
}

#[async_trait]
impl AttemptStore for FakeAttemptStore {
    async fn find(&self, key: &str) -> AppResult<Option<AttemptRecord>> {
        Ok(self.records.lock().await.get(key).cloned())
    }

    async fn save(
        &self,
        key: &str,
        record: &AttemptRecord,
        _retain_until: DateTime<Utc>,
    ) -> AppResult<()> {
        self.records
            .lock()
            .await
            .insert(key.to_owned(), record.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        self.records.lock().await.remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> AppResult<Vec<String>> {
        Ok(self
            .records
            .lock()
            .await
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

struct FailingAttemptStore;

#[async_trait]
impl AttemptStore for FailingAttemptStore {
    async fn find(&self, _key: &str) -> AppResult<Option<AttemptRecord>> {
        Err(AppError::Internal("store unavailable".to_owned()))
    }

    async fn save(
        &self,
        _key: &str,
        _record: &AttemptRecord,
        _retain_until: DateTime<Utc>,
    ) -> AppResult<()> {
        Err(AppError::Internal("store unavailable".to_owned()))
    }

    async fn remove(&self, _key: &str) -> AppResult<()> {
        Err(AppError::Internal("store unavailable".to_owned()))
    }

    async fn keys_with_prefix(&self, _prefix: &str) -> AppResult<Vec<String>> {
        Err(AppError::Internal("store unavailable".to_owned()))
    }
}

fn build_service() -> (RateLimitService, Arc<FakeAttemptStore>, Arc<TestClock>) {
    let store = Arc::new(FakeAttemptStore::default());
    let clock = Arc::new(TestClock::new());
    let service = RateLimitService::new(
        "login",
        RateLimitPolicy::login(),
        store.clone(),
        clock.clone(),
    )
    .unwrap_or_else(|_| unreachable!());
    (service, store, clock)
}

async fn exhaust(service: &RateLimitService, identifier: &str) {
    for _ in 0..service.policy().max_attempts() {
        let decision = service.is_allowed(identifier).await;
        assert!(decision.is_ok_and(|decision| decision.is_allowed()));
        assert!(service.record_attempt(identifier).await.is_ok());
    }
}

#[tokio::test]
async fn unseen_identifier_is_allowed_with_full_budget() {
    let (service, store, _clock) = build_service();

    let decision = service.is_allowed("new.student@example.com").await;
    assert!(decision.is_ok());
    assert_eq!(
        decision.unwrap_or_else(|_| unreachable!()),
        RateLimitDecision::Allowed {
            remaining_attempts: 4
        }
    );
    assert_eq!(store.len().await, 0);
}

#[tokio::test]
async fn remaining_attempts_count_down() {
    let (service, _store, _clock) = build_service();

    for expected_remaining in [4_u32, 3, 2, 1, 0] {
        let decision = service.is_allowed("ana@example.com").await;
        assert_eq!(
            decision.ok().and_then(|decision| decision.remaining_attempts()),
            Some(expected_remaining)
        );
        assert!(service.record_attempt("ana@example.com").await.is_ok());
    }
}

#[tokio::test]
async fn check_after_max_attempts_blocks_identifier() {
    let (service, store, clock) = build_service();
    exhaust(&service, "ana@example.com").await;

    let decision = service.is_allowed("ana@example.com").await;
    assert!(decision.is_ok());
    let decision = decision.unwrap_or_else(|_| unreachable!());
    assert!(!decision.is_allowed());
    assert_eq!(decision.retry_after(), Some(30 * 60));

    let record = store.get("login:ana@example.com").await;
    assert_eq!(
        record.and_then(|record| record.blocked_until),
        Some(clock.now() + Duration::minutes(30))
    );

    clock.advance(Duration::minutes(10));
    let decision = service.is_allowed("ana@example.com").await;
    assert_eq!(
        decision.ok().and_then(|decision| decision.retry_after()),
        Some(20 * 60)
    );
}

#[tokio::test]
async fn recording_without_checking_never_blocks() {
    let (service, store, _clock) = build_service();

    for _ in 0..20 {
        assert!(service.record_attempt("bot@example.com").await.is_ok());
    }

    let record = store.get("login:bot@example.com").await;
    assert_eq!(record.as_ref().map(|record| record.count), Some(20));
    assert_eq!(record.and_then(|record| record.blocked_until), None);
}

#[tokio::test]
async fn reset_restores_fresh_behavior() {
    let (service, _store, _clock) = build_service();
    exhaust(&service, "ana@example.com").await;
    let blocked = service.is_allowed("ana@example.com").await;
    assert!(blocked.is_ok_and(|decision| !decision.is_allowed()));

    assert!(service.reset("ana@example.com").await.is_ok());
    assert!(service.reset("ana@example.com").await.is_ok());

    let decision = service.is_allowed("ana@example.com").await;
    assert_eq!(
        decision.ok().and_then(|decision| decision.remaining_attempts()),
        Some(4)
    );
}

#[tokio::test]
async fn elapsed_window_starts_fresh_even_at_limit() {
    let (service, store, clock) = build_service();
    for _ in 0..5 {
        assert!(service.record_attempt("ana@example.com").await.is_ok());
    }

    clock.advance(Duration::minutes(15) + Duration::milliseconds(1));

    let decision = service.is_allowed("ana@example.com").await;
    assert_eq!(
        decision.ok().and_then(|decision| decision.remaining_attempts()),
        Some(4)
    );
    assert_eq!(store.len().await, 0);
}

#[tokio::test]
async fn window_boundary_is_inclusive() {
    let (service, _store, clock) = build_service();
    for _ in 0..5 {
        assert!(service.record_attempt("ana@example.com").await.is_ok());
    }

    clock.advance(Duration::minutes(15));

    let decision = service.is_allowed("ana@example.com").await;
    assert!(decision.is_ok_and(|decision| !decision.is_allowed()));
}

#[tokio::test]
async fn recording_after_window_restarts_count() {
    let (service, store, clock) = build_service();
    for _ in 0..3 {
        assert!(service.record_attempt("ana@example.com").await.is_ok());
    }

    clock.advance(Duration::minutes(16));
    assert!(service.record_attempt("ana@example.com").await.is_ok());

    let record = store.get("login:ana@example.com").await;
    assert_eq!(record.as_ref().map(|record| record.count), Some(1));
    assert_eq!(record.map(|record| record.first_attempt), Some(clock.now()));
}

#[tokio::test]
async fn block_outlives_window_and_then_lifts() {
    let (service, _store, clock) = build_service();
    exhaust(&service, "ana@example.com").await;
    assert!(
        service
            .is_allowed("ana@example.com")
            .await
            .is_ok_and(|decision| !decision.is_allowed())
    );

    clock.advance(Duration::minutes(20));
    assert!(service.record_attempt("ana@example.com").await.is_ok());
    assert!(
        service
            .is_allowed("ana@example.com")
            .await
            .is_ok_and(|decision| !decision.is_allowed())
    );

    clock.advance(Duration::minutes(11));
    let decision = service.is_allowed("ana@example.com").await;
    assert_eq!(
        decision.ok().and_then(|decision| decision.remaining_attempts()),
        Some(3)
    );
}

#[tokio::test]
async fn block_near_the_end_of_time_saturates() {
    let store = Arc::new(FakeAttemptStore::default());
    let clock = Arc::new(TestClock::new());
    let longest = Duration::seconds(MAX_POLICY_SECONDS);
    let policy = RateLimitPolicy::new(5, longest, longest).unwrap_or_else(|_| unreachable!());
    let service = RateLimitService::new("login", policy, store.clone(), clock.clone())
        .unwrap_or_else(|_| unreachable!());

    clock.advance(DateTime::<Utc>::MAX_UTC - clock.now() - Duration::days(1));
    exhaust(&service, "ana@example.com").await;

    let decision = service.is_allowed("ana@example.com").await;
    assert_eq!(
        decision.ok().and_then(|decision| decision.retry_after()),
        Some(24 * 60 * 60)
    );

    let record = store.get("login:ana@example.com").await;
    assert_eq!(
        record.and_then(|record| record.blocked_until),
        Some(DateTime::<Utc>::MAX_UTC)
    );
}

#[tokio::test]
async fn cleanup_removes_only_expired_unblocked_records() {
    let (service, store, clock) = build_service();

    assert!(service.record_attempt("stale@example.com").await.is_ok());
    exhaust(&service, "blocked@example.com").await;
    assert!(
        service
            .is_allowed("blocked@example.com")
            .await
            .is_ok_and(|decision| !decision.is_allowed())
    );

    clock.advance(Duration::minutes(16));
    assert!(service.record_attempt("recent@example.com").await.is_ok());

    let removed = service.cleanup().await;
    assert_eq!(removed.ok(), Some(1));
    assert!(store.get("login:stale@example.com").await.is_none());
    assert!(store.get("login:blocked@example.com").await.is_some());
    assert!(store.get("login:recent@example.com").await.is_some());
}

#[tokio::test]
async fn categories_sharing_a_store_are_isolated() {
    let store = Arc::new(FakeAttemptStore::default());
    let clock = Arc::new(TestClock::new());
    let login = RateLimitService::new(
        "login",
        RateLimitPolicy::login(),
        store.clone(),
        clock.clone(),
    );
    let registration = RateLimitService::new(
        "registration",
        RateLimitPolicy::registration(),
        store.clone(),
        clock.clone(),
    );
    assert!(login.is_ok() && registration.is_ok());
    let login = login.unwrap_or_else(|_| unreachable!());
    let registration = registration.unwrap_or_else(|_| unreachable!());

    exhaust(&registration, "ana@example.com").await;
    assert!(
        registration
            .is_allowed("ana@example.com")
            .await
            .is_ok_and(|decision| !decision.is_allowed())
    );

    let decision = login.is_allowed("ana@example.com").await;
    assert_eq!(
        decision.ok().and_then(|decision| decision.remaining_attempts()),
        Some(4)
    );

    clock.advance(Duration::hours(3));
    assert_eq!(login.cleanup().await.ok(), Some(0));
    assert_eq!(registration.cleanup().await.ok(), Some(1));
}

#[tokio::test]
async fn check_and_record_counts_only_allowed_attempts() {
    let (service, store, _clock) = build_service();

    for _ in 0..5 {
        let decision = service.check_and_record("ana@example.com").await;
        assert!(decision.is_ok_and(|decision| decision.is_allowed()));
    }

    let decision = service.check_and_record("ana@example.com").await;
    assert!(decision.is_ok_and(|decision| !decision.is_allowed()));

    let record = store.get("login:ana@example.com").await;
    assert_eq!(record.map(|record| record.count), Some(5));
}

#[tokio::test]
async fn concurrent_check_and_record_never_exceeds_budget() {
    let (service, store, _clock) = build_service();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.check_and_record("ana@example.com").await
        }));
    }

    let mut allowed = 0;
    for handle in handles {
        if let Ok(Ok(decision)) = handle.await
            && decision.is_allowed()
        {
            allowed += 1;
        }
    }

    assert_eq!(allowed, 5);
    let record = store.get("login:ana@example.com").await;
    assert_eq!(record.map(|record| record.count), Some(5));
}

#[tokio::test]
async fn store_failures_propagate() {
    let service = RateLimitService::new(
        "login",
        RateLimitPolicy::login(),
        Arc::new(FailingAttemptStore),
        Arc::new(TestClock::new()),
    )
    .unwrap_or_else(|_| unreachable!());

    let result = service.is_allowed("ana@example.com").await;
    assert!(matches!(result, Err(AppError::Internal(_))));
}

#[test]
fn category_must_not_contain_separator() {
    let result = RateLimitService::new(
        "login:v2",
        RateLimitPolicy::login(),
        Arc::new(FakeAttemptStore::default()),
        Arc::new(TestClock::new()),
    );
    assert!(matches!(result, Err(AppError::Validation(_))));
}
