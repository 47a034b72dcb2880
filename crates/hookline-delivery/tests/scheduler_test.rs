//! Integration tests for the retry scheduler: recovery after transient
//! failures, retry exhaustion, claim-once semantics, and lifecycle.

use std::{sync::Arc, time::Duration};

use hookline_core::{
    DeliveryStatus, EventType, RealClock, TenantId, WebhookEvent, WebhookSettings,
    MAX_DELIVERY_ATTEMPTS,
};
use hookline_delivery::{
    DeliveryLogStore, DispatchOutcome, Dispatcher, DispatcherConfig, InMemoryDeliveryLogStore,
    InMemorySettingsStore, RetryPolicy, RetryScheduler, SchedulerConfig,
};
use serde_json::json;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

struct Harness {
    dispatcher: Arc<Dispatcher>,
    scheduler: RetryScheduler,
    store: Arc<InMemoryDeliveryLogStore>,
    tenant: TenantId,
}

/// Builds a dispatcher with millisecond-scale backoff so sweeps become due
/// within test time, and a scheduler with no inter-item stagger.
async fn harness(destination_url: &str, base_delay: Duration) -> Harness {
    let store = Arc::new(InMemoryDeliveryLogStore::new());
    let settings_store = Arc::new(InMemorySettingsStore::new());
    let tenant = TenantId::new();
    let clock = Arc::new(RealClock);

    let settings = WebhookSettings::new(
        tenant,
        destination_url,
        "api-key",
        "secret",
        [EventType::ContactCreated].into_iter().collect(),
    )
    .unwrap();
    settings_store.upsert(settings).await;

    let config = DispatcherConfig {
        retry_policy: RetryPolicy { max_attempts: MAX_DELIVERY_ATTEMPTS, base_delay },
        ..Default::default()
    };
    let dispatcher =
        Arc::new(Dispatcher::new(settings_store, store.clone(), config, clock.clone()).unwrap());

    let scheduler_config = SchedulerConfig {
        sweep_interval: Duration::from_secs(3600),
        batch_size: 10,
        max_concurrent: 4,
        inter_item_delay: Duration::ZERO,
    };
    let scheduler =
        RetryScheduler::new(dispatcher.clone(), store.clone(), scheduler_config, clock);

    Harness { dispatcher, scheduler, store, tenant }
}

fn test_event(tenant: TenantId) -> WebhookEvent {
    WebhookEvent::new(EventType::ContactCreated, json!({"id": "42"}), tenant, chrono::Utc::now())
}

#[tokio::test]
async fn transient_failure_recovers_on_retry() {
    let mock_server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("flaky"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let harness = harness(&mock_server.uri(), Duration::from_millis(50)).await;

    let outcome = harness.dispatcher.send(&test_event(harness.tenant)).await.unwrap();
    let DispatchOutcome::FailedScheduled { delivery_id, .. } = outcome else {
        panic!("expected scheduled retry, got {outcome:?}");
    };

    tokio::time::sleep(Duration::from_millis(150)).await;
    let processed = harness.scheduler.sweep_once().await.unwrap();
    assert_eq!(processed, 1);

    let entry = harness.store.find(delivery_id).await.unwrap().unwrap();
    assert_eq!(entry.status, DeliveryStatus::Delivered);
    assert_eq!(entry.attempts, 2);
    assert_eq!(entry.response_status, Some(200));
    assert_eq!(entry.response_body_excerpt.as_deref(), Some("recovered"));

    let stats = harness.scheduler.stats().await;
    assert_eq!(stats.retries_attempted, 1);
    assert_eq!(stats.retries_delivered, 1);

    mock_server.verify().await;
}

#[tokio::test]
async fn persistent_failure_exhausts_retries() {
    let mock_server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let harness = harness(&mock_server.uri(), Duration::from_millis(20)).await;

    let outcome = harness.dispatcher.send(&test_event(harness.tenant)).await.unwrap();
    let DispatchOutcome::FailedScheduled { delivery_id, .. } = outcome else {
        panic!("expected scheduled retry, got {outcome:?}");
    };

    // Attempt 2: fails again, reschedules.
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(harness.scheduler.sweep_once().await.unwrap(), 1);
    let entry = harness.store.find(delivery_id).await.unwrap().unwrap();
    assert_eq!(entry.status, DeliveryStatus::Failed);
    assert_eq!(entry.attempts, 2);
    assert!(entry.next_retry_at.is_some());

    // Attempt 3: fails, exhausts the cap.
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(harness.scheduler.sweep_once().await.unwrap(), 1);
    let entry = harness.store.find(delivery_id).await.unwrap().unwrap();
    assert_eq!(entry.status, DeliveryStatus::Failed);
    assert_eq!(entry.attempts, MAX_DELIVERY_ATTEMPTS);
    assert!(entry.next_retry_at.is_none());
    assert!(entry.is_terminal());

    // The terminal entry is never picked up again.
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(harness.scheduler.sweep_once().await.unwrap(), 0);
    let frozen = harness.store.find(delivery_id).await.unwrap().unwrap();
    assert_eq!(frozen.attempts, MAX_DELIVERY_ATTEMPTS);
    assert_eq!(frozen.updated_at, entry.updated_at);

    let stats = harness.scheduler.stats().await;
    assert_eq!(stats.retries_exhausted, 1);

    mock_server.verify().await;
}

#[tokio::test]
async fn sweep_skips_entries_not_yet_due() {
    let mock_server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Default 60s backoff: the failure schedules far beyond test time.
    let harness = harness(&mock_server.uri(), Duration::from_secs(60)).await;
    harness.dispatcher.send(&test_event(harness.tenant)).await.unwrap();

    assert_eq!(harness.scheduler.sweep_once().await.unwrap(), 0);
    mock_server.verify().await;
}

#[tokio::test]
async fn empty_sweep_processes_nothing() {
    let mock_server = MockServer::start().await;
    let harness = harness(&mock_server.uri(), Duration::from_millis(20)).await;

    assert_eq!(harness.scheduler.sweep_once().await.unwrap(), 0);
    let stats = harness.scheduler.stats().await;
    assert_eq!(stats.sweeps, 1);
    assert_eq!(stats.retries_attempted, 0);
}

#[tokio::test]
async fn background_scheduler_recovers_failed_delivery() {
    let mock_server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let store = Arc::new(InMemoryDeliveryLogStore::new());
    let settings_store = Arc::new(InMemorySettingsStore::new());
    let tenant = TenantId::new();
    let clock = Arc::new(RealClock);

    let settings = WebhookSettings::new(
        tenant,
        mock_server.uri(),
        "api-key",
        "secret",
        [EventType::ContactCreated].into_iter().collect(),
    )
    .unwrap();
    settings_store.upsert(settings).await;

    let config = DispatcherConfig {
        retry_policy: RetryPolicy {
            max_attempts: MAX_DELIVERY_ATTEMPTS,
            base_delay: Duration::from_millis(30),
        },
        ..Default::default()
    };
    let dispatcher =
        Arc::new(Dispatcher::new(settings_store, store.clone(), config, clock.clone()).unwrap());

    let scheduler_config = SchedulerConfig {
        sweep_interval: Duration::from_millis(50),
        inter_item_delay: Duration::ZERO,
        ..Default::default()
    };
    let mut scheduler =
        RetryScheduler::new(dispatcher.clone(), store.clone(), scheduler_config, clock);
    scheduler.start();

    let outcome = dispatcher.send(&test_event(tenant)).await.unwrap();
    let DispatchOutcome::FailedScheduled { delivery_id, .. } = outcome else {
        panic!("expected scheduled retry, got {outcome:?}");
    };

    let mut delivered = false;
    for _ in 0..100 {
        let entry = store.find(delivery_id).await.unwrap().unwrap();
        if entry.status == DeliveryStatus::Delivered {
            delivered = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(delivered, "background sweeps should recover the delivery");

    scheduler.shutdown().await.unwrap();
}

#[tokio::test]
async fn scheduler_shuts_down_cleanly_when_idle() {
    let mock_server = MockServer::start().await;
    let mut harness = harness(&mock_server.uri(), Duration::from_millis(20)).await;

    harness.scheduler.start();
    tokio::time::sleep(Duration::from_millis(30)).await;
    harness.scheduler.shutdown().await.unwrap();
}
