//! End-to-end reservation lifecycle tests
//!
//! Run on a paused clock: sleeps advance virtual time instantly, and the
//! runtime only advances once every supervisor is idle.

use async_trait::async_trait;
use chrono::Utc;
use reservation_core::{
    ChargeReceipt, ChargeRequest, Config, Coordinate, Error, InMemoryReservationStore, Location,
    MachineType, OrderService, PaymentGateway, PaymentInstrument, Query, Reservation,
    ReservationId, ReservationStatus, ReservationStore, Result, SignedSolution, SubjectId,
};
use reservation_core::types::ReservationUpdate;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::{Duration, Instant};

const DECLINED: &str = "tok_chargeDeclined";
const VISA: &str = "tok_visa";

/// Payment gateway double that counts captures
#[derive(Default)]
struct RecordingGateway {
    captures: AtomicUsize,
    latency: Duration,
}

impl RecordingGateway {
    fn with_latency(latency: Duration) -> Self {
        Self {
            captures: AtomicUsize::new(0),
            latency,
        }
    }

    fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if request.source_token == DECLINED {
            return Err(Error::Payment("Your card was declined".to_string()));
        }
        let n = self.captures.fetch_add(1, Ordering::SeqCst);
        Ok(ChargeReceipt {
            charge_id: format!("ch_test_{}", n),
            amount_cents: request.amount_cents,
            currency: request.currency.clone(),
            charged_at: Utc::now(),
        })
    }
}

/// Store double with switchable failures
#[derive(Default)]
struct FlakyStore {
    inner: InMemoryReservationStore,
    fail_create: AtomicBool,
    fail_update: AtomicBool,
    update_calls: AtomicUsize,
    create_latency: Duration,
}

impl FlakyStore {
    fn with_create_latency(latency: Duration) -> Self {
        Self {
            create_latency: latency,
            ..Self::default()
        }
    }
}

#[async_trait]
impl ReservationStore for FlakyStore {
    async fn create_with_id(&self, id: ReservationId, record: &Reservation) -> Result<bool> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Error::Persistence("disk full".to_string()));
        }
        if !self.create_latency.is_zero() {
            tokio::time::sleep(self.create_latency).await;
        }
        self.inner.create_with_id(id, record).await
    }

    async fn update(&self, id: ReservationId, update: ReservationUpdate) -> Result<bool> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(Error::Persistence("connection reset".to_string()));
        }
        self.inner.update(id, update).await
    }

    async fn read(&self, id: ReservationId) -> Result<Option<Reservation>> {
        self.inner.read(id).await
    }
}

struct Harness {
    service: Arc<OrderService>,
    store: Arc<FlakyStore>,
    gateway: Arc<RecordingGateway>,
}

fn harness_with(gateway: RecordingGateway) -> Harness {
    harness_over(gateway, FlakyStore::default())
}

fn harness_over(gateway: RecordingGateway, store: FlakyStore) -> Harness {
    let mut config = Config::default();
    config.signing.seed_hex = Some("5a".repeat(32));
    config.persistence.retry.jitter_factor = 0.0;

    let store = Arc::new(store);
    let gateway = Arc::new(gateway);
    let service = OrderService::new(config, store.clone(), gateway.clone()).unwrap();

    Harness {
        service: Arc::new(service),
        store,
        gateway,
    }
}

fn harness() -> Harness {
    harness_with(RecordingGateway::default())
}

fn query() -> Query {
    Query {
        starting_point: Location {
            coordinate: Coordinate {
                lat: 37.7749,
                lon: -122.4194,
            },
            address: "Ferry Building".to_string(),
        },
        destination: Location {
            coordinate: Coordinate {
                lat: 37.8044,
                lon: -122.2712,
            },
            address: "Lake Merritt".to_string(),
        },
        machine_type: MachineType::RobotOnly,
        weight: 3.0,
        time: Utc::now(),
    }
}

/// Robot offer, priced at 1.00
async fn robot_offer(service: &OrderService) -> SignedSolution {
    let offers = service.quote(query()).await.unwrap();
    offers
        .into_iter()
        .find(|offer| offer.solution.machine_type == MachineType::RobotOnly)
        .unwrap()
}

fn card(token: &str) -> PaymentInstrument {
    PaymentInstrument {
        source_token: token.to_string(),
    }
}

fn alice() -> SubjectId {
    SubjectId::new("alice")
}

async fn stored_status(h: &Harness, id: ReservationId) -> ReservationStatus {
    h.store.read(id).await.unwrap().unwrap().status
}

#[tokio::test(start_paused = true)]
async fn test_unpaid_reservation_expires() {
    let h = harness();
    let offer = robot_offer(&h.service).await;
    let reservation = h.service.place_order(offer, alice()).await.unwrap();

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.service.active_reservations().await.unwrap(), 1);
    assert_eq!(stored_status(&h, reservation.id).await, ReservationStatus::Pending);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.service.active_reservations().await.unwrap(), 0);
    assert_eq!(stored_status(&h, reservation.id).await, ReservationStatus::Expired);

    let late = h
        .service
        .submit_payment(reservation.id, alice(), card(VISA))
        .await;
    assert!(matches!(late, Err(Error::NotFoundOrExpired(_))));
    assert_eq!(h.gateway.captures(), 0);
    assert_eq!(h.service.metrics().expired.get(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_immediate_payment_orders() {
    let h = harness();
    let offer = robot_offer(&h.service).await;
    let reservation = h.service.place_order(offer, alice()).await.unwrap();

    let receipt = h
        .service
        .submit_payment(reservation.id, alice(), card(VISA))
        .await
        .unwrap();

    assert_eq!(receipt.status, ReservationStatus::Ordered);
    assert_eq!(receipt.charge.amount_cents, 100);
    assert_eq!(receipt.charge.currency, "usd");
    assert_eq!(h.service.active_reservations().await.unwrap(), 0);
    assert_eq!(stored_status(&h, reservation.id).await, ReservationStatus::Ordered);

    // Never expires after a recorded payment
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(stored_status(&h, reservation.id).await, ReservationStatus::Ordered);
    assert_eq!(h.store.update_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_tampered_price_rejected() {
    let h = harness();
    let mut offer = robot_offer(&h.service).await;
    offer.solution.price = Decimal::new(1, 2);

    let result = h.service.place_order(offer, alice()).await;
    let err = result.unwrap_err();
    assert_eq!(err.kind(), "IntegrityError");
    assert_eq!(h.service.active_reservations().await.unwrap(), 0);
    assert!(h.store.inner.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_declined_then_retried_payment() {
    let h = harness();
    let offer = robot_offer(&h.service).await;
    let reservation = h.service.place_order(offer, alice()).await.unwrap();

    let declined = h
        .service
        .submit_payment(reservation.id, alice(), card(DECLINED))
        .await;
    assert!(matches!(declined, Err(Error::Payment(_))));
    assert_eq!(h.service.active_reservations().await.unwrap(), 1);
    assert_eq!(stored_status(&h, reservation.id).await, ReservationStatus::Pending);

    let receipt = h
        .service
        .submit_payment(reservation.id, alice(), card(VISA))
        .await
        .unwrap();
    assert_eq!(receipt.status, ReservationStatus::Ordered);
    assert_eq!(h.gateway.captures(), 1);
    assert_eq!(h.service.metrics().payment_failures.get(), 1);
    assert_eq!(h.service.metrics().payment_attempts.get(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_double_payment_charges_once() {
    let h = harness_with(RecordingGateway::with_latency(Duration::from_secs(2)));
    let offer = robot_offer(&h.service).await;
    let reservation = h.service.place_order(offer, alice()).await.unwrap();

    let pay = |service: Arc<OrderService>| {
        let id = reservation.id;
        tokio::spawn(async move { service.submit_payment(id, alice(), card(VISA)).await })
    };
    let first = pay(h.service.clone());
    let second = pay(h.service.clone());

    let results = [first.await.unwrap(), second.await.unwrap()];
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(Error::PaymentInProgress(_)) | Err(Error::NotFoundOrExpired(_))
    )));

    assert_eq!(h.gateway.captures(), 1);
    assert_eq!(stored_status(&h, reservation.id).await, ReservationStatus::Ordered);
}

#[tokio::test(start_paused = true)]
async fn test_slow_charge_past_deadline_still_orders() {
    let h = harness_with(RecordingGateway::with_latency(Duration::from_secs(45)));
    let offer = robot_offer(&h.service).await;
    let reservation = h.service.place_order(offer, alice()).await.unwrap();

    tokio::time::sleep(Duration::from_secs(20)).await;
    let receipt = h
        .service
        .submit_payment(reservation.id, alice(), card(VISA))
        .await
        .unwrap();

    assert_eq!(receipt.status, ReservationStatus::Ordered);
    assert_eq!(stored_status(&h, reservation.id).await, ReservationStatus::Ordered);
    assert_eq!(h.service.metrics().expired.get(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_orders_get_distinct_ids() {
    let h = harness();
    let offer = robot_offer(&h.service).await;

    let tasks: Vec<_> = (0..50)
        .map(|i| {
            let service = h.service.clone();
            let offer = offer.clone();
            tokio::spawn(async move {
                service
                    .place_order(offer, SubjectId::new(format!("user-{}", i)))
                    .await
                    .unwrap()
                    .id
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for task in tasks {
        ids.insert(task.await.unwrap());
    }
    assert_eq!(ids.len(), 50);
    assert_eq!(h.service.active_reservations().await.unwrap(), 50);
}

#[tokio::test(start_paused = true)]
async fn test_payment_for_unknown_reservation() {
    let h = harness();

    let result = h
        .service
        .submit_payment(ReservationId::generate(), alice(), card(VISA))
        .await;
    assert!(matches!(result, Err(Error::NotFoundOrExpired(_))));
    assert_eq!(h.gateway.captures(), 0);
    assert_eq!(h.service.metrics().payment_attempts.get(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_payment_by_other_user_rejected() {
    let h = harness();
    let offer = robot_offer(&h.service).await;
    let reservation = h.service.place_order(offer, alice()).await.unwrap();

    let result = h
        .service
        .submit_payment(reservation.id, SubjectId::new("mallory"), card(VISA))
        .await;
    assert!(matches!(result, Err(Error::Ownership(_))));
    assert_eq!(h.gateway.captures(), 0);
    assert_eq!(h.service.active_reservations().await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_initial_write_rolls_back() {
    let h = harness();
    h.store.fail_create.store(true, Ordering::SeqCst);

    let offer = robot_offer(&h.service).await;
    let result = h.service.place_order(offer, alice()).await;

    assert!(matches!(result, Err(Error::Persistence(_))));
    assert_eq!(h.service.active_reservations().await.unwrap(), 0);
    assert_eq!(h.service.metrics().created.get(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_write_failure_still_releases() {
    let h = harness();
    let offer = robot_offer(&h.service).await;
    let reservation = h.service.place_order(offer, alice()).await.unwrap();
    h.store.fail_update.store(true, Ordering::SeqCst);

    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(h.service.active_reservations().await.unwrap(), 0);
    assert_eq!(h.store.update_calls.load(Ordering::SeqCst), 4);
    assert_eq!(h.service.metrics().persistence_failures.get(), 1);
    // Store never learned the outcome
    assert_eq!(stored_status(&h, reservation.id).await, ReservationStatus::Pending);
}

#[tokio::test(start_paused = true)]
async fn test_reservation_view_follows_lifecycle() {
    let h = harness();
    let offer = robot_offer(&h.service).await;
    let reservation = h.service.place_order(offer, alice()).await.unwrap();

    let pending = h.service.reservation(reservation.id).await.unwrap().unwrap();
    assert_eq!(pending.status, ReservationStatus::Pending);

    h.service
        .submit_payment(reservation.id, alice(), card(VISA))
        .await
        .unwrap();

    let ordered = h.service.reservation(reservation.id).await.unwrap().unwrap();
    assert_eq!(ordered.status, ReservationStatus::Ordered);
    assert_eq!(ordered.solution_digest, pending.solution_digest);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_order_request_still_supervised() {
    let h = harness_over(
        RecordingGateway::default(),
        FlakyStore::with_create_latency(Duration::from_millis(500)),
    );
    let offer = robot_offer(&h.service).await;

    let abandoned =
        tokio::time::timeout(Duration::from_millis(100), h.service.place_order(offer, alice()))
            .await;
    assert!(abandoned.is_err());

    // Admission completes without the caller
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.store.inner.len(), 1);
    assert_eq!(h.service.active_reservations().await.unwrap(), 1);
    assert_eq!(h.service.metrics().created.get(), 1);

    // and its supervisor releases the entry on time
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(h.service.active_reservations().await.unwrap(), 0);
    assert_eq!(h.service.metrics().expired.get(), 1);
    assert_eq!(h.service.metrics().active.get(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_expiry_counts_from_placement() {
    let h = harness_over(
        RecordingGateway::default(),
        FlakyStore::with_create_latency(Duration::from_millis(500)),
    );
    let offer = robot_offer(&h.service).await;

    let placed = Instant::now();
    let reservation = h.service.place_order(offer, alice()).await.unwrap();
    assert!(placed.elapsed() >= Duration::from_millis(500));

    // Deadline is 30s after placement, checked on the next whole-second tick
    tokio::time::sleep_until(placed + Duration::from_millis(30_900)).await;
    assert_eq!(h.service.active_reservations().await.unwrap(), 1);

    tokio::time::sleep_until(placed + Duration::from_millis(31_200)).await;
    assert_eq!(h.service.active_reservations().await.unwrap(), 0);
    assert_eq!(stored_status(&h, reservation.id).await, ReservationStatus::Expired);
}
