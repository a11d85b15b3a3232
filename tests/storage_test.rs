//! Storage-backed invariant tests
//!
//! The hardest guarantees live in guarded SQL statements rather than in
//! application code: replay-idempotent ledger writes, capped counter
//! increments, the single reward flip. These tests exercise them against a
//! real Postgres instance (TEST_DATABASE_URL, or a disposable container).

mod helpers;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use serial_test::serial;
use teloxide::Bot;

use anonimka::config::{LimitsConfig, PushConfig};
use anonimka::database::DatabaseService;
use anonimka::models::referral::RewardOutcome;
use anonimka::services::{
    ChatService, EntitlementService, NotificationService, QuotaService, ReferralService,
    SubscriptionService,
};
use anonimka::utils::clock::PlatformClock;
use anonimka::AnonimkaError;
use helpers::TestDatabase;

fn entitlement(db: &DatabaseService) -> EntitlementService {
    EntitlementService::new(db.accounts.clone(), PlatformClock::default())
}

fn ledger(db: &DatabaseService) -> SubscriptionService {
    SubscriptionService::new(
        db.accounts.clone(),
        db.subscriptions.clone(),
        PlatformClock::default(),
    )
}

fn quota(db: &DatabaseService) -> QuotaService {
    QuotaService::new(
        db.accounts.clone(),
        db.counters.clone(),
        entitlement(db),
        LimitsConfig::default(),
        PlatformClock::default(),
    )
}

fn chat(db: &DatabaseService) -> ChatService {
    let push = PushConfig {
        enabled: false,
        endpoint: String::new(),
        server_key: String::new(),
    };
    let notifier = NotificationService::new(Bot::new("0:TEST"), db.accounts.clone(), push);
    ChatService::new(
        db.chats.clone(),
        db.accounts.clone(),
        entitlement(db),
        quota(db),
        notifier,
        LimitsConfig::default().pending_request_cap,
    )
}

#[tokio::test]
#[serial]
async fn replayed_purchase_extends_once() {
    let test_db = TestDatabase::new().await.expect("test database");
    test_db.cleanup().await.expect("cleanup");
    let db = test_db.service();

    let account = test_db.create_account().await;
    let svc = ledger(&db);

    let first = svc
        .activate(&account.token, 1, "txn-replay", 250)
        .await
        .expect("first activation");

    // The upstream payment notifier may deliver the callback again
    let replayed = svc
        .activate(&account.token, 1, "txn-replay", 250)
        .await
        .expect("replayed activation");
    assert_eq!(replayed, first);

    let entries = db
        .subscriptions
        .list_for_account(&account.token, 10)
        .await
        .expect("ledger entries");
    assert_eq!(entries.len(), 1);

    let stored = db
        .accounts
        .find_by_token(&account.token)
        .await
        .expect("reload")
        .expect("account exists");
    assert_eq!(stored.premium_until, Some(first));
    assert!(stored.is_premium);
}

#[tokio::test]
#[serial]
async fn second_purchase_stacks_on_first() {
    let test_db = TestDatabase::new().await.expect("test database");
    test_db.cleanup().await.expect("cleanup");
    let db = test_db.service();

    let account = test_db.create_account().await;
    let svc = ledger(&db);

    let first = svc.activate(&account.token, 1, "txn-a", 250).await.expect("first");
    let second = svc.activate(&account.token, 1, "txn-b", 250).await.expect("second");

    assert!(second > first);
    let entries = db
        .subscriptions
        .list_for_account(&account.token, 10)
        .await
        .expect("ledger entries");
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
#[serial]
async fn guarded_increment_denies_when_limit_reached() {
    let test_db = TestDatabase::new().await.expect("test database");
    test_db.cleanup().await.expect("cleanup");
    let db = test_db.service();

    let account = test_db.create_account().await;
    let today = PlatformClock::default().today();

    let first = db
        .counters
        .try_increment(&account.token, "photos_sent", today, 1)
        .await
        .expect("first increment");
    assert_eq!(first, Some(1));

    // The guard re-evaluates against the committed row, so the second
    // attempt writes nothing
    let second = db
        .counters
        .try_increment(&account.token, "photos_sent", today, 1)
        .await
        .expect("second increment");
    assert_eq!(second, None);

    let stored = db
        .counters
        .find(&account.token, "photos_sent")
        .await
        .expect("find counter")
        .expect("counter exists");
    assert_eq!(stored.count, 1);

    // Day rollover: the same statement resets to 1 instead of denying
    let tomorrow = today.succ_opt().expect("valid date");
    let rolled = db
        .counters
        .try_increment(&account.token, "photos_sent", tomorrow, 1)
        .await
        .expect("rollover increment");
    assert_eq!(rolled, Some(1));
}

#[tokio::test]
#[serial]
async fn free_tier_photo_quota_denies_second_consume() {
    let test_db = TestDatabase::new().await.expect("test database");
    test_db.cleanup().await.expect("cleanup");
    let db = test_db.service();

    let account = test_db.create_account().await;
    let svc = quota(&db);

    let first = svc
        .try_consume(&account, anonimka::models::CounterKind::PhotosSent)
        .await
        .expect("first consume");
    assert!(first.allowed);
    assert_eq!(first.used, 1);

    let second = svc
        .try_consume(&account, anonimka::models::CounterKind::PhotosSent)
        .await
        .expect("second consume");
    assert!(!second.allowed);
    assert_eq!(second.used, 1);
}

#[tokio::test]
#[serial]
async fn double_claim_credits_referrer_once() {
    let test_db = TestDatabase::new().await.expect("test database");
    test_db.cleanup().await.expect("cleanup");
    let db = test_db.service();

    let referrer = test_db.create_account().await;
    let referred = test_db.create_account().await;

    let svc = ReferralService::new(db.referrals.clone(), ledger(&db));
    svc.register(&referrer.token, &referred.token).await.expect("register");

    let first = svc.claim(&referred.token).await.expect("first claim");
    assert_matches!(first, RewardOutcome::Granted { .. });

    let second = svc.claim(&referred.token).await.expect("second claim");
    assert_eq!(second, RewardOutcome::AlreadyGranted);

    let credits = db
        .subscriptions
        .list_for_account(&referrer.token, 10)
        .await
        .expect("ledger entries");
    assert_eq!(credits.len(), 1);

    let tier = entitlement(&db).resolve(&referrer.token).await.expect("resolve");
    assert!(tier.premium);
}

#[tokio::test]
#[serial]
async fn accept_materializes_exactly_one_message() {
    let test_db = TestDatabase::new().await.expect("test database");
    test_db.cleanup().await.expect("cleanup");
    let db = test_db.service();

    let initiator = test_db.create_account().await;
    let recipient = test_db.create_account().await;
    let svc = chat(&db);

    let request = svc
        .request_chat(&initiator, &recipient, Some(1001), "hello there")
        .await
        .expect("request chat");
    assert!(request.is_pending());

    let accepted = svc.accept(request.id, &recipient).await.expect("accept");
    assert!(accepted.accepted);
    assert_eq!(accepted.staged_message, None);

    let messages = svc
        .messages(request.id, &recipient, 50)
        .await
        .expect("list messages");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].sender, initiator.token);
    assert_eq!(messages[0].body.as_deref(), Some("hello there"));
}

#[tokio::test]
#[serial]
async fn reject_materializes_nothing_and_removes_request() {
    let test_db = TestDatabase::new().await.expect("test database");
    test_db.cleanup().await.expect("cleanup");
    let db = test_db.service();

    let initiator = test_db.create_account().await;
    let recipient = test_db.create_account().await;
    let svc = chat(&db);

    let request = svc
        .request_chat(&initiator, &recipient, Some(1002), "hello?")
        .await
        .expect("request chat");

    svc.reject(request.id, &recipient).await.expect("reject");
    // Idempotent: rejecting again is a no-op, not a failure
    svc.reject(request.id, &recipient).await.expect("repeated reject");

    let gone = db.chats.find_by_id(request.id).await.expect("lookup");
    assert!(gone.is_none());
}

#[tokio::test]
#[serial]
async fn duplicate_request_returns_existing_row_unnotified() {
    let test_db = TestDatabase::new().await.expect("test database");
    test_db.cleanup().await.expect("cleanup");
    let db = test_db.service();

    let initiator = test_db.create_account().await;
    let recipient = test_db.create_account().await;

    let (first, created) = db
        .chats
        .create_pending(&initiator.token, &recipient.token, Some(1003), "first")
        .await
        .expect("first create");
    assert!(created);

    let (second, created_again) = db
        .chats
        .create_pending(&initiator.token, &recipient.token, Some(1003), "second")
        .await
        .expect("duplicate create");
    assert!(!created_again);
    assert_eq!(second.id, first.id);
    // The original staged message is kept untouched
    assert_eq!(second.staged_message.as_deref(), Some("first"));

    // Through the service: the duplicate still resolves to the same row
    let svc = chat(&db);
    let resolved = svc
        .request_chat(&initiator, &recipient, Some(1003), "third")
        .await
        .expect("service duplicate");
    assert_eq!(resolved.id, first.id);
}

#[tokio::test]
#[serial]
async fn admission_cap_fills_then_premium_bypasses() {
    let test_db = TestDatabase::new().await.expect("test database");
    test_db.cleanup().await.expect("cleanup");
    let db = test_db.service();

    let recipient = test_db.create_account().await;
    let svc = chat(&db);
    let listing = 2001_i64;

    // Five distinct free senders fill the listing's pending slots
    for _ in 0..5 {
        let sender = test_db.create_account().await;
        svc.request_chat(&sender, &recipient, Some(listing), "hi")
            .await
            .expect("pending request within cap");
    }

    let sixth = test_db.create_account().await;
    let denied = svc.request_chat(&sixth, &recipient, Some(listing), "hi").await;
    assert_matches!(
        denied,
        Err(AnonimkaError::AdmissionLimitReached { pending: 5, cap: 5 })
    );

    // A premium sender is admitted as a sixth concurrently-pending request
    let premium_sender = test_db.create_account().await;
    ledger(&db)
        .activate(&premium_sender.token, 1, "txn-cap-bypass", 250)
        .await
        .expect("activate premium");
    let premium_sender = db
        .accounts
        .find_by_token(&premium_sender.token)
        .await
        .expect("reload")
        .expect("account exists");

    let admitted = svc
        .request_chat(&premium_sender, &recipient, Some(listing), "hi")
        .await
        .expect("premium bypasses cap");
    assert!(admitted.is_pending());

    let pending = db
        .chats
        .count_pending_for_listing(listing)
        .await
        .expect("count pending");
    assert_eq!(pending, 6);
}

#[tokio::test]
#[serial]
async fn pre_registration_token_resolves_from_legacy_ledger() {
    let test_db = TestDatabase::new().await.expect("test database");
    test_db.cleanup().await.expect("cleanup");
    let db = test_db.service();

    // A grant recorded before any accounts row existed
    sqlx::query("INSERT INTO premium_tokens (token, is_premium, premium_until) VALUES ($1, TRUE, $2)")
        .bind("pre-reg-active")
        .bind(Utc::now() + Duration::days(10))
        .execute(&test_db.pool)
        .await
        .expect("insert legacy grant");

    let tier = entitlement(&db)
        .resolve("pre-reg-active")
        .await
        .expect("resolve legacy token");
    assert!(tier.premium);

    // An expired legacy grant does not resurrect the token
    sqlx::query("INSERT INTO premium_tokens (token, is_premium, premium_until) VALUES ($1, TRUE, $2)")
        .bind("pre-reg-expired")
        .bind(Utc::now() - Duration::days(10))
        .execute(&test_db.pool)
        .await
        .expect("insert expired grant");

    let missing = entitlement(&db).resolve("pre-reg-expired").await;
    assert_matches!(missing, Err(AnonimkaError::AccountNotFound { .. }));
}
