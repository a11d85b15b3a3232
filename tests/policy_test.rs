//! Policy rule tests
//!
//! Exercises the pure decision layer through the public API: entitlement
//! resolution, subscription stacking, quota limits, nickname policy,
//! admission caps and notification routing. These rules carry the business
//! invariants, so they are tested exhaustively without a database.

use assert_matches::assert_matches;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use anonimka::models::counter::{CounterKind, DailyCounter};
use anonimka::services::chat::admission_allowed;
use anonimka::services::entitlement::effective_premium;
use anonimka::services::ledger::{stacked_expiry, MAX_MONTHS, MIN_MONTHS};
use anonimka::services::notification::{delivery_route, DeliveryRoute};
use anonimka::services::quota::{
    daily_limit, nickname_change_allowed, validate_nickname, NicknameDecision,
};
use anonimka::config::LimitsConfig;
use anonimka::utils::clock::PlatformClock;
use anonimka::AnonimkaError;

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
}

#[test]
fn premium_flag_without_valid_expiry_is_not_premium() {
    let now = Utc::now();
    assert!(!effective_premium(true, Some(now - Duration::seconds(1)), now));
    assert!(!effective_premium(false, Some(now + Duration::days(30)), now));
    assert!(effective_premium(true, Some(now + Duration::seconds(1)), now));
    assert!(effective_premium(true, None, now));
}

#[test]
fn purchase_stacks_on_active_subscription() {
    let now = at(2024, 6, 1);
    let active_until = at(2024, 7, 15);

    let stacked = stacked_expiry(now, Some(active_until), true, 1).unwrap();
    assert_eq!(stacked, at(2024, 8, 15));

    // An expired subscription restarts from the purchase instant
    let expired_until = at(2024, 4, 15);
    let restarted = stacked_expiry(now, Some(expired_until), false, 1).unwrap();
    assert_eq!(restarted, at(2024, 7, 1));
}

#[test]
fn two_single_month_purchases_equal_one_double() {
    let now = at(2024, 6, 1);
    let first = stacked_expiry(now, None, false, 1).unwrap();
    let second = stacked_expiry(now, Some(first), true, 1).unwrap();
    assert_eq!(second, stacked_expiry(now, None, false, 2).unwrap());
}

#[test]
fn month_arithmetic_clamps_short_months() {
    // Jan 31 + 1 month lands on the last day of February
    assert_eq!(stacked_expiry(at(2024, 1, 31), None, false, 1).unwrap(), at(2024, 2, 29));
    assert_eq!(stacked_expiry(at(2023, 1, 31), None, false, 1).unwrap(), at(2023, 2, 28));
    // Crossing a year boundary
    assert_eq!(stacked_expiry(at(2024, 11, 30), None, false, 3).unwrap(), at(2025, 2, 28));
}

#[test]
fn month_count_bounds_are_enforced() {
    let now = at(2024, 6, 1);
    assert_matches!(
        stacked_expiry(now, None, false, MIN_MONTHS - 1),
        Err(AnonimkaError::InvalidInput(_))
    );
    assert_matches!(
        stacked_expiry(now, None, false, MAX_MONTHS + 1),
        Err(AnonimkaError::InvalidInput(_))
    );
    assert!(stacked_expiry(now, None, false, MIN_MONTHS).is_ok());
    assert!(stacked_expiry(now, None, false, MAX_MONTHS).is_ok());
}

#[test]
fn daily_limits_follow_tier() {
    let limits = LimitsConfig::default();
    assert_eq!(daily_limit(&limits, CounterKind::PhotosSent, false), Some(1));
    assert_eq!(daily_limit(&limits, CounterKind::PhotosSent, true), None);
    assert_eq!(daily_limit(&limits, CounterKind::AdsCreated, false), Some(1));
    assert_eq!(daily_limit(&limits, CounterKind::AdsCreated, true), Some(5));
}

#[test]
fn stale_counter_reads_as_zero_today() {
    let today = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
    let counter = DailyCounter {
        account_token: "t".to_string(),
        kind: "photos_sent".to_string(),
        count: 7,
        last_reset_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
    };
    assert_eq!(counter.logical_count(today), 0);

    let fresh = DailyCounter { last_reset_date: today, ..counter };
    assert_eq!(fresh.logical_count(today), 7);
}

#[test]
fn platform_day_rolls_over_at_offset_midnight() {
    let clock = PlatformClock::new(3);
    // 21:00 UTC June 1 is already June 2 at UTC+3
    let utc_evening = Utc.with_ymd_and_hms(2024, 6, 1, 21, 0, 0).unwrap();
    assert_eq!(
        clock.local_date(utc_evening),
        NaiveDate::from_ymd_opt(2024, 6, 2).unwrap()
    );
    let utc_afternoon = Utc.with_ymd_and_hms(2024, 6, 1, 20, 59, 59).unwrap();
    assert_eq!(
        clock.local_date(utc_afternoon),
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    );
}

#[test]
fn first_nickname_assignment_is_free_for_all_tiers() {
    let now = Utc::now();
    for premium in [false, true] {
        assert_eq!(
            nickname_change_allowed(premium, false, None, now, 24),
            NicknameDecision::Allowed { first_assignment: true }
        );
    }
}

#[test]
fn free_tier_never_changes_an_assigned_nickname() {
    let now = Utc::now();
    assert_eq!(
        nickname_change_allowed(false, true, None, now, 24),
        NicknameDecision::LockedFree
    );
    assert_eq!(
        nickname_change_allowed(false, true, Some(now - Duration::days(365)), now, 24),
        NicknameDecision::LockedFree
    );
}

#[test]
fn premium_nickname_cooldown_reports_hours_remaining() {
    let now = Utc::now();
    match nickname_change_allowed(true, true, Some(now - Duration::hours(10)), now, 24) {
        NicknameDecision::Cooldown { hours_remaining } => assert_eq!(hours_remaining, 14),
        other => panic!("expected cooldown, got {other:?}"),
    }
    assert_eq!(
        nickname_change_allowed(true, true, Some(now - Duration::hours(24)), now, 24),
        NicknameDecision::Allowed { first_assignment: false }
    );
}

#[test]
fn nickname_charset_is_validated() {
    assert!(validate_nickname("night_owl-7").is_ok());
    assert!(validate_nickname("Тайна").is_ok());
    assert!(validate_nickname("with space").is_err());
    assert!(validate_nickname("dot.ted").is_err());
    assert!(validate_nickname("").is_err());
    assert!(validate_nickname(&"x".repeat(65)).is_err());
}

#[test]
fn admission_cap_binds_free_initiators_only() {
    let cap = 5;
    assert!(admission_allowed(false, 4, cap));
    assert!(!admission_allowed(false, 5, cap));
    assert!(!admission_allowed(false, 50, cap));
    assert!(admission_allowed(true, 5, cap));
    assert!(admission_allowed(true, 50, cap));
}

#[test]
fn notification_routing_prefers_telegram_then_push() {
    assert_eq!(delivery_route(Some(7), false, false), DeliveryRoute::Telegram(7));
    assert_eq!(delivery_route(Some(7), false, true), DeliveryRoute::Telegram(7));
    assert_eq!(delivery_route(Some(7), true, true), DeliveryRoute::Push);
    assert_eq!(delivery_route(None, false, true), DeliveryRoute::Push);
    assert_eq!(delivery_route(None, false, false), DeliveryRoute::Nowhere);
    assert_eq!(delivery_route(Some(7), true, false), DeliveryRoute::Nowhere);
}
