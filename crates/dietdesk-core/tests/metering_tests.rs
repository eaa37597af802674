//! Subscription Meter integration tests.
//!
//! Covers the limit boundary, unlimited tiers, the monthly roll-over and
//! concurrent consumers on one database file.

use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{TimeZone, Utc};
use dietdesk_core::metering::{Decision, DenyReason, Meter};
use dietdesk_core::models::{Doctor, Feature, Tier};
use dietdesk_core::Database;

fn doctor_in(db: &Database, tier: Tier) -> Doctor {
    let email = format!("{}@cabinet.fr", uuid::Uuid::new_v4());
    let doctor = Doctor::new("Dr. Martin".into(), email, tier);
    db.insert_doctor(&doctor).unwrap();
    doctor
}

#[test]
fn test_at_limit_denies_and_keeps_count() {
    let db = Database::open_in_memory().unwrap();
    let doctor = doctor_in(&db, Tier::Essentiel);
    let limit = Tier::Essentiel.limit(Feature::AiDiets).unwrap();
    db.set_usage_count(&doctor.doctor_id, Feature::AiDiets, limit).unwrap();

    let decision = Meter::new(&db)
        .check_and_consume(&doctor.doctor_id, Feature::AiDiets, Utc::now())
        .unwrap();

    assert_eq!(
        decision,
        Decision::Denied {
            reason: DenyReason::LimitReached,
            used: limit
        }
    );
    assert_eq!(decision.remaining(), Some(0));
    assert_eq!(db.usage_count(&doctor.doctor_id, Feature::AiDiets).unwrap(), limit);
}

#[test]
fn test_one_below_limit_allows_and_reaches_limit() {
    let db = Database::open_in_memory().unwrap();
    let doctor = doctor_in(&db, Tier::Premium);
    let limit = Tier::Premium.limit(Feature::NutritionPlans).unwrap();
    db.set_usage_count(&doctor.doctor_id, Feature::NutritionPlans, limit - 1).unwrap();

    let decision = Meter::new(&db)
        .check_and_consume(&doctor.doctor_id, Feature::NutritionPlans, Utc::now())
        .unwrap();

    assert!(decision.is_allowed());
    assert_eq!(decision.used(), limit);
    assert_eq!(decision.remaining(), Some(0));
    assert_eq!(
        db.usage_count(&doctor.doctor_id, Feature::NutritionPlans).unwrap(),
        limit
    );
}

#[test]
fn test_pro_always_allows() {
    let db = Database::open_in_memory().unwrap();
    let doctor = doctor_in(&db, Tier::Pro);
    let meter = Meter::new(&db);

    for feature in Feature::ALL {
        db.set_usage_count(&doctor.doctor_id, feature, 1_000_000).unwrap();
        let decision = meter
            .check_and_consume(&doctor.doctor_id, feature, Utc::now())
            .unwrap();
        assert_eq!(
            decision,
            Decision::Allowed {
                used: 1_000_001,
                remaining: None
            }
        );
    }
}

#[test]
fn test_features_are_independent() {
    let db = Database::open_in_memory().unwrap();
    let doctor = doctor_in(&db, Tier::Essentiel);
    let meter = Meter::new(&db);
    db.set_usage_count(&doctor.doctor_id, Feature::AiDiets, 10).unwrap();

    let denied = meter
        .check_and_consume(&doctor.doctor_id, Feature::AiDiets, Utc::now())
        .unwrap();
    let allowed = meter
        .check_and_consume(&doctor.doctor_id, Feature::Appointments, Utc::now())
        .unwrap();

    assert!(!denied.is_allowed());
    assert_eq!(allowed, Decision::Allowed { used: 1, remaining: Some(99) });
}

#[test]
fn test_doctors_are_independent() {
    let db = Database::open_in_memory().unwrap();
    let full = doctor_in(&db, Tier::Essentiel);
    let fresh = doctor_in(&db, Tier::Essentiel);
    db.set_usage_count(&full.doctor_id, Feature::WorkoutPlans, 30).unwrap();

    let meter = Meter::new(&db);
    assert!(!meter
        .check_and_consume(&full.doctor_id, Feature::WorkoutPlans, Utc::now())
        .unwrap()
        .is_allowed());
    assert!(meter
        .check_and_consume(&fresh.doctor_id, Feature::WorkoutPlans, Utc::now())
        .unwrap()
        .is_allowed());
}

#[test]
fn test_reactivated_subscription_allows_again() {
    let db = Database::open_in_memory().unwrap();
    let doctor = doctor_in(&db, Tier::Premium);
    let meter = Meter::new(&db);

    db.update_subscription(&doctor.doctor_id, Tier::Premium, false, None, None)
        .unwrap();
    let decision = meter
        .check_and_consume(&doctor.doctor_id, Feature::Appointments, Utc::now())
        .unwrap();
    assert_eq!(
        decision,
        Decision::Denied {
            reason: DenyReason::SubscriptionInactive,
            used: 0
        }
    );

    db.update_subscription(&doctor.doctor_id, Tier::Premium, true, None, None)
        .unwrap();
    assert!(meter
        .check_and_consume(&doctor.doctor_id, Feature::Appointments, Utc::now())
        .unwrap()
        .is_allowed());
}

#[test]
fn test_future_billing_period_denies() {
    let db = Database::open_in_memory().unwrap();
    let doctor = doctor_in(&db, Tier::Premium);
    let start = Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2026, 11, 30, 23, 59, 59).unwrap();
    db.update_subscription(&doctor.doctor_id, Tier::Premium, true, Some(start), Some(end))
        .unwrap();

    let meter = Meter::new(&db);
    let before = Utc.with_ymd_and_hms(2026, 10, 20, 9, 0, 0).unwrap();
    assert_eq!(
        meter
            .check_and_consume(&doctor.doctor_id, Feature::AiDiets, before)
            .unwrap(),
        Decision::Denied {
            reason: DenyReason::SubscriptionInactive,
            used: 0
        }
    );

    let during = Utc.with_ymd_and_hms(2026, 11, 5, 9, 0, 0).unwrap();
    assert!(meter
        .check_and_consume(&doctor.doctor_id, Feature::AiDiets, during)
        .unwrap()
        .is_allowed());
}

#[test]
fn test_roll_over_and_reset() {
    let db = Database::open_in_memory().unwrap();
    let a = doctor_in(&db, Tier::Essentiel);
    let b = doctor_in(&db, Tier::Premium);
    db.set_usage_count(&a.doctor_id, Feature::Appointments, 40).unwrap();
    db.set_usage_count(&b.doctor_id, Feature::AiDiets, 3).unwrap();

    let meter = Meter::new(&db);
    let now = Utc.with_ymd_and_hms(2026, 10, 31, 23, 59, 0).unwrap();
    assert_eq!(meter.roll_over(now).unwrap(), Some(2));
    assert_eq!(meter.roll_over(now).unwrap(), None);

    db.set_usage_count(&a.doctor_id, Feature::Appointments, 5).unwrap();
    assert_eq!(meter.reset_all().unwrap(), 1);
    assert_eq!(meter.reset_all().unwrap(), 0);
    assert!(meter
        .usage(&a.doctor_id)
        .unwrap()
        .iter()
        .all(|u| u.used == 0));
}

#[test]
fn test_concurrent_consumers_at_limit_minus_one() {
    const WORKERS: usize = 8;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("practice.db");

    let setup = Database::open(&path).unwrap();
    let doctor = doctor_in(&setup, Tier::Essentiel);
    let limit = Tier::Essentiel.limit(Feature::AiDiets).unwrap();
    setup
        .set_usage_count(&doctor.doctor_id, Feature::AiDiets, limit - 1)
        .unwrap();

    let connections: Vec<Database> = (0..WORKERS)
        .map(|_| Database::open(&path).unwrap())
        .collect();
    let barrier = Arc::new(Barrier::new(WORKERS));

    let handles: Vec<_> = connections
        .into_iter()
        .map(|db| {
            let barrier = Arc::clone(&barrier);
            let doctor_id = doctor.doctor_id.clone();
            thread::spawn(move || {
                barrier.wait();
                Meter::new(&db)
                    .check_and_consume(&doctor_id, Feature::AiDiets, Utc::now())
                    .unwrap()
            })
        })
        .collect();

    let decisions: Vec<Decision> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let allowed = decisions.iter().filter(|d| d.is_allowed()).count();

    assert_eq!(allowed, 1);
    assert_eq!(
        setup.usage_count(&doctor.doctor_id, Feature::AiDiets).unwrap(),
        limit
    );
}
