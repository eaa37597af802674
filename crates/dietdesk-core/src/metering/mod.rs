//! Subscription meter.
//!
//! Per-doctor monthly counters gated by the tier limit table. The check and
//! the increment run inside one immediate transaction as a single conditional
//! `UPDATE`, so concurrent callers at `limit - 1` get at most one success.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::db::{self, Database, DbError};
use crate::models::{Feature, UsageSnapshot};

#[derive(Error, Debug)]
pub enum MeterError {
    #[error(transparent)]
    Database(#[from] DbError),

    #[error("Doctor not found: {0}")]
    DoctorNotFound(String),
}

pub type MeterResult<T> = Result<T, MeterError>;

/// Why a consume was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DenyReason {
    SubscriptionInactive,
    LimitReached,
}

/// Outcome of [`Meter::check_and_consume`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "camelCase")]
pub enum Decision {
    /// One unit was consumed. `remaining` is `None` for unlimited tiers.
    Allowed { used: u32, remaining: Option<u32> },
    /// Nothing was consumed.
    Denied { reason: DenyReason, used: u32 },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    pub fn used(&self) -> u32 {
        match *self {
            Self::Allowed { used, .. } | Self::Denied { used, .. } => used,
        }
    }

    /// Units left after this decision; `None` when unlimited.
    pub fn remaining(&self) -> Option<u32> {
        match *self {
            Self::Allowed { remaining, .. } => remaining,
            Self::Denied { .. } => Some(0),
        }
    }
}

/// Usage metering over a database connection.
pub struct Meter<'a> {
    db: &'a Database,
}

impl<'a> Meter<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Consume one unit of `feature` for a doctor if the tier allows it.
    pub fn check_and_consume(
        &self,
        doctor_id: &str,
        feature: Feature,
        now: DateTime<Utc>,
    ) -> MeterResult<Decision> {
        let tx = self.db.immediate_transaction()?;

        let doctor = self
            .db
            .get_doctor(doctor_id)?
            .ok_or_else(|| MeterError::DoctorNotFound(doctor_id.to_string()))?;

        if !doctor.is_subscription_active_at(now) {
            let used = db::usage::read_count(&tx, doctor_id, feature)?;
            debug!(doctor_id, %feature, "Usage denied: subscription inactive");
            return Ok(Decision::Denied {
                reason: DenyReason::SubscriptionInactive,
                used,
            });
        }

        let limit = doctor.tier.limit(feature);
        match db::usage::try_increment(&tx, doctor_id, feature, limit)? {
            Some(used) => {
                tx.commit().map_err(DbError::from)?;
                let remaining = limit.map(|l| l.saturating_sub(used));
                debug!(doctor_id, %feature, used, ?remaining, "Usage consumed");
                Ok(Decision::Allowed { used, remaining })
            }
            None => {
                let used = db::usage::read_count(&tx, doctor_id, feature)?;
                info!(doctor_id, %feature, used, tier = %doctor.tier, "Usage limit reached");
                Ok(Decision::Denied {
                    reason: DenyReason::LimitReached,
                    used,
                })
            }
        }
    }

    /// Return a unit consumed by an operation that then failed.
    pub fn release(&self, doctor_id: &str, feature: Feature) -> MeterResult<()> {
        if self.db.release_usage(doctor_id, feature)? {
            debug!(doctor_id, %feature, "Usage released");
        } else {
            warn!(doctor_id, %feature, "Release with nothing consumed");
        }
        Ok(())
    }

    /// Snapshot of every feature for a doctor.
    pub fn usage(&self, doctor_id: &str) -> MeterResult<Vec<UsageSnapshot>> {
        let doctor = self
            .db
            .get_doctor(doctor_id)?
            .ok_or_else(|| MeterError::DoctorNotFound(doctor_id.to_string()))?;
        let counts = self.db.usage_counts(doctor_id)?;

        Ok(Feature::ALL
            .into_iter()
            .map(|feature| {
                let used = counts.get(&feature).copied().unwrap_or(0);
                UsageSnapshot::new(feature, used, doctor.tier.limit(feature))
            })
            .collect())
    }

    /// Zero every counter of every doctor. Safe to repeat.
    pub fn reset_all(&self) -> MeterResult<usize> {
        let changed = self.db.reset_usage()?;
        info!(counters = changed, "Usage counters reset");
        Ok(changed)
    }

    /// Reset the counters if `now` falls in a new month.
    ///
    /// Returns the number of counters reset, or `None` when the stored
    /// period already matches and nothing was done.
    pub fn roll_over(&self, now: DateTime<Utc>) -> MeterResult<Option<usize>> {
        let period = usage_period(now);
        let tx = self.db.immediate_transaction()?;

        let stored = db::usage::read_usage_period(&tx)?;
        if stored == period {
            debug!(%period, "Usage period unchanged");
            return Ok(None);
        }

        let changed = db::usage::reset_counters(&tx)?;
        db::usage::write_usage_period(&tx, &period)?;
        tx.commit().map_err(DbError::from)?;

        info!(from = %stored, to = %period, counters = changed, "Usage period rolled over");
        Ok(Some(changed))
    }
}

/// Month key (`YYYY-MM`) used to detect a new usage period.
pub fn usage_period(now: DateTime<Utc>) -> String {
    now.format("%Y-%m").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Doctor, Tier};
    use chrono::{Duration, TimeZone};

    fn setup(tier: Tier) -> (Database, Doctor) {
        let db = Database::open_in_memory().unwrap();
        let doctor = Doctor::new("Dr. Martin".into(), "martin@cabinet.fr".into(), tier);
        db.insert_doctor(&doctor).unwrap();
        (db, doctor)
    }

    #[test]
    fn test_allows_until_limit() {
        let (db, doctor) = setup(Tier::Essentiel);
        let meter = Meter::new(&db);
        db.set_usage_count(&doctor.doctor_id, Feature::AiDiets, 9).unwrap();

        let decision = meter
            .check_and_consume(&doctor.doctor_id, Feature::AiDiets, Utc::now())
            .unwrap();
        assert_eq!(decision, Decision::Allowed { used: 10, remaining: Some(0) });

        let decision = meter
            .check_and_consume(&doctor.doctor_id, Feature::AiDiets, Utc::now())
            .unwrap();
        assert_eq!(
            decision,
            Decision::Denied { reason: DenyReason::LimitReached, used: 10 }
        );
        assert_eq!(db.usage_count(&doctor.doctor_id, Feature::AiDiets).unwrap(), 10);
    }

    #[test]
    fn test_pro_unlimited() {
        let (db, doctor) = setup(Tier::Pro);
        let meter = Meter::new(&db);
        db.set_usage_count(&doctor.doctor_id, Feature::Appointments, 10_000).unwrap();

        let decision = meter
            .check_and_consume(&doctor.doctor_id, Feature::Appointments, Utc::now())
            .unwrap();
        assert_eq!(decision, Decision::Allowed { used: 10_001, remaining: None });
    }

    #[test]
    fn test_inactive_subscription_denied() {
        let (db, doctor) = setup(Tier::Premium);
        let now = Utc::now();
        db.update_subscription(
            &doctor.doctor_id,
            Tier::Premium,
            true,
            Some(now - Duration::days(40)),
            Some(now - Duration::days(10)),
        )
        .unwrap();

        let meter = Meter::new(&db);
        let decision = meter
            .check_and_consume(&doctor.doctor_id, Feature::NutritionPlans, now)
            .unwrap();
        assert!(!decision.is_allowed());
        assert_eq!(decision.remaining(), Some(0));
        assert_eq!(db.usage_count(&doctor.doctor_id, Feature::NutritionPlans).unwrap(), 0);
    }

    #[test]
    fn test_unknown_doctor() {
        let (db, _) = setup(Tier::Premium);
        let meter = Meter::new(&db);
        let result = meter.check_and_consume("missing", Feature::Appointments, Utc::now());
        assert!(matches!(result, Err(MeterError::DoctorNotFound(_))));
    }

    #[test]
    fn test_release_gives_back_unit() {
        let (db, doctor) = setup(Tier::Essentiel);
        let meter = Meter::new(&db);
        meter
            .check_and_consume(&doctor.doctor_id, Feature::WorkoutPlans, Utc::now())
            .unwrap();
        meter.release(&doctor.doctor_id, Feature::WorkoutPlans).unwrap();
        meter.release(&doctor.doctor_id, Feature::WorkoutPlans).unwrap();
        assert_eq!(db.usage_count(&doctor.doctor_id, Feature::WorkoutPlans).unwrap(), 0);
    }

    #[test]
    fn test_usage_snapshot() {
        let (db, doctor) = setup(Tier::Essentiel);
        db.set_usage_count(&doctor.doctor_id, Feature::NutritionPlans, 12).unwrap();

        let usage = Meter::new(&db).usage(&doctor.doctor_id).unwrap();
        assert_eq!(usage.len(), 4);
        let plans = usage
            .iter()
            .find(|u| u.feature == Feature::NutritionPlans)
            .unwrap();
        assert_eq!(plans.used, 12);
        assert_eq!(plans.limit, Some(30));
        assert_eq!(plans.remaining, Some(18));
    }

    #[test]
    fn test_roll_over_once_per_month() {
        let (db, doctor) = setup(Tier::Essentiel);
        let meter = Meter::new(&db);
        db.set_usage_count(&doctor.doctor_id, Feature::Appointments, 7).unwrap();

        let october = Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap();
        assert_eq!(meter.roll_over(october).unwrap(), Some(1));
        assert_eq!(db.usage_period().unwrap(), "2026-10");

        db.set_usage_count(&doctor.doctor_id, Feature::Appointments, 3).unwrap();
        assert_eq!(meter.roll_over(october + Duration::days(5)).unwrap(), None);
        assert_eq!(db.usage_count(&doctor.doctor_id, Feature::Appointments).unwrap(), 3);

        let november = Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 0).unwrap();
        assert_eq!(meter.roll_over(november).unwrap(), Some(1));
        assert_eq!(db.usage_count(&doctor.doctor_id, Feature::Appointments).unwrap(), 0);
    }

    #[test]
    fn test_decision_serializes_tagged() {
        let json = serde_json::to_value(Decision::Denied {
            reason: DenyReason::LimitReached,
            used: 5,
        })
        .unwrap();
        assert_eq!(json["decision"], "denied");
        assert_eq!(json["reason"], "limitReached");
    }
}
