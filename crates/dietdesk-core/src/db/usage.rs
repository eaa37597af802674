//! Usage counter storage.
//!
//! The free functions take a plain `Connection` so the meter can run them
//! inside its own immediate transaction.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};

use super::{Database, DbResult};
use crate::models::Feature;

const USAGE_PERIOD_KEY: &str = "usage_period";

/// Create the zeroed counter row if the doctor has none for this feature.
pub(crate) fn ensure_counter(conn: &Connection, doctor_id: &str, feature: Feature) -> DbResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO usage_counters (doctor_id, feature, count) VALUES (?, ?, 0)",
        params![doctor_id, feature.as_str()],
    )?;
    Ok(())
}

/// Increment a counter only while it is below `limit` (`None` = unlimited).
///
/// Returns the new count, or `None` when the limit is already reached.
pub(crate) fn try_increment(
    conn: &Connection,
    doctor_id: &str,
    feature: Feature,
    limit: Option<u32>,
) -> DbResult<Option<u32>> {
    ensure_counter(conn, doctor_id, feature)?;
    let count = conn
        .query_row(
            r#"
            UPDATE usage_counters
            SET count = count + 1, updated_at = datetime('now')
            WHERE doctor_id = ?1 AND feature = ?2 AND (?3 IS NULL OR count < ?3)
            RETURNING count
            "#,
            params![doctor_id, feature.as_str(), limit],
            |row| row.get(0),
        )
        .optional()?;
    Ok(count)
}

pub(crate) fn read_count(conn: &Connection, doctor_id: &str, feature: Feature) -> DbResult<u32> {
    let count = conn
        .query_row(
            "SELECT count FROM usage_counters WHERE doctor_id = ? AND feature = ?",
            params![doctor_id, feature.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(count.unwrap_or(0))
}

pub(crate) fn reset_counters(conn: &Connection) -> DbResult<usize> {
    let rows = conn.execute(
        "UPDATE usage_counters SET count = 0, updated_at = datetime('now') WHERE count != 0",
        [],
    )?;
    Ok(rows)
}

pub(crate) fn read_usage_period(conn: &Connection) -> DbResult<String> {
    let period = conn
        .query_row(
            "SELECT value FROM meter_state WHERE key = ?",
            [USAGE_PERIOD_KEY],
            |row| row.get(0),
        )
        .optional()?;
    Ok(period.unwrap_or_default())
}

pub(crate) fn write_usage_period(conn: &Connection, period: &str) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO meter_state (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        params![USAGE_PERIOD_KEY, period],
    )?;
    Ok(())
}

impl Database {
    /// Current count for one feature; a doctor without a row has used nothing.
    pub fn usage_count(&self, doctor_id: &str, feature: Feature) -> DbResult<u32> {
        read_count(&self.conn, doctor_id, feature)
    }

    /// Counts for every feature of a doctor.
    pub fn usage_counts(&self, doctor_id: &str) -> DbResult<HashMap<Feature, u32>> {
        let mut stmt = self
            .conn
            .prepare("SELECT feature, count FROM usage_counters WHERE doctor_id = ?")?;
        let rows = stmt.query_map([doctor_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
        })?;

        let mut counts: HashMap<Feature, u32> = Feature::ALL.into_iter().map(|f| (f, 0)).collect();
        for row in rows {
            let (feature, count) = row?;
            if let Ok(feature) = feature.parse::<Feature>() {
                counts.insert(feature, count);
            }
        }
        Ok(counts)
    }

    /// Overwrite a counter.
    pub fn set_usage_count(&self, doctor_id: &str, feature: Feature, count: u32) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO usage_counters (doctor_id, feature, count) VALUES (?1, ?2, ?3)
            ON CONFLICT(doctor_id, feature)
            DO UPDATE SET count = excluded.count, updated_at = datetime('now')
            "#,
            params![doctor_id, feature.as_str(), count],
        )?;
        Ok(())
    }

    /// Give back one unit. Never goes below zero; returns whether a unit was returned.
    pub fn release_usage(&self, doctor_id: &str, feature: Feature) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE usage_counters
            SET count = count - 1, updated_at = datetime('now')
            WHERE doctor_id = ? AND feature = ? AND count > 0
            "#,
            params![doctor_id, feature.as_str()],
        )?;
        Ok(rows_affected > 0)
    }

    /// Zero every counter. Returns the number of counters that changed.
    pub fn reset_usage(&self) -> DbResult<usize> {
        reset_counters(&self.conn)
    }

    /// Stored usage period (`YYYY-MM`), empty before the first roll-over.
    pub fn usage_period(&self) -> DbResult<String> {
        read_usage_period(&self.conn)
    }
}
