//! SQLite schema definition.

/// Complete database schema for dietdesk.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Doctors
-- ============================================================================

CREATE TABLE IF NOT EXISTS doctors (
    doctor_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    specialty TEXT,
    tier TEXT NOT NULL CHECK (tier IN ('essentiel', 'premium', 'pro')),
    subscription_active INTEGER NOT NULL DEFAULT 1,
    period_start TEXT,
    period_end TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Usage counters (one row per doctor and feature, reset monthly)
-- ============================================================================

CREATE TABLE IF NOT EXISTS usage_counters (
    doctor_id TEXT NOT NULL REFERENCES doctors(doctor_id) ON DELETE CASCADE,
    feature TEXT NOT NULL
        CHECK (feature IN ('appointments', 'nutritionPlans', 'workoutPlans', 'aiDiets')),
    count INTEGER NOT NULL DEFAULT 0 CHECK (count >= 0),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (doctor_id, feature)
);

-- Meter bookkeeping (current usage period)
CREATE TABLE IF NOT EXISTS meter_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

INSERT OR IGNORE INTO meter_state (key, value) VALUES ('usage_period', '');

-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    patient_id TEXT PRIMARY KEY,
    doctor_id TEXT NOT NULL REFERENCES doctors(doctor_id) ON DELETE CASCADE,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    sex TEXT NOT NULL CHECK (sex IN ('male', 'female')),
    birth_date TEXT,
    height_cm REAL,
    activity_level TEXT,
    goal TEXT,
    weekly_rate_kg REAL,
    pathologies TEXT,
    allergies TEXT,
    status TEXT NOT NULL DEFAULT 'ongoing'
        CHECK (status IN ('inactive', 'ongoing', 'succeeded', 'abandoned')),
    last_measurement_at TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_patients_doctor ON patients(doctor_id);
CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(last_name, first_name);
CREATE INDEX IF NOT EXISTS idx_patients_status ON patients(doctor_id, status);

-- ============================================================================
-- Plans (structured content stored as JSON)
-- ============================================================================

CREATE TABLE IF NOT EXISTS diet_plans (
    plan_id TEXT PRIMARY KEY,
    doctor_id TEXT NOT NULL REFERENCES doctors(doctor_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    meals TEXT NOT NULL DEFAULT '[]',            -- JSON array of Meal
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_diet_plans_doctor ON diet_plans(doctor_id);

CREATE TABLE IF NOT EXISTS training_plans (
    plan_id TEXT PRIMARY KEY,
    doctor_id TEXT NOT NULL REFERENCES doctors(doctor_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    days TEXT NOT NULL DEFAULT '[]',             -- JSON array of TrainingDay
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_training_plans_doctor ON training_plans(doctor_id);

-- ============================================================================
-- Visits (immutable snapshots)
-- ============================================================================

CREATE TABLE IF NOT EXISTS visits (
    visit_id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(patient_id) ON DELETE CASCADE,
    visit_date TEXT NOT NULL,
    weight_kg REAL NOT NULL CHECK (weight_kg > 0),
    body_fat_percent REAL,
    bmi REAL,
    lean_mass_kg REAL,
    base_metabolism REAL,
    active_metabolism REAL,
    target_calories REAL,
    diet_plan_id TEXT REFERENCES diet_plans(plan_id) ON DELETE SET NULL,
    training_plan_id TEXT REFERENCES training_plans(plan_id) ON DELETE SET NULL,
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_visits_patient_date ON visits(patient_id, visit_date);

CREATE TRIGGER IF NOT EXISTS visits_immutable BEFORE UPDATE ON visits
WHEN old.weight_kg IS NOT new.weight_kg
    OR old.body_fat_percent IS NOT new.body_fat_percent
    OR old.visit_date IS NOT new.visit_date
    OR old.bmi IS NOT new.bmi
    OR old.lean_mass_kg IS NOT new.lean_mass_kg
    OR old.base_metabolism IS NOT new.base_metabolism
    OR old.active_metabolism IS NOT new.active_metabolism
    OR old.target_calories IS NOT new.target_calories
BEGIN
    SELECT RAISE(ABORT, 'Visit measurements are immutable');
END;

-- ============================================================================
-- Appointments
-- ============================================================================

CREATE TABLE IF NOT EXISTS appointments (
    appointment_id TEXT PRIMARY KEY,
    doctor_id TEXT NOT NULL REFERENCES doctors(doctor_id) ON DELETE CASCADE,
    date TEXT NOT NULL,                          -- YYYY-MM-DD
    time TEXT NOT NULL,                          -- HH:MM:SS
    purpose TEXT NOT NULL,
    patient_name TEXT,
    status TEXT NOT NULL DEFAULT 'scheduled'
        CHECK (status IN ('scheduled', 'completed', 'cancelled')),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_appointments_doctor_date ON appointments(doctor_id, date);
"#;
