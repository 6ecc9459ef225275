use rusqlite::Connection;
use tracing::info;

/// Run SQLite migrations
pub fn run_migrations(conn: &Connection) -> Result<(), String> {
    info!("Running SQLite migrations");

    create_health_data_table(conn)?;
    create_measurements_table(conn)?;
    create_alerts_table(conn)?;
    create_daily_summaries_table(conn)?;

    info!("SQLite migrations completed successfully");
    Ok(())
}

/// Multi-vital records, queried by patient and event-time window
fn create_health_data_table(conn: &Connection) -> Result<(), String> {
    info!("Creating health_data table if not exists");

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS health_data (
            id TEXT PRIMARY KEY,
            patient_id TEXT NOT NULL,
            device_id TEXT,
            heart_rate INTEGER,
            spo2 INTEGER,
            systolic INTEGER,
            diastolic INTEGER,
            temperature REAL,
            steps INTEGER,
            sleep_minutes INTEGER,
            calories REAL,
            distance REAL,
            timestamp TEXT NOT NULL,
            received_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_health_data_patient_timestamp
            ON health_data (patient_id, timestamp);",
    )
    .map_err(|e| format!("Failed to create health_data: {}", e))
}

/// Legacy single-value measurements, queried newest-first per patient and type
fn create_measurements_table(conn: &Connection) -> Result<(), String> {
    info!("Creating measurements table if not exists");

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS measurements (
            id TEXT PRIMARY KEY,
            patient_id TEXT NOT NULL,
            device_id TEXT,
            measurement_type TEXT NOT NULL,
            value REAL NOT NULL,
            timestamp TEXT NOT NULL,
            received_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_measurements_patient_type_timestamp
            ON measurements (patient_id, measurement_type, timestamp DESC);",
    )
    .map_err(|e| format!("Failed to create measurements: {}", e))
}

fn create_alerts_table(conn: &Connection) -> Result<(), String> {
    info!("Creating alerts table if not exists");

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS alerts (
            id TEXT PRIMARY KEY,
            patient_id TEXT NOT NULL,
            source_reading_id TEXT,
            message TEXT NOT NULL,
            severity TEXT NOT NULL,
            source TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            is_read INTEGER NOT NULL DEFAULT 0,
            version INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_alerts_patient ON alerts (patient_id, timestamp DESC);
        CREATE INDEX IF NOT EXISTS idx_alerts_severity_timestamp ON alerts (severity, timestamp);",
    )
    .map_err(|e| format!("Failed to create alerts: {}", e))
}

/// One row per patient and day
fn create_daily_summaries_table(conn: &Connection) -> Result<(), String> {
    info!("Creating daily_summaries table if not exists");

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS daily_summaries (
            id TEXT PRIMARY KEY,
            patient_id TEXT NOT NULL,
            date TEXT NOT NULL,
            avg_heart_rate REAL,
            min_heart_rate INTEGER,
            max_heart_rate INTEGER,
            total_steps INTEGER NOT NULL DEFAULT 0,
            total_sleep_minutes INTEGER NOT NULL DEFAULT 0,
            avg_spo2 REAL,
            min_spo2 INTEGER,
            avg_systolic REAL,
            avg_diastolic REAL,
            avg_temperature REAL,
            total_calories REAL NOT NULL DEFAULT 0,
            total_distance REAL NOT NULL DEFAULT 0,
            data_points_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (patient_id, date)
        );",
    )
    .map_err(|e| format!("Failed to create daily_summaries: {}", e))
}
