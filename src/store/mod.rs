//! SQLite-backed event store.
//!
//! Holds the write-once analytics tables (`redirects`, `recovery_attempts`,
//! `conversions`), the per-user `profiles` table read by the decision handler,
//! and the per-platform `channel_benchmarks` rollups maintained by the
//! aggregation job. The database is accessed through an [`r2d2`] connection
//! pool ([`DbPool`]) for thread-safe concurrent writes from async tasks.
//!
//! The [`export`] submodule provides JSON and CSV export of redirect events.

pub mod export;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::{LinkPeekError, Result};
use crate::firewall::{Plan, Profile};

/// SQLite connection pool type alias (r2d2 + r2d2-sqlite).
pub type DbPool = r2d2::Pool<r2d2_sqlite::SqliteConnectionManager>;

/// Open a connection pool for the given database file path.
///
/// Creates the database and all tables if they don't exist.
/// The pool is configured with a maximum of 4 connections.
pub fn open_pool(path: &std::path::Path) -> Result<DbPool> {
    let manager = r2d2_sqlite::SqliteConnectionManager::file(path);
    let pool = r2d2::Pool::builder()
        .max_size(4)
        .build(manager)
        .map_err(|e| LinkPeekError::Pool(e.to_string()))?;
    let conn = pool.get().map_err(|e| LinkPeekError::Pool(e.to_string()))?;
    init_db(&conn)?;
    Ok(pool)
}

/// Open an in-memory connection pool (for testing).
pub fn open_memory_pool() -> Result<DbPool> {
    let manager = r2d2_sqlite::SqliteConnectionManager::memory();
    let pool = r2d2::Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| LinkPeekError::Pool(e.to_string()))?;
    let conn = pool.get().map_err(|e| LinkPeekError::Pool(e.to_string()))?;
    init_db(&conn)?;
    Ok(pool)
}

/// Open or create a SQLite database at the given path.
pub fn open_db(path: &std::path::Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    init_db(&conn)?;
    Ok(conn)
}

/// Open an in-memory SQLite database (for testing).
pub fn open_memory_db() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_db(&conn)?;
    Ok(conn)
}

/// Initialize the SQLite database and create all tables if they don't exist.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS redirects (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp       TEXT NOT NULL,
            link_id         TEXT NOT NULL,
            platform        TEXT NOT NULL,
            device_class    TEXT NOT NULL,
            country         TEXT,
            success         INTEGER NOT NULL,
            load_time_ms    INTEGER NOT NULL,
            in_app_browser  INTEGER NOT NULL,
            fallback_used   INTEGER NOT NULL,
            risk_score      INTEGER NOT NULL,
            strategy        TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_redirects_timestamp ON redirects(timestamp);
        CREATE INDEX IF NOT EXISTS idx_redirects_platform ON redirects(platform);

        CREATE TABLE IF NOT EXISTS recovery_attempts (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            platform  TEXT NOT NULL,
            strategy  TEXT NOT NULL,
            success   INTEGER NOT NULL,
            user_id   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS profiles (
            user_id          TEXT PRIMARY KEY,
            plan             TEXT NOT NULL,
            firewall_enabled INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS conversions (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            goal_id   TEXT NOT NULL,
            event_ref TEXT NOT NULL,
            value     REAL,
            link_id   TEXT,
            source    TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_conversions_link ON conversions(link_id);

        CREATE TABLE IF NOT EXISTS channel_benchmarks (
            platform             TEXT PRIMARY KEY,
            avg_ctr              REAL NOT NULL,
            avg_conversion_rate  REAL NOT NULL,
            avg_redirect_success REAL NOT NULL,
            sample_size          INTEGER NOT NULL,
            updated_at           TEXT NOT NULL
        );",
    )?;
    Ok(())
}

/// Current timestamp in RFC 3339, the format all event tables use.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// A live decision event broadcast to subscribers (e.g., dashboard SSE).
///
/// Created alongside each firewall decision and sent via a
/// `tokio::sync::broadcast` channel. Subscribers that lag behind
/// automatically skip missed events.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionEvent {
    /// RFC 3339 timestamp.
    pub timestamp: String,
    pub link_id: String,
    pub platform: String,
    pub in_app_browser: bool,
    pub use_fallback: bool,
    pub strategy: Option<String>,
    pub risk_score: u8,
    pub reason: String,
}

/// One click-through attempt, recorded by the redirect path. Write-once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectEvent {
    /// Auto-incremented row ID (`None` for new records before insert).
    #[serde(default)]
    pub id: Option<i64>,
    /// RFC 3339 timestamp; filled in at insert time when empty.
    #[serde(default)]
    pub timestamp: String,
    pub link_id: String,
    pub platform: String,
    pub device_class: String,
    #[serde(default)]
    pub country: Option<String>,
    pub success: bool,
    pub load_time_ms: i64,
    pub in_app_browser: bool,
    pub fallback_used: bool,
    pub risk_score: u8,
    #[serde(default)]
    pub strategy: Option<String>,
}

/// One fallback invocation, recorded by the recovery path. Write-once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryAttempt {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub timestamp: String,
    pub platform: String,
    pub strategy: String,
    pub success: bool,
    pub user_id: String,
}

/// A recorded conversion from the pixel or webhook endpoint. Write-once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversion {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub timestamp: String,
    pub goal_id: String,
    pub event_ref: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub link_id: Option<String>,
    /// `"pixel"` or `"webhook"`.
    pub source: String,
}

fn or_now(timestamp: &str) -> String {
    if timestamp.is_empty() {
        now_rfc3339()
    } else {
        timestamp.to_string()
    }
}

/// Insert a redirect event, returning the new row ID.
pub fn insert_redirect(conn: &Connection, event: &RedirectEvent) -> Result<i64> {
    conn.execute(
        "INSERT INTO redirects (timestamp, link_id, platform, device_class, country,
            success, load_time_ms, in_app_browser, fallback_used, risk_score, strategy)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        rusqlite::params![
            or_now(&event.timestamp),
            event.link_id,
            event.platform,
            event.device_class,
            event.country,
            event.success,
            event.load_time_ms,
            event.in_app_browser,
            event.fallback_used,
            event.risk_score,
            event.strategy,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Insert a recovery attempt, returning the new row ID.
pub fn insert_recovery(conn: &Connection, attempt: &RecoveryAttempt) -> Result<i64> {
    conn.execute(
        "INSERT INTO recovery_attempts (timestamp, platform, strategy, success, user_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            or_now(&attempt.timestamp),
            attempt.platform,
            attempt.strategy,
            attempt.success,
            attempt.user_id,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Insert a conversion, returning the new row ID.
pub fn insert_conversion(conn: &Connection, conversion: &Conversion) -> Result<i64> {
    conn.execute(
        "INSERT INTO conversions (timestamp, goal_id, event_ref, value, link_id, source)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            or_now(&conversion.timestamp),
            conversion.goal_id,
            conversion.event_ref,
            conversion.value,
            conversion.link_id,
            conversion.source,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Query the most recent N redirect events.
pub fn query_recent_redirects(conn: &Connection, limit: usize) -> Result<Vec<RedirectEvent>> {
    let mut stmt = conn.prepare(
        "SELECT id, timestamp, link_id, platform, device_class, country,
                success, load_time_ms, in_app_browser, fallback_used, risk_score, strategy
         FROM redirects ORDER BY id DESC LIMIT ?1",
    )?;

    let rows = stmt.query_map(rusqlite::params![limit as i64], |row| {
        Ok(RedirectEvent {
            id: Some(row.get(0)?),
            timestamp: row.get(1)?,
            link_id: row.get(2)?,
            platform: row.get(3)?,
            device_class: row.get(4)?,
            country: row.get(5)?,
            success: row.get(6)?,
            load_time_ms: row.get(7)?,
            in_app_browser: row.get(8)?,
            fallback_used: row.get(9)?,
            risk_score: row.get::<_, i64>(10)? as u8,
            strategy: row.get(11)?,
        })
    })?;

    let mut events = Vec::new();
    for row in rows {
        events.push(row?);
    }
    Ok(events)
}

/// Look up a user's firewall profile.
pub fn get_profile(conn: &Connection, user_id: &str) -> Result<Option<Profile>> {
    let mut stmt =
        conn.prepare("SELECT user_id, plan, firewall_enabled FROM profiles WHERE user_id = ?1")?;
    let mut rows = stmt.query(rusqlite::params![user_id])?;

    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let plan_str: String = row.get(1)?;
    Ok(Some(Profile {
        user_id: row.get(0)?,
        // Unknown plan strings are treated as free so the gate stays closed.
        plan: Plan::parse(&plan_str).unwrap_or(Plan::Free),
        firewall_enabled: row.get(2)?,
    }))
}

/// Insert or replace a user's firewall profile.
pub fn upsert_profile(conn: &Connection, profile: &Profile) -> Result<()> {
    conn.execute(
        "INSERT INTO profiles (user_id, plan, firewall_enabled)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(user_id) DO UPDATE SET plan = ?2, firewall_enabled = ?3",
        rusqlite::params![profile.user_id, profile.plan.as_str(), profile.firewall_enabled],
    )?;
    Ok(())
}

/// Flip the firewall toggle for an existing profile.
///
/// Returns `false` if no profile exists for the user.
pub fn set_firewall_enabled(conn: &Connection, user_id: &str, enabled: bool) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE profiles SET firewall_enabled = ?2 WHERE user_id = ?1",
        rusqlite::params![user_id, enabled],
    )?;
    Ok(updated > 0)
}

/// Aggregate firewall savings statistics.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallStats {
    /// Total redirect events recorded.
    pub total_redirects: usize,
    /// Redirects routed through a fallback strategy.
    pub fallbacks_served: usize,
    /// Fallback redirects that still reached the destination.
    pub recovered_clicks: usize,
    /// Total recovery attempts recorded.
    pub recovery_attempts: usize,
    /// Recovery attempts that succeeded.
    pub recovery_successes: usize,
    /// Mean risk score across all redirect events.
    pub avg_risk_score: f64,
}

/// Query aggregated firewall statistics.
///
/// Uses SQL aggregation for efficiency without loading all rows into memory.
pub fn firewall_stats(conn: &Connection) -> Result<FirewallStats> {
    let (total, fallbacks, recovered, avg_risk) = conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(fallback_used), 0),
                COALESCE(SUM(CASE WHEN fallback_used AND success THEN 1 ELSE 0 END), 0),
                COALESCE(AVG(risk_score), 0.0)
         FROM redirects",
        [],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, f64>(3)?,
            ))
        },
    )?;

    let (attempts, successes) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(success), 0) FROM recovery_attempts",
        [],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
    )?;

    Ok(FirewallStats {
        total_redirects: total as usize,
        fallbacks_served: fallbacks as usize,
        recovered_clicks: recovered as usize,
        recovery_attempts: attempts as usize,
        recovery_successes: successes as usize,
        avg_risk_score: avg_risk,
    })
}
