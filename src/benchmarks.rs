//! Channel benchmark aggregation.
//!
//! A periodic batch job rolls up the `redirects` and `conversions` tables into
//! one `channel_benchmarks` row per platform:
//!
//! - `avg_ctr` — fraction of redirect attempts that reached the destination,
//!   fallbacks included
//! - `avg_redirect_success` — success rate of direct (non-fallback) redirects
//! - `avg_conversion_rate` — conversions attributed to the platform's links
//!   per redirect attempt, capped at 1.0
//! - `sample_size` — redirect attempts observed
//!
//! The job never touches the decision path at request time; decisions read
//! only `profiles` and the threshold config.

use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::alerts::{self, AlertSink};
use crate::config::AlertConfig;
use crate::error::Result;
use crate::store::{self, DbPool};

/// Rolled-up per-platform statistics, one row per platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelBenchmark {
    pub platform: String,
    pub avg_ctr: f64,
    pub avg_conversion_rate: f64,
    pub avg_redirect_success: f64,
    pub sample_size: u64,
    pub updated_at: String,
}

/// Recompute all platform benchmarks and upsert them, returning the fresh rows.
pub fn recompute(conn: &Connection) -> Result<Vec<ChannelBenchmark>> {
    let mut stmt = conn.prepare(
        "SELECT platform,
                COUNT(*),
                AVG(CASE WHEN success THEN 1.0 ELSE 0.0 END),
                COALESCE(AVG(CASE WHEN NOT fallback_used THEN success END), 0.0)
         FROM redirects
         GROUP BY platform",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, f64>(2)?,
            row.get::<_, f64>(3)?,
        ))
    })?;

    let updated_at = store::now_rfc3339();
    let mut benchmarks = Vec::new();
    for row in rows {
        let (platform, sample_size, avg_ctr, avg_redirect_success) = row?;
        let conversions: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT c.id)
             FROM conversions c
             JOIN redirects r ON c.link_id = r.link_id
             WHERE r.platform = ?1",
            rusqlite::params![platform],
            |r| r.get(0),
        )?;
        let avg_conversion_rate = if sample_size > 0 {
            (conversions as f64 / sample_size as f64).min(1.0)
        } else {
            0.0
        };

        benchmarks.push(ChannelBenchmark {
            platform,
            avg_ctr,
            avg_conversion_rate,
            avg_redirect_success,
            sample_size: sample_size as u64,
            updated_at: updated_at.clone(),
        });
    }

    for b in &benchmarks {
        upsert(conn, b)?;
    }
    Ok(benchmarks)
}

/// Insert or replace one benchmark row, keyed by platform name.
pub fn upsert(conn: &Connection, benchmark: &ChannelBenchmark) -> Result<()> {
    conn.execute(
        "INSERT INTO channel_benchmarks
            (platform, avg_ctr, avg_conversion_rate, avg_redirect_success, sample_size, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(platform) DO UPDATE SET
            avg_ctr = ?2, avg_conversion_rate = ?3, avg_redirect_success = ?4,
            sample_size = ?5, updated_at = ?6",
        rusqlite::params![
            benchmark.platform,
            benchmark.avg_ctr,
            benchmark.avg_conversion_rate,
            benchmark.avg_redirect_success,
            benchmark.sample_size as i64,
            benchmark.updated_at,
        ],
    )?;
    Ok(())
}

/// Query all benchmark rows, ordered by platform name.
pub fn query_all(conn: &Connection) -> Result<Vec<ChannelBenchmark>> {
    let mut stmt = conn.prepare(
        "SELECT platform, avg_ctr, avg_conversion_rate, avg_redirect_success, sample_size, updated_at
         FROM channel_benchmarks ORDER BY platform",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(ChannelBenchmark {
            platform: row.get(0)?,
            avg_ctr: row.get(1)?,
            avg_conversion_rate: row.get(2)?,
            avg_redirect_success: row.get(3)?,
            sample_size: row.get::<_, i64>(4)? as u64,
            updated_at: row.get(5)?,
        })
    })?;

    let mut benchmarks = Vec::new();
    for row in rows {
        benchmarks.push(row?);
    }
    Ok(benchmarks)
}

/// Spawn the periodic aggregation job.
///
/// Every `interval_secs` the job recomputes benchmarks and, when alerts are
/// enabled and a sink is configured, dispatches alerts for platforms below the
/// success floor. Recompute failures are logged and the loop continues.
pub fn spawn_aggregation_job(
    pool: DbPool,
    interval_secs: u64,
    alert_config: AlertConfig,
    sink: Option<Arc<dyn AlertSink>>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        // tokio intervals fire immediately; skip the zeroth tick
        interval.tick().await;
        loop {
            interval.tick().await;
            let conn = match pool.get() {
                Ok(c) => c,
                Err(e) => {
                    warn!("Aggregation job could not get a connection: {}", e);
                    continue;
                }
            };
            match recompute(&conn) {
                Ok(benchmarks) => {
                    debug!("Benchmarks recomputed for {} platforms", benchmarks.len());
                    if alert_config.enabled {
                        let alerts = alerts::evaluate(&benchmarks, &alert_config);
                        if let Some(ref sink) = sink {
                            alerts::dispatch(sink.clone(), alerts);
                        } else {
                            for alert in &alerts {
                                warn!("Channel alert: {}", alert.message);
                            }
                        }
                    }
                }
                Err(e) => warn!("Benchmark recompute failed: {}", e),
            }
        }
    })
}
