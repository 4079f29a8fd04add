use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;

use super::RedirectEvent;

#[derive(Debug, Serialize)]
struct ExportRow {
    id: i64,
    timestamp: String,
    link_id: String,
    platform: String,
    device_class: String,
    country: String,
    success: bool,
    load_time_ms: i64,
    in_app_browser: bool,
    fallback_used: bool,
    risk_score: u8,
    strategy: String,
}

impl From<&RedirectEvent> for ExportRow {
    fn from(event: &RedirectEvent) -> Self {
        ExportRow {
            id: event.id.unwrap_or(0),
            timestamp: event.timestamp.clone(),
            link_id: event.link_id.clone(),
            platform: event.platform.clone(),
            device_class: event.device_class.clone(),
            country: event.country.clone().unwrap_or_default(),
            success: event.success,
            load_time_ms: event.load_time_ms,
            in_app_browser: event.in_app_browser,
            fallback_used: event.fallback_used,
            risk_score: event.risk_score,
            strategy: event.strategy.clone().unwrap_or_default(),
        }
    }
}

/// Export all redirect events as JSON string.
pub fn export_json(conn: &Connection) -> Result<String> {
    let events = super::query_recent_redirects(conn, usize::MAX)?;
    let rows: Vec<ExportRow> = events.iter().map(ExportRow::from).collect();
    let json = serde_json::to_string_pretty(&rows)?;
    Ok(json)
}

/// Export all redirect events as CSV string.
pub fn export_csv(conn: &Connection) -> Result<String> {
    let events = super::query_recent_redirects(conn, usize::MAX)?;
    let mut output = String::from(
        "id,timestamp,link_id,platform,device_class,country,success,load_time_ms,in_app_browser,fallback_used,risk_score,strategy\n",
    );
    for event in &events {
        output.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{},{}\n",
            event.id.unwrap_or(0),
            event.timestamp,
            event.link_id,
            event.platform,
            event.device_class,
            event.country.as_deref().unwrap_or(""),
            event.success,
            event.load_time_ms,
            event.in_app_browser,
            event.fallback_used,
            event.risk_score,
            event.strategy.as_deref().unwrap_or(""),
        ));
    }
    Ok(output)
}
