//! # LinkPeek Traffic Firewall
//!
//! **Redirect-risk gating for link-in-bio traffic.**
//!
//! LinkPeek pages are opened overwhelmingly inside in-app browsers (Instagram,
//! TikTok, Facebook) that are known to mishandle redirects. This service
//! decides, per incoming redirect request, whether to route it through a safe
//! fallback strategy instead of the direct destination, and keeps the
//! analytics that power the dashboard: redirect events, recovery attempts,
//! per-platform channel benchmarks, and conversion tracking.
//!
//! ## Architecture
//!
//! - **[`firewall`]** — decision engine: plan/toggle gate, threshold table,
//!   hot-reloadable config
//! - **[`scorer`]** — pluggable risk scoring with a UA-signature heuristic
//! - **[`store`]** — SQLite-backed write-once event tables and profiles
//! - **[`benchmarks`]** — periodic per-platform rollup job
//! - **[`alerts`]** — channel alerts with async webhook delivery
//! - **[`web`]** — axum JSON API, tracking pixel, conversion webhook, sitemap
//! - **[`cli`]** — command-line interface (clap)
//! - **[`config`]** / **[`error`]** — TOML configuration and unified errors
//!
//! ## Quick Start
//!
//! ```bash
//! # Initialize configuration and database
//! linkpeek init
//!
//! # Start the service
//! linkpeek start
//!
//! # Evaluate a redirect
//! curl -X POST localhost:8787/api/firewall/decision \
//!   -H 'content-type: application/json' \
//!   -d '{"linkId":"lnk_1","userAgent":"... Instagram ...","platform":"instagram","userId":"u1"}'
//! ```

pub mod alerts;
pub mod benchmarks;
pub mod cli;
pub mod config;
pub mod error;
pub mod firewall;
pub mod scorer;
pub mod store;
pub mod web;
