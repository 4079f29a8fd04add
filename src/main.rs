use std::path::Path;
use std::sync::{Arc, RwLock};

use clap::Parser;
use linkpeek::alerts::webhook::WebhookSink;
use linkpeek::benchmarks;
use linkpeek::cli::{BenchmarkAction, Cli, Commands, FirewallAction};
use linkpeek::config::AppConfig;
use linkpeek::firewall::{Plan, Profile, reload};
use linkpeek::scorer::HeuristicScorer;
use linkpeek::scorer::patterns::SignatureTable;
use linkpeek::store;
use linkpeek::web;
use tokio::sync::broadcast;

fn db_path() -> std::path::PathBuf {
    dirs_path().join("linkpeek.db")
}

fn dirs_path() -> std::path::PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let dir = std::path::PathBuf::from(home).join(".linkpeek");
    std::fs::create_dir_all(&dir).ok();
    dir
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start => {
            cmd_start(&cli.config).await?;
        }
        Commands::Init { template } => {
            cmd_init(&cli.config, &template)?;
        }
        Commands::Status => {
            cmd_status()?;
        }
        Commands::Events {
            tail,
            export,
            format,
        } => {
            cmd_events(tail, export, &format)?;
        }
        Commands::Firewall { action } => match action {
            FirewallAction::Enable { user } => cmd_firewall_toggle(&user, true)?,
            FirewallAction::Disable { user } => cmd_firewall_toggle(&user, false)?,
            FirewallAction::Show { user } => cmd_firewall_show(&user)?,
        },
        Commands::Benchmarks { action } => match action {
            BenchmarkAction::Recompute => cmd_benchmarks_recompute()?,
            BenchmarkAction::Show => cmd_benchmarks_show()?,
        },
    }

    Ok(())
}

async fn cmd_start(config_path: &Path) -> anyhow::Result<()> {
    let config = AppConfig::load_from_path(config_path)?;
    println!("LinkPeek firewall starting...");
    println!("Config: {}", config_path.display());
    println!("Listen: {}", config.server.listen);
    println!(
        "Thresholds: high={}, medium={} ({})",
        config.firewall.high_risk_threshold,
        config.firewall.medium_risk_threshold,
        config.firewall.medium_risk_platforms.join(", ")
    );

    let pool = store::open_pool(&db_path())?;
    let firewall = Arc::new(RwLock::new(config.firewall.clone()));
    let (event_tx, _rx) = broadcast::channel(256);

    let sink = config
        .alerts
        .webhook
        .as_ref()
        .map(|w| Arc::new(WebhookSink::new(w.url.clone())) as Arc<dyn linkpeek::alerts::AlertSink>);
    let _aggregation = benchmarks::spawn_aggregation_job(
        pool.clone(),
        config.aggregation.interval_secs,
        config.alerts.clone(),
        sink,
    );

    // Keep the watcher handle alive for the life of the server.
    let _watcher = reload::start_file_watcher(config_path.to_path_buf(), firewall.clone())?;
    reload::start_sighup_handler(config_path.to_path_buf(), firewall.clone());

    let state = Arc::new(web::AppState {
        db: pool,
        firewall,
        scorer: Arc::new(HeuristicScorer::new()),
        event_tx,
        alerts: config.alerts.clone(),
        site_url: config.server.site_url.clone(),
        signatures: SignatureTable::new(),
    });

    web::start(&config.server.listen, state).await?;
    Ok(())
}

fn cmd_init(config_path: &Path, template: &str) -> anyhow::Result<()> {
    println!("Initializing LinkPeek...");

    let template_content = match template {
        "default" => include_str!("../templates/default.toml"),
        "strict" => include_str!("../templates/strict.toml"),
        _ => {
            println!("Unknown template: {}", template);
            println!("Available templates: default, strict");
            return Ok(());
        }
    };

    let data_dir = dirs_path();
    std::fs::create_dir_all(&data_dir)?;
    println!("  Created data dir: {}", data_dir.display());

    let db = db_path();
    store::open_db(&db)?;
    println!("  Initialized database: {}", db.display());

    if !config_path.exists() {
        std::fs::write(config_path, template_content)?;
        println!("  Created config: {}", config_path.display());
    } else {
        println!("  Config already exists: {}", config_path.display());
    }

    println!("\nDone! Next steps:");
    println!("  1. Review thresholds in {}", config_path.display());
    println!("  2. Start the service: linkpeek start");
    Ok(())
}

fn cmd_status() -> anyhow::Result<()> {
    let db = db_path();
    if db.exists() {
        let conn = store::open_db(&db)?;
        let stats = store::firewall_stats(&conn)?;

        println!("LinkPeek Firewall Status");
        println!("────────────────────────");
        println!("Total redirects:    {}", stats.total_redirects);
        println!("  Fallbacks served: {}", stats.fallbacks_served);
        println!("  Recovered clicks: {}", stats.recovered_clicks);
        println!("Recovery attempts:  {}", stats.recovery_attempts);
        println!("  Succeeded:        {}", stats.recovery_successes);
        println!("Avg risk score:     {:.1}", stats.avg_risk_score);
    } else {
        println!("LinkPeek Status: No database found.");
        println!("Run 'linkpeek init' then 'linkpeek start'.");
    }
    Ok(())
}

fn cmd_events(tail: usize, export: bool, format: &str) -> anyhow::Result<()> {
    let db = db_path();
    if !db.exists() {
        println!("No database found. Run 'linkpeek init' first.");
        return Ok(());
    }

    let conn = store::open_db(&db)?;

    if export {
        match format {
            "csv" => {
                let csv = store::export::export_csv(&conn)?;
                print!("{}", csv);
            }
            "json" => {
                let json = store::export::export_json(&conn)?;
                println!("{}", json);
            }
            _ => {
                println!("Unknown format: {}", format);
                println!("Available formats: json, csv");
            }
        }
    } else {
        let events = store::query_recent_redirects(&conn, tail)?;
        if events.is_empty() {
            println!("No redirect events found.");
        } else {
            println!(
                "{:<26} {:<12} {:<12} {:<8} {:<6} {:<9} {}",
                "TIMESTAMP", "LINK", "PLATFORM", "SUCCESS", "RISK", "FALLBACK", "STRATEGY"
            );
            println!("{}", "─".repeat(90));
            for event in &events {
                println!(
                    "{:<26} {:<12} {:<12} {:<8} {:<6} {:<9} {}",
                    event.timestamp,
                    event.link_id,
                    event.platform,
                    event.success,
                    event.risk_score,
                    event.fallback_used,
                    event.strategy.as_deref().unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}

fn cmd_firewall_toggle(user: &str, enabled: bool) -> anyhow::Result<()> {
    let conn = store::open_db(&db_path())?;
    if store::set_firewall_enabled(&conn, user, enabled)? {
        println!(
            "Firewall {} for {}",
            if enabled { "enabled" } else { "disabled" },
            user
        );
    } else {
        // First toggle for a new user creates the profile on the free plan;
        // the gate stays closed until the plan is upgraded.
        store::upsert_profile(
            &conn,
            &Profile {
                user_id: user.to_string(),
                plan: Plan::Free,
                firewall_enabled: enabled,
            },
        )?;
        println!("Created profile for {} (free plan, firewall_enabled={})", user, enabled);
    }
    Ok(())
}

fn cmd_firewall_show(user: &str) -> anyhow::Result<()> {
    let conn = store::open_db(&db_path())?;
    match store::get_profile(&conn, user)? {
        Some(p) => {
            println!("User:     {}", p.user_id);
            println!("Plan:     {}", p.plan.as_str());
            println!("Firewall: {}", if p.firewall_enabled { "on" } else { "off" });
        }
        None => println!("No profile for {}", user),
    }
    Ok(())
}

fn cmd_benchmarks_recompute() -> anyhow::Result<()> {
    let conn = store::open_db(&db_path())?;
    let rows = benchmarks::recompute(&conn)?;
    println!("Recomputed benchmarks for {} platforms", rows.len());
    Ok(())
}

fn cmd_benchmarks_show() -> anyhow::Result<()> {
    let conn = store::open_db(&db_path())?;
    let rows = benchmarks::query_all(&conn)?;
    if rows.is_empty() {
        println!("No benchmarks yet. Run 'linkpeek benchmarks recompute'.");
        return Ok(());
    }
    println!(
        "{:<14} {:>8} {:>10} {:>12} {:>8}",
        "PLATFORM", "CTR", "CONV RATE", "REDIR OK", "SAMPLES"
    );
    println!("{}", "─".repeat(58));
    for b in &rows {
        println!(
            "{:<14} {:>7.1}% {:>9.1}% {:>11.1}% {:>8}",
            b.platform,
            b.avg_ctr * 100.0,
            b.avg_conversion_rate * 100.0,
            b.avg_redirect_success * 100.0,
            b.sample_size
        );
    }
    Ok(())
}
