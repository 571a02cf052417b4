use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::sync::Arc;

use netsnare::audit::{self, AuditSink};
use netsnare::config::HoneypotConfig;
use netsnare::network::firewall::{BlockAction, IptablesBlock, NoopBlock};
use netsnare::network::tracker::BanTracker;
use netsnare::servers::{self, ftp, shell};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()))
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut conf_file = "conf/honeypot.yaml".to_string();

    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "--h" | "--?" | "/?" => {
                println!("Usage: honeypot [--conf FILE]");
                return Ok(());
            }
            "--conf" => {
                if i + 1 < args.len() {
                    i += 1;
                    conf_file = args[i].clone();
                } else {
                    eprintln!("Error: --conf requires a FILE argument");
                    return Ok(());
                }
            }
            _ => {}
        }
        i += 1;
    }

    let config: HoneypotConfig = if std::path::Path::new(&conf_file).exists() {
        HoneypotConfig::from_file(&conf_file)
            .with_context(|| format!("Cannot load config: {}", conf_file))?
    } else {
        tracing::warn!("[honeypot] [no_config] file={} using defaults", conf_file);
        HoneypotConfig::default()
    };

    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("Cannot create log dir: {}", config.log_dir))?;
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Cannot create data dir: {}", config.data_dir))?;

    // A missing database degrades audit to log-only; it never stops the trap.
    let pool = open_database(&config.db_path).await;
    let audit_sink = AuditSink::spawn_writer(pool);

    let block: Arc<dyn BlockAction> = if config.enable_firewall {
        Arc::new(IptablesBlock)
    } else {
        Arc::new(NoopBlock)
    };

    let tracker = Arc::new(BanTracker::new(
        config.ban_threshold,
        config.observation_window(),
        config.ban_duration(),
        audit_sink.clone(),
        block,
    ));
    let _sweeper = tracker.spawn_sweeper(config.sweep_interval());

    let services = [
        (shell::ssh_profile(&config), config.ssh_port),
        (shell::telnet_profile(&config), config.telnet_port),
        (ftp::ftp_profile(&config), config.ftp_port),
    ];

    for (profile, port) in services {
        let bind = format!("{}:{}", config.bind_ip, port);
        let tracker = Arc::clone(&tracker);
        let audit_sink = audit_sink.clone();
        tokio::spawn(async move {
            // Fatal to this service only; the others keep running.
            if let Err(e) = servers::run_service(profile, bind, tracker, audit_sink).await {
                tracing::error!("[honeypot] [service_failed] err={:#}", e);
            }
        });
    }

    tracing::info!("[honeypot] [started] threshold={} window={}s ban={}s",
        config.ban_threshold,
        config.observation_window_secs,
        config.ban_duration_secs,
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("[honeypot] [shutdown]");
    Ok(())
}

async fn open_database(db_path: &str) -> Option<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true);

    let pool = match SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!("[honeypot] [db_unavailable] path={} err={}", db_path, e);
            return None;
        }
    };

    if let Err(e) = audit::init_database(&pool).await {
        tracing::warn!("[honeypot] [db_init_failed] err={:#}", e);
        return None;
    }

    tracing::info!("[honeypot] [db_ready] path={}", db_path);
    Some(pool)
}
