#[cfg(test)]
mod tests;

use crate::config::credentials::{ENV_OVERRIDES, is_set};
use crate::config::{Config, MAX_TTL_SECS, load_config, save_config};
use crate::gateway::{self, GatewayState};
use crate::session::{Role, SessionKey};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use hrmail_mailbox::{MailboxDB, NewMessage};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "hrmail")]
#[command(about = "HR mailbox dashboard", version)]
pub struct Cli {
    /// Config file (defaults to ~/.hrmail/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config and create the mailbox database
    Onboard,
    /// Run the dashboard HTTP server
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Manage session tokens
    Session {
        #[command(subcommand)]
        cmd: SessionCommands,
    },
    /// Import messages from a JSON array file
    Import { file: PathBuf },
    /// Print mailbox statistics
    Stats,
    /// Print inbox thread summaries
    Threads {
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Mint a signed session token
    Issue {
        #[arg(long, short = 'u')]
        username: String,
        /// hr or employee
        #[arg(long, short = 'r')]
        role: Role,
        #[arg(long, default_value_t = 0)]
        user_id: i64,
        /// Lifetime such as `90m` or `12h` (defaults to session.ttlSecs)
        #[arg(long, value_parser = humantime::parse_duration)]
        ttl: Option<std::time::Duration>,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Onboard => {
            onboard(config_path)?;
        }
        Commands::Serve { host, port } => {
            let mut config = load_config(config_path)?;
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            serve(config).await?;
        }
        Commands::Session { cmd } => match cmd {
            SessionCommands::Issue {
                username,
                role,
                user_id,
                ttl,
            } => {
                let config = load_config(config_path)?;
                let ttl_secs = ttl.map(|d| d.as_secs());
                let (token, cookie) =
                    issue_session(&config, user_id, &username, role, ttl_secs, Utc::now())?;
                println!("{}", token);
                println!("Cookie: {}", cookie);
            }
        },
        Commands::Import { file } => {
            let config = load_config(config_path)?;
            let db = open_mailbox(&config)?;
            let messages = read_import_file(&file)?;
            let inserted = db.insert_messages(&messages)?;
            println!(
                "\u{2713} Imported {} messages ({} total)",
                inserted,
                db.count_messages()?
            );
        }
        Commands::Stats => {
            let config = load_config(config_path)?;
            let stats = open_mailbox(&config)?.get_email_stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Threads { limit } => {
            let config = load_config(config_path)?;
            let limit = limit.unwrap_or(config.mailbox.list_limit);
            let threads = open_mailbox(&config)?.get_inbox_threads(Some(limit))?;
            if threads.is_empty() {
                println!("No threads.");
            }
            for t in threads {
                println!(
                    "{}  {:<24}  {:>3} msg  {}  [{}]",
                    t.last_time.format("%Y-%m-%d %H:%M"),
                    t.thread_id,
                    t.message_count,
                    t.subject,
                    t.participants.join(", ")
                );
            }
        }
    }

    Ok(())
}

fn onboard(config_path: Option<&Path>) -> Result<()> {
    let path = match config_path {
        Some(p) => p.to_path_buf(),
        None => crate::config::get_config_path()?,
    };

    let config = if path.exists() {
        println!("Config already exists at {}", path.display());
        load_config(Some(path.as_path()))?
    } else {
        let mut config = Config::default();
        config.session.secret = generate_secret();
        save_config(&config, Some(path.as_path()))?;
        println!("\u{2713} Created config at {}", path.display());
        config
    };

    let db = open_mailbox(&config)?;
    println!("\u{2713} Mailbox database at {}", db.path());

    println!();
    for (name, env) in ENV_OVERRIDES {
        let state = if is_set(&config, name) { "set" } else { "not set" };
        println!("  {:<16} {:<8} (env: {})", name, state, env);
    }
    if !is_set(&config, "session-secret") {
        println!();
        println!("Next: set session.secret in the config (or HRMAIL_SESSION_SECRET),");
        println!("then run `hrmail serve`.");
    }
    Ok(())
}

/// Random signing secret: two v4 UUIDs, 64 hex characters.
fn generate_secret() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

fn open_mailbox(config: &Config) -> Result<MailboxDB> {
    let path = config.database_path();
    debug!("opening mailbox at {}", path.display());
    MailboxDB::new(&path)
}

/// Parse an import file: a JSON array of messages.
fn read_import_file(path: &Path) -> Result<Vec<NewMessage>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse messages from {}", path.display()))
}

/// Mint a token and the matching `Cookie` header value.
fn issue_session(
    config: &Config,
    user_id: i64,
    username: &str,
    role: Role,
    ttl_secs: Option<u64>,
    now: DateTime<Utc>,
) -> Result<(String, String)> {
    config.require_session_secret()?;
    let key = SessionKey::new(&config.session.secret)?;
    let ttl_secs = ttl_secs.unwrap_or(config.session.ttl_secs);
    if ttl_secs == 0 || ttl_secs > MAX_TTL_SECS {
        anyhow::bail!("session ttl must be between 1s and {}s", MAX_TTL_SECS);
    }
    let ttl = i64::try_from(ttl_secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .context("session ttl out of range")?;
    let token = key.issue(user_id, username, role, ttl, now)?;
    let cookie = format!("{}={}", config.session.cookie_name, token);
    Ok((token, cookie))
}

async fn serve(config: Config) -> Result<()> {
    config.validate()?;
    config.require_session_secret()?;
    let key = SessionKey::new(&config.session.secret)?;
    let mailbox = Arc::new(open_mailbox(&config)?);
    info!(
        "mailbox {} holds {} messages",
        mailbox.path(),
        mailbox.count_messages()?
    );

    let state = GatewayState::new(
        mailbox,
        key,
        &config.session.cookie_name,
        config.mailbox.list_limit,
    );
    let (handle, addr) = gateway::start(
        &config.gateway.host,
        config.gateway.port,
        state,
        shutdown_signal(),
    )
    .await?;
    println!("\u{2713} Dashboard at http://{}{}", addr, gateway::DASHBOARD_PATH);
    println!("  Issue a session with `hrmail session issue --username NAME --role hr`");
    debug!("session cookie name: {}", config.session.cookie_name);

    handle.await.context("gateway task failed")?;
    println!("\nShut down.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = until_signal("ctrl-c", tokio::signal::ctrl_c());
    #[cfg(unix)]
    let term = until_signal("SIGTERM", async {
        let mut s = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        s.recv().await;
        Ok(())
    });
    #[cfg(not(unix))]
    let term = std::future::pending::<()>();
    tokio::select! {
        _ = ctrl_c => {}
        _ = term => {}
    }
    info!("shutdown signal received");
}

/// Resolve when `listen` delivers its signal. A listener that cannot be
/// installed never resolves, so it cannot trigger a shutdown.
async fn until_signal<F>(name: &str, listen: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = listen.await {
        warn!("failed to listen for {}: {}", name, e);
        std::future::pending::<()>().await;
    }
}
