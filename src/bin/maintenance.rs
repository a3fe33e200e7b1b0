use std::env;

use anyhow::{bail, Context, Result};
use chrono::Duration;
use tracing_subscriber::EnvFilter;

use doctrack::{
    config::AppConfig,
    db::{self, retry_on_conflict, Database},
    store::{BatchIssuer, SessionStore},
};

const USAGE: &str = "Usage: maintenance <migrate | purge-sessions | retire-batch <id>>";

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let mut args = env::args().skip(1);
    let command = args.next();
    let Some(command) = command.as_deref() else {
        bail!(USAGE);
    };

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        command,
        "loaded backend configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, 1)?;

    match command {
        "migrate" => {
            let mut conn = pool.get().context("failed to get database connection")?;
            db::run_migrations(&mut conn)?;
            println!("Migrations are up to date.");
        }
        "purge-sessions" => {
            let sessions = SessionStore::new(
                Database::new(pool),
                Duration::minutes(config.pending_session_ttl_minutes),
            );
            let purged = sessions.purge_expired()?;
            println!(
                "Purged {} pending and {} upgraded sessions.",
                purged.pending, purged.sessions
            );
        }
        "retire-batch" => {
            let id: i32 = args
                .next()
                .context(USAGE)?
                .parse()
                .context("batch id must be an integer")?;
            let issuer = BatchIssuer::new(Database::new(pool));
            match retry_on_conflict(config.serialization_retry_limit, || {
                issuer.retire_batch(id)
            })? {
                Some(retired) if retired.released => println!(
                    "Batch {id} retired; {} unused codes discarded and its id is free again.",
                    retired.discarded_codes.len()
                ),
                Some(retired) => println!(
                    "Discarded {} unused codes; batch {id} still backs documents.",
                    retired.discarded_codes.len()
                ),
                None => println!("No batch {id}."),
            }
        }
        other => bail!("Unknown command: {other}\n{USAGE}"),
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
