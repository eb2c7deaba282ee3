//! # Fanout Service Entry Point
//!
//! Runs the periodic connection verification service. Publishing itself is
//! invoked by the host job queue through the library API.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use tokio_util::sync::CancellationToken;

use fanout::config::ConfigLoader;
use fanout::repositories::SocialAccountRepository;
use fanout::verification::{
    ConnectionVerifier, LinkedInTokenSynchronizer, LogNotifier, TokenRefresher, VerificationJob,
};
use fanout::{db, logging};

#[derive(Parser)]
#[command(name = "fanout", about = "Social publishing core service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply database migrations and exit.
    Migrate,
    /// Run a single verification sweep and exit.
    VerifyOnce,
    /// Run the periodic connection verification service.
    Verify,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Arc::new(ConfigLoader::new().load()?);
    logging::init_subscriber(&config);

    let db = Arc::new(db::connect(&config).await?);

    match cli.command {
        Command::Migrate => {
            Migrator::up(db.as_ref(), None).await?;
            println!("Migrations applied");
        }
        Command::VerifyOnce => {
            let job = build_verification_job(&config, db)?;
            let stats = job.tick().await?;
            println!(
                "Checked {} accounts: {} healthy, {} disconnected",
                stats.accounts_checked, stats.healthy, stats.disconnected
            );
        }
        Command::Verify => {
            let job = build_verification_job(&config, db)?;

            let shutdown = CancellationToken::new();
            let signal_token = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    signal_token.cancel();
                }
            });

            job.run(shutdown).await?;
        }
    }

    Ok(())
}

fn build_verification_job(
    config: &Arc<fanout::config::AppConfig>,
    db: Arc<sea_orm::DatabaseConnection>,
) -> anyhow::Result<VerificationJob> {
    let crypto_key = config.crypto_key()?;
    let accounts = Arc::new(SocialAccountRepository::new(db.clone(), crypto_key));

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_seconds))
        .build()?;

    let synchronizer = Arc::new(LinkedInTokenSynchronizer::new(accounts.clone()));
    let refresher = Arc::new(TokenRefresher::new(
        http.clone(),
        config.clone(),
        accounts.clone(),
        synchronizer,
    ));
    let verifier = Arc::new(ConnectionVerifier::new(
        http,
        config.clone(),
        accounts.clone(),
        refresher,
    ));

    Ok(VerificationJob::new(
        db,
        config.clone(),
        accounts,
        verifier,
        Arc::new(LogNotifier),
    ))
}
