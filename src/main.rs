use clap::{Parser, Subcommand};
use fundsync::config::Config;
use fundsync::datasource::{HorizonClient, LedgerClient};
use fundsync::db::init_db;
use fundsync::error::AppError;
use fundsync::orchestration::{MemoBackfiller, Recomputer, ReferenceContext, Syncer};
use fundsync::Repository;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "fundsync",
    about = "Sync fund account payments from Horizon into a project-mapped ledger."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch new payments for every fund account and append them to the ledger.
    Sync,
    /// Resolve queued transaction memos and fill empty ledger memos.
    Memos,
    /// Sync, then backfill memos.
    Run,
    /// Re-run classification over stored rows.
    Reclassify,
    /// Re-run project mapping over unmapped and ambiguous rows.
    Remap,
    /// Forget every paging cursor so the next sync starts from the beginning.
    ResetCursors,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    execute(cli.command, &config).await?;
    Ok(())
}

async fn execute(command: Commands, config: &Config) -> Result<(), AppError> {
    let pool = init_db(&config.database_path).await?;
    let repo = Arc::new(Repository::new(pool));
    let client: Arc<dyn LedgerClient> = Arc::new(HorizonClient::new(config.horizon_url.clone()));

    match command {
        Commands::Sync => {
            sync(config, client, repo).await?;
        }
        Commands::Memos => {
            MemoBackfiller::new(client, repo, config.memo_options())
                .run()
                .await?;
        }
        Commands::Run => {
            sync(config, Arc::clone(&client), Arc::clone(&repo)).await?;
            MemoBackfiller::new(client, repo, config.memo_options())
                .run()
                .await?;
        }
        Commands::Reclassify => {
            let context = load_context(config)?;
            Recomputer::new(repo, context).reclassify().await?;
        }
        Commands::Remap => {
            let context = load_context(config)?;
            Recomputer::new(repo, context).remap().await?;
        }
        Commands::ResetCursors => {
            let removed = repo.reset_cursors().await?;
            tracing::info!(removed, "Cursors reset");
        }
    }
    Ok(())
}

async fn sync(
    config: &Config,
    client: Arc<dyn LedgerClient>,
    repo: Arc<Repository>,
) -> Result<(), AppError> {
    let context = load_context(config)?;
    let report = Syncer::new(client, repo, context, config.sync_options())
        .run()
        .await?;
    for fund in report.failed_funds() {
        tracing::warn!(fund, "Fund sync stopped early on a ledger API error");
    }
    Ok(())
}

fn load_context(config: &Config) -> Result<Arc<ReferenceContext>, AppError> {
    let context = ReferenceContext::load(
        config.fund_accounts.clone(),
        &config.projects_file,
        &config.residents_file,
        config.accounts_file.as_deref(),
        config.mapping_rules()?,
        config.classification_rules(),
    )?;
    Ok(Arc::new(context))
}
