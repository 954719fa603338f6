//! Headless client bootstrap: signs in, loads the saved game data and flushes
//! a final save before exiting.

use clap::Parser;
use client::app::SessionAppBuilder;
use client::config::ClientSettings;
use client::domain::game_data::STAGE;
use client::domain::LoginStatus;
use color_eyre::eyre::{Context, Report, Result, eyre};
use tokio::runtime::Builder;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// `client` command arguments.
///
/// Everything else is read from `GAME_CLIENT_*` variables or the
/// configuration file; the settings loader never sees these arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "client",
    about = "Sign in to the game backend and load the player's saved data",
    version
)]
struct CliArgs {
    /// Nickname to submit when the account does not have one yet.
    #[arg(long, value_name = "name")]
    nickname: Option<String>,
    /// Use the in-process backend regardless of configuration.
    #[arg(long)]
    offline: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let args = CliArgs::parse();
    let mut settings = ClientSettings::load_from_environment()
        .wrap_err("failed to load client settings")?;
    settings.offline |= args.offline;

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("failed to build client runtime")?;
    runtime.block_on(run(args, settings))
}

async fn run(args: CliArgs, settings: ClientSettings) -> Result<()> {
    let app = SessionAppBuilder::from_settings(&settings)
        .wrap_err("failed to assemble client")?
        .build()
        .wrap_err("failed to assemble client")?;
    let queue = app.queue();
    let orchestrator = app.orchestrator();
    let period = settings.tick_period();
    let budget = settings.max_login_ticks;

    let mut status = queue
        .drive_paced(orchestrator.try_auto_login(), period, budget)
        .await?;
    if matches!(status, LoginStatus::Failed(_)) {
        info!("falling back to guest login");
        status = queue
            .drive_paced(orchestrator.try_guest_login(), period, budget)
            .await?;
    }
    if status == LoginStatus::NicknameRequired {
        let nickname = args
            .nickname
            .as_deref()
            .ok_or_else(|| eyre!("this account needs a nickname; pass --nickname"))?;
        status = queue
            .drive_paced(orchestrator.submit_nickname(nickname), period, budget)
            .await?;
    }
    if let LoginStatus::Failed(err) = status {
        return Err(Report::new(err).wrap_err("login failed"));
    }

    let session = orchestrator.session();
    info!(
        state = %session.state(),
        record_id = session
            .identity()
            .map(|identity| identity.remote_record_id().to_string()),
        "session ready"
    );

    let progress = orchestrator
        .loaded_categories()
        .and_then(|loaded| loaded.get(&STAGE))
        .transpose()
        .wrap_err("stage progress unavailable")?
        .unwrap_or_else(|| STAGE.default_value());
    let outcome = app
        .lifecycle()
        .shutdown_paced(
            orchestrator.save_category(&STAGE, &progress),
            period,
            settings.shutdown_flush_ticks,
        )
        .await;
    info!(?outcome, stage = progress.stage, "client finished");
    Ok(())
}
