use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use gdshare::auth;
use gdshare::commands::pull::{self, SYNC_STATE_FILE};
use gdshare::Result;

/// Mirror a shared Google Drive folder into a local directory, once or on
/// a watch interval.
#[derive(Parser)]
#[command(version, about)]
struct Opts {
    /// Drive folder id to download
    #[arg(short, long)]
    folder_id: String,

    /// Local destination directory
    #[arg(short, long)]
    local_path: PathBuf,

    /// Seconds between checks in watch mode
    #[arg(short, long, default_value_t = 300)]
    interval: u64,

    /// Sync once and exit instead of watching
    #[arg(short, long)]
    once: bool,

    /// OAuth client secrets file
    #[arg(long, default_value = gdshare::DEFAULT_CREDENTIALS_FILE)]
    credentials: PathBuf,

    /// Persisted session file
    #[arg(long, default_value = gdshare::DEFAULT_SESSION_FILE)]
    session: PathBuf,
}

async fn sync_once(opts: &Opts, state: &mut pull::SyncState) -> Result<usize> {
    // Re-reads the persisted session every pass so a long watch survives
    // token expiry.
    let session = auth::authenticate(&opts.credentials, &opts.session).await?;
    let synced = pull::pull(
        &opts.folder_id,
        &opts.local_path,
        state,
        &session.access_token,
    )
    .await?;
    if synced > 0 {
        pull::save_state(SYNC_STATE_FILE, state).await?;
    }
    Ok(synced)
}

async fn run(opts: Opts) -> Result<()> {
    let mut state = pull::load_state(SYNC_STATE_FILE).await;

    if opts.once {
        let synced = sync_once(&opts, &mut state).await?;
        println!("Synced {} file(s)", synced);
        return Ok(());
    }

    println!(
        "Watching folder {} every {} seconds (Ctrl-C to stop)",
        opts.folder_id, opts.interval
    );
    loop {
        match sync_once(&opts, &mut state).await {
            Ok(0) => println!("No changes"),
            Ok(synced) => println!("Synced {} file(s)", synced),
            // keep watching through transient failures
            Err(e) => log::error!("sync pass failed: {}", e),
        }
        tokio::time::sleep(Duration::from_secs(opts.interval)).await;
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let opts = Opts::parse();

    if let Err(e) = run(opts).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
