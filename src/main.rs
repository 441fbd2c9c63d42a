use clap::Parser;
use std::path::PathBuf;

use gdshare::auth;
use gdshare::commands::{folder_link, share};
use gdshare::permissions::Role;
use gdshare::Result;

/// Upload a local folder to Google Drive and share it with a collaborator.
#[derive(Parser)]
#[command(version, about)]
struct Opts {
    /// Local folder to upload
    #[arg(short, long)]
    folder: PathBuf,

    /// Email address of the collaborator
    #[arg(short, long)]
    email: String,

    /// Permission to grant: reader, writer, commenter or owner
    #[arg(short, long, default_value = "writer")]
    role: String,

    /// Drive folder id to upload into (defaults to the storage root)
    #[arg(short, long, default_value = "root")]
    parent_folder: String,

    /// OAuth client secrets file
    #[arg(long, default_value = gdshare::DEFAULT_CREDENTIALS_FILE)]
    credentials: PathBuf,

    /// Persisted session file
    #[arg(long, default_value = gdshare::DEFAULT_SESSION_FILE)]
    session: PathBuf,
}

async fn run(opts: Opts) -> Result<()> {
    // Role problems surface before any network traffic.
    let role: Role = opts.role.parse()?;

    println!("Authenticating ...");
    let session = auth::authenticate(&opts.credentials, &opts.session).await?;

    let folder_id = share::share(
        &opts.folder,
        &opts.parent_folder,
        &opts.email,
        role,
        &session,
    )
    .await?;

    println!(
        "Shared {} with {} (role: {})",
        folder_link(&folder_id),
        opts.email,
        role
    );
    Ok(())
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
