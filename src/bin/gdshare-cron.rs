use clap::Parser;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use gdshare::cron::{self, CronJob};
use gdshare::permissions::Role;
use gdshare::{Error, Result};

const LOG_FILE: &str = "cron.log";
const LOGROTATE_FILE: &str = "gdshare.logrotate";

/// Manage the crontab entry that re-runs gdshare periodically.
#[derive(Parser)]
#[command(version, about)]
struct Opts {
    /// Local folder the scheduled job uploads
    #[arg(short, long)]
    folder: Option<PathBuf>,

    /// Collaborator email for the scheduled job
    #[arg(short, long)]
    email: Option<String>,

    /// Permission to grant: reader, writer, commenter or owner
    #[arg(short, long, default_value = "writer")]
    role: String,

    /// Minutes between runs
    #[arg(short, long, default_value_t = 2)]
    interval: u32,

    /// Remove matching entries instead of installing
    #[arg(long)]
    remove: bool,

    /// Print the current crontab and exit
    #[arg(short, long)]
    list: bool,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    yes: bool,
}

fn confirm(prompt: &str) -> Result<bool> {
    let io_err = |e: std::io::Error| Error::Scheduler(format!("prompt failed: {}", e));
    print!("{} (y/N): ", prompt);
    std::io::stdout().flush().map_err(io_err)?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line).map_err(io_err)?;
    Ok(matches!(
        line.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

fn run(opts: Opts) -> Result<()> {
    if opts.list {
        let table = cron::current_table()?;
        if table.trim().is_empty() {
            println!("No crontab entries.");
        } else {
            print!("{}", table);
        }
        return Ok(());
    }

    let folder = opts
        .folder
        .ok_or_else(|| Error::Validation("--folder is required".to_owned()))?;
    let email = opts
        .email
        .ok_or_else(|| Error::Validation("--email is required".to_owned()))?;
    if opts.interval == 0 {
        return Err(Error::Validation("--interval must be at least 1".to_owned()));
    }
    let role: Role = opts.role.parse()?;

    let workdir = std::env::current_dir()
        .map_err(|e| Error::Scheduler(format!("cannot resolve working directory: {}", e)))?;
    // The share binary sits next to this installer.
    let binary = std::env::current_exe()
        .map_err(|e| Error::Scheduler(format!("cannot resolve binary path: {}", e)))?
        .parent()
        .map(|dir| dir.join("gdshare"))
        .ok_or_else(|| Error::Scheduler("cannot resolve binary path".to_owned()))?;

    let job = CronJob {
        folder,
        email,
        role,
        interval_minutes: opts.interval,
        log_path: workdir.join(LOG_FILE),
        workdir,
        binary,
    };

    if opts.remove {
        let removed = cron::remove(&job)?;
        if removed == 0 {
            println!("No matching crontab entries.");
        } else {
            println!("Removed {} crontab entr{}.", removed, if removed == 1 { "y" } else { "ies" });
        }
        return Ok(());
    }

    println!("Crontab entry to install:\n\n{}\n", job.entry());
    if !opts.yes && !confirm("Install this cron job?")? {
        println!("Cancelled.");
        return Ok(());
    }

    if cron::install(&job)? {
        let conf_path = job.workdir.join(LOGROTATE_FILE);
        std::fs::write(&conf_path, cron::logrotate_conf(&job.log_path))
            .map_err(|e| Error::Scheduler(format!("cannot write {}: {}", conf_path.display(), e)))?;
        println!("Installed. Output goes to {}.", job.log_path.display());
        println!(
            "Rotation policy written to {}; link it from /etc/logrotate.d to activate.",
            conf_path.display()
        );
    } else {
        println!("This cron job is already installed.");
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let opts = Opts::parse();

    if let Err(e) = run(opts) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
