//! # spirit
//!
//! **spirit** preserves an AI agent's state (identity, soul, memory and
//! project notes) in a git repository.
//!
//! Features:
//! - `spirit init` creates the config directory, optionally in workspace mode
//! - `spirit checkpoint` commits the tracked files locally
//! - `spirit sync` mirrors, rebases onto the remote, commits and pushes
//! - `spirit backup` / `spirit autobackup` checkpoint and sync, once or on a schedule
//! - `spirit status` shows tracked files and repository state
//! - `spirit migrate` / `spirit restore` move state between machines
//!
//! Global flags apply to every subcommand and can also come from
//! `SPIRIT_HOME` and `SPIRIT_GIT_TIMEOUT`.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use spirit::{
    AutoBackupArgs, Context, InitArgs, cmd_autobackup, cmd_backup, cmd_checkpoint, cmd_init,
    cmd_migrate, cmd_restore, cmd_status, cmd_sync, spirit_home,
};

#[derive(Parser, Debug)]
#[command(
    name = "spirit",
    version,
    about = "SPIRIT - preserve an agent's state in git",
    arg_required_else_help = true
)]
struct Cli {
    /// Config directory [default: ~/.spirit]
    #[arg(long, global = true, env = "SPIRIT_HOME", value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Seconds any single git command may run before it is killed
    #[arg(
        long,
        global = true,
        env = "SPIRIT_GIT_TIMEOUT",
        default_value_t = 120,
        value_name = "SECS"
    )]
    timeout: u64,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Initialize the SPIRIT state directory
    Init {
        /// Agent name
        #[arg(long)]
        name: Option<String>,
        /// Agent emoji
        #[arg(long)]
        emoji: Option<String>,
        /// Agent email, used as the commit author
        #[arg(long)]
        email: Option<String>,
        /// Workspace directory (enables symlinked manifest mode)
        #[arg(long, value_name = "DIR")]
        workspace: Option<PathBuf>,
    },
    /// Create a local checkpoint without pushing
    Checkpoint {
        /// Checkpoint message
        message: Option<String>,
        /// Stage every change in the config directory
        #[arg(long)]
        all: bool,
    },
    /// Sync state with the remote repository
    Sync {
        /// List files as they are synced
        #[arg(long)]
        verbose: bool,
    },
    /// Checkpoint and sync in one step
    Backup {
        /// Backup message
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Configure automatic backups
    Autobackup {
        /// Interval between backups, e.g. 15m or 1h30m
        #[arg(long)]
        interval: Option<String>,
        /// Back up when the agent session ends
        #[arg(long)]
        on_session_end: bool,
        /// Watch for changes and back up in the foreground
        #[arg(long)]
        watch: bool,
        /// Disable auto-backup
        #[arg(long, conflicts_with_all = ["interval", "on_session_end", "watch"])]
        disable: bool,
    },
    /// Move state to another location
    Migrate {
        /// current, a path, github:<repo>, gitlab:<repo> or s3://<bucket>
        source: String,
        destination: String,
    },
    /// Show state and repository status
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Pull the latest state and restore it into the workspace
    Restore {
        /// Skip pulling from the remote
        #[arg(long)]
        no_pull: bool,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {:#}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(cmd) = cli.cmd else {
        return Ok(());
    };
    let root = cli.config_dir.clone().unwrap_or_else(spirit_home);
    let ctx = Context::new(Some(root.clone()), Duration::from_secs(cli.timeout), cli.verbose);

    match cmd {
        Cmd::Init {
            name,
            emoji,
            email,
            workspace,
        } => cmd_init(
            &root,
            &InitArgs {
                name,
                emoji,
                email,
                workspace,
            },
        ),
        Cmd::Checkpoint { message, all } => cmd_checkpoint(&ctx, message.as_deref(), all),
        Cmd::Sync { verbose } => cmd_sync(&ctx, verbose),
        Cmd::Backup { message } => cmd_backup(&ctx, message.as_deref()),
        Cmd::Autobackup {
            interval,
            on_session_end,
            watch,
            disable,
        } => cmd_autobackup(
            &ctx,
            &AutoBackupArgs {
                interval,
                on_session_end,
                watch,
                disable,
            },
        ),
        Cmd::Migrate {
            source,
            destination,
        } => cmd_migrate(&ctx, &source, &destination),
        Cmd::Status { json } => cmd_status(&ctx, json),
        Cmd::Restore { no_pull } => cmd_restore(&ctx, no_pull),
    }
}

/// Logs go to stderr: `warn` by default, `debug` with `-v`, `RUST_LOG` wins.
fn init_tracing(verbose: bool) {
    let default = if verbose { "spirit=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
