use clap::{ArgAction, Parser, Subcommand};
use std::io::Write;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod aws_sso;
mod browser;
mod cache;
mod commands;
mod config;
mod error;
mod federation;
mod runner;
#[cfg(test)]
mod testutil;

use aws_sso::SSO;
use commands::ConsoleOptions;
use config::Config;
use error::{Error, Result};
use runner::SystemRunner;

#[derive(Parser)]
#[command(author, version, about = "AWS SSO utility", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(clap::Args)]
struct ProfileArg {
    /// Name of the AWS profile
    #[arg(long)]
    profile: Option<String>,
}

impl ProfileArg {
    fn name(&self) -> Result<&str> {
        match self.profile.as_deref() {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(Error::MissingProfile),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Opens the default browser and logs into AWS Web Console using SSO
    Console {
        #[command(flatten)]
        profile: ProfileArg,
        /// Force logout of any existing session in the browser first
        #[arg(
            long,
            default_value_t = true,
            num_args = 0..=1,
            default_missing_value = "true",
            action = ArgAction::Set
        )]
        force_logout: bool,
        /// Number of seconds to wait after forcing logout before logging in
        #[arg(long, default_value_t = 1)]
        logout_wait: u64,
    },
    /// Prints credentials for exporting to your shell
    Export {
        #[command(flatten)]
        profile: ProfileArg,
    },
    /// Fetches new credentials and writes them to the local credentials file
    Import {
        #[command(flatten)]
        profile: ProfileArg,
    },
    /// Fetches credential process compatible JSON output
    Process {
        #[command(flatten)]
        profile: ProfileArg,
    },
    /// Print the version information
    Version,
}

fn version() -> String {
    format!(
        "Version: {}, Commit: {}",
        env!("CARGO_PKG_VERSION"),
        option_env!("GIT_COMMIT_HASH").unwrap_or("unknown")
    )
}

fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_sso() -> Result<SSO<SystemRunner>> {
    Ok(SSO::new(Config::load_from_env()?, SystemRunner))
}

async fn run<W: Write>(command: Commands, out: &mut W) -> Result<()> {
    match command {
        Commands::Console {
            profile,
            force_logout,
            logout_wait,
        } => {
            let name = profile.name()?;
            let options = ConsoleOptions {
                force_logout,
                logout_wait,
            };
            let sso = build_sso()?;
            sso.console(name, &options, out).await
        }
        Commands::Export { profile } => {
            let name = profile.name()?;
            let sso = build_sso()?;
            sso.export(name, out).await
        }
        Commands::Import { profile } => {
            let name = profile.name()?;
            let sso = build_sso()?;
            sso.import(name, out).await
        }
        Commands::Process { profile } => {
            let name = profile.name()?;
            let sso = build_sso()?;
            sso.process(name, out).await
        }
        Commands::Version => {
            writeln!(out, "{}", version())?;
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match run(args.command, &mut out).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
