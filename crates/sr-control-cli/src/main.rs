//! SR Control - command-line front end for the library tracker.
//!
//! Loads library definitions from a catalog, then starts, stops, queries or
//! watches them on this machine or over SSH.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

/// Environment variable read for SSH passwords unless `--password-env` says otherwise.
const DEFAULT_PASSWORD_ENV: &str = "SR_CONTROL_PASSWORD";

#[derive(Parser, Debug)]
#[command(name = "sr-control")]
#[command(about = "Start, stop and monitor ROS libraries on local and remote machines")]
struct Args {
    /// Catalog file or directory (defaults to <config dir>/sr-control/libraries)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    /// SSH connect timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    connect_timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the libraries in the catalog
    List,

    /// Run status checks and print the result
    Status {
        /// Only check this library
        name: Option<String>,
    },

    /// Run a library's start command
    Start { name: String },

    /// Run a library's stop command
    Stop { name: String },

    /// Resolve where a library would run when pointed at an address
    Target {
        name: String,
        ip: String,

        /// SSH login used when the address is another machine
        #[arg(long, default_value = "")]
        login: String,

        /// Environment variable holding the SSH password
        #[arg(long, default_value = DEFAULT_PASSWORD_ENV)]
        password_env: String,
    },

    /// Check that a login and password open a shell on a machine
    CheckLogin {
        ip: String,

        #[arg(long)]
        login: String,

        /// Environment variable holding the SSH password
        #[arg(long, default_value = DEFAULT_PASSWORD_ENV)]
        password_env: String,
    },

    /// Poll status and print every change until interrupted
    Watch {
        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 4000)]
        interval_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so `--json` output stays parseable
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let catalog = commands::catalog_path(args.catalog);
    debug!("Catalog: {:?}", catalog);
    let tracker = commands::build_tracker(args.connect_timeout.map(Duration::from_secs));
    let tracker = commands::load_tracker(tracker, catalog.as_deref()).await?;
    let format = output::Format::from_json_flag(args.json);

    match args.command {
        Command::List => commands::list(&tracker, format),
        Command::Status { name } => commands::status(&tracker, name.as_deref(), format).await,
        Command::Start { name } => commands::start(&tracker, &name, format).await,
        Command::Stop { name } => commands::stop(&tracker, &name, format).await,
        Command::Target {
            name,
            ip,
            login,
            password_env,
        } => {
            let password = commands::password_from_env(&password_env);
            commands::target(&tracker, &name, &ip, &login, &password, format).await
        }
        Command::CheckLogin {
            ip,
            login,
            password_env,
        } => {
            let password = commands::password_from_env(&password_env);
            commands::check_login(&tracker, &ip, &login, &password, format).await
        }
        Command::Watch { interval_ms } => commands::watch(tracker, interval_ms, format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_target() {
        let args = Args::try_parse_from([
            "sr-control",
            "--json",
            "target",
            "hand",
            "10.0.0.2",
            "--login",
            "hand",
            "--connect-timeout",
            "5",
        ])
        .unwrap();
        assert!(args.json);
        assert_eq!(args.connect_timeout, Some(5));
        match args.command {
            Command::Target {
                name,
                ip,
                login,
                password_env,
            } => {
                assert_eq!(name, "hand");
                assert_eq!(ip, "10.0.0.2");
                assert_eq!(login, "hand");
                assert_eq!(password_env, DEFAULT_PASSWORD_ENV);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args =
            Args::try_parse_from(["sr-control", "watch", "--interval-ms", "500", "--debug"])
                .unwrap();
        assert!(args.debug);
        assert!(matches!(args.command, Command::Watch { interval_ms: 500 }));
    }
}
