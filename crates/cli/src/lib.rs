pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use newsbot_core::config::{ConfigOverrides, LoadOptions};

#[derive(Debug, Parser)]
#[command(
    name = "newsbot",
    about = "NewsBot operator CLI",
    long_about = "Apply migrations, run the weekly roundup, inspect configuration, and check readiness.",
    after_help = "Examples:\n  newsbot migrate\n  newsbot roundup --days 7\n  newsbot doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a newsbot.toml config file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Post the weekly roundup digest to every channel with recent submissions")]
    Roundup {
        #[arg(long, help = "Override roundup.day_window for this run")]
        days: Option<u32>,
    },
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config,
    #[command(about = "Validate config, Slack credentials, and database readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = |overrides: ConfigOverrides| LoadOptions {
        config_path: cli.config.clone(),
        require_file: cli.config.is_some(),
        overrides,
    };

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(options(ConfigOverrides::default())),
        Command::Roundup { days } => commands::roundup::run(options(ConfigOverrides {
            roundup_day_window: days,
            ..ConfigOverrides::default()
        })),
        Command::Config => commands::config::run(options(ConfigOverrides::default())),
        Command::Doctor { json } => commands::doctor::run(options(ConfigOverrides::default()), json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
