use crate::commands::{current_thread_runtime, CommandResult};
use newsbot_core::config::{AppConfig, LoadOptions};
use newsbot_server::{bootstrap_with_config, BootstrapError};

/// Runs one weekly roundup pass. Per-channel failures are counted in the summary, not surfaced.
pub fn run(options: LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "roundup",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };
    let day_window = config.roundup.day_window;

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "roundup",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let app = bootstrap_with_config(config).await.map_err(|error| {
            let (error_class, exit_code) = match &error {
                BootstrapError::DatabaseConnect(_) => ("db_connectivity", 4u8),
                BootstrapError::Migration(_) => ("migration", 5u8),
                _ => ("bootstrap", 6u8),
            };
            (error_class, error.to_string(), exit_code)
        })?;
        let summary = app
            .roundup
            .run()
            .await
            .map_err(|error| ("persistence", error.to_string(), 7u8))?;
        app.db_pool.close().await;
        Ok::<_, (&'static str, String, u8)>(summary)
    });

    match result {
        Ok(summary) => CommandResult::success_with_details(
            "roundup",
            format!(
                "posted {} of {} channel digests for the past {day_window} days",
                summary.sent, summary.channels_total
            ),
            serde_json::to_value(summary).ok(),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("roundup", error_class, message, exit_code)
        }
    }
}
