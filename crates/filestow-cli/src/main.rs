//! filestow: command-line front end for the storage engine.

use anyhow::{anyhow, Context};
use clap::Parser;
use filestow_cli::{print_json, redact, setup, Cli, Commands, TargetCommands};
use filestow_core::{Config, FileTransferUnit, TargetRef};
use filestow_infra::{init_telemetry, shutdown_telemetry, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    let format: LogFormat = config.log_format.parse().map_err(|e: String| anyhow!(e))?;
    init_telemetry(format, &config.log_filter, &config.environment)
        .map_err(|e| anyhow!("Failed to initialize telemetry: {}", e))?;

    let (coordinator, report) = setup::initialize(&config).await?;
    if !report.ready {
        for failure in report.critical_failures() {
            tracing::error!(loader = %failure.name, status = ?failure.status, "Startup incomplete");
        }
    }

    match cli.command {
        Commands::Targets { sub } => match &sub {
            TargetCommands::List => {
                let targets: Vec<_> = coordinator
                    .list_storage_targets()
                    .await
                    .iter()
                    .map(redact)
                    .collect();
                print_json(&targets)?;
            }
            TargetCommands::Upsert { key, .. } => {
                let target = sub
                    .to_target()
                    .ok_or_else(|| anyhow!("not an upsert command"))?;
                coordinator.upsert_storage_target(target).await?;
                print_json(&serde_json::json!({ "saved": key }))?;
            }
            TargetCommands::Remove { key } => {
                coordinator.remove_storage_target(key).await?;
                print_json(&serde_json::json!({ "removed": key }))?;
            }
        },
        Commands::Reload => {
            coordinator.reload_config().await?;
            print_json(&serde_json::json!({
                "targets": coordinator.list_storage_targets().await.len()
            }))?;
        }
        Commands::Upload {
            file,
            target,
            content_type,
            checksum,
        } => {
            let mut unit = FileTransferUnit::from_path(&file, content_type.as_deref())
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            if let Some(checksum) = checksum {
                unit = unit.with_checksum(checksum);
            }
            let record = coordinator
                .upload(unit, TargetRef::from(target.as_deref()))
                .await?;
            print_json(&record)?;
        }
        Commands::Delete { id, permanent } => {
            let record = coordinator.record(id).await?;
            let record = coordinator.delete(&record, permanent).await?;
            print_json(&record)?;
        }
        Commands::Restore { id } => {
            let record = coordinator.record(id).await?;
            let record = coordinator.restore(&record).await?;
            print_json(&record)?;
        }
        Commands::Url { id } => {
            let record = coordinator.record(id).await?;
            let url = coordinator.resolve_url(&record).await?;
            print_json(&serde_json::json!({ "id": id, "url": url }))?;
        }
        Commands::Usage { target } => {
            let target = TargetRef::from(target.as_deref());
            let used = coordinator.usage(target.clone()).await?;
            print_json(&serde_json::json!({
                "target": target.to_string(),
                "usedBytes": used
            }))?;
        }
    }

    shutdown_telemetry().await;
    Ok(())
}
