//! CLI front end for deckhand.
//!
//! Every command prints JSON on stdout; logs go to stderr.
//!
//! ```ignore
//! use deckhand::cli::{parse_args, run_cli_command};
//! use deckhand::config::DeckConfig;
//!
//! let command = parse_args(std::env::args());
//! run_cli_command(command, &DeckConfig::from_env()).await?;
//! ```

pub mod args;
pub mod version;

pub use args::{parse_args, CliCommand, USAGE};
pub use version::{version_line, VERSION};

use color_eyre::eyre::{eyre, Report};
use color_eyre::Result;
use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;

use crate::config::DeckConfig;
use crate::error::DeckError;
use crate::hub::Hub;
use crate::scheduler::PollEvent;
use crate::store::WidgetConfig;

/// Run a parsed command.
pub async fn run_cli_command(command: CliCommand, config: &DeckConfig) -> Result<()> {
    match command {
        CliCommand::Version => {
            println!("{}", version_line());
            return Ok(());
        }
        CliCommand::Help => {
            println!("{}", USAGE);
            return Ok(());
        }
        CliCommand::Invalid(message) => return Err(eyre!("{}\n\n{}", message, USAGE)),
        _ => {}
    }

    let hub = Hub::open(config).await.map_err(report)?;
    let result = run_with_hub(&hub, command, config).await;
    hub.shutdown();
    result
}

async fn run_with_hub(hub: &Hub, command: CliCommand, config: &DeckConfig) -> Result<()> {
    match command {
        CliCommand::Widgets => print_json(&hub.list_widgets().await),
        CliCommand::Public { widget_id } => {
            print_json(&hub.get_public_config(&widget_id).await.map_err(report)?)
        }
        CliCommand::Add {
            widget_id,
            kind,
            host,
            port,
        } => {
            let widget = match port {
                Some(port) => WidgetConfig::new(widget_id, kind, host).with_port(port),
                None => WidgetConfig::new(widget_id, kind, host),
            };
            print_json(&hub.create_widget(widget).await.map_err(report)?)
        }
        CliCommand::Remove { widget_id } => {
            hub.delete_widget(&widget_id).await.map_err(report)?;
            print_json(&json!({ "removed": widget_id }))
        }
        CliCommand::SetSecret {
            widget_id,
            field,
            value,
        } => {
            let update = hub
                .set_secret(&widget_id, &field, &value)
                .await
                .map_err(report)?;
            print_json(&json!({ "widget_id": widget_id, "field": field, "update": update }))
        }
        CliCommand::Login { widget_id } => {
            let state = hub.login(&widget_id).await.map_err(report)?;
            print_json(&json!({ "widget_id": widget_id, "state": state }))
        }
        CliCommand::Poll { widget_id } => print_json(&hub.poll(&widget_id).await.map_err(report)?),
        CliCommand::Command {
            widget_id,
            name,
            args,
        } => print_json(&hub.command(&widget_id, &name, args).await.map_err(report)?),
        CliCommand::Watch {
            widget_id,
            interval,
        } => watch(hub, &widget_id, interval.unwrap_or(config.poll_interval)).await,
        CliCommand::Version | CliCommand::Help | CliCommand::Invalid(_) => Ok(()),
    }
}

async fn watch(hub: &Hub, widget_id: &str, interval: std::time::Duration) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<PollEvent>();
    let handle = hub.subscribe(widget_id, interval, tx).await.map_err(report)?;

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                let line = match event.public_outcome() {
                    Ok(snapshot) => json!({ "widget_id": event.widget_id, "snapshot": snapshot }),
                    Err(error) => json!({ "widget_id": event.widget_id, "error": error }),
                };
                println!("{}", line);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    hub.unsubscribe(handle);
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Classified message for the terminal; the detail goes to the log only.
fn report(err: DeckError) -> Report {
    tracing::debug!(kind = %err.kind(), "{}", err);
    eyre!("{} [{}]", err.user_message(), err.kind())
}
