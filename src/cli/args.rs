//! Command-line argument parsing for the deckhand CLI.

use serde_json::{Map, Value};
use std::time::Duration;

use crate::integrations::AdapterKind;

/// Parsed CLI command to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// Show version information
    Version,
    /// Show usage
    Help,
    /// List every widget, secrets masked
    Widgets,
    /// Show one widget, secrets masked
    Public { widget_id: String },
    /// Register a widget
    Add {
        widget_id: String,
        kind: AdapterKind,
        host: String,
        port: Option<u16>,
    },
    /// Delete a widget
    Remove { widget_id: String },
    /// Submit a secret field
    SetSecret {
        widget_id: String,
        field: String,
        value: String,
    },
    /// Log in once
    Login { widget_id: String },
    /// Poll once
    Poll { widget_id: String },
    /// Run a widget command
    Command {
        widget_id: String,
        name: String,
        args: Map<String, Value>,
    },
    /// Poll repeatedly until interrupted
    Watch {
        widget_id: String,
        interval: Option<Duration>,
    },
    /// Arguments that do not form a command
    Invalid(String),
}

pub const USAGE: &str = "\
usage: deckhand <command>

  widgets                              list widgets
  public <id>                          show a widget with secrets masked
  add <id> <kind> <host> [port]        register a widget
  remove <id>                          delete a widget
  set-secret <id> <field> <value>      submit a secret (********** keeps it)
  login <id>                           log in once
  poll <id>                            poll once
  command <id> <name> [key=value...]   run a widget command
  watch <id> [interval-secs]           poll until interrupted
  --version                            print the version";

/// Parse command-line arguments and return the appropriate command.
///
/// # Examples
///
/// ```
/// use deckhand::cli::args::{parse_args, CliCommand};
///
/// let args = vec!["deckhand".to_string(), "poll".to_string(), "qb".to_string()];
/// assert_eq!(
///     parse_args(args.into_iter()),
///     CliCommand::Poll { widget_id: "qb".to_string() }
/// );
/// ```
pub fn parse_args<I>(args: I) -> CliCommand
where
    I: Iterator<Item = String>,
{
    // Skip the program name
    let args: Vec<String> = args.skip(1).collect();
    let Some(first) = args.first() else {
        return CliCommand::Help;
    };
    let rest = &args[1..];

    match (first.as_str(), rest) {
        ("--version" | "-V", _) => CliCommand::Version,
        ("--help" | "-h" | "help", _) => CliCommand::Help,
        ("widgets", []) => CliCommand::Widgets,
        ("public", [id]) => CliCommand::Public {
            widget_id: id.clone(),
        },
        ("add", [id, kind, host, port @ ..]) if port.len() <= 1 => parse_add(id, kind, host, port),
        ("remove", [id]) => CliCommand::Remove {
            widget_id: id.clone(),
        },
        ("set-secret", [id, field, value]) => CliCommand::SetSecret {
            widget_id: id.clone(),
            field: field.clone(),
            value: value.clone(),
        },
        ("login", [id]) => CliCommand::Login {
            widget_id: id.clone(),
        },
        ("poll", [id]) => CliCommand::Poll {
            widget_id: id.clone(),
        },
        ("command", [id, name, pairs @ ..]) => match parse_pairs(pairs) {
            Ok(args) => CliCommand::Command {
                widget_id: id.clone(),
                name: name.clone(),
                args,
            },
            Err(message) => CliCommand::Invalid(message),
        },
        ("watch", [id]) => CliCommand::Watch {
            widget_id: id.clone(),
            interval: None,
        },
        ("watch", [id, secs]) => match secs.parse::<u64>() {
            Ok(secs) if secs > 0 => CliCommand::Watch {
                widget_id: id.clone(),
                interval: Some(Duration::from_secs(secs)),
            },
            _ => CliCommand::Invalid(format!("invalid interval '{}'", secs)),
        },
        (other, _) => CliCommand::Invalid(format!("unrecognized arguments for '{}'", other)),
    }
}

fn parse_add(id: &str, kind: &str, host: &str, port: &[String]) -> CliCommand {
    let kind = match kind.parse::<AdapterKind>() {
        Ok(kind) => kind,
        Err(err) => return CliCommand::Invalid(err.to_string()),
    };
    let port = match port.first().map(|p| p.parse::<u16>()) {
        None => None,
        Some(Ok(port)) => Some(port),
        Some(Err(_)) => return CliCommand::Invalid(format!("invalid port '{}'", port[0])),
    };
    CliCommand::Add {
        widget_id: id.to_string(),
        kind,
        host: host.to_string(),
        port,
    }
}

/// `key=value` pairs; values that parse as JSON keep their type.
fn parse_pairs(pairs: &[String]) -> Result<Map<String, Value>, String> {
    let mut args = Map::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| format!("expected key=value, got '{}'", pair))?;
        let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::from(raw));
        args.insert(key.to_string(), value);
    }
    Ok(args)
}
