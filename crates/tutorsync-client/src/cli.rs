//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// tutorsync - Tutoring sessions on your Google Calendar
#[derive(Debug, Parser)]
#[command(name = "tutorsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "TUTORSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Ingest scraped schedule rows and create missing calendar events
    Sync {
        /// File with the scraped rows (JSON array of rows or tab-separated lines), `-` for stdin
        #[arg(long, short, default_value = "-")]
        rows: String,

        /// Run against an in-memory calendar and store; nothing is written
        #[arg(long)]
        dry_run: bool,
    },

    /// Sync every stored session again without new input
    Resync,

    /// Delete a session's calendar event and forget the session
    Delete {
        /// Session identifier, as shown by `tutorsync list`
        session_id: String,
    },

    /// Handle one raw `saveSessions` or `deleteSession` message from the page
    Dispatch {
        /// File with the JSON message, bare or in an envelope, `-` for stdin
        #[arg(default_value = "-")]
        input: String,
    },

    /// List stored sessions and their calendar events
    List,

    /// Show how a scraped date string is interpreted
    Normalize {
        /// Date as it appears on the schedule page, e.g. "Jan. 5, 2025 3 p.m."
        date: String,

        /// Timezone override (IANA name)
        #[arg(long)]
        time_zone: Option<String>,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration with inline secrets masked
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_sync_from_file() {
        let cli = Cli::parse_from(["tutorsync", "sync", "--rows", "rows.json", "--dry-run"]);
        match cli.command {
            Command::Sync { rows, dry_run } => {
                assert_eq!(rows, "rows.json");
                assert!(dry_run);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn sync_reads_stdin_by_default() {
        let cli = Cli::parse_from(["tutorsync", "--debug", "sync"]);
        assert!(cli.debug);
        assert!(matches!(cli.command, Command::Sync { ref rows, dry_run: false } if rows == "-"));
    }

    #[test]
    fn parse_delete_and_json() {
        let cli = Cli::parse_from(["tutorsync", "delete", "abc123", "--json"]);
        assert!(cli.json);
        assert!(matches!(cli.command, Command::Delete { ref session_id } if session_id == "abc123"));
    }

    #[test]
    fn delete_requires_session_id() {
        assert!(Cli::try_parse_from(["tutorsync", "delete"]).is_err());
    }

    #[test]
    fn parse_dispatch() {
        let cli = Cli::parse_from(["tutorsync", "dispatch", "message.json"]);
        assert!(matches!(cli.command, Command::Dispatch { ref input } if input == "message.json"));

        let cli = Cli::parse_from(["tutorsync", "dispatch"]);
        assert!(matches!(cli.command, Command::Dispatch { ref input } if input == "-"));
    }

    #[test]
    fn parse_config_action() {
        let cli = Cli::parse_from(["tutorsync", "config", "validate"]);
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::Validate
            }
        ));
    }
}
