//! CLI interface for Nudge
//!
//! Defines the commands and global flags using clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Nudge conversational reminder assistant
///
/// Turns WhatsApp messages into calendar reminders and lets people list,
/// edit and delete them by replying to numbered menus.
#[derive(Parser, Debug)]
#[command(name = "nudge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the webhook server
    Serve,

    /// Extract a reminder from text without storing anything
    Parse {
        /// The utterance to extract from
        text: String,
    },

    /// Run one message through the full conversation and print the replies
    Simulate {
        /// The inbound message text
        text: String,

        /// Sender identity
        #[arg(long, default_value = "simulator")]
        sender: String,

        /// Display name used in replies
        #[arg(long, default_value = "there")]
        name: String,

        /// Use an in-memory calendar instead of the configured backend
        #[arg(long)]
        offline: bool,
    },

    /// Resolve a date reference such as "next friday" or "this month"
    Resolve {
        /// The date phrase
        text: String,
    },

    /// Validate configuration and check collaborators
    Doctor,

    /// Approve Google Calendar access in a browser and store the refresh token
    ///
    /// Needs google_client_id and google_client_secret from a Google Cloud
    /// "Desktop app" OAuth client.
    CalendarAuth {
        /// Local port Google redirects to (0 picks a free one)
        #[arg(long, default_value_t = 0)]
        port: u16,
    },

    /// Manage stored secrets
    Secret {
        #[command(subcommand)]
        action: SecretAction,
    },
}

/// Secret management actions
#[derive(Subcommand, Debug)]
pub enum SecretAction {
    /// Prompt for a secret and store it in the OS keychain
    Set {
        /// Secret key (e.g. gemini_api_key)
        key: String,
    },

    /// Remove a secret from the OS keychain
    Delete {
        /// Secret key
        key: String,
    },

    /// Show which secrets are present
    List,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["nudge", "serve"]);
        assert!(matches!(cli.command, Command::Serve));
        assert!(!cli.json);
        assert!(cli.log.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["nudge", "--json", "--log", "debug", "doctor"]);
        assert!(cli.json);
        assert_eq!(cli.log, Some("debug".to_string()));
        assert!(matches!(cli.command, Command::Doctor));
    }

    #[test]
    fn test_simulate_defaults() {
        let cli = Cli::parse_from(["nudge", "simulate", "call mom tomorrow at 3pm"]);
        if let Command::Simulate {
            text,
            sender,
            name,
            offline,
        } = cli.command
        {
            assert_eq!(text, "call mom tomorrow at 3pm");
            assert_eq!(sender, "simulator");
            assert_eq!(name, "there");
            assert!(!offline);
        } else {
            panic!("Expected Simulate command");
        }
    }

    #[test]
    fn test_simulate_flags() {
        let cli = Cli::parse_from([
            "nudge",
            "simulate",
            "list my reminders",
            "--sender",
            "923001234567",
            "--name",
            "Ayesha",
            "--offline",
        ]);
        if let Command::Simulate {
            sender,
            name,
            offline,
            ..
        } = cli.command
        {
            assert_eq!(sender, "923001234567");
            assert_eq!(name, "Ayesha");
            assert!(offline);
        } else {
            panic!("Expected Simulate command");
        }
    }

    #[test]
    fn test_secret_subcommand() {
        let cli = Cli::parse_from(["nudge", "secret", "set", "gemini_api_key"]);
        if let Command::Secret {
            action: SecretAction::Set { key },
        } = cli.command
        {
            assert_eq!(key, "gemini_api_key");
        } else {
            panic!("Expected Secret Set command");
        }
    }

    #[test]
    fn test_config_path_flag() {
        let cli = Cli::parse_from(["nudge", "--config", "/tmp/nudge.toml", "resolve", "next friday"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/nudge.toml")));
        assert!(matches!(cli.command, Command::Resolve { .. }));
    }
}
