//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use livefeed_core::{FormatOptions, OutputFormat};

/// livefeed - Watch a live room's chat feed from the terminal
#[derive(Debug, Parser)]
#[command(name = "livefeed")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Watch a room's live feed
    Watch(WatchArgs),

    /// Resolve a user's avatar URL and exit
    Avatar(AvatarArgs),

    /// Show where avatar cache settings are read from
    CachePath,
}

/// Arguments for the watch command.
#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Numeric room id to join
    pub room_id: u64,

    // --- Connection flags ---
    /// Viewer uid presented during auth (0 is anonymous)
    #[arg(long, default_value = "0")]
    pub uid: u64,

    /// Negotiation API base URL
    #[arg(long, env = "LIVEFEED_API_BASE")]
    pub api_base: Option<String>,

    /// Seconds between reconnect attempts
    #[arg(long, default_value = "5")]
    pub reconnect_delay: u64,

    // --- Output flags ---
    /// Output one JSON document per event
    #[arg(long)]
    pub json: bool,

    /// Maximum chat text length (truncated with ellipsis)
    #[arg(long)]
    pub max_text_length: Option<usize>,

    /// Show sender uids after usernames
    #[arg(long)]
    pub show_uids: bool,

    /// Render events the formatter does not recognize
    #[arg(long)]
    pub show_unknown: bool,

    /// Resolve and show avatar URLs for chat senders
    #[arg(long)]
    pub avatars: bool,

    // --- Cache flags ---
    /// Path to the avatar cache settings file
    #[arg(long, env = "LIVEFEED_CACHE_CONFIG")]
    pub cache_config: Option<PathBuf>,

    /// Disable the avatar cache
    #[arg(long)]
    pub no_cache: bool,
}

impl WatchArgs {
    /// Returns the output format based on CLI flags.
    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Tty
        }
    }

    /// Returns formatter options based on CLI flags.
    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            max_text_length: self.max_text_length,
            show_uids: self.show_uids,
            show_unknown: self.show_unknown,
        }
    }
}

/// Arguments for the avatar command.
#[derive(Debug, Args)]
pub struct AvatarArgs {
    /// Numeric uid to resolve
    pub uid: u64,

    /// Path to the avatar cache settings file
    #[arg(long, env = "LIVEFEED_CACHE_CONFIG")]
    pub cache_config: Option<PathBuf>,

    /// Disable the avatar cache
    #[arg(long)]
    pub no_cache: bool,
}

/// Default path of the avatar cache settings file.
pub fn default_cache_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("livefeed")
        .join("cache.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_parses_room_and_defaults() {
        let cli = Cli::try_parse_from(["livefeed", "watch", "642922"]).unwrap();

        assert!(!cli.debug);
        let Command::Watch(args) = cli.command else {
            panic!("expected watch command");
        };
        assert_eq!(args.room_id, 642922);
        assert_eq!(args.uid, 0);
        assert_eq!(args.reconnect_delay, 5);
        assert!(!args.json);
        assert!(!args.no_cache);
        assert_eq!(args.output_format(), OutputFormat::Tty);
    }

    #[test]
    fn watch_flags_map_to_format_options() {
        let cli = Cli::try_parse_from([
            "livefeed",
            "watch",
            "1",
            "--json",
            "--max-text-length",
            "40",
            "--show-uids",
            "--show-unknown",
        ])
        .unwrap();

        let Command::Watch(args) = cli.command else {
            panic!("expected watch command");
        };
        assert_eq!(args.output_format(), OutputFormat::Json);
        let options = args.format_options();
        assert_eq!(options.max_text_length, Some(40));
        assert!(options.show_uids);
        assert!(options.show_unknown);
    }

    #[test]
    fn watch_requires_a_room_id() {
        assert!(Cli::try_parse_from(["livefeed", "watch"]).is_err());
    }

    #[test]
    fn avatar_parses_uid_and_cache_path() {
        let cli = Cli::try_parse_from([
            "livefeed",
            "avatar",
            "1234",
            "--cache-config",
            "/tmp/cache.toml",
        ])
        .unwrap();

        let Command::Avatar(args) = cli.command else {
            panic!("expected avatar command");
        };
        assert_eq!(args.uid, 1234);
        assert_eq!(args.cache_config, Some(PathBuf::from("/tmp/cache.toml")));
    }

    #[test]
    fn debug_flag_is_global() {
        let cli = Cli::try_parse_from(["livefeed", "-v", "cache-path"]).unwrap();
        assert!(cli.debug);
        assert!(matches!(cli.command, Command::CachePath));
    }

    #[test]
    fn default_cache_path_is_under_app_dir() {
        let path = default_cache_settings_path();
        assert!(path.ends_with("livefeed/cache.toml"));
    }
}
