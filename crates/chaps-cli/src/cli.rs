use std::path::PathBuf;

use chaps_types::InternalBlobId;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "chaps-store",
    about = "Inspect and maintain a Chaps token object store",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Args)]
pub struct StoreArgs {
    /// TOML store configuration file
    #[arg(long, global = true, conflicts_with = "store")]
    pub config: Option<PathBuf>,

    /// Journal file, using default settings
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show store statistics
    Info,
    /// Dump an internal blob as hex
    Internal(InternalArgs),
    /// List stored objects
    List(ListArgs),
    /// Rewrite the journal without superseded records
    Compact,
}

#[derive(Args)]
pub struct InternalArgs {
    /// Blob name (e.g. `encrypted-auth-key`) or number
    pub id: InternalBlobId,
}

#[derive(Args)]
pub struct ListArgs {
    /// 32-byte object encryption key as hex; private objects are listed too
    #[arg(long)]
    pub key_hex: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_info_with_store() {
        let cli = Cli::try_parse_from(["chaps-store", "--store", "/tmp/db.journal", "info"]).unwrap();
        assert!(matches!(cli.command, Command::Info));
        assert_eq!(cli.store.store, Some(PathBuf::from("/tmp/db.journal")));
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn parse_internal_by_name_and_number() {
        let cli = Cli::try_parse_from(["chaps-store", "internal", "imported-tracker"]).unwrap();
        if let Command::Internal(args) = cli.command {
            assert_eq!(args.id, InternalBlobId::ImportedTracker);
        } else {
            panic!("wrong command");
        }
        let cli = Cli::try_parse_from(["chaps-store", "internal", "0"]).unwrap();
        if let Command::Internal(args) = cli.command {
            assert_eq!(args.id, InternalBlobId::EncryptedAuthKey);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_internal_rejects_unknown_id() {
        assert!(Cli::try_parse_from(["chaps-store", "internal", "root-key"]).is_err());
        assert!(Cli::try_parse_from(["chaps-store", "internal", "42"]).is_err());
    }

    #[test]
    fn parse_list_with_key() {
        let cli = Cli::try_parse_from(["chaps-store", "list", "--key-hex", "00ff", "--format", "json"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        if let Command::List(args) = cli.command {
            assert_eq!(args.key_hex.as_deref(), Some("00ff"));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn config_and_store_conflict() {
        assert!(Cli::try_parse_from([
            "chaps-store", "--config", "a.toml", "--store", "b.journal", "info"
        ])
        .is_err());
    }

    #[test]
    fn parse_compact_verbose() {
        let cli = Cli::try_parse_from(["chaps-store", "compact", "-v"]).unwrap();
        assert!(matches!(cli.command, Command::Compact));
        assert!(cli.verbose);
    }
}
