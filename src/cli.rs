use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Ingest photo and video export archives into a deduplicated library.
///
/// Archives dropped into the input directory are extracted, every media file
/// is hashed, and new content is filed under `YYYY/MM` (or `undated`) in the
/// library. Already filed content is discarded.
#[derive(Debug, Parser)]
#[command(name = "trove", version, about, long_about)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, value_name = "FILE", env = "TROVE_CONFIG_FILE")]
    pub config: Option<PathBuf>,
    /// Directory that archives are dropped into
    #[arg(short, long, value_name = "DIR")]
    pub input: Option<PathBuf>,
    /// Root of the date-partitioned library
    #[arg(short, long, value_name = "DIR")]
    pub library: Option<PathBuf>,
    /// Rebuild the dedup index from the library instead of ingesting
    #[arg(long)]
    pub reindex: bool,
    /// Increase log verbosity (-v debug, -vv trace); overrides RUST_LOG
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::parse_from(["trove", "--input", "/in", "-l", "/lib", "--reindex", "-vv"]);
        assert_eq!(cli.input, Some(PathBuf::from("/in")));
        assert_eq!(cli.library, Some(PathBuf::from("/lib")));
        assert!(cli.reindex);
        assert_eq!(cli.verbose, 2);
    }
}
