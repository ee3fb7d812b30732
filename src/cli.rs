use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use url::Url;

#[derive(Debug, Parser)]
#[command(name = "seedmirror", version, about)]
pub struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, env = "SEEDMIRROR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch provider documents, publish webseeds, and download missing descriptors
    Discover(DiscoverArgs),
}

#[derive(Debug, Args)]
pub struct DiscoverArgs {
    /// Snapshot directory descriptors are downloaded into
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Extra HTTP provider, after configured ones
    #[arg(long = "http", value_name = "URL")]
    pub http: Vec<Url>,

    /// Extra object-storage mirror token, after configured ones
    #[arg(long = "token", value_name = "TOKEN")]
    pub tokens: Vec<String>,

    /// Extra local provider document, after configured ones
    #[arg(long = "local", value_name = "PATH")]
    pub local: Vec<PathBuf>,

    /// Publish webseeds only; do not download descriptors
    #[arg(long)]
    pub no_download: bool,
}

impl Cli {
    /// Default tracing directive when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_discover_flags() {
        let cli = Cli::try_parse_from([
            "seedmirror",
            "--config",
            "/etc/seedmirror.toml",
            "discover",
            "--dir",
            "/data",
            "--http",
            "https://a.example/webseeds.toml",
            "--http",
            "https://b.example/webseeds.toml",
            "--token",
            "v1:AAAA",
            "--no-download",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/etc/seedmirror.toml")));
        let Command::Discover(args) = cli.command;
        assert_eq!(args.dir, Some(PathBuf::from("/data")));
        assert_eq!(args.http.len(), 2);
        assert_eq!(args.http[1].as_str(), "https://b.example/webseeds.toml");
        assert_eq!(args.tokens, ["v1:AAAA"]);
        assert!(args.local.is_empty());
        assert!(args.no_download);
    }

    #[test]
    fn test_rejects_bad_url() {
        assert!(Cli::try_parse_from(["seedmirror", "discover", "--http", "not a url"]).is_err());
    }

    #[rstest]
    #[case(&["seedmirror", "discover"], "info")]
    #[case(&["seedmirror", "-v", "discover"], "debug")]
    #[case(&["seedmirror", "discover", "-vvv"], "trace")]
    fn test_log_level(#[case] argv: &[&str], #[case] expected: &str) {
        assert_eq!(Cli::try_parse_from(argv).unwrap().log_level(), expected);
    }
}
