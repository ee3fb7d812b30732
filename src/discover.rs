use crate::cli::DiscoverArgs;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use seedmirror_config::Config;
use seedmirror_webseed::{DiscoveryReport, FetchReport, Providers, SkipPolicy, SkipRule, WebSeedOptions, WebSeeds};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Configured providers first, then the ones given on the command line.
pub fn providers(config: &Config, args: &DiscoverArgs) -> Providers {
    let configured = &config.providers;
    Providers {
        http: configured.http.iter().chain(&args.http).cloned().collect(),
        object_storage: configured.object_storage.iter().chain(&args.tokens).cloned().collect(),
        local: configured.local.iter().chain(&args.local).cloned().collect(),
    }
}

pub fn options(config: &Config, args: &DiscoverArgs) -> WebSeedOptions {
    WebSeedOptions {
        chain: config.chain.clone(),
        download_descriptors: config.descriptors.download && !args.no_download,
        max_descriptor_size: config.descriptors.max_size,
        skip: SkipPolicy::new(
            config.descriptors.skip.iter().map(|rule| SkipRule::new(rule.prefix.clone(), rule.suffixes.clone())),
        ),
    }
}

pub async fn run(config: Config, args: DiscoverArgs, cancel: CancellationToken) -> Result<()> {
    let providers = providers(&config, &args);
    let options = options(&config, &args);
    let snapshot_dir = match args.dir.or(config.snapshot_dir) {
        Some(dir) => Some(std::path::absolute(&dir).or_raise(|| ErrorKind::Setup("snapshot directory"))?),
        None => None,
    };

    let client = WebSeeds::http_client(Duration::from_secs(config.http.timeout_secs))
        .or_raise(|| ErrorKind::Setup("HTTP client"))?;
    let download = options.download_descriptors;
    let webseeds = WebSeeds::new(options, client);

    let discovery = webseeds.discover(&providers, &cancel).await;
    let fetched = match (&snapshot_dir, download) {
        (Some(dir), true) => Some(
            webseeds.fetch_missing(dir, &cancel).await.or_raise(|| ErrorKind::Setup("snapshot directory"))?,
        ),
        (None, true) => {
            info!("No snapshot directory configured, skipping descriptor downloads");
            None
        },
        (_, false) => None,
    };

    print!("{}", summary(&discovery, fetched.as_ref(), snapshot_dir));
    Ok(())
}

fn summary(discovery: &DiscoveryReport, fetched: Option<&FetchReport>, dir: Option<PathBuf>) -> String {
    let mut out = format!(
        "providers: {} ok, {} failed, {} not attempted\n\
         published: {} webseeds, {} descriptors ({} bad urls dropped)\n",
        discovery.succeeded,
        discovery.failed,
        discovery.cancelled,
        discovery.web_seeds,
        discovery.torrents,
        discovery.dropped_urls,
    );
    if let (Some(report), Some(dir)) = (fetched, dir) {
        out.push_str(&format!(
            "descriptors in {}: {} downloaded, {} present, {} skipped, {} failed, {} invalid, {} cancelled\n",
            dir.display(),
            report.downloaded,
            report.present,
            report.skipped,
            report.exhausted,
            report.invalid,
            report.cancelled,
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use seedmirror_config::SkipRuleConfig;
    use url::Url;

    fn args() -> DiscoverArgs {
        DiscoverArgs { dir: None, http: Vec::new(), tokens: Vec::new(), local: Vec::new(), no_download: false }
    }

    #[test]
    fn test_cli_providers_come_after_configured() {
        let mut config = Config::default();
        config.providers.http = vec![Url::parse("https://configured.example/webseeds.toml").unwrap()];
        config.providers.object_storage = vec!["v1:configured".to_string()];
        let args = DiscoverArgs {
            http: vec![Url::parse("https://flag.example/webseeds.toml").unwrap()],
            tokens: vec!["v1:flag".to_string()],
            local: vec![PathBuf::from("/tmp/webseeds.toml")],
            ..args()
        };

        let providers = providers(&config, &args);
        let hosts: Vec<_> = providers.http.iter().filter_map(Url::host_str).collect();
        assert_eq!(hosts, ["configured.example", "flag.example"]);
        assert_eq!(providers.object_storage, ["v1:configured", "v1:flag"]);
        assert_eq!(providers.local, [PathBuf::from("/tmp/webseeds.toml")]);
    }

    #[test]
    fn test_options_from_config() {
        let mut config = Config::default();
        config.chain = "gnosis".to_string();
        config.descriptors.skip = vec![SkipRuleConfig { prefix: "x".to_string(), suffixes: vec![".y".to_string()] }];

        let enabled = options(&config, &args());
        assert_eq!(enabled.chain, "gnosis");
        assert!(enabled.download_descriptors);
        assert_eq!(enabled.skip.rules(), [SkipRule::new("x", [".y"])]);

        let disabled = options(&config, &DiscoverArgs { no_download: true, ..args() });
        assert!(!disabled.download_descriptors);
    }

    #[test]
    fn test_summary() {
        let discovery = DiscoveryReport { succeeded: 2, failed: 1, web_seeds: 10, torrents: 4, ..Default::default() };
        let fetched = FetchReport { downloaded: 3, present: 1, ..Default::default() };
        let text = summary(&discovery, Some(&fetched), Some(PathBuf::from("/data")));
        assert!(text.contains("providers: 2 ok, 1 failed, 0 not attempted"));
        assert!(text.contains("published: 10 webseeds, 4 descriptors"));
        assert!(text.contains("descriptors in /data: 3 downloaded, 1 present"));

        let discovery_only = summary(&discovery, None, None);
        assert_eq!(discovery_only.lines().count(), 2);
    }
}
