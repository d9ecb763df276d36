//! Command handlers for pkgcaster
//!
//! Each CLI subcommand is implemented in its own submodule and receives the
//! fully loaded and validated [`Config`].

use crate::config::Config;
use crate::error::{PkgcasterError, Result};
use crate::watcher::NormalizedPackage;

/// Watch command: run the registry-to-feed bridge until Ctrl-C
pub mod watch {
    use super::*;
    use crate::publisher::{FeedError, HttpFeedPoster, Publisher, PublisherOptions, SledDedupStore};
    use crate::registry::HttpRegistry;
    use crate::watcher::{
        Blocklist, FileCheckpointStore, PackageFilter, WatchEvent, Watcher, WatcherOptions,
    };
    use reqwest::Client;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tracing::info;

    /// Start the watcher and, unless `dry_run`, the publisher.
    ///
    /// The blocklist is fetched once here and kept for the whole run. In dry
    /// run mode matches are only logged: nothing is recorded or posted.
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `dry_run` - Log matches without announcing them
    ///
    /// # Errors
    ///
    /// Returns error if the filter, store or feed client cannot be set up
    pub async fn run_watch(config: Config, dry_run: bool) -> Result<()> {
        let timeout = Duration::from_secs(config.registry.timeout_secs);

        let blocklist = match &config.filter.blocklist_url {
            Some(url) => {
                let client = Client::builder().timeout(timeout).build()?;
                Blocklist::fetch_or_empty(&client, url).await
            }
            None => Blocklist::empty(),
        };

        let filter = PackageFilter::new(config.filter.clone(), blocklist)?;
        info!(filter = %filter.summary(), "Package filter ready");

        let registry = Arc::new(HttpRegistry::new(timeout)?);
        let checkpoints = Arc::new(FileCheckpointStore::new(&config.registry.checkpoint_file));
        let options = WatcherOptions::from_config(&config.registry)?;

        let mut watcher = Watcher::new(options, registry, checkpoints)
            .await
            .with_filter(filter.into_predicate());
        let events = watcher.subscribe();

        if dry_run {
            info!("Dry run: matches are logged, nothing is announced");
            let handle = watcher.spawn();
            let logger = tokio::spawn(log_matches(events));

            tokio::signal::ctrl_c().await?;
            info!("Shutdown requested");
            handle.shutdown().await;
            let logged = logger.await?;
            info!(matches = logged, "Dry run finished");
            return Ok(());
        }

        let store = Arc::new(SledDedupStore::new(&config.publisher.store_path)?);
        let feed = Arc::new(HttpFeedPoster::new(&config.publisher.feed).map_err(|e| match e {
            FeedError::MissingCredentials => anyhow::Error::from(
                PkgcasterError::MissingCredentials(
                    "set PKGCASTER_FEED_TOKEN or publisher.feed.bearer_token".to_string(),
                ),
            ),
            other => other.into(),
        })?);
        let publisher = Arc::new(Publisher::new(
            PublisherOptions::from_config(&config.publisher),
            store,
            feed,
        )?);

        info!(
            store = %config.publisher.store_path.display(),
            "Publisher ready"
        );

        let handle = watcher.spawn();
        let publishing = tokio::spawn(publisher.run(events));

        tokio::signal::ctrl_c().await?;
        info!("Shutdown requested");
        handle.shutdown().await;

        // The watcher task owned the event senders, so the publisher drains
        // what is left and stops.
        let stats = publishing.await?;
        info!(
            posted = stats.posted,
            skipped = stats.skipped,
            failed = stats.failed,
            "Watch finished"
        );
        Ok(())
    }

    /// Log every matching package until the channel closes.
    ///
    /// Returns the number of packages logged.
    pub async fn log_matches(mut events: mpsc::UnboundedReceiver<WatchEvent>) -> usize {
        let mut logged = 0;
        while let Some(event) = events.recv().await {
            if let WatchEvent::Item(pkg) = event {
                info!(
                    package = %pkg.name,
                    version = %pkg.version,
                    url = %pkg.url,
                    "Would announce"
                );
                logged += 1;
            }
        }
        logged
    }

}

/// Render command: preview the announcement for a package
pub mod render {
    use super::*;
    use crate::publisher::{MessageFormatter, PublisherOptions};

    /// Split `name@version`, keeping a leading scope `@` in the name.
    ///
    /// # Errors
    ///
    /// Returns `PkgcasterError::Config` if either part is missing
    pub fn parse_package_spec(spec: &str) -> Result<(String, String)> {
        match spec.rsplit_once('@') {
            Some((name, version)) if !name.is_empty() && !version.is_empty() => {
                Ok((name.to_string(), version.to_string()))
            }
            _ => Err(PkgcasterError::Config(format!(
                "Expected a package as name@version, got '{}'",
                spec
            ))
            .into()),
        }
    }

    /// Render the message `package` would be announced with.
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration
    /// * `package` - Package as `name@version`
    /// * `description` - Optional package description
    /// * `url` - Optional link; defaults to the registry package page
    /// * `marker` - Optional truncation marker override
    ///
    /// # Errors
    ///
    /// Returns error if the package spec or the template is invalid, or the
    /// message renders empty
    pub fn render_message(
        config: &Config,
        package: &str,
        description: Option<String>,
        url: Option<String>,
        marker: Option<String>,
    ) -> Result<String> {
        let (name, version) = parse_package_spec(package)?;
        let url = url.unwrap_or_else(|| format!("{}{}", config.registry.website_base, name));
        let pkg = NormalizedPackage {
            name,
            version,
            keywords: Vec::new(),
            url,
            description: description.unwrap_or_default(),
        };

        let formatter = MessageFormatter::new(&PublisherOptions::from_config(&config.publisher))
            .map_err(|e| PkgcasterError::Format(e.to_string()))?;
        let message = formatter
            .format(&pkg, marker.as_deref())
            .map_err(|e| PkgcasterError::Format(e.to_string()))?;
        Ok(message)
    }

}
