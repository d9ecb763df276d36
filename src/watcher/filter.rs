//! Package filtering
//!
//! The watcher applies a [`PackagePredicate`] to every normalized package in
//! a tick. [`PackageFilter`] is the configuration-driven predicate used by
//! the CLI; library callers can pass any closure instead.

use super::blocklist::Blocklist;
use super::package::{keyword_filter, NormalizedPackage};
use crate::config::FilterConfig;
use anyhow::Result;
use regex::{Regex, RegexBuilder};
use std::sync::Arc;

/// Pure, deterministic test applied to each candidate package.
pub type PackagePredicate = Arc<dyn Fn(&NormalizedPackage) -> bool + Send + Sync>;

/// Predicate that accepts every package.
pub fn accept_all() -> PackagePredicate {
    Arc::new(|_: &NormalizedPackage| true)
}

/// Configuration-driven package filter.
///
/// A package passes when it is not blocklisted and either its name matches
/// the name pattern or one of its keywords is wanted. With no pattern and no
/// keywords configured, every non-blocklisted package passes.
#[derive(Clone)]
pub struct PackageFilter {
    config: FilterConfig,
    name_regex: Option<Arc<Regex>>,
    blocklist: Blocklist,
}

impl PackageFilter {
    /// Create a new package filter from configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Filter configuration
    /// * `blocklist` - Names that never pass
    ///
    /// # Returns
    ///
    /// Returns the filter or error if the name pattern does not compile
    ///
    /// # Examples
    ///
    /// ```
    /// use pkgcaster::config::FilterConfig;
    /// use pkgcaster::watcher::{Blocklist, PackageFilter};
    ///
    /// let config = FilterConfig {
    ///     name_pattern: Some("^gulp-".to_string()),
    ///     keywords: vec!["gulpplugin".to_string()],
    ///     blocklist_url: None,
    /// };
    ///
    /// let filter = PackageFilter::new(config, Blocklist::empty());
    /// assert!(filter.is_ok());
    /// ```
    pub fn new(config: FilterConfig, blocklist: Blocklist) -> Result<Self> {
        let name_regex = match &config.name_pattern {
            Some(pattern) => Some(Arc::new(
                RegexBuilder::new(pattern).case_insensitive(true).build()?,
            )),
            None => None,
        };

        Ok(Self {
            config,
            name_regex,
            blocklist,
        })
    }

    /// Check if a package should be announced.
    pub fn matches(&self, pkg: &NormalizedPackage) -> bool {
        if self.blocklist.contains(&pkg.name) {
            return false;
        }

        if self.name_regex.is_none() && self.config.keywords.is_empty() {
            return true;
        }

        if let Some(regex) = &self.name_regex {
            if regex.is_match(&pkg.name) {
                return true;
            }
        }

        keyword_filter(&pkg.keywords, &self.config.keywords)
    }

    /// Get filter summary for logging.
    ///
    /// # Examples
    ///
    /// ```
    /// use pkgcaster::config::FilterConfig;
    /// use pkgcaster::watcher::{Blocklist, PackageFilter};
    ///
    /// let config = FilterConfig {
    ///     name_pattern: Some("^gulp-".to_string()),
    ///     keywords: vec!["gulp".to_string(), "gulpplugin".to_string()],
    ///     blocklist_url: None,
    /// };
    ///
    /// let filter = PackageFilter::new(config, Blocklist::empty()).unwrap();
    /// let summary = filter.summary();
    /// assert!(summary.contains("name~^gulp-"));
    /// assert!(summary.contains("keywords=gulp,gulpplugin"));
    /// ```
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if let Some(pattern) = &self.config.name_pattern {
            parts.push(format!("name~{}", pattern));
        }

        if !self.config.keywords.is_empty() {
            parts.push(format!("keywords={}", self.config.keywords.join(",")));
        }

        if !self.blocklist.is_empty() {
            parts.push(format!("blocked={}", self.blocklist.len()));
        }

        if parts.is_empty() {
            "no filters (all packages)".to_string()
        } else {
            parts.join(", ")
        }
    }

    /// Convert into a predicate the watcher can own.
    pub fn into_predicate(self) -> PackagePredicate {
        Arc::new(move |pkg: &NormalizedPackage| self.matches(pkg))
    }
}
