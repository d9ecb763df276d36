//! Package normalization
//!
//! Turns raw registry documents into [`NormalizedPackage`] values: version
//! resolved from the `latest` dist-tag, keywords defaulted, and a best-effort
//! link derived from `homepage`, then `repository`, then the registry's own
//! package page.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashSet;
use url::Url;

/// Keys starting with this character are registry metadata, not packages.
pub const METADATA_SENTINEL: char = '_';

/// Default prefix for the fallback package page link.
pub const DEFAULT_WEBSITE_BASE: &str = "https://npmjs.org/package/";

/// The watcher's canonical view of a registry package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedPackage {
    /// Package name
    pub name: String,
    /// Version pointed to by the `latest` dist-tag
    pub version: String,
    /// Keywords in registry order
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Best link for the package
    pub url: String,
    /// Package description, empty when absent
    #[serde(default)]
    pub description: String,
}

impl NormalizedPackage {
    /// Identity key used for dedup: `name@version`.
    ///
    /// # Examples
    ///
    /// ```
    /// use pkgcaster::watcher::NormalizedPackage;
    ///
    /// let pkg = NormalizedPackage {
    ///     name: "foo".to_string(),
    ///     version: "1.0.0".to_string(),
    ///     keywords: vec![],
    ///     url: "http://x.com".to_string(),
    ///     description: String::new(),
    /// };
    /// assert_eq!(pkg.identity_key(), "foo@1.0.0");
    /// ```
    pub fn identity_key(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

/// Whether a top-level response key is metadata rather than a package.
pub fn is_metadata_key(key: &str) -> bool {
    key.starts_with(METADATA_SENTINEL)
}

/// Normalize one registry document.
///
/// Returns `None` when the document is not an object or has no `latest`
/// dist-tag, since such an entry cannot be announced.
///
/// # Arguments
///
/// * `key` - The response key the document was found under
/// * `doc` - The raw package document
/// * `website_base` - Prefix of the fallback package page link
pub fn normalize(key: &str, doc: &JsonValue, website_base: &str) -> Option<NormalizedPackage> {
    let obj = doc.as_object()?;

    let version = obj
        .get("dist-tags")
        .and_then(|tags| tags.get("latest"))
        .and_then(JsonValue::as_str)?
        .to_string();

    let name = obj
        .get("name")
        .and_then(JsonValue::as_str)
        .filter(|n| !n.is_empty())
        .unwrap_or(key)
        .to_string();

    let description = obj
        .get("description")
        .and_then(JsonValue::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();

    Some(NormalizedPackage {
        url: best_url(obj, &name, website_base),
        keywords: keywords_of(obj),
        name,
        version,
        description,
    })
}

// Older packages publish keywords as a single comma separated string.
fn keywords_of(obj: &Map<String, JsonValue>) -> Vec<String> {
    match obj.get("keywords") {
        Some(JsonValue::Array(items)) => items
            .iter()
            .filter_map(JsonValue::as_str)
            .map(str::to_string)
            .collect(),
        Some(JsonValue::String(s)) => s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Pick the best link for a package.
///
/// Order of preference:
/// 1. `homepage`, if it is an http(s) URL
/// 2. `repository.url` (or a bare `repository` string), with git short
///    forms rewritten to a web address
/// 3. `<website_base><name>`
///
/// Never fails; anything unusable falls through to the package page.
///
/// # Examples
///
/// ```
/// use pkgcaster::watcher::package::best_url;
/// use serde_json::json;
///
/// let doc = json!({"repository": {"url": "git://github.com/gulpjs/gulp.git"}});
/// let url = best_url(doc.as_object().unwrap(), "gulp", "https://npmjs.org/package/");
/// assert_eq!(url, "https://github.com/gulpjs/gulp");
///
/// let url = best_url(&Default::default(), "gulp", "https://npmjs.org/package/");
/// assert_eq!(url, "https://npmjs.org/package/gulp");
/// ```
pub fn best_url(obj: &Map<String, JsonValue>, name: &str, website_base: &str) -> String {
    if let Some(homepage) = obj.get("homepage").and_then(JsonValue::as_str) {
        let homepage = homepage.trim();
        if is_web_url(homepage) {
            return homepage.to_string();
        }
    }

    let repository = match obj.get("repository") {
        Some(JsonValue::Object(repo)) => repo.get("url").and_then(JsonValue::as_str),
        Some(JsonValue::String(repo)) => Some(repo.as_str()),
        _ => None,
    };

    if let Some(url) = repository.and_then(normalize_repository_url) {
        if is_web_url(&url) {
            return url;
        }
    }

    format!("{}{}", website_base, name)
}

/// Whether `s` parses as an absolute http or https URL.
pub fn is_web_url(s: &str) -> bool {
    Url::parse(s)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

const KNOWN_FORGES: [(&str, &str); 3] = [
    ("github", "github.com"),
    ("gitlab", "gitlab.com"),
    ("bitbucket", "bitbucket.org"),
];

/// Rewrite a repository URL into a browsable web address.
///
/// Handles `git+` prefixes, `git://`, `ssh://`, scp-style `git@host:owner/repo`,
/// `github:`/`gitlab:`/`bitbucket:`/`gist:` shorthands, bare `owner/repo`
/// (GitHub), and trailing `.git`. Plain http(s) URLs on other hosts are kept.
/// Returns `None` for anything that cannot be turned into a web address.
///
/// # Examples
///
/// ```
/// use pkgcaster::watcher::package::normalize_repository_url;
///
/// assert_eq!(
///     normalize_repository_url("git@github.com:gulpjs/gulp.git").as_deref(),
///     Some("https://github.com/gulpjs/gulp")
/// );
/// assert_eq!(
///     normalize_repository_url("gitlab:group/project").as_deref(),
///     Some("https://gitlab.com/group/project")
/// );
/// assert_eq!(normalize_repository_url("svn"), None);
/// ```
pub fn normalize_repository_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let raw = raw.strip_prefix("git+").unwrap_or(raw);
    if raw.is_empty() {
        return None;
    }

    if let Some(id) = raw.strip_prefix("gist:") {
        return web_address("gist.github.com", id);
    }

    for (shorthand, host) in KNOWN_FORGES {
        if let Some(rest) = raw
            .strip_prefix(shorthand)
            .and_then(|r| r.strip_prefix(':'))
        {
            if !rest.starts_with("//") {
                return web_address(host, rest);
            }
        }
    }

    if raw.contains("://") {
        let url = Url::parse(raw).ok()?;
        let host = url.host_str()?.to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
        if KNOWN_FORGES.iter().any(|(_, h)| *h == host) || host == "gist.github.com" {
            return web_address(&host, url.path());
        }
        if matches!(url.scheme(), "http" | "https") {
            let cleaned = raw.trim_end_matches('/');
            return Some(cleaned.strip_suffix(".git").unwrap_or(cleaned).to_string());
        }
        return None;
    }

    // scp-like: [user@]host:owner/repo
    if let Some((left, path)) = raw.split_once(':') {
        let host = left.rsplit('@').next().unwrap_or(left);
        if host.contains('.') && !path.is_empty() {
            return web_address(&host.to_ascii_lowercase(), path);
        }
        return None;
    }

    // bare owner/repo shorthand resolves to GitHub
    let mut parts = raw.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(repo), None)
            if is_slug(owner) && is_slug(repo.strip_suffix(".git").unwrap_or(repo)) =>
        {
            web_address("github.com", raw)
        }
        _ => None,
    }
}

fn is_slug(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn web_address(host: &str, path: &str) -> Option<String> {
    let path = path.split(['#', '?']).next().unwrap_or_default();
    let path = path.trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    if path.is_empty() || path.contains(char::is_whitespace) {
        return None;
    }
    Some(format!("https://{}/{}", host, path))
}

/// Keywords a filter accepts: one keyword or a list of them.
pub trait KeywordSet {
    /// Every keyword, lowercased.
    fn lowercase_set(&self) -> HashSet<String>;
}

impl KeywordSet for str {
    fn lowercase_set(&self) -> HashSet<String> {
        HashSet::from([self.to_lowercase()])
    }
}

impl KeywordSet for String {
    fn lowercase_set(&self) -> HashSet<String> {
        self.as_str().lowercase_set()
    }
}

impl<S: AsRef<str>> KeywordSet for [S] {
    fn lowercase_set(&self) -> HashSet<String> {
        self.iter().map(|w| w.as_ref().to_lowercase()).collect()
    }
}

impl<S: AsRef<str>, const N: usize> KeywordSet for [S; N] {
    fn lowercase_set(&self) -> HashSet<String> {
        self.as_slice().lowercase_set()
    }
}

impl<S: AsRef<str>> KeywordSet for Vec<S> {
    fn lowercase_set(&self) -> HashSet<String> {
        self.as_slice().lowercase_set()
    }
}

impl<T: KeywordSet + ?Sized> KeywordSet for &T {
    fn lowercase_set(&self) -> HashSet<String> {
        (**self).lowercase_set()
    }
}

/// Case-insensitive keyword intersection test.
///
/// Returns `true` when at least one of `keywords` appears in `wanted`. A
/// single keyword counts as a one-element set.
///
/// # Examples
///
/// ```
/// use pkgcaster::watcher::keyword_filter;
///
/// let keywords = vec!["Gulp".to_string(), "stream".to_string()];
/// assert!(keyword_filter(&keywords, ["gulpplugin", "GULP"]));
/// assert!(keyword_filter(&keywords, "stream"));
/// assert!(!keyword_filter(&keywords, "grunt"));
/// ```
pub fn keyword_filter<K: KeywordSet>(keywords: &[String], wanted: K) -> bool {
    let wanted = wanted.lowercase_set();
    keywords
        .iter()
        .any(|k| wanted.contains(&k.to_lowercase()))
}
