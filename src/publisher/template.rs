//! Outbound message templates
//!
//! Templates interpolate package fields with `${field}` placeholders, e.g.
//! `"${name} (${version}): ${url} ${description}"`. Unknown fields are
//! rejected when the template is compiled, not when a package is rendered.

use crate::watcher::NormalizedPackage;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors raised while compiling or rendering a message template.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Placeholder names a field packages do not have
    #[error("Unknown template field: {0}")]
    UnknownField(String),

    /// `${` without a closing brace
    #[error("Unterminated placeholder at byte {0}")]
    Unterminated(usize),

    /// Rendering produced nothing but whitespace
    #[error("Rendered message is empty")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    Version,
    Url,
    Description,
    Keywords,
}

impl Field {
    fn parse(raw: &str) -> Result<Self, FormatError> {
        match raw.trim() {
            "name" => Ok(Field::Name),
            "version" => Ok(Field::Version),
            "url" => Ok(Field::Url),
            "description" => Ok(Field::Description),
            "keywords" => Ok(Field::Keywords),
            other => Err(FormatError::UnknownField(other.to_string())),
        }
    }

    fn value(self, pkg: &NormalizedPackage) -> String {
        match self {
            Field::Name => pkg.name.clone(),
            Field::Version => pkg.version.clone(),
            Field::Url => pkg.url.clone(),
            Field::Description => pkg.description.clone(),
            Field::Keywords => pkg.keywords.join(", "),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field),
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\$\{([^}]*)\}").expect("placeholder pattern is a valid regex")
    })
}

/// Compiled message template.
///
/// # Examples
///
/// ```
/// use pkgcaster::publisher::MessageTemplate;
/// use pkgcaster::watcher::NormalizedPackage;
///
/// let template = MessageTemplate::compile("${name}@${version}").unwrap();
/// let pkg = NormalizedPackage {
///     name: "foo".to_string(),
///     version: "1.0.0".to_string(),
///     keywords: vec![],
///     url: "https://npmjs.org/package/foo".to_string(),
///     description: String::new(),
/// };
/// assert_eq!(template.render(&pkg), "foo@1.0.0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl MessageTemplate {
    /// Parse `source` into literal text and field placeholders.
    ///
    /// # Errors
    ///
    /// Returns `FormatError::UnknownField` for a placeholder that is not one
    /// of `name`, `version`, `url`, `description` or `keywords`, and
    /// `FormatError::Unterminated` for a `${` that is never closed.
    pub fn compile(source: &str) -> Result<Self, FormatError> {
        let mut segments = Vec::new();
        let mut cursor = 0;

        for captures in placeholder_regex().captures_iter(source) {
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            if whole.start() > cursor {
                segments.push(Segment::Literal(source[cursor..whole.start()].to_string()));
            }
            segments.push(Segment::Field(Field::parse(name.as_str())?));
            cursor = whole.end();
        }

        let tail = &source[cursor..];
        if let Some(offset) = tail.find("${") {
            return Err(FormatError::Unterminated(cursor + offset));
        }
        if !tail.is_empty() {
            segments.push(Segment::Literal(tail.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Template text as configured.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Interpolate `pkg` into the template. Missing values render empty.
    pub fn render(&self, pkg: &NormalizedPackage) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.clone(),
                Segment::Field(field) => field.value(pkg),
            })
            .collect()
    }
}

/// Trim `text` and fit it into `limit` characters.
///
/// Text that already fits is returned trimmed. Longer text is cut to
/// `limit - marker` characters, trimmed again and suffixed with `marker`,
/// so the result is never longer than `limit`. A marker that does not fit
/// is itself cut to `limit` characters and replaces the whole text.
///
/// # Examples
///
/// ```
/// use pkgcaster::publisher::truncate_message;
///
/// assert_eq!(truncate_message("  short  ", 10, "..."), "short");
/// assert_eq!(truncate_message("abcdefghijkl", 10, "..."), "abcdefg...");
/// assert_eq!(truncate_message("abcdefghijkl", 2, "..."), "..");
/// ```
pub fn truncate_message(text: &str, limit: usize, marker: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= limit {
        return text.to_string();
    }

    let marker: String = marker.chars().take(limit).collect();
    let keep = limit - marker.chars().count();
    let head: String = text.chars().take(keep).collect();
    format!("{}{}", head.trim_end(), marker)
}
