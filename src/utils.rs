//! Utility functions for request building, error formatting and file naming

use regex::Regex;
use std::sync::OnceLock;

/// Render an error followed by every error in its `source()` chain
///
/// The first line is the error itself; each cause is appended on its own
/// line prefixed with `Caused by: `, unless the error above it already
/// printed the cause's text. This is the text stored in ERROR log entries
/// after the human-readable summary.
pub fn format_error_chain(error: &dyn std::error::Error) -> String {
    let mut previous = error.to_string();
    let mut out = previous.clone();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !previous.contains(&text) {
            out.push_str("\nCaused by: ");
            out.push_str(&text);
        }
        previous = text;
        source = cause.source();
    }
    out
}

/// Host name to send in the `Host` header: the host with one leading
/// `https://` or `http://` removed
///
/// ```
/// use vripper_engine::utils::strip_scheme;
///
/// assert_eq!(strip_scheme("https://vipergirls.to"), "vipergirls.to");
/// assert_eq!(strip_scheme("http://example.com"), "example.com");
/// assert_eq!(strip_scheme("example.com"), "example.com");
/// ```
pub fn strip_scheme(host: &str) -> &str {
    host.strip_prefix("https://")
        .or_else(|| host.strip_prefix("http://"))
        .unwrap_or(host)
}

/// Encode fields as an `application/x-www-form-urlencoded` body, keeping
/// their order
pub fn form_urlencode(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(name, value)| {
            format!(
                "{}={}",
                urlencoding::encode(name),
                urlencoding::encode(value)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // the pattern is a literal and always compiles
    #[allow(clippy::expect_used)]
    RE.get_or_init(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("valid regex"))
}

/// Replace characters that are invalid in file names on common platforms
///
/// Leading and trailing dots and whitespace are trimmed. An empty result
/// becomes `"untitled"`.
pub fn sanitize_file_name(name: &str) -> String {
    let replaced = unsafe_chars().replace_all(name, "_");
    let trimmed = replaced.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Last path segment of a URL, or `fallback` when there is none
pub fn file_name_from_url(url: &str, fallback: &str) -> String {
    if let Ok(parsed_url) = url::Url::parse(url)
        && let Some(mut segments) = parsed_url.path_segments()
        && let Some(last_segment) = segments.next_back()
        && !last_segment.is_empty()
    {
        let decoded = urlencoding::decode(last_segment)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| last_segment.to_string());
        return sanitize_file_name(&decoded);
    }
    fallback.to_string()
}

/// Image format detected from the first bytes of a file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageKind {
    /// JPEG (`FF D8 FF`)
    Jpeg,
    /// PNG (`89 50 4E 47 0D 0A 1A 0A`)
    Png,
}

impl ImageKind {
    /// Detect the format from magic bytes
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageKind::Jpeg)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ImageKind::Png)
        } else {
            None
        }
    }

    /// Canonical file extension
    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
        }
    }

    /// Whether `ext` is already an accepted extension for this format
    fn accepts(&self, ext: &str) -> bool {
        match self {
            ImageKind::Jpeg => matches!(ext, "jpg" | "jpeg" | "jpe"),
            ImageKind::Png => ext == "png",
        }
    }
}

/// File name with its extension corrected to match `kind`
///
/// A name whose extension already fits is returned unchanged; otherwise the
/// canonical extension is appended.
pub fn with_image_extension(name: &str, kind: ImageKind) -> String {
    let ext = std::path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext {
        Some(ext) if kind.accepts(&ext) => name.to_string(),
        _ => format!("{}.{}", name, kind.extension()),
    }
}
