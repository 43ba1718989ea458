//! Final file name resolution
//!
//! Precedence: `filename` from `Content-Disposition`, then the last path
//! segment of the source URL, then a generated placeholder.

use reqwest::Url;
use uuid::Uuid;

const FILENAME_PARAM: &str = "filename=";

/// Name derived from the source URL alone, before any request is made.
///
/// Query string and fragment never take part; a URL whose path ends in `/`
/// has no candidate.
pub fn candidate_name(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .next_back()
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
}

/// Placeholder used when neither the headers nor the URL carry a name.
pub fn generated_name() -> String {
    format!("file-{}", Uuid::new_v4())
}

/// Whether a `Content-Disposition` value carries a `filename=` parameter.
pub fn has_filename_param(disposition: &str) -> bool {
    disposition.to_ascii_lowercase().contains(FILENAME_PARAM)
}

/// Extract the `filename` parameter of a `Content-Disposition` value.
///
/// Quoted values are taken up to the closing quote; bare tokens run to the
/// next `;`. Empty values yield `None`.
pub fn filename_from_disposition(disposition: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets aligned with the original.
    let start = disposition.to_ascii_lowercase().find(FILENAME_PARAM)? + FILENAME_PARAM.len();
    let rest = &disposition[start..];

    let value = match rest.strip_prefix('"') {
        Some(quoted) => &quoted[..quoted.find('"')?],
        None => rest.split(';').next().unwrap_or_default().trim(),
    };

    (!value.is_empty()).then(|| value.to_string())
}

/// Apply the full precedence chain.
pub fn resolve_name(disposition: Option<&str>, candidate: Option<String>) -> String {
    disposition
        .and_then(filename_from_disposition)
        .or(candidate)
        .unwrap_or_else(generated_name)
}
