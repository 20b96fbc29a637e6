//! Recorded calls as returned by a feed's call listing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::null_as_default;

/// One recorded transmission on a scanner feed.
///
/// Identity is the upstream `_id`. Two records with the same id are the same
/// logical call, whatever their other fields say.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    /// Upstream identity
    #[serde(rename = "_id")]
    pub id: String,

    /// Where the recording can be downloaded from
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,

    /// Upstream file name of the recording
    #[serde(default, deserialize_with = "null_as_default")]
    pub filename: String,

    /// Recording time, passed through as-is
    #[serde(default, deserialize_with = "null_as_default")]
    pub time: String,
}

impl Call {
    /// Create a call with just an identity and an audio URL
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        let filename = url.rsplit('/').next().unwrap_or_default().to_string();
        Self {
            id: id.into(),
            url,
            filename,
            time: String::new(),
        }
    }

    /// Best-effort parse of the recording time.
    ///
    /// The raw `time` string is never rewritten; this is only used for log output.
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.time)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Local file name to store the download under.
    ///
    /// Only the final path component of `filename` is used. Falls back to the
    /// URL's last segment, then to the call id.
    pub fn local_file_name(&self) -> String {
        let from_filename = base_name(&self.filename);
        if !from_filename.is_empty() {
            return from_filename.to_string();
        }

        let from_url = base_name(self.url.split(['?', '#']).next().unwrap_or_default());
        if !from_url.is_empty() {
            return from_url.to_string();
        }

        format!("{}.m4a", self.id)
    }
}

impl PartialEq for Call {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Call {}

fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|name| *name != "." && *name != "..")
        .unwrap_or_default()
}

/// Body of `GET /{shortName}/calls`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallsResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub calls: Vec<Call>,
}
