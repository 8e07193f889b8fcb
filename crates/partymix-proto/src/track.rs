//! Queue entries and display metadata.
//!
//! The server only ships the track URL plus bookkeeping. Title and artist are
//! derived on demand from the URL path by [`parse_track_details`], a pure
//! function that never touches session state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use url::Url;

/// Title shown when a track URL cannot be parsed.
pub const UNKNOWN_TITLE: &str = "Unknown title";

/// Artist shown when a track URL cannot be parsed.
pub const UNKNOWN_ARTIST: &str = "Unknown artist";

/// Host whose URLs carry `/<artist>/<title>` paths.
const TRACK_HOST: &str = "soundcloud.com";

/// Playback status of a queue entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackStatus {
    /// Currently playing.
    Playing,
    /// Waiting in the queue. Also used for statuses this client does not know.
    #[default]
    #[serde(other)]
    Pending,
}

impl TrackStatus {
    /// Lenient conversion from a raw JSON value. Null, missing, or unknown
    /// values are pending.
    fn from_value(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            Some(status) if status.eq_ignore_ascii_case("playing") => Self::Playing,
            _ => Self::Pending,
        }
    }
}

/// A queue entry as pushed by the server.
///
/// Older servers send bare URL strings instead of objects; those decode as a
/// pending track with no timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Link submitted by a participant.
    pub url: String,
    /// When the server accepted the submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
    /// Playback status.
    pub status: TrackStatus,
}

impl Track {
    /// Pending track with no timestamp.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), added_at: None, status: TrackStatus::Pending }
    }

    /// Title and artist derived from the URL.
    #[must_use]
    pub fn details(&self) -> TrackDetails {
        parse_track_details(&self.url)
    }
}

impl<'de> Deserialize<'de> for Track {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Only the URL is load-bearing. Bookkeeping fields that fail to
        // parse are dropped so one odd entry cannot reject a whole queue.
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Entry {
            url: String,
            #[serde(default)]
            added_at: Option<Value>,
            #[serde(default)]
            status: Option<Value>,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Url(String),
            Entry(Entry),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Url(url) => Self::new(url),
            Repr::Entry(Entry { url, added_at, status }) => Self {
                added_at: added_at.as_ref().and_then(parse_timestamp),
                status: TrackStatus::from_value(status.as_ref()),
                url,
            },
        })
    }
}

/// Accepts RFC 3339 text or epoch milliseconds. Anything else is `None`.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let parsed = match value {
        Value::Null => return None,
        Value::String(text) => {
            DateTime::parse_from_rfc3339(text).ok().map(|ts| ts.with_timezone(&Utc))
        },
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|ms| ms.is_finite()).map(|ms| ms.trunc() as i64))
            .and_then(DateTime::from_timestamp_millis),
        Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    };

    if parsed.is_none() {
        tracing::debug!(%value, "ignoring unparseable track timestamp");
    }
    parsed
}

/// Display metadata derived from a track URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackDetails {
    /// Humanized artist path segment.
    pub artist: String,
    /// Humanized title path segment.
    pub title: String,
}

impl TrackDetails {
    /// The sentinel pair used when the URL does not match.
    #[must_use]
    pub fn unknown() -> Self {
        Self { artist: UNKNOWN_ARTIST.to_owned(), title: UNKNOWN_TITLE.to_owned() }
    }

    /// `true` if these are the sentinel values.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.artist == UNKNOWN_ARTIST && self.title == UNKNOWN_TITLE
    }
}

/// Derive artist and title from a track URL.
///
/// Takes the two path segments following the host and replaces `-` with a
/// space. The query string and fragment are ignored, and a missing scheme is
/// tolerated. Anything that is not a `soundcloud.com` URL with at least two
/// path segments yields [`TrackDetails::unknown`].
///
/// ```
/// use partymix_proto::parse_track_details;
///
/// let details = parse_track_details("https://soundcloud.com/artist-name/song-title?x=1");
/// assert_eq!(details.artist, "artist name");
/// assert_eq!(details.title, "song title");
/// ```
#[must_use]
pub fn parse_track_details(raw: &str) -> TrackDetails {
    extract_details(raw.trim()).unwrap_or_else(TrackDetails::unknown)
}

fn extract_details(raw: &str) -> Option<TrackDetails> {
    let url = parse_lenient(raw)?;
    let host = url.host_str()?.to_ascii_lowercase();
    if host != TRACK_HOST && !host.ends_with(&format!(".{TRACK_HOST}")) {
        return None;
    }

    let mut segments = url.path_segments()?.filter(|segment| !segment.is_empty());
    let artist = humanize(segments.next()?);
    let title = humanize(segments.next()?);
    if artist.is_empty() || title.is_empty() {
        return None;
    }

    Some(TrackDetails { artist, title })
}

fn parse_lenient(raw: &str) -> Option<Url> {
    match Url::parse(raw) {
        Ok(url) if url.has_host() => Some(url),
        Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("https://{raw}")).ok()
        },
        Err(_) => None,
    }
}

fn humanize(segment: &str) -> String {
    segment.replace('-', " ").trim().to_owned()
}
