//! Entity normalizer
//!
//! Turns a raw listening-session record into the canonical rows the store
//! writes: the session itself plus whichever of user, device and library item
//! the record carries. Everything here is pure; the only fallible step is
//! [`decode_session`].

mod raw;

pub use raw::{RawContributor, RawDeviceInfo, RawMediaMetadata, RawSession, RawUser};

use chrono::{DateTime, Datelike, Utc};
use serde_json::Value;
use tracing::debug;

use crate::error::NormalizeError;

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: String,
    pub client_name: Option<String>,
    pub device_name: Option<String>,
    pub model: Option<String>,
    pub manufacturer: Option<String>,
    pub client_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LibraryItem {
    pub id: String,
    pub library_id: Option<String>,
    pub media_type: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    /// Single author, or contributors joined with ", "
    pub author: Option<String>,
    pub narrators: Vec<String>,
    pub description: Option<String>,
    pub genres: Vec<String>,
    pub release_date: Option<String>,
    pub published_year: Option<String>,
    pub feed_url: Option<String>,
    pub image_url: Option<String>,
    pub explicit: Option<bool>,
    pub language: Option<String>,
    pub publisher: Option<String>,
    pub isbn: Option<String>,
    pub asin: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListeningSessionRow {
    pub id: String,
    pub user_id: Option<String>,
    pub library_item_id: Option<String>,
    pub episode_id: Option<String>,
    pub device_id: Option<String>,
    pub display_title: Option<String>,
    pub display_author: Option<String>,
    /// Seconds
    pub duration: Option<f64>,
    pub time_listening: Option<f64>,
    pub start_offset: Option<f64>,
    pub media_progress: Option<f64>,
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub date_log: Option<String>,
    pub day_of_week: Option<String>,
}

/// Everything one record writes
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub session: ListeningSessionRow,
    pub user: Option<User>,
    pub device: Option<Device>,
    pub library_item: Option<LibraryItem>,
}

/// Decode a raw record into its typed schema
pub fn decode_session(value: Value) -> Result<RawSession, NormalizeError> {
    let raw: RawSession = serde_json::from_value(value)?;
    if raw.id.trim().is_empty() {
        return Err(NormalizeError::MissingId);
    }
    if !raw.extra.is_empty() {
        debug!(
            session_id = %raw.id,
            unmapped = ?raw.extra.keys().collect::<Vec<_>>(),
            "ignoring unmapped session fields"
        );
    }
    Ok(raw)
}

pub fn normalize_record(raw: &RawSession) -> NormalizedRecord {
    NormalizedRecord {
        session: normalize_session(raw),
        user: raw.user.as_ref().and_then(normalize_user),
        device: raw.device_info.as_ref().and_then(normalize_device),
        library_item: normalize_library_item(raw),
    }
}

pub fn normalize_user(raw: &RawUser) -> Option<User> {
    Some(User {
        id: non_blank(raw.id.clone())?,
        username: raw.username.clone(),
    })
}

pub fn normalize_device(raw: &RawDeviceInfo) -> Option<Device> {
    Some(Device {
        id: non_blank(raw.id.clone())?,
        client_name: raw.client_name.clone(),
        device_name: raw.device_name.clone(),
        model: raw.model.clone(),
        manufacturer: raw.manufacturer.clone(),
        client_version: raw.client_version.clone(),
    })
}

/// Library item referenced by the session, if any
pub fn normalize_library_item(raw: &RawSession) -> Option<LibraryItem> {
    let id = non_blank(raw.library_item_id.clone())?;
    let empty = RawMediaMetadata::default();
    let meta = raw.media_metadata.as_ref().unwrap_or(&empty);

    Some(LibraryItem {
        id,
        library_id: raw.library_id.clone(),
        media_type: raw.media_type.clone(),
        title: meta.title.clone(),
        subtitle: meta.subtitle.clone(),
        author: resolve_author(meta),
        narrators: meta.narrators.clone().unwrap_or_default(),
        description: meta.description.clone(),
        genres: meta.genres.clone().unwrap_or_default(),
        release_date: resolve_release_date(meta),
        published_year: meta.published_year.clone(),
        feed_url: meta.feed_url.clone(),
        image_url: meta.image_url.clone(),
        explicit: meta.explicit,
        language: meta.language.clone(),
        publisher: meta.publisher.clone(),
        isbn: meta.isbn.clone(),
        asin: meta.asin.clone(),
    })
}

pub fn normalize_session(raw: &RawSession) -> ListeningSessionRow {
    let user_id = raw
        .user_id
        .clone()
        .or_else(|| raw.user.as_ref().and_then(|u| u.id.clone()));

    ListeningSessionRow {
        id: raw.id.clone(),
        user_id,
        library_item_id: raw.library_item_id.clone(),
        episode_id: raw.episode_id.clone(),
        device_id: raw
            .device_info
            .as_ref()
            .and_then(|d| non_blank(d.id.clone())),
        display_title: raw.display_title.clone(),
        display_author: raw.display_author.clone(),
        duration: raw.duration,
        time_listening: raw.time_listening,
        start_offset: raw.start_time,
        media_progress: raw.current_time,
        started_at: ms_to_datetime(raw.started_at),
        updated_at: ms_to_datetime(raw.updated_at),
        date_log: non_blank(raw.date.clone()),
        day_of_week: raw.day_of_week.clone(),
    }
}

/// Prefer the singular `author`, else join the contributor list
pub fn resolve_author(meta: &RawMediaMetadata) -> Option<String> {
    if let Some(author) = non_blank(meta.author.clone()) {
        return Some(author);
    }

    let joined = meta
        .authors
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter_map(RawContributor::name)
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    non_blank(Some(joined))
}

/// `releaseDate`, falling back to `publishedDate`; blank is absent
pub fn resolve_release_date(meta: &RawMediaMetadata) -> Option<String> {
    non_blank(meta.release_date.clone()).or_else(|| non_blank(meta.published_date.clone()))
}

/// Epoch milliseconds to a UTC instant. Negative or out-of-range is absent.
///
/// Instants past year 9999 are out of range: their RFC 3339 text gains a sign
/// and more year digits, which breaks text ordering in the store.
pub fn ms_to_datetime(ms: Option<f64>) -> Option<DateTime<Utc>> {
    let ms = ms?;
    if !ms.is_finite() || ms < 0.0 {
        return None;
    }
    DateTime::from_timestamp_millis(ms.round() as i64).filter(|t| t.year() <= 9999)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
