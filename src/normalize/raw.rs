//! Wire shapes of a listening-session record
//!
//! Every field is optional and decoded leniently: a value of the wrong JSON
//! type reads as absent rather than failing the record. Only `id` is required.

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSession {
    #[serde(deserialize_with = "required_text")]
    pub id: String,

    #[serde(default, deserialize_with = "lenient")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub user: Option<RawUser>,

    #[serde(default, deserialize_with = "lenient")]
    pub library_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub library_item_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub episode_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub media_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub media_metadata: Option<RawMediaMetadata>,

    #[serde(default, deserialize_with = "lenient")]
    pub display_title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub display_author: Option<String>,

    #[serde(default, deserialize_with = "lenient")]
    pub duration: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub time_listening: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub start_time: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub current_time: Option<f64>,

    /// Epoch milliseconds
    #[serde(default, deserialize_with = "lenient")]
    pub started_at: Option<f64>,
    /// Epoch milliseconds
    #[serde(default, deserialize_with = "lenient")]
    pub updated_at: Option<f64>,

    #[serde(default, deserialize_with = "lenient")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub day_of_week: Option<String>,

    #[serde(default, deserialize_with = "lenient")]
    pub device_info: Option<RawDeviceInfo>,

    /// Fields this crate does not map (player, chapters, server version, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawUser {
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDeviceInfo {
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub client_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub device_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub manufacturer: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub client_version: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMediaMetadata {
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub subtitle: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub authors: Option<Vec<RawContributor>>,
    #[serde(default, deserialize_with = "lenient")]
    pub narrators: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub genres: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    pub release_date: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub published_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub published_year: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub feed_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub explicit: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub language: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub publisher: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub isbn: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub asin: Option<String>,
}

/// An entry of `authors`: `{id, name}` for books, a bare string elsewhere
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawContributor {
    Named {
        #[serde(default, deserialize_with = "lenient")]
        name: Option<String>,
    },
    Plain(String),
    Other(Value),
}

impl RawContributor {
    pub fn name(&self) -> Option<&str> {
        match self {
            RawContributor::Named { name } => name.as_deref(),
            RawContributor::Plain(name) => Some(name.as_str()),
            RawContributor::Other(_) => None,
        }
    }
}

/// Decode `T`, or `None` when the value is null or of another shape
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Strings pass through, numbers are rendered; anything else is absent
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(text_of(Value::deserialize(deserializer)?))
}

fn required_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    text_of(Value::deserialize(deserializer)?)
        .ok_or_else(|| serde::de::Error::custom("`id` must be a string or number"))
}

fn text_of(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
