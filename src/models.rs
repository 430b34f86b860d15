use serde::{Deserialize, Deserializer, Serialize};

/// One station entry, serialized with the upstream field names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    #[serde(rename = "stationuuid", default, deserialize_with = "nullable")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(rename = "url", default, deserialize_with = "nullable")]
    pub playback_url: String,
    #[serde(rename = "url_resolved", default, deserialize_with = "nullable")]
    pub resolved_playback_url: String,
    #[serde(rename = "favicon", default, deserialize_with = "nullable")]
    pub icon_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub country: String,
    #[serde(rename = "countrycode", default, deserialize_with = "nullable")]
    pub country_code: String,
    #[serde(rename = "state", default, deserialize_with = "nullable")]
    pub region: String,
    #[serde(default, deserialize_with = "nullable")]
    pub language: String,
    #[serde(default, deserialize_with = "nullable")]
    pub tags: String,
    #[serde(rename = "votes", default, deserialize_with = "nullable")]
    pub vote_count: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub codec: String,
    #[serde(rename = "bitrate", default, deserialize_with = "nullable")]
    pub bitrate_kbps: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(rename = "stationcount", default, deserialize_with = "nullable")]
    pub station_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(rename = "stationcount", default, deserialize_with = "nullable")]
    pub station_count: u64,
    #[serde(rename = "iso_3166_1", default, deserialize_with = "nullable")]
    pub iso_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(rename = "stationcount", default, deserialize_with = "nullable")]
    pub station_count: u64,
    #[serde(rename = "iso_639", default, deserialize_with = "nullable")]
    pub iso_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StationList {
    pub stations: Vec<Station>,
    pub count: usize,
}

impl From<Vec<Station>> for StationList {
    fn from(stations: Vec<Station>) -> Self {
        let count = stations.len();
        Self { stations, count }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagList {
    pub tags: Vec<Genre>,
    pub count: usize,
}

impl From<Vec<Genre>> for TagList {
    fn from(tags: Vec<Genre>) -> Self {
        let count = tags.len();
        Self { tags, count }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryList {
    pub countries: Vec<Country>,
    pub count: usize,
}

impl From<Vec<Country>> for CountryList {
    fn from(countries: Vec<Country>) -> Self {
        let count = countries.len();
        Self { countries, count }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageList {
    pub languages: Vec<Language>,
    pub count: usize,
}

impl From<Vec<Language>> for LanguageList {
    fn from(languages: Vec<Language>) -> Self {
        let count = languages.len();
        Self { languages, count }
    }
}

/// Result of registering a play with the upstream directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClickResult {
    pub ok: bool,
    pub url: String,
}

/// Upstream answer for `url/{id}`.
///
/// Mirrors disagree on the type of `ok` (`true` or `"true"`), so it is kept
/// loose and only read through [`UrlResponse::rejected`].
#[derive(Debug, Clone, Deserialize)]
pub struct UrlResponse {
    #[serde(default)]
    pub ok: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "nullable")]
    pub url: String,
    #[serde(default)]
    pub message: Option<serde_json::Value>,
}

impl UrlResponse {
    /// True only when upstream explicitly answered `ok: false`.
    pub fn rejected(&self) -> bool {
        match &self.ok {
            Some(serde_json::Value::Bool(ok)) => !ok,
            Some(serde_json::Value::String(ok)) => ok.trim().eq_ignore_ascii_case("false"),
            _ => false,
        }
    }
}

/// Upstream sometimes sends `null` where a value is expected.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
