//! Query normalization between the public directory API and the Radio Browser
//! protocol.
//!
//! Every public intent is validated here, mapped onto an upstream endpoint with
//! its fixed ordering and filtering parameters, and the decoded answer is
//! wrapped into the `{<items>, count}` envelopes of [`crate::models`].

use crate::error::{Error, Result};
use crate::models::{
    ClickResult, Country, CountryList, Genre, Language, LanguageList, Station, StationList,
    TagList, UrlResponse,
};
use crate::radio_browser::{RadioBrowserClient, UpstreamRequest};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::debug;

pub const DEFAULT_LIMIT: u32 = 50;
pub const STATION_LIMIT_CEILING: u32 = 100;
pub const LISTING_LIMIT_CEILING: u32 = 200;

/// Filters accepted by station search.
///
/// `None` and `Some("")` stay distinct here; neither is forwarded upstream.
/// `countryCode` takes precedence over the lowercase `countrycode` spelling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SearchFilters {
    pub name: Option<String>,
    pub tag: Option<String>,
    pub country: Option<String>,
    #[serde(rename = "countryCode")]
    pub country_code: Option<String>,
    #[serde(rename = "countrycode")]
    pub country_code_lowercase: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl SearchFilters {
    pub fn country_code(&self) -> Option<&str> {
        self.country_code
            .as_deref()
            .filter(|v| !v.is_empty())
            .or(self.country_code_lowercase.as_deref())
    }
}

/// A validated result limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit(u32);

impl Limit {
    pub fn checked(requested: Option<u32>, ceiling: u32) -> Result<Self> {
        match requested.unwrap_or(DEFAULT_LIMIT) {
            0 => Err(Error::invalid_request("limit must be at least 1")),
            n if n > ceiling => Err(Error::invalid_request(format!(
                "limit must be at most {ceiling}, got {n}"
            ))),
            n => Ok(Self(n)),
        }
    }

    pub fn stations(requested: Option<u32>) -> Result<Self> {
        Self::checked(requested, STATION_LIMIT_CEILING)
    }

    pub fn listing(requested: Option<u32>) -> Result<Self> {
        Self::checked(requested, LISTING_LIMIT_CEILING)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct Directory {
    client: RadioBrowserClient,
}

impl Directory {
    pub fn new(client: RadioBrowserClient) -> Self {
        Self { client }
    }

    pub async fn search(&self, filters: &SearchFilters) -> Result<StationList> {
        let limit = Limit::stations(filters.limit)?;
        let mut request = by_votes(UpstreamRequest::new("stations/search"), limit)
            .param("offset", filters.offset.unwrap_or(0));
        for (key, value) in [
            ("name", filters.name.as_deref()),
            ("tag", filters.tag.as_deref()),
            ("country", filters.country.as_deref()),
            ("countrycode", filters.country_code()),
        ] {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                request = request.param(key, value);
            }
        }
        self.stations(&request).await
    }

    pub async fn top_voted(&self, limit: Option<u32>) -> Result<StationList> {
        let limit = Limit::stations(limit)?;
        let request = UpstreamRequest::new("stations/topvote")
            .param("limit", limit.get())
            .param("hidebroken", "true");
        self.stations(&request).await
    }

    pub async fn top_clicked(&self, limit: Option<u32>) -> Result<StationList> {
        let limit = Limit::stations(limit)?;
        let request = UpstreamRequest::new("stations/topclick")
            .param("limit", limit.get())
            .param("hidebroken", "true");
        self.stations(&request).await
    }

    pub async fn by_tag(&self, tag: &str, limit: Option<u32>) -> Result<StationList> {
        self.stations_by("stations/bytag", tag, limit).await
    }

    pub async fn by_country(&self, country: &str, limit: Option<u32>) -> Result<StationList> {
        self.stations_by("stations/bycountry", country, limit).await
    }

    pub async fn by_language(&self, language: &str, limit: Option<u32>) -> Result<StationList> {
        self.stations_by("stations/bylanguage", language, limit).await
    }

    pub async fn station(&self, id: &str) -> Result<Station> {
        let request = UpstreamRequest::new("stations/byuuid").segment(path_value("id", id)?);
        let stations: Vec<Station> = self.client.get_json(&request).await?;
        stations
            .into_iter()
            .find(|s| !s.id.is_empty())
            .ok_or_else(|| Error::not_found(format!("Station {id}")))
    }

    pub async fn tags(&self, limit: Option<u32>) -> Result<TagList> {
        let request = by_station_count(UpstreamRequest::new("tags"), Limit::listing(limit)?);
        let tags: Vec<Genre> = self.client.get_json(&request).await?;
        Ok(tags.into())
    }

    pub async fn countries(&self, limit: Option<u32>) -> Result<CountryList> {
        let request = by_station_count(UpstreamRequest::new("countries"), Limit::listing(limit)?);
        let countries: Vec<Country> = self.client.get_json(&request).await?;
        Ok(countries.into())
    }

    pub async fn languages(&self, limit: Option<u32>) -> Result<LanguageList> {
        let request = by_station_count(UpstreamRequest::new("languages"), Limit::listing(limit)?);
        let languages: Vec<Language> = self.client.get_json(&request).await?;
        Ok(languages.into())
    }

    /// Registers a play upstream and returns the stream URL it resolved.
    pub async fn record_click(&self, id: &str) -> Result<ClickResult> {
        let request = UpstreamRequest::new("url").segment(path_value("id", id)?);
        let resp: UrlResponse = self.client.get_json(&request).await?;
        if resp.rejected() {
            debug!(stationuuid = %id, message = ?resp.message, "upstream rejected click");
            return Err(Error::not_found(format!("Station {id}")));
        }
        Ok(ClickResult {
            ok: true,
            url: resp.url,
        })
    }

    async fn stations_by(&self, path: &str, value: &str, limit: Option<u32>) -> Result<StationList> {
        let limit = Limit::stations(limit)?;
        let value = path_value(path, value)?;
        let request = by_votes(UpstreamRequest::new(path).segment(value), limit);
        self.stations(&request).await
    }

    async fn stations(&self, request: &UpstreamRequest) -> Result<StationList> {
        let stations: Vec<Station> = self.client.get_json(request).await?;
        Ok(normalize_batch(stations).into())
    }
}

/// Dot segments would be dropped while building the upstream URL and the call
/// would land on a different endpoint.
fn path_value<'a>(what: &str, value: &'a str) -> Result<&'a str> {
    match value {
        "" | "." | ".." => Err(Error::invalid_request(format!(
            "invalid path value for {what}: {value:?}"
        ))),
        v => Ok(v),
    }
}

fn by_votes(request: UpstreamRequest, limit: Limit) -> UpstreamRequest {
    request
        .param("limit", limit.get())
        .param("order", "votes")
        .param("reverse", "true")
        .param("hidebroken", "true")
}

fn by_station_count(request: UpstreamRequest, limit: Limit) -> UpstreamRequest {
    request
        .param("limit", limit.get())
        .param("order", "stationcount")
        .param("reverse", "true")
}

/// Drops entries without an id and repeated ids, keeping upstream order.
fn normalize_batch(stations: Vec<Station>) -> Vec<Station> {
    let total = stations.len();
    let mut seen = HashSet::with_capacity(total);
    let kept: Vec<Station> = stations
        .into_iter()
        .filter(|s| !s.id.is_empty() && seen.insert(s.id.clone()))
        .collect();
    if kept.len() != total {
        debug!(dropped = total - kept.len(), "dropped stations without a unique id");
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpstreamConfig;
    use serde_json::{json, Value};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn directory_for(server: &MockServer) -> Directory {
        let config = UpstreamConfig {
            mirrors: vec![format!("{}/json", server.uri())],
            timeout_secs: 2,
            ..Default::default()
        };
        Directory::new(RadioBrowserClient::new(&config).unwrap())
    }

    fn station_json(id: &str, name: &str) -> Value {
        json!({
            "stationuuid": id,
            "name": name,
            "url": format!("http://streams.example/{id}"),
            "url_resolved": format!("http://streams.example/{id}.mp3"),
            "votes": 10,
            "bitrate": 128
        })
    }

    fn query_keys(request: &Request) -> Vec<String> {
        request
            .url
            .query_pairs()
            .map(|(k, _)| k.into_owned())
            .collect()
    }

    #[test]
    fn limit_defaults_and_ceilings() {
        assert_eq!(Limit::stations(None).unwrap().get(), 50);
        assert_eq!(Limit::stations(Some(100)).unwrap().get(), 100);
        assert!(matches!(Limit::stations(Some(101)), Err(Error::InvalidRequest(_))));
        assert!(matches!(Limit::stations(Some(0)), Err(Error::InvalidRequest(_))));
        assert_eq!(Limit::listing(Some(200)).unwrap().get(), 200);
        assert!(matches!(Limit::listing(Some(201)), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn batch_normalization_keeps_first_of_each_id() {
        let stations = vec![
            Station { id: "a".into(), name: "first".into(), ..Default::default() },
            Station { id: "".into(), ..Default::default() },
            Station { id: "a".into(), name: "second".into(), ..Default::default() },
            Station { id: "b".into(), ..Default::default() },
        ];
        let kept = normalize_batch(stations);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].name, "first");
        assert_eq!(kept[1].id, "b");
    }

    #[tokio::test]
    async fn search_by_name_wraps_stations() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/stations/search"))
            .and(query_param("name", "BBC"))
            .and(query_param("limit", "10"))
            .and(query_param("offset", "0"))
            .and(query_param("order", "votes"))
            .and(query_param("reverse", "true"))
            .and(query_param("hidebroken", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                station_json("1", "BBC Radio 1"),
                station_json("2", "BBC Radio 2"),
                station_json("3", "BBC World Service"),
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let filters = SearchFilters {
            name: Some("BBC".into()),
            limit: Some(10),
            ..Default::default()
        };
        let list = directory_for(&server).search(&filters).await.unwrap();
        assert_eq!(list.count, 3);
        assert_eq!(list.stations.len(), 3);
        assert_eq!(list.stations[2].name, "BBC World Service");
    }

    #[tokio::test]
    async fn search_omits_absent_and_empty_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/stations/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let filters = SearchFilters {
            tag: Some(String::new()),
            country_code: Some("AT".into()),
            ..Default::default()
        };
        let list = directory_for(&server).search(&filters).await.unwrap();
        assert_eq!(list.count, 0);
        assert!(list.stations.is_empty());

        let received = server.received_requests().await.unwrap();
        let keys = query_keys(&received[0]);
        assert!(keys.contains(&"countrycode".to_string()));
        assert!(!keys.contains(&"tag".to_string()));
        assert!(!keys.contains(&"name".to_string()));
        assert!(!keys.contains(&"country".to_string()));
    }

    #[tokio::test]
    async fn over_ceiling_limit_never_reaches_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let directory = directory_for(&server);
        let filters = SearchFilters {
            limit: Some(101),
            ..Default::default()
        };
        assert!(matches!(directory.search(&filters).await, Err(Error::InvalidRequest(_))));
        assert!(matches!(directory.top_voted(Some(101)).await, Err(Error::InvalidRequest(_))));
        assert!(matches!(directory.by_tag("pop", Some(101)).await, Err(Error::InvalidRequest(_))));
        assert!(matches!(directory.tags(Some(201)).await, Err(Error::InvalidRequest(_))));
        assert!(matches!(directory.countries(Some(201)).await, Err(Error::InvalidRequest(_))));
        assert!(matches!(directory.languages(Some(201)).await, Err(Error::InvalidRequest(_))));
        assert!(matches!(directory.top_clicked(Some(101)).await, Err(Error::InvalidRequest(_))));
        assert!(matches!(directory.by_country("Austria", Some(101)).await, Err(Error::InvalidRequest(_))));
        assert!(matches!(directory.by_language("german", Some(101)).await, Err(Error::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn dot_segments_are_rejected_before_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([station_json("x", "Elsewhere")])))
            .expect(0)
            .mount(&server)
            .await;

        let directory = directory_for(&server);
        for value in ["..", "."] {
            assert!(matches!(directory.by_tag(value, None).await, Err(Error::InvalidRequest(_))));
            assert!(matches!(directory.by_country(value, None).await, Err(Error::InvalidRequest(_))));
            assert!(matches!(directory.by_language(value, None).await, Err(Error::InvalidRequest(_))));
            assert!(matches!(directory.station(value).await, Err(Error::InvalidRequest(_))));
            assert!(matches!(directory.record_click(value).await, Err(Error::InvalidRequest(_))));
        }
    }

    #[tokio::test]
    async fn search_prefers_camel_case_country_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/stations/search"))
            .and(query_param("countrycode", "AT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([station_json("a", "Ö1")])))
            .expect(2)
            .mount(&server)
            .await;

        let directory = directory_for(&server);
        let both = SearchFilters {
            country_code: Some("AT".into()),
            country_code_lowercase: Some("DE".into()),
            ..Default::default()
        };
        assert_eq!(directory.search(&both).await.unwrap().count, 1);

        let lowercase_only = SearchFilters {
            country_code_lowercase: Some("AT".into()),
            ..Default::default()
        };
        assert_eq!(directory.search(&lowercase_only).await.unwrap().count, 1);

        let received = server.received_requests().await.unwrap();
        for request in &received {
            let codes: Vec<_> = request
                .url
                .query_pairs()
                .filter(|(k, _)| k == "countrycode")
                .collect();
            assert_eq!(codes.len(), 1);
        }
    }

    #[tokio::test]
    async fn top_lists_hide_broken_stations() {
        let server = MockServer::start().await;
        for endpoint in ["/json/stations/topvote", "/json/stations/topclick"] {
            Mock::given(method("GET"))
                .and(path(endpoint))
                .and(query_param("limit", "12"))
                .and(query_param("hidebroken", "true"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                    station_json("a", "Alpha"),
                    station_json("b", "Beta"),
                ])))
                .expect(1)
                .mount(&server)
                .await;
        }

        let directory = directory_for(&server);
        assert_eq!(directory.top_voted(Some(12)).await.unwrap().count, 2);
        assert_eq!(directory.top_clicked(Some(12)).await.unwrap().count, 2);
    }

    #[tokio::test]
    async fn by_tag_encodes_path_segment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/stations/bytag/hip%20hop"))
            .and(query_param("order", "votes"))
            .and(query_param("limit", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([station_json("a", "Beats")])))
            .expect(1)
            .mount(&server)
            .await;

        let list = directory_for(&server).by_tag("hip hop", None).await.unwrap();
        assert_eq!(list.count, 1);
    }

    #[tokio::test]
    async fn by_country_and_language_use_vote_ordering() {
        let server = MockServer::start().await;
        for endpoint in ["/json/stations/bycountry/Germany", "/json/stations/bylanguage/german"] {
            Mock::given(method("GET"))
                .and(path(endpoint))
                .and(query_param("order", "votes"))
                .and(query_param("reverse", "true"))
                .and(query_param("hidebroken", "true"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([station_json("d", "Deutschlandfunk")])))
                .expect(1)
                .mount(&server)
                .await;
        }

        let directory = directory_for(&server);
        assert_eq!(directory.by_country("Germany", Some(5)).await.unwrap().count, 1);
        assert_eq!(directory.by_language("german", Some(5)).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn station_lookup_returns_first_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/stations/byuuid/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([station_json("abc", "Found FM")])))
            .mount(&server)
            .await;

        let station = directory_for(&server).station("abc").await.unwrap();
        assert_eq!(station.id, "abc");
        assert_eq!(station.name, "Found FM");
    }

    #[tokio::test]
    async fn station_lookup_of_unknown_id_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/stations/byuuid/missing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let err = directory_for(&server).station("missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn listings_order_by_station_count() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/tags"))
            .and(query_param("order", "stationcount"))
            .and(query_param("reverse", "true"))
            .and(query_param("limit", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "pop", "stationcount": 5000},
                {"name": "rock", "stationcount": 4000}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/json/countries"))
            .and(query_param("order", "stationcount"))
            .and(query_param("limit", "200"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "Germany", "iso_3166_1": "DE", "stationcount": 3000}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/json/languages"))
            .and(query_param("order", "stationcount"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "english", "iso_639": null, "stationcount": 9000}
            ])))
            .mount(&server)
            .await;

        let directory = directory_for(&server);
        let tags = directory.tags(None).await.unwrap();
        assert_eq!(tags.count, 2);
        assert_eq!(tags.tags[0].station_count, 5000);

        let countries = directory.countries(Some(200)).await.unwrap();
        assert_eq!(countries.countries[0].iso_code, "DE");

        let languages = directory.languages(None).await.unwrap();
        assert_eq!(languages.languages[0].iso_code, "");
        assert_eq!(languages.count, 1);
    }

    #[tokio::test]
    async fn record_click_returns_resolved_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/url/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "message": "retrieved station url",
                "stationuuid": "abc",
                "name": "Found FM",
                "url": "http://streams.example/abc.mp3"
            })))
            .mount(&server)
            .await;

        let click = directory_for(&server).record_click("abc").await.unwrap();
        assert_eq!(
            click,
            ClickResult {
                ok: true,
                url: "http://streams.example/abc.mp3".into()
            }
        );
    }

    #[tokio::test]
    async fn record_click_accepts_string_ok_flag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/url/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": "true",
                "message": "retrieved station url",
                "url": "http://s.example/a.mp3"
            })))
            .mount(&server)
            .await;

        let click = directory_for(&server).record_click("abc").await.unwrap();
        assert!(click.ok);
        assert_eq!(click.url, "http://s.example/a.mp3");
    }

    #[tokio::test]
    async fn record_click_without_url_defaults_to_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/url/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"stationuuid": "abc"})))
            .mount(&server)
            .await;

        let click = directory_for(&server).record_click("abc").await.unwrap();
        assert!(click.ok);
        assert_eq!(click.url, "");
    }

    #[tokio::test]
    async fn record_click_rejected_upstream_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/url/nope"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": false,
                "message": "did not find station with matching uuid",
                "url": ""
            })))
            .mount(&server)
            .await;

        let err = directory_for(&server).record_click("nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn record_click_with_all_mirrors_down_is_upstream_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = directory_for(&server).record_click("abc").await.unwrap_err();
        assert!(matches!(err, Error::UpstreamUnavailable { .. }));
    }
}
