use crate::config::UpstreamConfig;
use crate::error::{Error, Result};
use anyhow::{anyhow, bail, Context};
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};
use url::Url;

const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// One logical upstream call: an endpoint path below the mirror base plus
/// query parameters, identical for every mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    segments: Vec<String>,
    params: Vec<(&'static str, String)>,
}

impl UpstreamRequest {
    /// `path` is a fixed endpoint such as `stations/search`.
    pub fn new(path: &str) -> Self {
        Self {
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            params: Vec::new(),
        }
    }

    /// Appends a caller-supplied path segment; it is encoded as one segment.
    pub fn segment(mut self, value: impl Into<String>) -> Self {
        self.segments.push(value.into());
        self
    }

    pub fn param(mut self, key: &'static str, value: impl ToString) -> Self {
        self.params.push((key, value.to_string()));
        self
    }

    pub fn path(&self) -> String {
        self.segments.join("/")
    }

    fn url_for(&self, base: &Url) -> anyhow::Result<Url> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Mirror URL cannot carry a path: {base}"))?
            .pop_if_empty()
            .extend(&self.segments);
        if !self.params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(self.params.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }
}

impl fmt::Display for UpstreamRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Client for a prioritized list of Radio Browser mirrors.
#[derive(Debug, Clone)]
pub struct RadioBrowserClient {
    http: reqwest::Client,
    mirrors: Arc<[Url]>,
}

impl RadioBrowserClient {
    pub fn new(config: &UpstreamConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = reqwest::ClientBuilder::new()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout())
            .timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            mirrors: config.mirror_urls()?.into(),
        })
    }

    pub fn mirrors(&self) -> &[Url] {
        &self.mirrors
    }

    /// GETs `request` and decodes the JSON body, trying mirrors in order.
    ///
    /// A mirror counts as failed on transport errors, timeouts, non-success
    /// status codes and bodies that do not decode as `T`. A decoded empty list
    /// is a valid answer and ends the traversal.
    pub async fn get_json<T>(&self, request: &UpstreamRequest) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let http = self.http.clone();
        self.with_mirror_fallback(request, move |url| {
            let http = http.clone();
            async move {
                debug!(%url, "GET");
                let resp = http.get(url).send().await.context("Request failed")?;
                let status = resp.status();
                if !status.is_success() {
                    bail!("Upstream returned {status}");
                }
                let bytes = read_limited(resp, MAX_BODY_BYTES).await?;
                serde_json::from_slice::<T>(&bytes).context("Invalid JSON response")
            }
        })
        .await
    }

    async fn with_mirror_fallback<F, Fut, T>(&self, request: &UpstreamRequest, mut f: F) -> Result<T>
    where
        F: FnMut(Url) -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<T>>,
    {
        let mut last_err: Option<anyhow::Error> = None;
        for (attempt, base) in self.mirrors.iter().enumerate() {
            let outcome = match request.url_for(base) {
                Ok(url) => f(url).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(v) => return Ok(v),
                Err(e) => {
                    warn!(mirror = %base, path = %request, attempt, error = %format!("{e:#}"), "mirror failed");
                    last_err = Some(e);
                }
            }
        }

        let detail = last_err
            .map(|e| format!("{e:#}"))
            .unwrap_or_else(|| "no upstream mirrors configured".to_string());
        error!(path = %request, %detail, "all upstream mirrors failed");
        Err(Error::UpstreamUnavailable {
            path: request.path(),
            detail,
        })
    }
}

async fn read_limited(resp: reqwest::Response, limit: usize) -> anyhow::Result<Vec<u8>> {
    if let Some(len) = resp.content_length() {
        if len as usize > limit {
            bail!("HTTP response too large ({len} bytes)");
        }
    }

    let mut data: Vec<u8> = Vec::new();
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("HTTP body read error")?;
        if data.len().saturating_add(chunk.len()) > limit {
            bail!("HTTP response exceeded size limit");
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}
