//! An HTTP client that fetches feature definitions from the server.
use reqwest::{
    header::{AUTHORIZATION, ETAG, IF_NONE_MATCH},
    StatusCode, Url,
};

use crate::{feature::FeaturesResponse, Error, Feature, Result};

const FEATURES_ENDPOINT: &str = "/features";

/// Build `{base_url}{endpoint}`.
pub(crate) fn endpoint_url(base_url: &str, endpoint: &str) -> Result<Url> {
    Url::parse(&format!("{}{}", base_url.trim_end_matches('/'), endpoint))
        .map_err(Error::InvalidBaseUrl)
}

pub(crate) fn bearer(api_key: &str) -> String {
    format!("Bearer {api_key}")
}

/// A client that fetches features from the server.
pub(crate) struct FeatureFetcher {
    // Client holds a connection pool internally, so we're reusing the client between requests.
    client: reqwest::blocking::Client,
    url: Url,
    api_key: String,
    /// `ETag` of the last successful response, sent back as `If-None-Match`.
    etag: Option<String>,
    /// If we receive a 401 Unauthorized error during a request, it means the API key is not
    /// valid. We cache this error so we don't issue additional requests to the server.
    unauthorized: bool,
}

impl FeatureFetcher {
    pub fn new(base_url: &str, api_key: &str) -> Result<FeatureFetcher> {
        Ok(FeatureFetcher {
            client: reqwest::blocking::Client::new(),
            url: endpoint_url(base_url, FEATURES_ENDPOINT)?,
            api_key: api_key.to_owned(),
            etag: None,
            unauthorized: false,
        })
    }

    /// Fetch all features. Returns `Ok(None)` if nothing changed since the previous fetch.
    pub fn fetch_features(&mut self) -> Result<Option<Vec<Feature>>> {
        if self.unauthorized {
            return Err(Error::Unauthorized);
        }

        log::debug!(target: "molasses", "fetching features");
        let mut request = self
            .client
            .get(self.url.clone())
            .header(AUTHORIZATION, bearer(&self.api_key));
        if let Some(etag) = &self.etag {
            request = request.header(IF_NONE_MATCH, etag);
        }
        let response = request.send()?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_MODIFIED => {
                log::debug!(target: "molasses", "features not modified");
                return Ok(None);
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                log::warn!(target: "molasses", "client is not authorized. Check your API key");
                self.unauthorized = true;
                return Err(Error::Unauthorized);
            }
            status => {
                log::warn!(target: "molasses", "received non-200 response while fetching features: {:?}", status);
                return Err(Error::UnexpectedStatus(status));
            }
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let body: FeaturesResponse = response.json()?;
        self.etag = etag;

        log::debug!(target: "molasses", "successfully fetched features");
        Ok(Some(body.into_features()))
    }
}
