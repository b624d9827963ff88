#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! HTTP client for the e-Stat simple statistics API.
//!
//! All three endpoints answer with a CSV-like body that has to be repaired
//! (see [`response`]) before it parses as a table. Requests are sent one at
//! a time; nothing is retried.

pub mod response;

use estat_api_models::{Endpoint, SingleStatsQuery, StatsDataQuery};
use estat_table::{Table, TableError};
use thiserror::Error;

pub use response::{decode_body, filter_year, parse_response, repair_response};

/// Base URL of the e-Stat REST API, version 3.0.
pub const DEFAULT_BASE_URL: &str = "http://api.e-stat.go.jp/rest/3.0/app/";

/// Host every official API URL points at.
pub const ESTAT_API_HOST: &str = "api.e-stat.go.jp";

/// Response language sent with every request.
pub const DEFAULT_LANG: &str = "J";

const USER_AGENT: &str = concat!("estat/", env!("CARGO_PKG_VERSION"));

/// Errors that can occur while talking to the API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response lacks the quoted section line the payload follows.
    #[error("Response has no \"{marker}\" section and cannot be formatted")]
    UnformattableResponse {
        /// Section name that was looked for.
        marker: String,
    },

    /// The repaired payload could not be read as a table.
    #[error(transparent)]
    Table(#[from] TableError),

    /// A section pattern failed to compile.
    #[error("Invalid section pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Connection settings for [`EStatClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Application id issued by e-Stat.
    pub app_id: String,
    /// Base URL, ending in `/`.
    pub base_url: String,
    /// `lang` parameter.
    pub lang: String,
}

impl ApiConfig {
    /// Settings for the official endpoint.
    #[must_use]
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            lang: DEFAULT_LANG.to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
        self
    }
}

/// Whether `url` points at the official e-Stat API host.
#[must_use]
pub fn is_estat_api_url(url: &str) -> bool {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|url| url.host_str().map(|host| host == ESTAT_API_HOST))
        .unwrap_or(false)
}

/// Client for the `getSimpleStatsList`, `getSimpleMetaInfo` and
/// `getSimpleStatsData` endpoints.
#[derive(Debug, Clone)]
pub struct EStatClient {
    client: reqwest::Client,
    config: ApiConfig,
}

impl EStatClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Http`] if the HTTP client cannot be built.
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        if !is_estat_api_url(&config.base_url) {
            log::warn!(
                "API base URL {} is not an e-Stat endpoint",
                config.base_url
            );
        }

        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self { client, config })
    }

    #[must_use]
    pub const fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// `getSimpleStatsList` request for the tables under a government
    /// statistics code.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Http`] if the URL cannot be built.
    pub fn stats_list_request(&self, stats_code: &str) -> Result<reqwest::Request, ApiError> {
        self.request(
            Endpoint::StatsList,
            &[
                ("statsCode", stats_code),
                ("searchKind", "1"),
                ("explanationGetFlg", "N"),
            ],
        )
    }

    /// `getSimpleMetaInfo` request for one statistics table.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Http`] if the URL cannot be built.
    pub fn meta_info_request(&self, stats_table_id: &str) -> Result<reqwest::Request, ApiError> {
        self.request(
            Endpoint::MetaInfo,
            &[
                ("statsDataId", stats_table_id),
                ("explanationGetFlg", "N"),
            ],
        )
    }

    /// `getSimpleStatsData` request. Every filter list is comma-joined and
    /// years are sent as time codes; metadata, counts, explanations and
    /// annotations are switched off.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Http`] if the URL cannot be built.
    pub fn stats_data_request(&self, query: &StatsDataQuery) -> Result<reqwest::Request, ApiError> {
        let areas = query.area_filter();
        let classes = query.class_filter();
        let times = query.time_filter();

        self.request(
            Endpoint::StatsData,
            &[
                ("cdArea", areas.as_str()),
                ("cdCat01", classes.as_str()),
                ("cdTime", times.as_str()),
                ("statsDataId", query.stats_table_id.as_str()),
                ("metaGetFlg", "N"),
                ("cntGetFlg", "N"),
                ("explanationGetFlg", "N"),
                ("annotationGetFlg", "N"),
                ("sectionHeaderFlg", "2"),
            ],
        )
    }

    /// Fetches the statistics table ids published under a government
    /// statistics code.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the request fails or the response cannot be
    /// repaired and parsed.
    pub async fn fetch_stats_list(&self, stats_code: &str) -> Result<Table, ApiError> {
        self.fetch_table(Endpoint::StatsList, self.stats_list_request(stats_code)?)
            .await
    }

    /// Fetches the classification metadata of one statistics table.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the request fails or the response cannot be
    /// repaired and parsed.
    pub async fn fetch_meta_info(&self, stats_table_id: &str) -> Result<Table, ApiError> {
        self.fetch_table(Endpoint::MetaInfo, self.meta_info_request(stats_table_id)?)
            .await
    }

    /// Fetches statistics values filtered by area, class and time codes.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the request fails or the response cannot be
    /// repaired and parsed.
    pub async fn fetch_stats_data(&self, query: &StatsDataQuery) -> Result<Table, ApiError> {
        self.fetch_table(Endpoint::StatsData, self.stats_data_request(query)?)
            .await
    }

    /// Fetches one area / class / year and keeps only the rows of that year.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the fetch fails or the payload has no
    /// `time_code` column.
    pub async fn fetch_stats_for_year(&self, query: &SingleStatsQuery) -> Result<Table, ApiError> {
        let table = self.fetch_stats_data(&query.to_query()).await?;
        filter_year(&table, &query.year)
    }

    /// GET request for `endpoint` with `appId` and `lang` ahead of `params`.
    fn request(
        &self,
        endpoint: Endpoint,
        params: &[(&str, &str)],
    ) -> Result<reqwest::Request, ApiError> {
        let url = format!("{}{}", self.config.base_url, endpoint.path());

        let mut query = vec![("appId", self.config.app_id.as_str())];
        query.push(("lang", self.config.lang.as_str()));
        query.extend_from_slice(params);

        log::debug!("GET {url} {}", describe_params(&query));

        Ok(self.client.get(&url).query(&query).build()?)
    }

    async fn fetch_table(
        &self,
        endpoint: Endpoint,
        request: reqwest::Request,
    ) -> Result<Table, ApiError> {
        let body = self.get_text(endpoint, request).await?;
        let table = parse_response(&body, endpoint)?;

        log::info!(
            "{}: {} rows, {} columns",
            endpoint.path(),
            table.len(),
            table.column_names().len()
        );

        Ok(table)
    }

    /// Sends the request and decodes the body. The HTTP status is not
    /// checked; e-Stat reports failures inside the body, which the section
    /// repair then rejects.
    async fn get_text(
        &self,
        endpoint: Endpoint,
        request: reqwest::Request,
    ) -> Result<String, ApiError> {
        let response = self.client.execute(request).await?;
        let status = response.status();
        if !status.is_success() {
            log::warn!("{} answered {status}", endpoint.path());
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;

        Ok(decode_body(&bytes, content_type.as_deref()))
    }
}

/// Renders query parameters for logging with the application id masked.
fn describe_params(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(key, value)| {
            if *key == "appId" && !value.is_empty() {
                format!("{key}=***")
            } else {
                format!("{key}={value}")
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}
