//! Country enrichment client. Called before a post write to snapshot the
//! country's metadata; a lookup failure aborts the write entirely.

use reqwest::{StatusCode, header::AUTHORIZATION};
use serde::Deserialize;
use std::{collections::BTreeMap, time::Duration};
use thiserror::Error;
use tracing::warn;
use traveltales_common::model::country::{CountryData, NO_DATA_SENTINEL};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const TRANSIENT_RETRIES: u32 = 2;
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum CountryError {
    #[error("Country request failed: {0}")]
    Request(reqwest::Error),
    #[error("Country source replied with status {0}")]
    Status(StatusCode),
    #[error("No country data found for {0:?}")]
    NotFound(String),
    #[error("Country source returned an unexpected shape: {0}")]
    Shape(reqwest::Error),
}

/// Which upstream the client talks to. Chosen once at startup from
/// configuration, never per request.
#[derive(Clone, Debug)]
pub enum CountrySource {
    /// The public country-data API; replies with an array of country records.
    RestCountries { base_url: String },
    /// An internal proxy that replies with the normalized record directly,
    /// authorized via a static token.
    Proxy { base_url: String, auth_token: String },
}

#[derive(Debug)]
pub struct CountryClient {
    http: reqwest::Client,
    source: CountrySource,
}

impl CountryClient {
    pub fn new(source: CountrySource) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { http, source })
    }

    /// Resolves a free-text country name to its normalized metadata.
    /// Transient failures (connect, timeout, upstream 5xx) are retried a
    /// bounded number of times.
    pub async fn lookup(&self, name: &str) -> Result<CountryData, CountryError> {
        let mut attempt = 0;
        loop {
            match self.lookup_once(name).await {
                Err(err) if attempt < TRANSIENT_RETRIES && is_transient(&err) => {
                    attempt += 1;
                    warn!(country = name, error = %err, attempt, "Retrying country lookup");
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                result => return result,
            }
        }
    }

    /// Lists the names of every country the upstream knows, for pickers and
    /// search suggestions. Same retry discipline as [`Self::lookup`].
    pub async fn all_names(&self) -> Result<Vec<String>, CountryError> {
        let mut attempt = 0;
        loop {
            match self.all_names_once().await {
                Err(err) if attempt < TRANSIENT_RETRIES && is_transient(&err) => {
                    attempt += 1;
                    warn!(error = %err, attempt, "Retrying country name listing");
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                result => return result,
            }
        }
    }

    async fn lookup_once(&self, name: &str) -> Result<CountryData, CountryError> {
        match &self.source {
            CountrySource::RestCountries { base_url } => {
                let response = self
                    .http
                    .get(format!("{base_url}/name/{name}"))
                    .send()
                    .await
                    .map_err(CountryError::Request)?;
                let response = check_status(response, name)?;

                let countries: Vec<ApiCountry> =
                    response.json().await.map_err(CountryError::Shape)?;
                let country = countries
                    .into_iter()
                    .next()
                    .ok_or_else(|| CountryError::NotFound(name.to_owned()))?;

                Ok(country.normalize())
            }
            CountrySource::Proxy {
                base_url,
                auth_token,
            } => {
                let response = self
                    .http
                    .get(format!("{base_url}/{name}"))
                    .header(AUTHORIZATION, auth_token)
                    .send()
                    .await
                    .map_err(CountryError::Request)?;
                let response = check_status(response, name)?;

                response.json().await.map_err(CountryError::Shape)
            }
        }
    }

    async fn all_names_once(&self) -> Result<Vec<String>, CountryError> {
        let request = match &self.source {
            CountrySource::RestCountries { base_url } => self.http.get(format!("{base_url}/all")),
            CountrySource::Proxy {
                base_url,
                auth_token,
            } => self
                .http
                .get(format!("{base_url}/all"))
                .header(AUTHORIZATION, auth_token),
        };

        let response = request.send().await.map_err(CountryError::Request)?;
        if !response.status().is_success() {
            return Err(CountryError::Status(response.status()));
        }

        let countries: Vec<ApiNamedCountry> = response.json().await.map_err(CountryError::Shape)?;
        Ok(countries
            .into_iter()
            .map(|country| country.name.common)
            .collect())
    }
}

fn check_status(response: reqwest::Response, name: &str) -> Result<reqwest::Response, CountryError> {
    if response.status() == StatusCode::NOT_FOUND {
        return Err(CountryError::NotFound(name.to_owned()));
    }
    if !response.status().is_success() {
        return Err(CountryError::Status(response.status()));
    }
    Ok(response)
}

fn is_transient(err: &CountryError) -> bool {
    match err {
        CountryError::Request(err) => err.is_timeout() || err.is_connect(),
        CountryError::Status(status) => status.is_server_error(),
        CountryError::NotFound(_) | CountryError::Shape(_) => false,
    }
}

/// The upstream record, reduced to the fields enrichment cares about.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct ApiCountry {
    name: ApiCountryName,
    #[serde(default)]
    capital: Vec<String>,
    #[serde(default)]
    currencies: BTreeMap<String, ApiCurrency>,
    #[serde(default)]
    languages: BTreeMap<String, String>,
    flags: ApiFlags,
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct ApiCountryName {
    common: String,
}

/// The `/all` listing only needs the name; everything else is ignored.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct ApiNamedCountry {
    name: ApiCountryName,
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct ApiCurrency {
    name: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct ApiFlags {
    png: String,
}

impl ApiCountry {
    fn normalize(self) -> CountryData {
        let capital = self
            .capital
            .into_iter()
            .next()
            .unwrap_or_else(|| NO_DATA_SENTINEL.to_owned());
        let currency = self
            .currencies
            .into_values()
            .next()
            .map_or_else(|| NO_DATA_SENTINEL.to_owned(), |currency| currency.name);

        CountryData {
            name: self.name.common,
            capital,
            currency,
            flag: self.flags.png,
            languages: self.languages.into_values().collect(),
        }
    }
}
