use super::{clean_abstract_text, AbstractSource, EnrichmentError};
use crate::records::normalize_title;
use crate::reviews::EnrichmentSettings;
use anyhow::{Context, Result};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use strsim::jaro_winkler;
use tracing::debug;

const TITLE_MATCH_THRESHOLD: f64 = 0.9;

#[derive(Debug, Deserialize)]
struct WorkEnvelope {
    message: Work,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    message: SearchMessage,
}

#[derive(Debug, Deserialize)]
struct SearchMessage {
    #[serde(default)]
    items: Vec<Work>,
}

#[derive(Debug, Deserialize)]
struct Work {
    #[serde(default, rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(default)]
    title: Vec<String>,
}

/// Blocking client for the Crossref REST API.
pub struct CrossrefClient {
    http: Client,
    base_url: String,
    min_chars: usize,
}

impl CrossrefClient {
    pub fn new(settings: &EnrichmentSettings) -> Result<Self> {
        let user_agent = match settings.mailto.as_deref() {
            Some(mail) => format!("reviewbase/{} (mailto:{mail})", env!("CARGO_PKG_VERSION")),
            None => format!("reviewbase/{}", env!("CARGO_PKG_VERSION")),
        };
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to build Crossref HTTP client")?;
        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            min_chars: settings.min_abstract_chars,
        })
    }

    fn by_doi(&self, doi: &str) -> Result<String, EnrichmentError> {
        let url = format!("{}/works/{}", self.base_url, doi);
        let response = self.http.get(&url).send().map_err(transport_error)?;
        let envelope: WorkEnvelope = check_status(response)?
            .json()
            .map_err(transport_error)?;
        self.accept(envelope.message.abstract_text)
    }

    fn by_title(&self, title: &str) -> Result<String, EnrichmentError> {
        let url = format!("{}/works", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("query.bibliographic", title), ("rows", "1")])
            .send()
            .map_err(transport_error)?;
        let envelope: SearchEnvelope = check_status(response)?
            .json()
            .map_err(transport_error)?;
        let wanted = normalize_title(title);
        let work = envelope
            .message
            .items
            .into_iter()
            .find(|work| {
                work.title
                    .iter()
                    .any(|t| jaro_winkler(&wanted, &normalize_title(t)) >= TITLE_MATCH_THRESHOLD)
            })
            .ok_or(EnrichmentError::NotFound)?;
        self.accept(work.abstract_text)
    }

    fn accept(&self, raw: Option<String>) -> Result<String, EnrichmentError> {
        accept_abstract(raw.as_deref(), self.min_chars)
    }
}

/// Cleans a Crossref abstract; anything shorter than `min_chars` counts as missing.
fn accept_abstract(raw: Option<&str>, min_chars: usize) -> Result<String, EnrichmentError> {
    let cleaned = raw.map(clean_abstract_text).unwrap_or_default();
    if cleaned.chars().count() < min_chars {
        return Err(EnrichmentError::NotFound);
    }
    Ok(cleaned)
}

impl AbstractSource for CrossrefClient {
    fn fetch_abstract(&self, doi: Option<&str>, title: &str) -> Result<String, EnrichmentError> {
        debug!(doi, title, "querying crossref for abstract");
        match doi {
            Some(doi) => self.by_doi(doi),
            None => self.by_title(title),
        }
    }
}

fn check_status(response: Response) -> Result<Response, EnrichmentError> {
    match status_error(response.status()) {
        Some(err) => Err(err),
        None => Ok(response),
    }
}

fn status_error(status: StatusCode) -> Option<EnrichmentError> {
    match status {
        status if status.is_success() => None,
        StatusCode::NOT_FOUND => Some(EnrichmentError::NotFound),
        StatusCode::TOO_MANY_REQUESTS => Some(EnrichmentError::RateLimited),
        status => Some(EnrichmentError::Unavailable(format!("HTTP {status}"))),
    }
}

fn transport_error(err: reqwest::Error) -> EnrichmentError {
    EnrichmentError::Unavailable(err.to_string())
}
