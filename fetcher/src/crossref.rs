//! CrossRef works lookup, with citing works from OpenCitations.

use crate::error::FetchError;
use crate::source::{FetchedWork, MetadataFetcher};
use async_trait::async_trait;
use citegraph_core::config::FetcherConfig;
use citegraph_core::model::{Identifier, Paper};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http client: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid endpoint {url:?}: {reason}")]
    Endpoint { url: String, reason: String },
}

pub struct CrossrefFetcher {
    client: reqwest::Client,
    base_url: Url,
    citations_url: Option<Url>,
}

impl CrossrefFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, ClientError> {
        let user_agent = match &config.mailto {
            Some(mailto) => format!("citegraph/{} (mailto:{mailto})", env!("CARGO_PKG_VERSION")),
            None => format!("citegraph/{}", env!("CARGO_PKG_VERSION")),
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(user_agent)
            .build()?;

        let citations_url = match config.citations_url.trim() {
            "" => None,
            url => Some(endpoint(url)?),
        };

        Ok(Self {
            client,
            base_url: endpoint(&config.base_url)?,
            citations_url,
        })
    }

    async fn get_text(&self, id: &Identifier, url: Url) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(transport_error)?;

        if let Some(err) = status_error(id, response.status()) {
            return Err(err);
        }
        response.text().await.map_err(transport_error)
    }

    async fn fetch_citing(&self, id: &Identifier, citations_url: &Url) -> Result<Vec<Identifier>, FetchError> {
        let url = with_segments(citations_url, &["citations", id.as_str()]);
        let body = self.get_text(id, url).await?;
        parse_citing(id, &body)
    }
}

#[async_trait]
impl MetadataFetcher for CrossrefFetcher {
    fn name(&self) -> &str {
        "crossref"
    }

    async fn fetch(&self, id: &Identifier) -> Result<FetchedWork, FetchError> {
        let url = with_segments(&self.base_url, &["works", id.as_str()]);
        debug!(identifier = %id, %url, "fetching work");

        let body = self.get_text(id, url).await?;
        let mut work = parse_work(id, &body).inspect_err(|err| {
            warn!(identifier = %id, error = %err, "malformed work record");
        })?;

        if let Some(citations_url) = &self.citations_url {
            match self.fetch_citing(id, citations_url).await {
                Ok(citing) => work.citation_ids = citing,
                Err(FetchError::NotFound(_)) => {}
                Err(err) => {
                    warn!(identifier = %id, error = %err, "citing works unavailable");
                    work.citations_complete = false;
                }
            }
        }

        Ok(work)
    }
}

fn endpoint(raw: &str) -> Result<Url, ClientError> {
    let invalid = |reason: String| ClientError::Endpoint {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw.trim()).map_err(|err| invalid(err.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("not a base url".into()));
    }
    Ok(url)
}

/// Appends percent-encoded path segments, so a `/`, `?` or `#` inside a DOI
/// stays part of its segment.
fn with_segments(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

fn transport_error(err: reqwest::Error) -> FetchError {
    if err.is_decode() {
        FetchError::MalformedResponse(err.to_string())
    } else {
        FetchError::Transient(err.to_string())
    }
}

/// Maps a non-success status to the failure it represents.
pub fn status_error(id: &Identifier, status: StatusCode) -> Option<FetchError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::NOT_FOUND | StatusCode::GONE | StatusCode::BAD_REQUEST => {
            FetchError::NotFound(id.clone())
        }
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited,
        StatusCode::REQUEST_TIMEOUT => FetchError::Transient(format!("status {status}")),
        s if s.is_server_error() => FetchError::Transient(format!("status {s}")),
        s => FetchError::MalformedResponse(format!("unexpected status {s}")),
    })
}

#[derive(Debug, Deserialize)]
struct WorkEnvelope {
    message: WorkMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct WorkMessage {
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    author: Vec<Author>,
    #[serde(default)]
    container_title: Vec<String>,
    published_print: Option<DateParts>,
    published_online: Option<DateParts>,
    issued: Option<DateParts>,
    created: Option<DateParts>,
    reference_count: Option<u64>,
    is_referenced_by_count: Option<u64>,
    #[serde(default)]
    reference: Vec<ReferenceEntry>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(default)]
    subject: Vec<String>,
    #[serde(rename = "URL")]
    url: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Author {
    given: Option<String>,
    family: Option<String>,
    name: Option<String>,
}

impl Author {
    fn display_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.given.as_deref(), self.family.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
        if !parts.is_empty() {
            return Some(parts.join(" "));
        }
        non_empty(self.name.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct DateParts {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Option<i64>>>,
}

impl DateParts {
    fn year(&self) -> Option<i32> {
        let year = (*self.date_parts.first()?.first()?)?;
        i32::try_from(year).ok()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ReferenceEntry {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    article_title: Option<String>,
    journal_title: Option<String>,
    year: Option<serde_json::Value>,
    author: Option<String>,
}

impl ReferenceEntry {
    fn summary(&self, id: Identifier) -> Option<Paper> {
        let title = non_empty(self.article_title.as_deref());
        let venue = non_empty(self.journal_title.as_deref());
        let year = self.year.as_ref().and_then(year_from_value);
        if title.is_none() && venue.is_none() && year.is_none() {
            return None;
        }

        let mut paper = Paper::new(id);
        paper.title = title;
        paper.venue = venue;
        paper.year = year;
        paper.authors = non_empty(self.author.as_deref()).into_iter().collect();
        Some(paper)
    }
}

#[derive(Debug, Deserialize)]
struct CitingEntry {
    citing: String,
}

/// Parses a `/works/{id}` body. The requested identifier is kept as the key.
pub fn parse_work(id: &Identifier, body: &str) -> Result<FetchedWork, FetchError> {
    let envelope: WorkEnvelope = serde_json::from_str(body)
        .map_err(|err| FetchError::MalformedResponse(err.to_string()))?;
    let message = envelope.message;

    let mut paper = Paper::new(id.clone());
    paper.title = message
        .title
        .iter()
        .find_map(|title| non_empty(Some(title.as_str())));
    paper.authors = message.author.iter().filter_map(Author::display_name).collect();
    paper.venue = message
        .container_title
        .iter()
        .find_map(|venue| non_empty(Some(venue.as_str())));
    paper.year = [
        &message.published_print,
        &message.published_online,
        &message.issued,
        &message.created,
    ]
    .into_iter()
    .flatten()
    .find_map(DateParts::year);
    paper.citation_count = message.is_referenced_by_count.unwrap_or(0);
    paper.reference_count = message
        .reference_count
        .unwrap_or(message.reference.len() as u64);
    paper.abstract_text = message
        .abstract_text
        .as_deref()
        .map(strip_markup)
        .filter(|text| !text.is_empty());
    paper.set_keywords(message.subject);
    paper.url = non_empty(message.url.as_deref());
    paper.kind = non_empty(message.kind.as_deref());

    let mut work = FetchedWork::new(paper);
    let mut seen = HashSet::new();
    for entry in &message.reference {
        let Some(ref_id) = entry.doi.as_deref().and_then(Identifier::parse) else {
            continue;
        };
        if ref_id == *id || !seen.insert(ref_id.clone()) {
            continue;
        }
        if let Some(summary) = entry.summary(ref_id.clone()) {
            work.reference_summaries.push(summary);
        }
        work.reference_ids.push(ref_id);
    }

    Ok(work)
}

/// Parses an OpenCitations `/citations/{id}` body into citing identifiers, in listed order.
pub fn parse_citing(id: &Identifier, body: &str) -> Result<Vec<Identifier>, FetchError> {
    let entries: Vec<CitingEntry> = serde_json::from_str(body)
        .map_err(|err| FetchError::MalformedResponse(err.to_string()))?;

    let mut seen = HashSet::new();
    Ok(entries
        .iter()
        .filter_map(|entry| citing_doi(&entry.citing))
        .filter(|citing| citing != id && seen.insert(citing.clone()))
        .collect())
}

/// Accepts a bare DOI or a space-separated id list such as `omid:br/1 doi:10.1/x`.
/// A list without a `doi:` token names no DOI.
fn citing_doi(raw: &str) -> Option<Identifier> {
    let raw = raw.trim();
    if raw.starts_with("10.") || raw.contains("doi.org/") {
        return raw.split_whitespace().next().and_then(Identifier::parse);
    }
    raw.split_whitespace()
        .find(|token| token.to_ascii_lowercase().starts_with("doi:"))
        .and_then(Identifier::parse)
}

fn year_from_value(value: &serde_json::Value) -> Option<i32> {
    match value {
        serde_json::Value::Number(number) => number.as_i64().and_then(|y| i32::try_from(y).ok()),
        serde_json::Value::String(text) => {
            let digits: String = text
                .trim()
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            if digits.len() == 4 {
                digits.parse().ok()
            } else {
                None
            }
        }
        _ => None,
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Drops JATS/HTML tags and collapses whitespace.
fn strip_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORK: &str = r#"{
        "status": "ok",
        "message": {
            "DOI": "10.1038/NATURE12373",
            "title": ["Nanometre-scale thermometry in a living cell"],
            "author": [
                {"given": "G.", "family": "Kucsko"},
                {"family": "Maurer"},
                {"name": "Harvard Quantum Group"}
            ],
            "container-title": ["Nature"],
            "published-online": {"date-parts": [[2013, 7, 31]]},
            "created": {"date-parts": [[2013, 8, 1]]},
            "reference-count": 4,
            "is-referenced-by-count": 1500,
            "reference": [
                {"key": "r1", "DOI": "10.1103/PhysRevLett.1", "article-title": "Spins", "year": "2010a"},
                {"key": "r2", "unstructured": "A book without a DOI"},
                {"key": "r3", "DOI": "https://doi.org/10.1126/science.2", "journal-title": "Science"},
                {"key": "r4", "DOI": "10.1103/physrevlett.1"},
                {"key": "r5", "DOI": "10.5555/bare"}
            ],
            "abstract": "<jats:p>Sensitive probing of temperature.</jats:p>",
            "subject": ["Multidisciplinary", "Multidisciplinary"],
            "URL": "http://dx.doi.org/10.1038/nature12373",
            "type": "journal-article"
        }
    }"#;

    fn id(raw: &str) -> Identifier {
        Identifier::parse(raw).unwrap()
    }

    #[test]
    fn parses_work_fields() {
        let work = parse_work(&id("10.1038/nature12373"), WORK).unwrap();
        let paper = &work.paper;

        assert_eq!(paper.identifier, id("10.1038/nature12373"));
        assert_eq!(paper.title.as_deref(), Some("Nanometre-scale thermometry in a living cell"));
        assert_eq!(paper.authors, vec!["G. Kucsko", "Maurer", "Harvard Quantum Group"]);
        assert_eq!(paper.venue.as_deref(), Some("Nature"));
        assert_eq!(paper.year, Some(2013));
        assert_eq!(paper.citation_count, 1500);
        assert_eq!(paper.reference_count, 4);
        assert_eq!(paper.abstract_text.as_deref(), Some("Sensitive probing of temperature."));
        assert_eq!(paper.keywords, vec!["Multidisciplinary"]);
        assert_eq!(paper.kind.as_deref(), Some("journal-article"));
    }

    #[test]
    fn references_keep_source_order_and_skip_missing_dois() {
        let work = parse_work(&id("10.1038/nature12373"), WORK).unwrap();
        assert_eq!(
            work.reference_ids,
            vec![
                id("10.1103/physrevlett.1"),
                id("10.1126/science.2"),
                id("10.5555/bare")
            ]
        );

        let summaries: Vec<(&Identifier, Option<i32>)> = work
            .reference_summaries
            .iter()
            .map(|paper| (&paper.identifier, paper.year))
            .collect();
        assert_eq!(
            summaries,
            vec![
                (&id("10.1103/physrevlett.1"), Some(2010)),
                (&id("10.1126/science.2"), None)
            ]
        );
    }

    #[test]
    fn year_falls_back_through_date_fields() {
        let body = r#"{"message": {"published-print": {"date-parts": [[null]]},
                                    "issued": {"date-parts": [[1999]]},
                                    "created": {"date-parts": [[2004, 1, 1]]}}}"#;
        let work = parse_work(&id("10.1/a"), body).unwrap();
        assert_eq!(work.paper.year, Some(1999));

        let body = r#"{"message": {}}"#;
        let work = parse_work(&id("10.1/a"), body).unwrap();
        assert_eq!(work.paper.year, None);
        assert!(work.paper.title.is_none());
        assert!(work.reference_ids.is_empty(), "no reference list degrades to no edges");
    }

    #[test]
    fn schema_mismatch_is_malformed() {
        for body in ["not json", r#"{"status": "ok"}"#, r#"{"message": {"title": "not a list"}}"#] {
            assert!(matches!(
                parse_work(&id("10.1/a"), body),
                Err(FetchError::MalformedResponse(_))
            ));
        }
    }

    #[test]
    fn parses_citing_entries() {
        let body = r#"[
            {"oci": "1", "citing": "10.1/X", "cited": "10.1/a"},
            {"oci": "2", "citing": "omid:br/06 doi:10.1/y pmid:123", "cited": "10.1/a"},
            {"oci": "3", "citing": "omid:br/07", "cited": "10.1/a"},
            {"oci": "4", "citing": "10.1/x", "cited": "10.1/a"},
            {"oci": "5", "citing": "10.1/a", "cited": "10.1/a"},
            {"oci": "6", "citing": "10.1002/(sici)1097-4636(199706)35:4<409::aid-jbm1>3.0.co;2-c", "cited": "10.1/a"},
            {"oci": "7", "citing": "https://doi.org/10.1/z", "cited": "10.1/a"}
        ]"#;
        assert_eq!(
            parse_citing(&id("10.1/a"), body).unwrap(),
            vec![
                id("10.1/x"),
                id("10.1/y"),
                id("10.1002/(sici)1097-4636(199706)35:4<409::aid-jbm1>3.0.co;2-c"),
                id("10.1/z")
            ]
        );
        assert!(parse_citing(&id("10.1/a"), "{}").is_err());
    }

    #[test]
    fn status_mapping() {
        let a = id("10.1/a");
        assert_eq!(status_error(&a, StatusCode::OK), None);
        assert_eq!(status_error(&a, StatusCode::NOT_FOUND), Some(FetchError::NotFound(a.clone())));
        assert_eq!(status_error(&a, StatusCode::TOO_MANY_REQUESTS), Some(FetchError::RateLimited));
        assert!(matches!(
            status_error(&a, StatusCode::SERVICE_UNAVAILABLE),
            Some(FetchError::Transient(_))
        ));
        assert!(matches!(
            status_error(&a, StatusCode::UNAUTHORIZED),
            Some(FetchError::MalformedResponse(_))
        ));
    }

    #[test]
    fn doi_is_one_encoded_path_segment() {
        let base = endpoint("https://api.crossref.org/").unwrap();
        assert_eq!(
            with_segments(&base, &["works", "10.1/a?b#c"]).as_str(),
            "https://api.crossref.org/works/10.1%2Fa%3Fb%23c"
        );

        let base = endpoint("https://opencitations.net/index/coci/api/v1").unwrap();
        assert_eq!(
            with_segments(&base, &["citations", "10.1/x"]).as_str(),
            "https://opencitations.net/index/coci/api/v1/citations/10.1%2Fx"
        );
        assert!(endpoint("not a url").is_err());
    }

    #[test]
    fn strips_markup() {
        assert_eq!(strip_markup("<p>a <b>b</b></p>\n c"), "a b c");
    }
}
