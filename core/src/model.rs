use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

const SCHEME_PREFIXES: [&str; 5] = [
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi:",
];

/// Canonical paper key: a DOI with scheme prefixes removed, trimmed and lowercased.
#[derive(
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
    serde::Serialize,
    serde::Deserialize,
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
)]
#[archive(check_bytes)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn parse(raw: &str) -> Option<Self> {
        let mut value = raw.trim().to_lowercase();
        for prefix in SCHEME_PREFIXES {
            if let Some(rest) = value.strip_prefix(prefix) {
                value = rest.trim().to_string();
                break;
            }
        }

        if value.is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
    serde::Serialize,
    serde::Deserialize,
    Debug,
    Clone,
    PartialEq,
)]
#[archive(check_bytes)]
pub struct Paper {
    pub identifier: Identifier,
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub venue: Option<String>,
    pub citation_count: u64,
    pub reference_count: u64,
    pub abstract_text: Option<String>,
    pub keywords: Vec<String>,
    pub url: Option<String>,
    pub kind: Option<String>,
}

impl Paper {
    pub fn new(identifier: Identifier) -> Self {
        Self {
            identifier,
            title: None,
            authors: Vec::new(),
            year: None,
            venue: None,
            citation_count: 0,
            reference_count: 0,
            abstract_text: None,
            keywords: Vec::new(),
            url: None,
            kind: None,
        }
    }

    pub fn set_keywords<I, S>(&mut self, keywords: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = keywords
            .into_iter()
            .map(Into::into)
            .map(|keyword| keyword.trim().to_string())
            .filter(|keyword| !keyword.is_empty())
            .collect();
        out.sort();
        out.dedup();
        self.keywords = out;
    }

    pub fn title_or_identifier(&self) -> &str {
        self.title.as_deref().unwrap_or(self.identifier.as_str())
    }
}

/// Directed citation fact: `citing` lists `cited` among its references.
#[derive(
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
    serde::Serialize,
    serde::Deserialize,
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
)]
#[archive(check_bytes)]
pub struct Edge {
    pub citing: Identifier,
    pub cited: Identifier,
}

impl Edge {
    pub fn new(citing: Identifier, cited: Identifier) -> Option<Self> {
        if citing == cited {
            return None;
        }
        Some(Self { citing, cited })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Reference,
    Citation,
}

#[derive(
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
    serde::Serialize,
    serde::Deserialize,
    Debug,
    Clone,
    PartialEq,
)]
#[archive(check_bytes)]
pub struct CacheRecord {
    pub paper: Paper,
    pub fetched_at_secs: u64,
    /// Whether the neighbor lists below are the complete lists reported by the source.
    pub fully_expanded: bool,
    pub references: Vec<Identifier>,
    pub citations: Vec<Identifier>,
}

impl CacheRecord {
    pub fn expanded(paper: Paper, references: Vec<Identifier>, citations: Vec<Identifier>) -> Self {
        Self {
            paper,
            fetched_at_secs: now_secs(),
            fully_expanded: true,
            references,
            citations,
        }
    }

    pub fn summary(paper: Paper) -> Self {
        Self {
            paper,
            fetched_at_secs: now_secs(),
            fully_expanded: false,
            references: Vec::new(),
            citations: Vec::new(),
        }
    }

    pub fn identifier(&self) -> &Identifier {
        &self.paper.identifier
    }

    pub fn neighbors(&self, kind: EdgeKind) -> &[Identifier] {
        match kind {
            EdgeKind::Reference => &self.references,
            EdgeKind::Citation => &self.citations,
        }
    }

    pub fn edges(&self) -> Vec<Edge> {
        let id = self.identifier();
        let outgoing = self
            .references
            .iter()
            .filter_map(|cited| Edge::new(id.clone(), cited.clone()));
        let incoming = self
            .citations
            .iter()
            .filter_map(|citing| Edge::new(citing.clone(), id.clone()));
        outgoing.chain(incoming).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PaperFilter {
    #[serde(default)]
    pub min_year: Option<i32>,
    #[serde(default)]
    pub max_year: Option<i32>,
    #[serde(default)]
    pub min_citations: Option<u64>,
}

impl PaperFilter {
    pub fn is_empty(&self) -> bool {
        self.min_year.is_none() && self.max_year.is_none() && self.min_citations.is_none()
    }

    pub fn matches(&self, paper: &Paper) -> bool {
        if self.min_year.is_some() || self.max_year.is_some() {
            let Some(year) = paper.year else {
                return false;
            };
            if self.min_year.is_some_and(|min| year < min) {
                return false;
            }
            if self.max_year.is_some_and(|max| year > max) {
                return false;
            }
        }

        if let Some(min) = self.min_citations {
            if paper.citation_count < min {
                return false;
            }
        }

        true
    }
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
