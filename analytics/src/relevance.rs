use citegraph_core::model::Paper;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

const CITATION_WEIGHT: f64 = 40.0;
const CITATIONS_FOR_FULL_SCORE: f64 = 100.0;
const AGE_WEIGHT: f64 = 30.0;
const AGE_SPAN_YEARS: f64 = 50.0;
const KEYWORD_WEIGHT: f64 = 10.0;

const VENUE_TIERS: [(&[&str], f64); 3] = [
    (&["nature", "science"], 20.0),
    (&["cell", "lancet"], 18.0),
    (&["pnas", "jama"], 15.0),
];
const DEFAULT_VENUE_SCORE: f64 = 10.0;

pub const DEFAULT_RELEVANCE_LIMIT: usize = 15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPaper {
    pub paper: Paper,
    pub score: f64,
}

/// Scores each paper out of 100 and returns the best `limit`, highest first.
///
/// Citation count contributes up to 40 (saturating at 100 citations), age
/// relative to `reference_year` up to 30 (saturating at 50 years, unknown
/// year scores 0), venue tier 10 to 20, and keyword overlap up to 10. Ties
/// are broken by identifier.
pub fn rank_by_relevance<'a, I>(
    papers: I,
    keywords: &[String],
    reference_year: i32,
    limit: usize,
) -> Vec<RankedPaper>
where
    I: IntoIterator<Item = &'a Paper>,
{
    let keywords: Vec<String> = keywords
        .iter()
        .map(|keyword| keyword.trim().to_lowercase())
        .filter(|keyword| !keyword.is_empty())
        .collect();

    let mut ranked: Vec<RankedPaper> = papers
        .into_iter()
        .map(|paper| RankedPaper {
            score: relevance_score(paper, &keywords, reference_year),
            paper: paper.clone(),
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.paper.identifier.cmp(&b.paper.identifier))
    });
    ranked.truncate(limit);
    ranked
}

/// `keywords` are expected lowercased and non-empty.
fn relevance_score(paper: &Paper, keywords: &[String], reference_year: i32) -> f64 {
    citation_score(paper.citation_count)
        + age_score(paper.year, reference_year)
        + venue_score(paper.venue.as_deref())
        + keyword_score(&paper.keywords, keywords)
}

fn citation_score(citation_count: u64) -> f64 {
    (citation_count as f64 / CITATIONS_FOR_FULL_SCORE).min(1.0) * CITATION_WEIGHT
}

fn age_score(year: Option<i32>, reference_year: i32) -> f64 {
    match year {
        Some(year) => {
            let age = f64::from(reference_year - year) / AGE_SPAN_YEARS;
            age.clamp(0.0, 1.0) * AGE_WEIGHT
        }
        None => 0.0,
    }
}

fn venue_score(venue: Option<&str>) -> f64 {
    let Some(venue) = venue else {
        return DEFAULT_VENUE_SCORE;
    };
    let venue = venue.to_lowercase();
    VENUE_TIERS
        .iter()
        .find(|(names, _)| names.iter().any(|name| venue.contains(name)))
        .map(|(_, score)| *score)
        .unwrap_or(DEFAULT_VENUE_SCORE)
}

/// A query keyword matches when it contains, or is contained in, any paper keyword.
fn keyword_score(paper_keywords: &[String], keywords: &[String]) -> f64 {
    if keywords.is_empty() || paper_keywords.is_empty() {
        return 0.0;
    }
    let paper_keywords: Vec<String> = paper_keywords.iter().map(|k| k.to_lowercase()).collect();
    let matches = keywords
        .iter()
        .filter(|keyword| {
            paper_keywords
                .iter()
                .any(|pk| pk.contains(keyword.as_str()) || keyword.contains(pk.as_str()))
        })
        .count();
    (matches as f64 / keywords.len() as f64).min(1.0) * KEYWORD_WEIGHT
}
