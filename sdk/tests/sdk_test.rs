use citegraph_core::error::{CitegraphError, ErrorCode};
use citegraph_core::model::EdgeKind;
use citegraph_sdk::export::{graph_json, histogram_csv, papers_csv, report_json};
use citegraph_sdk::{AppConfig, CiteGraph, Identifier, Paper, PaperFilter, SdkError};
use fetcher::{FetchError, FetchedWork, MetadataFetcher, MockFetcher};
use std::sync::Arc;
use storage::LocalStore;
use tempfile::TempDir;

const SEED: &str = "10.1038/nature12373";

fn id(raw: &str) -> Identifier {
    Identifier::parse(raw).unwrap()
}

fn work(raw: &str, year: i32, citations: u64, references: &[&str], citing: &[&str]) -> FetchedWork {
    let mut paper = Paper::new(id(raw));
    paper.title = Some(format!("Paper {raw}"));
    paper.authors = vec!["A. Author".into()];
    paper.year = Some(year);
    paper.citation_count = citations;
    paper.reference_count = references.len() as u64;
    let mut work = FetchedWork::new(paper);
    work.reference_ids = references.iter().map(|r| id(r)).collect();
    work.citation_ids = citing.iter().map(|c| id(c)).collect();
    work
}

fn catalog() -> MockFetcher {
    let mock = MockFetcher::new();
    let mut seed = work(SEED, 2013, 420, &["10.9/r1", "10.9/r2"], &["10.9/c1"]);
    seed.paper.set_keywords(["thermometry", "nanoscale"]);
    mock.insert(seed);
    mock.insert(work("10.9/r1", 2001, 90, &[], &[SEED]));
    mock.insert(work("10.9/r2", 2005, 15, &["10.9/r1"], &[SEED]));
    mock.insert(work("10.9/c1", 2019, 2, &[SEED, "10.9/r1"], &[]));
    mock
}

async fn open_with(mock: MockFetcher) -> (TempDir, CiteGraph, Arc<MockFetcher>) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::defaults().unwrap();
    config.store.path = dir.path().join("cache.wal").to_string_lossy().into_owned();
    config.expansion.fan_out_cap = 5;

    let store = Arc::new(LocalStore::open(&config.store.path).await.unwrap());
    let mock = Arc::new(mock);
    let graph = CiteGraph::with_fetcher(config, store, mock.clone() as Arc<dyn MetadataFetcher>);
    (dir, graph, mock)
}

#[tokio::test]
async fn expand_uses_default_depth_and_analyzes() {
    let (_dir, citegraph, mock) = open_with(catalog()).await;

    let expansion = citegraph
        .expand(" https://doi.org/10.1038/NATURE12373 ", None, PaperFilter::default())
        .await
        .unwrap();
    let graph = &expansion.graph;
    assert_eq!(graph.root(), &id(SEED));
    assert_eq!(graph.node_count(), 4);
    // seed->r1, seed->r2, c1->seed, r2->r1, c1->r1
    assert_eq!(graph.edge_count(), 5);
    assert_eq!(mock.call_count(), 4);
    assert!(expansion.unresolved.is_empty());

    let report = citegraph.analyze(graph);
    assert_eq!(report.statistics.node_count, 4);
    assert!((report.statistics.density - 5.0 / 12.0).abs() < 1e-12);
    let pagerank_total: f64 = report.pagerank.values().sum();
    assert!((pagerank_total - 1.0).abs() < 1e-6);
    assert_eq!(report.year_histogram.total(), 4);

    let ranked = citegraph.most_relevant(graph, 2);
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].paper.identifier, id(SEED));
}

#[tokio::test]
async fn second_run_is_served_from_the_store() {
    let (_dir, citegraph, mock) = open_with(catalog()).await;

    let first = citegraph
        .expand(SEED, Some(1), PaperFilter::default())
        .await
        .unwrap();
    mock.reset_calls();
    let second = citegraph
        .expand(SEED, Some(1), PaperFilter::default())
        .await
        .unwrap();

    assert_eq!(mock.call_count(), 0);
    assert_eq!(second.stats.fetches, 0);
    assert_eq!(
        first.graph.node_ids().collect::<Vec<_>>(),
        second.graph.node_ids().collect::<Vec<_>>()
    );
    assert_eq!(first.graph.edge_count(), second.graph.edge_count());

    let snapshot = citegraph.metrics_snapshot();
    assert_eq!(snapshot.expansions, 2);
    assert_eq!(snapshot.cache_hits, 4);
}

#[tokio::test]
async fn store_queries_after_expansion() {
    let (_dir, citegraph, _mock) = open_with(catalog()).await;
    citegraph
        .expand(SEED, Some(1), PaperFilter::default())
        .await
        .unwrap();

    let stats = citegraph.store_stats().await;
    assert_eq!(stats.paper_count, 4);
    assert_eq!(stats.fully_expanded_count, 4);
    assert_eq!(stats.min_year, Some(2001));
    assert_eq!(stats.max_year, Some(2019));

    let recent = citegraph
        .papers(PaperFilter {
            min_year: Some(2010),
            ..PaperFilter::default()
        })
        .await;
    let recent_ids: Vec<&str> = recent.iter().map(|p| p.identifier.as_str()).collect();
    assert_eq!(recent_ids, vec![SEED, "10.9/c1"]);

    let hits = citegraph.search("thermometry", 10).await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].identifier, id(SEED));

    let references = citegraph.neighbors(SEED, EdgeKind::Reference).await.unwrap();
    assert_eq!(references, vec![id("10.9/r1"), id("10.9/r2")]);

    // r2 and seed both cite r1.
    let related = citegraph.related("10.9/r2", 5).await.unwrap();
    assert!(related.iter().any(|(other, _)| other == &id(SEED)));
}

#[tokio::test]
async fn invalid_and_unknown_seeds() {
    let (_dir, citegraph, mock) = open_with(catalog()).await;

    let err = citegraph
        .expand("   ", None, PaperFilter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::InvalidIdentifier(_)));
    assert_eq!(err.error_code(), ErrorCode::InvalidArgument);

    mock.fail_always(&id("10.9/gone"), FetchError::NotFound(id("10.9/gone")));
    let err = citegraph
        .expand("10.9/gone", None, PaperFilter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::Build(_)));
    assert_eq!(err.error_code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn exports_from_an_expansion() {
    let (_dir, citegraph, _mock) = open_with(catalog()).await;
    let expansion = citegraph
        .expand(SEED, Some(1), PaperFilter::default())
        .await
        .unwrap();
    let graph = &expansion.graph;

    let json: serde_json::Value = serde_json::from_str(&graph_json(graph).unwrap()).unwrap();
    assert_eq!(json["root"], SEED);
    assert_eq!(json["nodes"].as_array().map(Vec::len), Some(4));
    assert_eq!(json["edges"].as_array().map(Vec::len), Some(5));

    let csv = papers_csv(graph.papers());
    assert_eq!(csv.lines().count(), 5);
    assert!(csv.starts_with("identifier,title,authors,year,venue,citation_count,reference_count"));

    let report = citegraph.analyze(graph);
    let histogram = histogram_csv(&report.year_histogram);
    assert_eq!(histogram.lines().count(), 5);
    assert!(report_json(&report).unwrap().contains("\"pagerank\""));
}

#[tokio::test]
async fn open_builds_the_http_stack_without_network() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::defaults().unwrap();
    config.store.path = dir.path().join("nested/cache.wal").to_string_lossy().into_owned();
    config.store.compact_on_open = true;

    let citegraph = CiteGraph::open(config).await.unwrap();
    assert_eq!(citegraph.store_stats().await.paper_count, 0);
    assert!(citegraph.lookup(SEED).await.unwrap().is_none());
}
