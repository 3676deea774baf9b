use citegraph_core::config::AppConfig;
use citegraph_core::model::Identifier;
use fetcher::{CrossrefFetcher, FetchError, MetadataFetcher};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serves canned `(status, body)` responses keyed by request path.
async fn serve(routes: HashMap<String, (u16, String)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes = Arc::new(routes);

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let routes = routes.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                }
                let request = String::from_utf8_lossy(&request);
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                let (status, body) = routes
                    .get(&path)
                    .cloned()
                    .unwrap_or((404, "{}".to_string()));
                let response = format!(
                    "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{addr}")
}

fn id(raw: &str) -> Identifier {
    Identifier::parse(raw).unwrap()
}

fn fetcher_for(base: &str, citations: bool) -> CrossrefFetcher {
    let mut config = AppConfig::defaults().unwrap().fetcher;
    config.base_url = base.to_string();
    config.citations_url = if citations {
        format!("{base}/coci")
    } else {
        String::new()
    };
    config.timeout_ms = 2_000;
    CrossrefFetcher::new(&config).unwrap()
}

#[tokio::test]
async fn fetches_work_and_citing_ids() {
    let mut routes = HashMap::new();
    routes.insert(
        "/works/10.1%2Froot".to_string(),
        (
            200,
            r#"{"message": {"title": ["Root"], "issued": {"date-parts": [[2012]]},
                "reference": [{"DOI": "10.1/r1"}, {"DOI": "10.1/r2"}]}}"#
                .to_string(),
        ),
    );
    routes.insert(
        "/coci/citations/10.1%2Froot".to_string(),
        (200, r#"[{"citing": "10.1/c1"}, {"citing": "10.1/c2"}]"#.to_string()),
    );
    let base = serve(routes).await;

    let work = fetcher_for(&base, true).fetch(&id("10.1/root")).await.unwrap();
    assert_eq!(work.paper.title.as_deref(), Some("Root"));
    assert_eq!(work.paper.year, Some(2012));
    assert_eq!(work.reference_ids, vec![id("10.1/r1"), id("10.1/r2")]);
    assert_eq!(work.citation_ids, vec![id("10.1/c1"), id("10.1/c2")]);
    assert!(work.citations_complete);
}

#[tokio::test]
async fn citing_lookup_failure_marks_citations_incomplete() {
    let mut routes = HashMap::new();
    routes.insert(
        "/works/10.1%2Froot".to_string(),
        (200, r#"{"message": {"reference": [{"DOI": "10.1/r1"}]}}"#.to_string()),
    );
    routes.insert(
        "/coci/citations/10.1%2Froot".to_string(),
        (503, "{}".to_string()),
    );
    routes.insert(
        "/works/10.1%2Flonely".to_string(),
        (200, r#"{"message": {}}"#.to_string()),
    );
    let base = serve(routes).await;

    let fetcher = fetcher_for(&base, true);
    let work = fetcher.fetch(&id("10.1/root")).await.unwrap();
    assert_eq!(work.reference_ids, vec![id("10.1/r1")]);
    assert!(work.citation_ids.is_empty());
    assert!(!work.citations_complete);

    // No citing record at all is a complete, empty list.
    let work = fetcher.fetch(&id("10.1/lonely")).await.unwrap();
    assert!(work.citation_ids.is_empty());
    assert!(work.citations_complete);
}

#[tokio::test]
async fn maps_http_failures() {
    let mut routes = HashMap::new();
    routes.insert("/works/10.1%2Flimited".to_string(), (429, "{}".to_string()));
    routes.insert("/works/10.1%2Fdown".to_string(), (503, "{}".to_string()));
    routes.insert("/works/10.1%2Fgarbled".to_string(), (200, "<html>".to_string()));
    let base = serve(routes).await;
    let fetcher = fetcher_for(&base, false);

    assert_eq!(
        fetcher.fetch(&id("10.1/missing")).await,
        Err(FetchError::NotFound(id("10.1/missing")))
    );
    assert_eq!(fetcher.fetch(&id("10.1/limited")).await, Err(FetchError::RateLimited));
    assert!(matches!(
        fetcher.fetch(&id("10.1/down")).await,
        Err(FetchError::Transient(_))
    ));
    assert!(matches!(
        fetcher.fetch(&id("10.1/garbled")).await,
        Err(FetchError::MalformedResponse(_))
    ));
}

#[tokio::test]
async fn doi_with_reserved_characters_stays_in_the_path() {
    let mut routes = HashMap::new();
    routes.insert(
        "/works/10.1%2Fa%3Fb%23c".to_string(),
        (200, r#"{"message": {"title": ["Odd"]}}"#.to_string()),
    );
    let base = serve(routes).await;

    let work = fetcher_for(&base, false).fetch(&id("10.1/a?b#c")).await.unwrap();
    assert_eq!(work.paper.title.as_deref(), Some("Odd"));
}

#[tokio::test]
async fn unreachable_host_is_transient() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let fetcher = fetcher_for(&format!("http://{addr}"), false);
    assert!(matches!(
        fetcher.fetch(&id("10.1/a")).await,
        Err(FetchError::Transient(_))
    ));
}
