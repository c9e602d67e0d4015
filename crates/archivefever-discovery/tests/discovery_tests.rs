//! Tests for archivefever-discovery: ranking, bounded retries, escalation,
//! ingestion over HTTP, search providers and the delayed reading queue

use archivefever_core::*;
use archivefever_discovery::*;
use archivefever_store::{MemoryStore, Store};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ===========================================================================
// Fakes
// ===========================================================================

struct StaticProvider {
    results: Vec<TextCandidate>,
    calls: AtomicUsize,
}

impl StaticProvider {
    fn new(results: Vec<TextCandidate>) -> Arc<Self> {
        Arc::new(Self {
            results,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SearchProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }
    async fn search(&self, _query: &str) -> DiscoveryResult<Vec<TextCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(self.results.clone())
    }
}

struct BrokenProvider;

#[async_trait]
impl SearchProvider for BrokenProvider {
    fn name(&self) -> &str {
        "broken"
    }
    async fn search(&self, _query: &str) -> DiscoveryResult<Vec<TextCandidate>> {
        Err(DiscoveryError::Parse("garbage".into()))
    }
}

struct StalledProvider;

#[async_trait]
impl SearchProvider for StalledProvider {
    fn name(&self) -> &str {
        "stalled"
    }
    async fn search(&self, _query: &str) -> DiscoveryResult<Vec<TextCandidate>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(vec![candidate("Never", "https://slow/never.txt")])
    }
}

/// Serves bodies from a map; unknown URLs fail. Records every fetch.
#[derive(Default)]
struct MapFetcher {
    bodies: HashMap<String, String>,
    fetched: Mutex<Vec<String>>,
}

impl MapFetcher {
    fn with(bodies: &[(&str, String)]) -> Arc<Self> {
        Arc::new(Self {
            bodies: bodies.iter().map(|(u, b)| (u.to_string(), b.clone())).collect(),
            fetched: Mutex::new(Vec::new()),
        })
    }

    fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> DiscoveryResult<String> {
        self.fetched.lock().unwrap().push(url.to_string());
        self.bodies.get(url).cloned().ok_or(DiscoveryError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

#[derive(Default)]
struct RecordingReader {
    readings: Mutex<Vec<PassageReading>>,
}

impl RecordingReader {
    fn titles_and_indices(&self) -> Vec<(String, usize)> {
        self.readings
            .lock()
            .unwrap()
            .iter()
            .map(|r| (r.title.clone(), r.index))
            .collect()
    }
}

#[async_trait]
impl PassageReader for RecordingReader {
    async fn read_passage(&self, reading: PassageReading) {
        self.readings.lock().unwrap().push(reading);
    }
}

fn candidate(title: &str, url: &str) -> TextCandidate {
    TextCandidate::new(title, "Author", url, "Test")
}

fn long_text() -> String {
    let sentence = "Duration is the continuous progress of the past which gnaws into the future";
    vec![sentence; 40].join(". ")
}

struct Harness {
    discovery: TextDiscovery,
    store: Arc<MemoryStore>,
    broadcaster: Broadcaster,
    _worker: ReadingWorker,
}

fn harness(providers: Vec<Arc<dyn SearchProvider>>, fetcher: Arc<dyn Fetcher>, config: DiscoveryConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let broadcaster = Broadcaster::new(64);
    let (queue, worker) = ReadingQueue::channel();
    let discovery = TextDiscovery::new(providers, fetcher, store.clone(), broadcaster.clone(), queue, config);
    Harness {
        discovery,
        store,
        broadcaster,
        _worker: worker,
    }
}

// ===========================================================================
// Ranking
// ===========================================================================

#[test]
fn rank_drops_blank_and_dedups_by_url() {
    let mut blank_title = candidate("", "https://x/blank-title.txt");
    blank_title.title = "  ".into();
    let ranked = rank_candidates(vec![
        candidate("First", "https://x/a.txt"),
        candidate("Duplicate", "https://x/a.txt"),
        candidate("No url", ""),
        blank_title,
        candidate("Second", "https://x/b.txt"),
    ]);
    let titles: Vec<_> = ranked.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["First", "Second"]);
}

#[test]
fn rank_orders_by_citations_then_year_stably() {
    let mut cited = candidate("Cited", "https://x/cited.txt");
    cited.citation_count = Some(900);
    let mut recent = candidate("Recent", "https://x/recent.txt");
    recent.year = Some(1990);
    let mut old = candidate("Old", "https://x/old.txt");
    old.year = Some(1889);
    let plain_a = candidate("Plain A", "https://x/pa.txt");
    let plain_b = candidate("Plain B", "https://x/pb.txt");

    let ranked = rank_candidates(vec![plain_a, old, plain_b, cited, recent]);
    let titles: Vec<_> = ranked.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Cited", "Recent", "Old", "Plain A", "Plain B"]);
}

// ===========================================================================
// search_for_texts
// ===========================================================================

#[tokio::test]
async fn downloads_are_bounded_then_escalated() {
    let provider = StaticProvider::new(
        (0..5)
            .map(|i| candidate(&format!("Text {}", i), &format!("https://x/{}.txt", i)))
            .collect(),
    );
    let fetcher = MapFetcher::with(&[]);
    let h = harness(vec![provider], fetcher.clone(), DiscoveryConfig::default());
    let mut rx = h.broadcaster.subscribe();

    let outcome = h.discovery.search_for_texts("Bergson duration").await.unwrap();

    assert_eq!(fetcher.fetched().len(), 3);
    let request_id = match outcome {
        DiscoveryOutcome::Escalated { request_id } => request_id,
        other => panic!("expected escalation, got {:?}", other),
    };
    let rows = h.store.list_research_requests_with_counts().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].request.id, request_id);
    assert!(rows[0].request.message.contains("\"Bergson duration\""));
    assert!(rows[0].request.message.contains("Text 0; Text 1; Text 2"));
    assert!(!rows[0].request.message.contains("Text 3"));

    match rx.recv().await.unwrap() {
        StreamEvent::ResearchRequest(req) => assert_eq!(req.id, request_id),
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn no_candidates_escalates_once() {
    let h = harness(vec![StaticProvider::new(vec![])], MapFetcher::with(&[]), DiscoveryConfig::default());
    let mut rx = h.broadcaster.subscribe();

    let outcome = h.discovery.search_for_texts("Bergson duration").await.unwrap();
    assert!(matches!(outcome, DiscoveryOutcome::Escalated { .. }));

    let rows = h.store.list_research_requests_with_counts().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].request.query, "Bergson duration");
    assert_eq!(rows[0].request.status, RequestStatus::Pending);
    assert!(!rows[0].request.message.contains("couldn't access them"));
    assert_eq!(rx.recv().await.unwrap().name(), "research_request");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn first_success_stops_the_attempts() {
    let provider = StaticProvider::new(vec![
        candidate("Missing", "https://x/missing.txt"),
        candidate("Present", "https://x/present.txt"),
        candidate("Never tried", "https://x/never.txt"),
    ]);
    let fetcher = MapFetcher::with(&[("https://x/present.txt", long_text()), ("https://x/never.txt", long_text())]);
    let h = harness(vec![provider], fetcher.clone(), DiscoveryConfig::default());
    let mut rx = h.broadcaster.subscribe();

    let outcome = h.discovery.search_for_texts("duration").await.unwrap();
    assert!(matches!(outcome, DiscoveryOutcome::Ingested { .. }));
    assert_eq!(fetcher.fetched(), vec!["https://x/missing.txt", "https://x/present.txt"]);

    let texts = h.store.list_discovered_texts().await.unwrap();
    assert_eq!(texts.len(), 1);
    assert_eq!(texts[0].title, "Present");
    assert_eq!(texts[0].discovered_for, "duration");
    assert!(h.store.list_research_requests_with_counts().await.unwrap().is_empty());

    match rx.recv().await.unwrap() {
        StreamEvent::TextDiscovered(notice) => {
            assert_eq!(notice.title, "Present");
            assert_eq!(notice.original_query, "duration");
            assert_eq!(notice.status, "processing");
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn failing_and_slow_providers_count_as_empty() {
    let good = StaticProvider::new(vec![candidate("Good", "https://x/good.txt")]);
    let fetcher = MapFetcher::with(&[("https://x/good.txt", long_text())]);
    let config = DiscoveryConfig {
        provider_timeout: Duration::from_millis(200),
        ..Default::default()
    };
    let h = harness(
        vec![Arc::new(BrokenProvider), Arc::new(StalledProvider), good],
        fetcher.clone(),
        config,
    );

    let outcome = h.discovery.search_for_texts("anything").await.unwrap();
    assert!(matches!(outcome, DiscoveryOutcome::Ingested { .. }));
    assert_eq!(fetcher.fetched(), vec!["https://x/good.txt"]);
}

#[tokio::test]
async fn short_texts_are_rejected() {
    let fetcher = MapFetcher::with(&[("https://x/short.txt", "Too short to read.".to_string())]);
    let h = harness(vec![], fetcher, DiscoveryConfig::default());
    let ok = h
        .discovery
        .download_and_ingest(&candidate("Short", "https://x/short.txt"), "q")
        .await;
    assert!(!ok);
    assert!(h.store.list_discovered_texts().await.unwrap().is_empty());
}

#[tokio::test]
async fn not_found_then_success_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.txt"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    let body = format!(
        "Header\n*** START OF THE PROJECT GUTENBERG EBOOK TIME ***\n{}\n*** END OF THE PROJECT GUTENBERG EBOOK TIME ***\nLicense",
        long_text()
    );
    Mock::given(method("GET"))
        .and(path("/time.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(&server)
        .await;

    let mut gone = candidate("Gone", &format!("{}/gone.txt", server.uri()));
    gone.citation_count = Some(10);
    let time = candidate("Time and Free Will", &format!("{}/time.txt", server.uri()));
    let h = harness(
        vec![StaticProvider::new(vec![time, gone])],
        Arc::new(HttpFetcher::new()),
        DiscoveryConfig::default(),
    );

    let outcome = h.discovery.search_for_texts("Bergson").await.unwrap();
    let text_id = match outcome {
        DiscoveryOutcome::Ingested { text_id } => text_id,
        other => panic!("expected ingestion, got {:?}", other),
    };
    let stored = h.store.discovered_text(&text_id).await.unwrap();
    assert_eq!(stored.title, "Time and Free Will");
    assert!(!stored.content.contains("START OF"));
    assert!(!stored.content.contains("License"));
    assert_eq!(stored.analysis_status, AnalysisStatus::Pending);
}

// ===========================================================================
// process_hungers
// ===========================================================================

#[tokio::test]
async fn duplicate_hungers_search_once() {
    let provider = StaticProvider::new(vec![]);
    let h = harness(vec![provider.clone()], MapFetcher::with(&[]), DiscoveryConfig::default());

    let outcomes = h
        .discovery
        .process_hungers(&["Bergson duration".into(), "bergson DURATION ".into(), "  ".into()])
        .await;

    assert_eq!(outcomes.len(), 1);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

    // Once finished, the same hunger may be searched again.
    h.discovery.process_hungers(&["Bergson duration".into()]).await;
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn distinct_hungers_each_resolve() {
    let h = harness(vec![StaticProvider::new(vec![])], MapFetcher::with(&[]), DiscoveryConfig::default());
    let outcomes = h
        .discovery
        .process_hungers(&["Derrida archive".into(), "Husserl time".into()])
        .await;
    assert_eq!(outcomes.len(), 2);
    assert_eq!(h.store.list_research_requests_with_counts().await.unwrap().len(), 2);
}

// ===========================================================================
// Reading queue
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn readings_fire_in_due_order() {
    let (queue, worker) = ReadingQueue::channel();
    let reader = Arc::new(RecordingReader::default());
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(worker.run(reader.clone(), cancel.clone()));

    let reading = |title: &str, index| PassageReading {
        text_id: "t".into(),
        title: title.into(),
        author: "a".into(),
        passage: "p".into(),
        index,
    };
    assert!(queue.enqueue_after(Duration::from_secs(600), reading("late", 2)));
    assert!(queue.enqueue_after(Duration::ZERO, reading("now", 0)));
    assert!(queue.enqueue_after(Duration::from_secs(300), reading("soon", 1)));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(reader.titles_and_indices(), vec![("now".to_string(), 0)]);

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(reader.titles_and_indices().len(), 2);

    tokio::time::sleep(Duration::from_secs(300)).await;
    let order: Vec<_> = reader.titles_and_indices().into_iter().map(|(t, _)| t).collect();
    assert_eq!(order, vec!["now", "soon", "late"]);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn cancelled_worker_drops_pending_readings() {
    let (queue, worker) = ReadingQueue::channel();
    let reader = Arc::new(RecordingReader::default());
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(worker.run(reader.clone(), cancel.clone()));

    queue.enqueue_after(
        Duration::from_secs(60),
        PassageReading {
            text_id: "t".into(),
            title: "x".into(),
            author: "a".into(),
            passage: "p".into(),
            index: 0,
        },
    );
    tokio::task::yield_now().await;
    cancel.cancel();
    handle.await.unwrap();

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(reader.titles_and_indices().is_empty());
    assert!(!queue.enqueue_after(Duration::ZERO, reader_placeholder()));
}

fn reader_placeholder() -> PassageReading {
    PassageReading {
        text_id: "t".into(),
        title: "after".into(),
        author: "a".into(),
        passage: "p".into(),
        index: 0,
    }
}

#[tokio::test(start_paused = true)]
async fn ingested_text_schedules_three_spaced_passages() {
    let store = Arc::new(MemoryStore::new());
    let (queue, worker) = ReadingQueue::channel();
    let reader = Arc::new(RecordingReader::default());
    let cancel = CancellationToken::new();
    tokio::spawn(worker.run(reader.clone(), cancel.clone()));

    let discovery = TextDiscovery::new(
        vec![],
        MapFetcher::with(&[]),
        store,
        Broadcaster::new(8),
        queue,
        DiscoveryConfig::default(),
    );
    let text = candidate("On Duration", "");
    let scheduled = discovery.schedule_passage_analysis("d-1", &text, &long_text());
    assert_eq!(scheduled, 3);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(reader.titles_and_indices(), vec![("On Duration".to_string(), 0)]);

    tokio::time::sleep(Duration::from_secs(600)).await;
    let indices: Vec<_> = reader.titles_and_indices().into_iter().map(|(_, i)| i).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    cancel.cancel();
}

// ===========================================================================
// HTTP search providers
// ===========================================================================

#[tokio::test]
async fn gutendex_prefers_utf8_plain_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/books"))
        .and(query_param("search", "bergson"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 2,
            "results": [
                {
                    "title": "Time and Free Will",
                    "authors": [{"name": "Bergson, Henri", "birth_year": 1859, "death_year": 1941}],
                    "formats": {
                        "text/plain; charset=us-ascii": "https://g/56852.txt",
                        "text/plain; charset=utf-8": "https://g/56852-0.txt",
                        "text/html": "https://g/56852.html"
                    },
                    "download_count": 1200
                },
                {
                    "title": "Laughter",
                    "authors": [],
                    "formats": {"text/html": "https://g/4352.html"},
                    "download_count": 800
                }
            ]
        })))
        .mount(&server)
        .await;

    let results = GutendexSearch::new(server.uri()).search("bergson").await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].url, "https://g/56852-0.txt");
    assert_eq!(results[0].author, "Bergson, Henri");
    assert_eq!(results[0].citation_count, Some(1200));
    assert_eq!(results[0].source, "Project Gutenberg");
}

#[tokio::test]
async fn internet_archive_builds_stream_urls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/advancedsearch.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "response": {
                "numFound": 2,
                "docs": [
                    {"identifier": "creativeevolution00berg", "title": "Creative Evolution",
                     "creator": ["Bergson, Henri", "Mitchell, Arthur"], "year": "1911"},
                    {"identifier": "anon01"}
                ]
            }
        })))
        .mount(&server)
        .await;

    let results = InternetArchiveSearch::new(server.uri()).search("creative evolution").await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(
        results[0].url,
        format!("{}/stream/creativeevolution00berg/creativeevolution00berg_djvu.txt", server.uri())
    );
    assert_eq!(results[0].author, "Bergson, Henri");
    assert_eq!(results[0].year, Some(1911));
    assert_eq!(results[1].title, "Unknown Title");
    assert_eq!(results[1].author, "Unknown Author");
}

#[tokio::test]
async fn provider_http_error_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let err = GutendexSearch::new(server.uri()).search("kant").await.unwrap_err();
    assert!(matches!(err, DiscoveryError::Status { status: 503, .. }));
}
