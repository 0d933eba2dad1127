//! End-to-end pipeline tests: scrape → normalize → score → lifecycle →
//! violation detection, driven through an in-memory page fetcher with canned
//! storefront pages.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

use mapwatch::catalog::{CatalogProvider, JsonCatalog};
use mapwatch::config::{MatchingConfig, ViolationsConfig};
use mapwatch::matching::{MatchEngine, MatchLifecycle, MatchScorer};
use mapwatch::scraping::{
    FetchError, FetchedPage, PageFetcher, ScrapeRunConfig, ScrapeRunner,
};
use mapwatch::store::{
    BlacklistStore, CompetitorProductStore, CompetitorStore, MatchStore, ViolationStore,
};
use mapwatch::types::{CatalogProduct, Competitor, MatchState, ScrapingStrategy, Severity};
use mapwatch::violations::ViolationDetector;

/// In-memory fetcher with canned pages keyed by full URL
struct MemoryFetcher {
    pages: HashMap<String, String>,
}

impl MemoryFetcher {
    fn new(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, body)| (url.to_string(), body.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl PageFetcher for MemoryFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        match self.pages.get(url.as_str()) {
            Some(body) => Ok(FetchedPage {
                url: url.clone(),
                status: 200,
                body: body.clone(),
                content_type: "application/json".to_string(),
                fetch_duration: Duration::from_millis(1),
            }),
            None => Err(FetchError::NotFound),
        }
    }
}

const EMPTY_PAGE: &str = r#"{"products": []}"#;

const COLLECTION_PAGE: &str = r#"{
    "products": [
        {
            "title": "ECM Synchronika - New",
            "handle": "ecm-synchronika",
            "vendor": "ECM",
            "product_type": "Espresso Machines",
            "variants": [{"price": "2399.25", "sku": "ECM-SYN"}]
        },
        {
            "title": "Clearance Espresso Machine",
            "handle": "clearance-espresso-machine",
            "vendor": "ECM",
            "product_type": "Espresso Machines",
            "variants": [{"price": "999.00"}]
        }
    ]
}"#;

struct World {
    competitor: Competitor,
    catalog: Arc<JsonCatalog>,
    products: Arc<CompetitorProductStore>,
    matches: Arc<MatchStore>,
    blacklist: Arc<BlacklistStore>,
    violations: Arc<ViolationStore>,
    runner: ScrapeRunner,
    engine: MatchEngine,
    lifecycle: MatchLifecycle,
    detector: ViolationDetector,
}

fn world() -> World {
    let competitor = Competitor {
        id: Uuid::new_v4(),
        name: "Rival Coffee".to_string(),
        domain: "rival.example".to_string(),
        strategy: ScrapingStrategy::Collections {
            collections: vec!["espresso-machines".to_string()],
        },
        exclude_patterns: vec!["*clearance*".to_string()],
        is_active: true,
        last_scraped_at: None,
    };

    let catalog = Arc::new(JsonCatalog::from_products(vec![CatalogProduct {
        id: "cp-ecm-synchronika".to_string(),
        title: "ECM Synchronika".to_string(),
        vendor: "ECM".to_string(),
        product_type: "Espresso Machines".to_string(),
        sku: Some("ECM-SYN".to_string()),
        price: "3199.00".parse().unwrap(),
        map_price: None,
    }]));

    let fetcher = MemoryFetcher::new(&[
        ("https://rival.example/products.json?limit=1", EMPTY_PAGE),
        (
            "https://rival.example/collections/espresso-machines/products.json?limit=250&page=1",
            COLLECTION_PAGE,
        ),
        (
            "https://rival.example/collections/espresso-machines/products.json?limit=250&page=2",
            EMPTY_PAGE,
        ),
    ]);

    let products = Arc::new(CompetitorProductStore::new());
    let matches = Arc::new(MatchStore::new());
    let blacklist = Arc::new(BlacklistStore::new());
    let violations = Arc::new(ViolationStore::new());

    let runner = ScrapeRunner::new(
        Arc::new(fetcher),
        Arc::clone(&products),
        ScrapeRunConfig {
            max_concurrent_fetches: 2,
            politeness_delay: Duration::ZERO,
            max_pages_per_target: 10,
        },
    );
    let engine = MatchEngine::new(MatchScorer::new(MatchingConfig::default()));
    let lifecycle = MatchLifecycle::new(
        Arc::clone(&matches),
        Arc::clone(&blacklist),
        Arc::clone(&violations),
    );
    let detector = ViolationDetector::new(ViolationsConfig::default());

    World {
        competitor,
        catalog,
        products,
        matches,
        blacklist,
        violations,
        runner,
        engine,
        lifecycle,
        detector,
    }
}

impl World {
    async fn scrape(&self) {
        self.runner
            .run(&self.competitor, CancellationToken::new(), &|_| {})
            .await
            .expect("scrape run should succeed");
    }

    fn rescan(&self) -> mapwatch::matching::RescanOutcome {
        self.engine.rescan(
            &self.catalog.products(),
            &self.products.all(),
            &self.matches,
            self.blacklist.as_ref(),
        )
    }

    fn scan(&self) -> mapwatch::violations::ScanOutcome {
        self.detector.scan(
            &self.matches,
            self.catalog.as_ref(),
            &self.products,
            &self.violations,
        )
    }
}

#[tokio::test]
async fn scrape_applies_exclusions_and_normalization() {
    let w = world();
    w.scrape().await;

    // The clearance listing matched the collection but the exclude glob
    // suppressed it
    assert_eq!(w.products.len(), 1);
    let listing = w
        .products
        .get("https://rival.example/products/ecm-synchronika")
        .expect("listing should be stored");
    assert_eq!(listing.price, Some("2399.25".parse().unwrap()));
    assert_eq!(listing.vendor.as_deref(), Some("ECM"));
}

#[tokio::test]
async fn pipeline_scores_match_and_detects_severe_violation() {
    let w = world();
    w.scrape().await;

    let rescan = w.rescan();
    assert_eq!(rescan.created, 1);

    let pair = (
        "cp-ecm-synchronika".to_string(),
        "https://rival.example/products/ecm-synchronika".to_string(),
    );
    let record = w.matches.get_active_pair(&pair).expect("match should exist");
    assert_eq!(record.state, MatchState::Pending);
    assert!(record.overall_score >= 0.80, "score {}", record.overall_score);

    let scan = w.scan();
    assert_eq!(scan.created, 1);

    let open = w.violations.list(Some(false));
    assert_eq!(open.len(), 1);
    let violation = &open[0];
    // floor $3199.00, observed $2399.25: exactly 25% below MAP
    assert!((violation.violation_percent - 0.25).abs() < 1e-9);
    assert_eq!(violation.severity, Severity::Severe);
    assert_eq!(violation.reference_price, "3199.00".parse().unwrap());
    assert_eq!(violation.price_delta, "799.75".parse().unwrap());
}

#[tokio::test]
async fn verify_pins_match_and_keeps_violation_open() {
    let w = world();
    w.scrape().await;
    w.rescan();
    w.scan();

    let record = w.matches.active_matches().pop().unwrap();
    let verified = w.lifecycle.verify(&record.id).unwrap();
    assert_eq!(verified.state, MatchState::Verified);
    assert!((verified.overall_score - 1.0).abs() < 1e-9);
    assert!(w.violations.open_for_match(&record.id).is_some());

    // A later scoring pass never alters the pinned match
    let rescan = w.rescan();
    assert_eq!(rescan.pinned, 1);
    let after = w.matches.get(&record.id).unwrap();
    assert!((after.overall_score - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn unmatch_blacklists_pair_and_suppresses_rescans() {
    let w = world();
    w.scrape().await;
    w.rescan();
    w.scan();
    assert_eq!(w.violations.open_count(), 1);

    let record = w.matches.active_matches().pop().unwrap();
    w.lifecycle
        .reject(&record.id, Some("wrong machine".to_string()))
        .unwrap();

    // Exactly one blacklist row, the open violation cascaded closed
    assert_eq!(w.blacklist.len(), 1);
    assert!(w
        .blacklist
        .contains(&record.catalog_product_id, &record.competitor_product_id));
    assert_eq!(w.violations.open_count(), 0);

    // Re-running the scoring pass over the same raw inputs yields zero new
    // candidate matches for that pair
    let rescan = w.rescan();
    assert_eq!(rescan.created, 0);
    assert_eq!(rescan.blacklisted, 1);
    assert_eq!(w.matches.active_count(), 0);

    // And the violation scan has nothing to act on
    let scan = w.scan();
    assert_eq!(scan.created, 0);
}

#[tokio::test]
async fn delete_allows_rematching_later() {
    let w = world();
    w.scrape().await;
    w.rescan();

    let record = w.matches.active_matches().pop().unwrap();
    w.lifecycle.delete(&record.id).unwrap();
    assert!(w.blacklist.is_empty());

    // The pair is free to match again
    let rescan = w.rescan();
    assert_eq!(rescan.created, 1);
}

#[tokio::test]
async fn manual_match_respects_blacklist_until_entry_removed() {
    let w = world();
    w.scrape().await;
    w.rescan();

    let record = w.matches.active_matches().pop().unwrap();
    let listing = w.products.get(&record.competitor_product_id).unwrap();
    w.lifecycle.reject(&record.id, None).unwrap();

    // Blacklisted pair: manual creation is refused with an explicit error
    let err = w
        .lifecycle
        .create_manual(record.catalog_product_id.clone(), &listing)
        .unwrap_err();
    assert!(err.to_string().contains("blacklisted"));

    // Operator removes the blacklist entry, then the manual match succeeds
    assert!(w
        .blacklist
        .remove(&record.catalog_product_id, &record.competitor_product_id));
    let manual = w
        .lifecycle
        .create_manual(record.catalog_product_id.clone(), &listing)
        .unwrap();
    assert_eq!(manual.state, MatchState::Manual);
    assert!((manual.overall_score - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn repeated_scrape_and_scan_are_idempotent() {
    let w = world();
    w.scrape().await;
    w.rescan();
    w.scan();

    // Same inputs again: listings upsert, the pending match re-scores in
    // place, the open violation updates in place
    w.scrape().await;
    let rescan = w.rescan();
    assert_eq!(rescan.created, 0);
    assert_eq!(rescan.updated, 1);

    let scan = w.scan();
    assert_eq!(scan.created, 0);
    assert_eq!(scan.updated, 1);
    assert_eq!(w.products.len(), 1);
    assert_eq!(w.matches.active_count(), 1);
    assert_eq!(w.violations.list(None).len(), 1);
}

#[tokio::test]
async fn competitor_roster_seeds_scrape_targets() {
    // Ties the store-level roster to the scrape path: a seeded competitor
    // is immediately scrapeable
    let store = CompetitorStore::new();
    let w = world();
    let stored = store.upsert(w.competitor.clone());
    assert_eq!(store.len(), 1);

    w.runner
        .run(&stored, CancellationToken::new(), &|_| {})
        .await
        .unwrap();
    assert_eq!(w.products.len(), 1);
}
