//! End-to-end mirror runs against a mocked feed and article pages.
//!
//! Each test gets its own directory under the system temp dir for the store
//! and output files, and its own wiremock server.

use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use rss_mirror::feed::parse_items;
use rss_mirror::storage::{ParsedItem, Store};
use rss_mirror::{run_at, Config, PipelineError, RunSummary};
use std::path::{Path, PathBuf};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

fn test_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rss_mirror_pipeline_{}", name));
    std::fs::remove_dir_all(&dir).ok();
    dir
}

fn test_config(server: &MockServer, dir: &Path) -> Config {
    let mut config = Config {
        feed_url: format!("{}/feed", server.uri()),
        store_path: dir.join("data").join("store.json"),
        output_path: dir.join("docs").join("feed.xml"),
        ..Config::default()
    };
    config.channel.title = "Test mirror".into();
    config
}

/// Three items: one with an og:image page, one whose page 404s, one without guid.
fn feed_xml(base: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Source</title>
    <link>{base}/</link>
    <item>
      <title>With preview</title>
      <link>{base}/article/1</link>
      <description><![CDATA[<p>First &amp; best</p>]]></description>
      <enclosure url="{base}/small/1.jpg" length="100" type="image/jpeg"/>
      <guid>urn:uuid:AAAA-0001</guid>
      <pubDate>Sat, 15 Jun 2024 10:00:00 +0000</pubDate>
    </item>
    <item>
      <title>Without preview</title>
      <link>{base}/article/2</link>
      <description>Plain text</description>
      <enclosure url="{base}/small/2.png" length="200" type="image/png"/>
      <guid>tag:example.com,2024:post/2</guid>
      <pubDate>Fri, 14 Jun 2024 10:00:00 +0000</pubDate>
    </item>
    <item>
      <title>No identity</title>
      <link>{base}/article/3</link>
    </item>
  </channel>
</rss>"#
    )
}

async fn mount_source(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(feed_xml(&server.uri()))
                .insert_header("Content-Type", "application/rss+xml"),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/article/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head><meta property="og:image" content="https://cdn.example.com/big/1.webp?w=1200"></head></html>"#,
        ))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/article/2"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/article/3"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(server)
        .await;
}

fn without_build_date(xml: &str) -> String {
    let start = xml.find("<lastBuildDate>").unwrap();
    let end = xml.find("</lastBuildDate>").unwrap();
    format!("{}{}", &xml[..start], &xml[end..])
}

fn seeded_item(guid: &str) -> ParsedItem {
    ParsedItem {
        guid: guid.to_string(),
        title: format!("Seeded {}", guid),
        link: format!("https://example.com/{}", guid),
        ..ParsedItem::default()
    }
}

// ============================================================================
// Successful runs
// ============================================================================

#[tokio::test]
async fn test_run_mirrors_feed_into_store_and_output() {
    let server = MockServer::start().await;
    mount_source(&server).await;
    let dir = test_dir("full_run");
    let config = test_config(&server, &dir);
    let client = reqwest::Client::new();

    let summary = run_at(&config, &client, now()).await.unwrap();

    assert_eq!(
        summary,
        RunSummary {
            seen: 3,
            inserted: 2,
            updated: 0,
            skipped: 1,
            pruned: 0,
            total: 2,
        }
    );

    let store = Store::load(&config.store_path);
    let first = store.get("AAAA-0001").unwrap();
    assert_eq!(first.title, "With preview");
    assert_eq!(first.description, "<p>First &amp; best</p>");
    assert_eq!(first.fetched_at, now());
    assert_eq!(first.pub_date_raw, "Sat, 15 Jun 2024 10:00:00 +0000");

    let xml = std::fs::read_to_string(&config.output_path).unwrap();
    assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
    assert!(xml.contains("<title>Test mirror</title>"));
    assert!(xml.contains("<description><![CDATA[<p>First &amp; best</p>]]></description>"));

    let guids: Vec<_> = parse_items(xml.as_bytes())
        .unwrap()
        .iter()
        .map(|i| i.child("guid").unwrap().text.clone())
        .collect();
    assert_eq!(guids, vec!["AAAA-0001", "post/2"]);

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_og_image_replaces_native_enclosure() {
    let server = MockServer::start().await;
    mount_source(&server).await;
    let dir = test_dir("enclosure_precedence");
    let config = test_config(&server, &dir);

    run_at(&config, &reqwest::Client::new(), now()).await.unwrap();

    let store = Store::load(&config.store_path);
    let with_preview = store.get("AAAA-0001").unwrap().enclosure.clone().unwrap();
    assert_eq!(with_preview.url, "https://cdn.example.com/big/1.webp?w=1200");
    assert_eq!(with_preview.length, "");
    assert_eq!(with_preview.mime_type, "image/webp");

    // Page 404'd: the feed's own enclosure survives
    let native = store.get("post/2").unwrap().enclosure.clone().unwrap();
    assert_eq!(native.url, format!("{}/small/2.png", server.uri()));
    assert_eq!(native.length, "200");

    let xml = std::fs::read_to_string(&config.output_path).unwrap();
    assert!(xml.contains(
        r#"<enclosure url="https://cdn.example.com/big/1.webp?w=1200" type="image/webp"/>"#
    ));
    assert!(!xml.contains("/small/1.jpg"));

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_previews_disabled_skips_article_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_string(feed_xml(&server.uri())))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/article/1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let dir = test_dir("previews_disabled");
    let config = Config {
        resolve_previews: false,
        ..test_config(&server, &dir)
    };

    run_at(&config, &reqwest::Client::new(), now()).await.unwrap();

    let store = Store::load(&config.store_path);
    let enclosure = store.get("AAAA-0001").unwrap().enclosure.clone().unwrap();
    assert_eq!(enclosure.url, format!("{}/small/1.jpg", server.uri()));

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let server = MockServer::start().await;
    mount_source(&server).await;
    let dir = test_dir("idempotent");
    let config = test_config(&server, &dir);
    let client = reqwest::Client::new();

    run_at(&config, &client, now()).await.unwrap();
    let store_first = std::fs::read_to_string(&config.store_path).unwrap();
    let output_first = std::fs::read_to_string(&config.output_path).unwrap();

    let summary = run_at(&config, &client, now() + Duration::minutes(5))
        .await
        .unwrap();
    let store_second = std::fs::read_to_string(&config.store_path).unwrap();
    let output_second = std::fs::read_to_string(&config.output_path).unwrap();

    assert_eq!(summary.inserted, 0);
    assert_eq!(summary.updated, 2);
    assert_eq!(store_first, store_second);
    assert_eq!(
        without_build_date(&output_first),
        without_build_date(&output_second)
    );

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_retention_prunes_before_upsert() {
    let server = MockServer::start().await;
    mount_source(&server).await;
    let dir = test_dir("retention");
    let config = test_config(&server, &dir);

    let mut seeded = Store::new();
    seeded.upsert([seeded_item("expired")], now() - Duration::days(8));
    seeded.upsert([seeded_item("kept")], now() - Duration::days(6));
    seeded.save(&config.store_path).unwrap();

    let summary = run_at(&config, &reqwest::Client::new(), now())
        .await
        .unwrap();

    assert_eq!(summary.pruned, 1);
    assert_eq!(summary.total, 3);
    let store = Store::load(&config.store_path);
    assert!(store.get("expired").is_none());
    assert!(store.get("kept").is_some());

    let xml = std::fs::read_to_string(&config.output_path).unwrap();
    assert!(xml.contains("<guid>kept</guid>"));
    assert!(!xml.contains("<guid>expired</guid>"));

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_corrupt_store_treated_as_empty() {
    let server = MockServer::start().await;
    mount_source(&server).await;
    let dir = test_dir("corrupt_store");
    let config = test_config(&server, &dir);
    std::fs::create_dir_all(config.store_path.parent().unwrap()).unwrap();
    std::fs::write(&config.store_path, "{ this is not json").unwrap();

    let summary = run_at(&config, &reqwest::Client::new(), now())
        .await
        .unwrap();

    assert_eq!(summary.inserted, 2);
    assert_eq!(Store::load(&config.store_path).len(), 2);

    std::fs::remove_dir_all(&dir).ok();
}

// ============================================================================
// Fatal failures leave previous state untouched
// ============================================================================

fn seed_previous_outputs(config: &Config) {
    std::fs::create_dir_all(config.store_path.parent().unwrap()).unwrap();
    std::fs::create_dir_all(config.output_path.parent().unwrap()).unwrap();
    std::fs::write(&config.store_path, "{}").unwrap();
    std::fs::write(&config.output_path, "previous output").unwrap();
}

fn assert_previous_outputs_intact(config: &Config) {
    assert_eq!(std::fs::read_to_string(&config.store_path).unwrap(), "{}");
    assert_eq!(
        std::fs::read_to_string(&config.output_path).unwrap(),
        "previous output"
    );
}

#[tokio::test]
async fn test_fetch_failure_aborts_without_writing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    let dir = test_dir("fetch_failure");
    let config = test_config(&server, &dir);
    seed_previous_outputs(&config);

    let result = run_at(&config, &reqwest::Client::new(), now()).await;

    assert!(matches!(result, Err(PipelineError::Fetch(_))));
    assert_previous_outputs_intact(&config);

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_malformed_feed_aborts_without_writing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<rss><channel><item></rss>"))
        .mount(&server)
        .await;
    let dir = test_dir("parse_failure");
    let config = test_config(&server, &dir);
    seed_previous_outputs(&config);

    let result = run_at(&config, &reqwest::Client::new(), now()).await;

    match result {
        Err(PipelineError::Parse(_)) => {}
        other => panic!("Expected Parse error, got {:?}", other),
    }
    assert_previous_outputs_intact(&config);

    std::fs::remove_dir_all(&dir).ok();
}
