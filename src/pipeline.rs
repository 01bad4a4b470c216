//! One mirror run: load → prune → fetch → parse → extract → upsert → save → render.
//!
//! Fetch and parse failures abort the run before anything is written, so the
//! previous store and output stay authoritative. Per-item problems (missing
//! preview, unparseable date) only degrade that item.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::Config;
use crate::feed::{
    apply_preview, extract_item, fetch_feed, parse_items, render_feed, write_feed, FetchError,
    ParseError, PreviewResolver,
};
use crate::storage::{Store, StoreError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to fetch feed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Failed to parse feed: {0}")]
    Parse(#[from] ParseError),

    #[error("Failed to save store: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to write output feed: {0:#}")]
    Output(anyhow::Error),
}

/// What a run did, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Items present in the fetched feed.
    pub seen: usize,
    pub inserted: usize,
    pub updated: usize,
    /// Items dropped for lacking a guid.
    pub skipped: usize,
    /// Records removed by retention before the upsert.
    pub pruned: usize,
    /// Records in the store after the run.
    pub total: usize,
}

/// Runs the mirror once against the current time.
pub async fn run(config: &Config, client: &reqwest::Client) -> Result<RunSummary, PipelineError> {
    run_at(config, client, Utc::now()).await
}

/// Runs the mirror once as if the current time were `now`.
///
/// `now` drives pruning, `fetched_at` of new records and `lastBuildDate`.
pub async fn run_at(
    config: &Config,
    client: &reqwest::Client,
    now: DateTime<Utc>,
) -> Result<RunSummary, PipelineError> {
    let mut store = Store::load(&config.store_path);
    let pruned = store.prune(now, config.retention());

    let bytes = fetch_feed(client, &config.feed_url, &config.http).await?;
    let raw_items = parse_items(&bytes)?;
    tracing::info!(url = %config.feed_url, items = raw_items.len(), "Fetched feed");

    let resolver = PreviewResolver::new(client.clone(), config.http.clone());
    let mut items = Vec::with_capacity(raw_items.len());
    for raw in &raw_items {
        let item = extract_item(raw);
        let item = if config.resolve_previews {
            apply_preview(item, &resolver).await
        } else {
            item
        };
        items.push(item);
    }

    let stats = store.upsert(items, now);
    store.save(&config.store_path)?;

    let xml = render_feed(store.records(), &config.channel, now).map_err(PipelineError::Output)?;
    write_feed(&config.output_path, &xml).map_err(PipelineError::Output)?;

    let summary = RunSummary {
        seen: raw_items.len(),
        inserted: stats.inserted,
        updated: stats.updated,
        skipped: stats.skipped,
        pruned,
        total: store.len(),
    };
    tracing::info!(
        inserted = summary.inserted,
        updated = summary.updated,
        skipped = summary.skipped,
        pruned = summary.pruned,
        total = summary.total,
        output = %config.output_path.display(),
        "Mirror run complete"
    );
    Ok(summary)
}
