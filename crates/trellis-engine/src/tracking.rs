//! Cross-stage order tracking.
//!
//! An order number is looked up in every production-stage table
//! concurrently, each stage under its own timeout. A slow or failing
//! stage degrades to a warning instead of sinking the whole view; the
//! aggregation only fails when every stage does.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use trellis_common::{
    Record, TrellisError, TrellisResult, Value, DEFAULT_STAGE_TIMEOUT_MS, MAX_SUGGESTIONS,
    MIN_SUGGESTION_QUERY_LEN,
};
use trellis_schema::{SchemaRegistry, TableDescriptor};
use trellis_store::{Selection, SortOrder, Store};

/// How many suggestions each stage contributes before deduplication.
const SUGGESTIONS_PER_STAGE: u64 = 10;

/// Options for one tracking request.
#[derive(Debug, Clone)]
pub struct TrackOptions {
    /// Columns to project per stage; `None` returns full records.
    /// Columns a stage does not declare are skipped for that stage.
    pub stage_fields: Option<Vec<String>>,
    /// Per-stage deadline.
    pub timeout: Duration,
}

impl Default for TrackOptions {
    fn default() -> Self {
        Self {
            stage_fields: None,
            timeout: Duration::from_millis(DEFAULT_STAGE_TIMEOUT_MS),
        }
    }
}

impl TrackOptions {
    /// Restricts stage records to the named columns.
    #[must_use]
    pub fn with_stage_fields(mut self, fields: Vec<String>) -> Self {
        self.stage_fields = Some(fields);
        self
    }

    /// Sets the per-stage deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// The aggregated view of one order across all stages.
#[derive(Debug, Serialize)]
pub struct OrderView {
    /// The order number that was tracked.
    #[serde(rename = "orderNumber")]
    pub order_number: String,
    /// Records per stage. Stages with no records are absent.
    pub stages: BTreeMap<String, Vec<Record>>,
    /// Stages that failed or timed out, with the reason.
    pub warnings: Vec<String>,
}

/// One order-number suggestion.
#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    /// The matching order number.
    pub identifier: String,
    /// Every stage the number appears in, in process order.
    #[serde(rename = "matchingStages")]
    pub stages: Vec<String>,
}

/// Aggregates order records across the production stages.
#[derive(Clone)]
pub struct OrderTracker {
    registry: Arc<SchemaRegistry>,
    store: Arc<dyn Store>,
}

impl OrderTracker {
    /// Creates a tracker over the given registry and store.
    #[must_use]
    pub fn new(registry: Arc<SchemaRegistry>, store: Arc<dyn Store>) -> Self {
        Self { registry, store }
    }

    /// Builds the cross-stage view for one order number.
    pub async fn track(&self, order_number: &str, options: &TrackOptions) -> TrellisResult<OrderView> {
        let stages = self.registry.stage_tables();

        let lookups = stages.iter().map(|desc| {
            let selection = stage_selection(desc, order_number, options);
            let store = Arc::clone(&self.store);
            let name = desc.name.clone();
            async move {
                let result =
                    tokio::time::timeout(options.timeout, store.select(&selection)).await;
                (name, result)
            }
        });
        let results = join_all(lookups).await;

        let mut view = OrderView {
            order_number: order_number.to_string(),
            stages: BTreeMap::new(),
            warnings: Vec::new(),
        };
        let mut failed = Vec::new();
        for (stage, result) in results {
            match result {
                Ok(Ok(rows)) => {
                    if !rows.is_empty() {
                        view.stages.insert(stage, rows);
                    }
                }
                Ok(Err(e)) => {
                    warn!(stage, error = %e, "stage lookup failed");
                    view.warnings.push(format!("{stage}: {e}"));
                    failed.push(stage);
                }
                Err(_) => {
                    warn!(
                        stage,
                        timeout_ms = options.timeout.as_millis() as u64,
                        "stage lookup timed out"
                    );
                    view.warnings
                        .push(format!("{stage}: timed out"));
                    failed.push(stage);
                }
            }
        }

        if failed.len() == stages.len() {
            return Err(TrellisError::AggregationFailed { stages: failed });
        }
        debug!(
            order_number,
            stages = view.stages.len(),
            warnings = view.warnings.len(),
            "order tracked"
        );
        Ok(view)
    }

    /// Suggests order numbers matching a partial term.
    ///
    /// Terms shorter than the minimum return nothing. Each stage
    /// contributes up to a handful of matches; duplicates keep their
    /// first-seen stage and the combined list is capped.
    pub async fn suggest(&self, term: &str) -> TrellisResult<Vec<Suggestion>> {
        let term = term.trim();
        if term.len() < MIN_SUGGESTION_QUERY_LEN {
            return Ok(Vec::new());
        }

        let stages = self.registry.stage_tables();
        let lookups = stages.iter().map(|desc| {
            let selection = Selection::all(desc.name.clone())
                .with_search(term.to_string(), vec!["order_number".to_string()])
                .with_order("order_number", SortOrder::Asc)
                .with_limit(SUGGESTIONS_PER_STAGE)
                .with_projection(vec!["order_number".to_string()]);
            let store = Arc::clone(&self.store);
            let name = desc.name.clone();
            async move { (name, store.select(&selection).await) }
        });
        let results = join_all(lookups).await;

        let mut suggestions: Vec<Suggestion> = Vec::new();
        for (stage, result) in results {
            // A failing stage just contributes nothing here.
            let Ok(rows) = result else { continue };
            for row in rows {
                let Some(number) = row.get("order_number").and_then(Value::to_text) else {
                    continue;
                };
                if let Some(existing) = suggestions.iter_mut().find(|s| s.identifier == number) {
                    if !existing.stages.contains(&stage) {
                        existing.stages.push(stage.clone());
                    }
                } else if suggestions.len() < MAX_SUGGESTIONS {
                    suggestions.push(Suggestion {
                        identifier: number,
                        stages: vec![stage.clone()],
                    });
                }
            }
        }
        Ok(suggestions)
    }
}

/// Builds the per-stage selection for a tracking request.
fn stage_selection(
    desc: &TableDescriptor,
    order_number: &str,
    options: &TrackOptions,
) -> Selection {
    let mut selection = Selection::all(desc.name.clone())
        .with_filter("order_number", Value::String(order_number.to_string()));
    if let Some(fields) = &options.stage_fields {
        let mut known: Vec<String> = fields
            .iter()
            .filter(|f| desc.has_field(f))
            .cloned()
            .collect();
        // The order-number column always comes along.
        if !known.iter().any(|f| f == "order_number") {
            known.push("order_number".to_string());
        }
        selection = selection.with_projection(known);
    }
    selection
}
