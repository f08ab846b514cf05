//! Work-management board client
//!
//! Fetches session-note items (groups, item ids, updates, column values)
//! over the board's GraphQL endpoint and writes audit results back as
//! status/text column values. Update/column fetches run in fixed-size
//! batches with inter-batch pacing; a complexity/limit response abandons the
//! remaining batches and keeps whatever was already merged.

use crate::clients::retry::{is_limit_error, RetryingClient, RetryPolicy};
use crate::error::{AuditError, AuditResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Default timeout for board API requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Items requested per group page
const ITEMS_PAGE_LIMIT: usize = 400;

// ============================================================================
// Wire types
// ============================================================================

/// One group on a board, with the ids of its items.
#[derive(Debug, Clone, Deserialize)]
pub struct BoardGroup {
    pub id: String,
    pub title: String,
    pub item_ids: Vec<String>,
}

/// One update entry on a board item. Ordered oldest-first in the source.
#[derive(Debug, Clone, Deserialize)]
pub struct RawUpdate {
    pub id: String,
    pub text_body: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// One column value: title-addressed, value is a nested JSON-encoded string
/// for date/time columns, `text` carries the display label for status
/// columns.
#[derive(Debug, Clone, Deserialize)]
pub struct RawColumnValue {
    pub title: String,
    pub value: Option<String>,
    pub text: Option<String>,
}

/// One board item with its updates and column values merged on.
#[derive(Debug, Clone, Deserialize)]
pub struct RawItem {
    pub id: String,
    pub name: Option<String>,
    /// Tagged from the group fetch via an explicit id -> group join.
    pub group_title: Option<String>,
    #[serde(default)]
    pub updates: Vec<RawUpdate>,
    #[serde(default)]
    pub column_values: Vec<RawColumnValue>,
}

/// Result of a batched item fetch, with the per-stage counts the run
/// summary reports.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub items: Vec<RawItem>,
    pub requested: usize,
    pub retrieved: usize,
    pub abandoned_batches: usize,
}

// ============================================================================
// Trait seam
// ============================================================================

/// Abstract board capability the pipeline consumes.
///
/// The trait seam keeps the pipeline and audit passes testable with mock
/// boards.
#[async_trait]
pub trait BoardApi: Send + Sync {
    /// Fetch the groups of a board with their item ids.
    async fn fetch_groups(&self, board_id: u64) -> AuditResult<Vec<BoardGroup>>;

    /// Fetch updates + column values for a set of items, batched.
    async fn fetch_item_details(&self, item_ids: &[String]) -> AuditResult<FetchOutcome>;

    /// Write one column value on one item.
    async fn write_column_value(
        &self,
        item_id: &str,
        board_id: &str,
        column_id: &str,
        value: &str,
    ) -> AuditResult<()>;
}

// ============================================================================
// GraphQL client
// ============================================================================

/// GraphQL board client.
pub struct BoardClient {
    client: RetryingClient,
    url: String,
    batch_size: usize,
    inter_batch_delay: Duration,
}

impl BoardClient {
    pub fn new(
        url: impl Into<String>,
        token: &str,
        policy: RetryPolicy,
        batch_size: usize,
        inter_batch_delay: Duration,
    ) -> AuditResult<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(token)
                .map_err(|e| AuditError::Config(format!("invalid board token: {}", e)))?,
        );

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| AuditError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client: RetryingClient::new(http, policy),
            url: url.into(),
            batch_size: batch_size.max(1),
            inter_batch_delay,
        })
    }

    async fn post_query(&self, label: &str, body: Value) -> (Value, bool) {
        self.client
            .send(label, |http| http.post(&self.url).json(&body))
            .await
    }
}

#[async_trait]
impl BoardApi for BoardClient {
    async fn fetch_groups(&self, board_id: u64) -> AuditResult<Vec<BoardGroup>> {
        let query = format!(
            "query {{ boards(ids: {}) {{ groups {{ title id items_page(limit: {}) {{ items {{ id name }} }} }} }} }}",
            board_id, ITEMS_PAGE_LIMIT
        );

        let (payload, success) = self
            .post_query("fetch_groups", json!({ "query": query }))
            .await;
        if !success {
            return Err(AuditError::Api(format!(
                "group fetch for board {} failed",
                board_id
            )));
        }

        let groups = parse_groups(&payload);
        debug!(board_id, group_count = groups.len(), "fetched board groups");
        Ok(groups)
    }

    async fn fetch_item_details(&self, item_ids: &[String]) -> AuditResult<FetchOutcome> {
        const UPDATES_QUERY: &str = "query GetItemDetails($itemIds: [ID!]!) { \
             items(ids: $itemIds) { id name \
               updates { id text_body created_at updated_at } \
               column_values { column { title } value text } } }";

        let mut outcome = FetchOutcome {
            requested: item_ids.len(),
            ..Default::default()
        };

        let total_batches = item_ids.len().div_ceil(self.batch_size);
        for (batch_num, batch) in item_ids.chunks(self.batch_size).enumerate() {
            let body = json!({
                "query": UPDATES_QUERY,
                "variables": { "itemIds": batch },
            });

            let (payload, success) = self
                .post_query(&format!("item_details batch {}", batch_num + 1), body)
                .await;

            if !success {
                if is_limit_error(&payload) {
                    warn!(
                        batch = batch_num + 1,
                        total_batches, "limit error; abandoning remaining batches"
                    );
                    outcome.abandoned_batches = total_batches - batch_num;
                    return Ok(outcome);
                }
                warn!(batch = batch_num + 1, total_batches, "batch fetch failed; skipping");
                outcome.abandoned_batches += 1;
            } else {
                let items = parse_items(&payload);
                debug!(
                    batch = batch_num + 1,
                    total_batches,
                    item_count = items.len(),
                    "batch retrieved"
                );
                outcome.retrieved += items.len();
                outcome.items.extend(items);
            }

            if (batch_num + 1) * self.batch_size < item_ids.len() {
                sleep(self.inter_batch_delay).await;
            }
        }

        info!(
            requested = outcome.requested,
            retrieved = outcome.retrieved,
            abandoned_batches = outcome.abandoned_batches,
            "item detail fetch complete"
        );
        Ok(outcome)
    }

    async fn write_column_value(
        &self,
        item_id: &str,
        board_id: &str,
        column_id: &str,
        value: &str,
    ) -> AuditResult<()> {
        let mutation = format!(
            "mutation {{ change_simple_column_value (item_id: {}, board_id: {}, column_id: \"{}\", value: \"{}\") {{ id }} }}",
            item_id,
            board_id,
            column_id,
            value.replace('\\', "\\\\").replace('"', "\\\"")
        );

        let (payload, success) = self
            .post_query("write_column_value", json!({ "query": mutation }))
            .await;
        if !success {
            return Err(AuditError::Api(format!(
                "column write {} on item {} failed: {}",
                column_id, item_id, payload
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Payload parsing
// ============================================================================

/// Parse the group-fetch payload, tolerating absent branches.
pub fn parse_groups(payload: &Value) -> Vec<BoardGroup> {
    let mut groups = Vec::new();
    let boards = payload["data"]["boards"].as_array().cloned().unwrap_or_default();
    for board in boards {
        for group in board["groups"].as_array().cloned().unwrap_or_default() {
            let item_ids = group["items_page"]["items"]
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|i| i["id"].as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default();
            groups.push(BoardGroup {
                id: group["id"].as_str().unwrap_or_default().to_string(),
                title: group["title"].as_str().unwrap_or_default().to_string(),
                item_ids,
            });
        }
    }
    groups
}

/// Parse the item-detail payload into `RawItem`s.
pub fn parse_items(payload: &Value) -> Vec<RawItem> {
    let mut items = Vec::new();
    for item in payload["data"]["items"].as_array().cloned().unwrap_or_default() {
        let Some(id) = item["id"].as_str() else {
            continue;
        };
        let updates = item["updates"]
            .as_array()
            .map(|updates| {
                updates
                    .iter()
                    .map(|u| RawUpdate {
                        id: u["id"].as_str().unwrap_or_default().to_string(),
                        text_body: u["text_body"].as_str().map(String::from),
                        created_at: u["created_at"].as_str().map(String::from),
                        updated_at: u["updated_at"].as_str().map(String::from),
                    })
                    .collect()
            })
            .unwrap_or_default();
        let column_values = item["column_values"]
            .as_array()
            .map(|columns| {
                columns
                    .iter()
                    .filter_map(|c| {
                        let title = c["column"]["title"].as_str()?;
                        Some(RawColumnValue {
                            title: title.to_string(),
                            value: c["value"].as_str().map(String::from),
                            text: c["text"].as_str().map(String::from),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        items.push(RawItem {
            id: id.to_string(),
            name: item["name"].as_str().map(String::from),
            group_title: None,
            updates,
            column_values,
        });
    }
    items
}

/// Tag each item with its group title via an explicit id -> group join.
///
/// Replaces the old recursive patch-anything-by-id merge: the join applies
/// exactly where items are materialized, so unrelated record types can never
/// collide on an id.
pub fn tag_items_with_groups(items: &mut [RawItem], groups: &[BoardGroup]) {
    let id_to_group: std::collections::HashMap<&str, &str> = groups
        .iter()
        .flat_map(|g| g.item_ids.iter().map(move |id| (id.as_str(), g.title.as_str())))
        .collect();

    for item in items.iter_mut() {
        item.group_title = id_to_group.get(item.id.as_str()).map(|t| t.to_string());
    }
}
