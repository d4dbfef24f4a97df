//! Bounded-concurrency processing of independent per-item operations.

use std::future::Future;

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::Result;

#[derive(Debug, Clone, Serialize)]
pub struct BatchItemResult {
    pub id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub results: Vec<BatchItemResult>,
    pub summary: BatchSummary,
}

/// Runs `op` once per item, at most `concurrency` at a time.
///
/// A failing item is recorded and does not stop its siblings. Results keep
/// the input order.
pub async fn process_batch<I, F, Fut>(items: Vec<I>, concurrency: usize, op: F) -> BatchReport
where
    I: ToString,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<Value>>,
{
    let results: Vec<BatchItemResult> = stream::iter(items)
        .map(|item| {
            let id = item.to_string();
            let fut = op(item);
            async move {
                match fut.await {
                    Ok(value) => BatchItemResult {
                        id,
                        success: true,
                        result: Some(value),
                        error: None,
                    },
                    Err(e) => {
                        warn!(item = %id, error = %e, "batch item failed");
                        BatchItemResult {
                            id,
                            success: false,
                            result: None,
                            error: Some(e.to_string()),
                        }
                    }
                }
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let succeeded = results.iter().filter(|r| r.success).count();
    let summary = BatchSummary {
        total: results.len(),
        succeeded,
        failed: results.len() - succeeded,
    };
    BatchReport { results, summary }
}
