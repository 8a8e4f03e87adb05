use crate::core::coordinator::FanOutCoordinator;
use crate::core::decoder::{decode_batch, BatchEncoding};
use crate::core::{Forwarder, RequestContext, Transformer};
use crate::domain::model::ProcessingSummary;
use crate::utils::error::Result;
use std::sync::Arc;

/// 一次請求的完整流程：解析 → 並發轉換 → 轉送下游
pub struct BatchEngine {
    coordinator: FanOutCoordinator,
    forwarder: Arc<dyn Forwarder>,
}

impl BatchEngine {
    pub fn new(
        transformer: Arc<dyn Transformer>,
        forwarder: Arc<dyn Forwarder>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            coordinator: FanOutCoordinator::new(transformer, max_in_flight),
            forwarder,
        }
    }

    pub async fn run(
        &self,
        body: &[u8],
        encoding: BatchEncoding,
        ctx: &RequestContext,
    ) -> Result<ProcessingSummary> {
        // Decode
        let batch = decode_batch(body, encoding).inspect_err(|e| {
            tracing::error!(request_id = %ctx.request_id, error = %e, "Failed to parse batch");
        })?;
        let users_received = batch.len();
        tracing::info!(
            request_id = %ctx.request_id,
            users_count = users_received,
            "Batch parsed successfully"
        );

        // Fan-out / fan-in
        let outcome = self.coordinator.process(batch, ctx).await;

        if !outcome.failures.is_empty() {
            tracing::error!(
                request_id = %ctx.request_id,
                error_count = outcome.failures.len(),
                "Errors during user processing"
            );
            for failure in &outcome.failures {
                tracing::error!(
                    request_id = %ctx.request_id,
                    item_id = %failure.item_id,
                    error = %failure.cause,
                    "Processing error detail"
                );
            }
        }

        // Forward：只有在全部項目結束後才開始
        let users_sent = self
            .forwarder
            .forward(&outcome.successes, ctx)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    request_id = %ctx.request_id,
                    error = %e,
                    processed = outcome.successes.len(),
                    "Failed to send data to remote server"
                );
            })?;

        Ok(ProcessingSummary::completed(
            users_received,
            users_sent,
            outcome.failures.len(),
        ))
    }
}
