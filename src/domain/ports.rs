use crate::domain::model::{InputRecord, ItemFailure, OutputRecord, RequestContext};
use crate::utils::error::ForwardError;
use async_trait::async_trait;

/// 單筆轉換。必須是純函數：可並發、重複呼叫，結果相同。
pub trait Transformer: Send + Sync + 'static {
    fn transform(&self, record: &InputRecord) -> Result<OutputRecord, ItemFailure>;
}

/// 下游投遞。回傳實際送出的筆數。
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(
        &self,
        records: &[OutputRecord],
        ctx: &RequestContext,
    ) -> Result<usize, ForwardError>;
}
