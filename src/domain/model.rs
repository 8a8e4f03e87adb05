use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 一筆待轉換的輸入記錄，解析後不可變。缺少的欄位取零值。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// 不做範圍限制
    #[serde(default)]
    pub age: i64,
}

/// 送往下游的正規化記錄
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub age_group: AgeGroup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeGroup {
    #[serde(rename = "under 25")]
    Under25,
    #[serde(rename = "25 to 35")]
    From25To35,
    #[serde(rename = "over 35")]
    Over35,
}

impl AgeGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgeGroup::Under25 => "under 25",
            AgeGroup::From25To35 => "25 to 35",
            AgeGroup::Over35 => "over 35",
        }
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchRequest {
    pub items: Vec<InputRecord>,
}

impl BatchRequest {
    pub fn new(items: Vec<InputRecord>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FailureCause {
    #[error("identifier is empty")]
    EmptyIdentifier,
    #[error("batch deadline exceeded before the item finished")]
    DeadlineExceeded,
    #[error("worker panicked while transforming the item")]
    WorkerPanicked,
}

/// 單筆失敗：只收集、不中斷同批次其他項目
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("item '{item_id}': {cause}")]
pub struct ItemFailure {
    pub item_id: String,
    pub cause: FailureCause,
}

impl ItemFailure {
    pub fn new(item_id: impl Into<String>, cause: FailureCause) -> Self {
        Self {
            item_id: item_id.into(),
            cause,
        }
    }
}

/// Per-request aggregate of the fan-in.
///
/// `successes` is in arrival order, which is not the batch order.
#[derive(Debug, Clone, Default)]
pub struct ProcessingOutcome {
    pub successes: Vec<OutputRecord>,
    pub failures: Vec<ItemFailure>,
}

impl ProcessingOutcome {
    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    /// 以共用 bearer token 通過驗證
    SharedToken,
}

/// Read-only per-request context, passed by reference through every stage.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub started_at: DateTime<Utc>,
    pub principal: Principal,
    /// 整批處理的截止時間
    pub deadline: tokio::time::Instant,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>, batch_deadline: std::time::Duration) -> Self {
        Self {
            request_id: request_id.into(),
            started_at: Utc::now(),
            principal: Principal::SharedToken,
            deadline: tokio::time::Instant::now() + batch_deadline,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingSummary {
    pub message: String,
    pub users_received: usize,
    pub users_sent: usize,
    pub errors: usize,
}

impl ProcessingSummary {
    pub fn completed(users_received: usize, users_sent: usize, errors: usize) -> Self {
        Self {
            message: "Processing completed".to_string(),
            users_received,
            users_sent,
            errors,
        }
    }
}
