//! Fan-out/fan-in over one batch.
//!
//! Each record becomes one spawned unit of work. Launches are gated by a
//! semaphore so at most `max_in_flight` units run at once. Units publish to
//! a success channel or a failure channel, both sized to the batch. A
//! supervisor task joins every unit and then drops its senders, which closes
//! both channels; the caller drains the two channels until both are closed.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::{Id, JoinSet};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, warn};

use crate::core::{BatchRequest, InputRecord, OutputRecord, Transformer};
use crate::domain::model::{FailureCause, ItemFailure, ProcessingOutcome, RequestContext};

pub struct FanOutCoordinator {
    transformer: Arc<dyn Transformer>,
    max_in_flight: usize,
}

impl FanOutCoordinator {
    pub fn new(transformer: Arc<dyn Transformer>, max_in_flight: usize) -> Self {
        Self {
            transformer,
            max_in_flight: max_in_flight.max(1),
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// 處理整批記錄。單筆失敗不影響其他項目；
    /// 回傳時 successes + failures 的總數等於輸入筆數。
    pub async fn process(&self, batch: BatchRequest, ctx: &RequestContext) -> ProcessingOutcome {
        let total = batch.len();
        if total == 0 {
            return ProcessingOutcome::default();
        }

        let (success_tx, mut success_rx) = mpsc::channel::<OutputRecord>(total);
        let (failure_tx, mut failure_rx) = mpsc::channel::<ItemFailure>(total);

        let supervisor = Supervisor {
            transformer: Arc::clone(&self.transformer),
            permits: Arc::new(Semaphore::new(self.max_in_flight)),
            deadline: ctx.deadline,
            request_id: ctx.request_id.clone(),
            success_tx,
            failure_tx,
        };
        // 呼叫端的 future 被丟棄時（例如連線中斷），JoinSet 隨之中止 supervisor 與其所有工作
        let mut supervision = JoinSet::new();
        supervision.spawn(supervisor.run(batch.items));

        let mut outcome = ProcessingOutcome {
            successes: Vec::with_capacity(total),
            failures: Vec::new(),
        };
        let mut successes_open = true;
        let mut failures_open = true;

        while successes_open || failures_open {
            tokio::select! {
                received = success_rx.recv(), if successes_open => match received {
                    Some(record) => outcome.successes.push(record),
                    None => successes_open = false,
                },
                received = failure_rx.recv(), if failures_open => match received {
                    Some(failure) => outcome.failures.push(failure),
                    None => failures_open = false,
                },
            }
        }

        while let Some(joined) = supervision.join_next().await {
            if let Err(e) = joined {
                // 通道都已關閉代表 supervisor 已放下 sender；這裡只會是 panic
                error!(request_id = %ctx.request_id, error = %e, "Batch supervisor task failed");
            }
        }

        debug!(
            request_id = %ctx.request_id,
            total,
            succeeded = outcome.successes.len(),
            failed = outcome.failures.len(),
            "Fan-in complete"
        );

        outcome
    }
}

struct Supervisor {
    transformer: Arc<dyn Transformer>,
    permits: Arc<Semaphore>,
    deadline: Instant,
    request_id: String,
    success_tx: mpsc::Sender<OutputRecord>,
    failure_tx: mpsc::Sender<ItemFailure>,
}

impl Supervisor {
    async fn run(self, items: Vec<InputRecord>) {
        let mut units = JoinSet::new();
        let mut pending: HashMap<Id, String> = HashMap::with_capacity(items.len());
        let mut items = items.into_iter();

        while let Some(record) = items.next() {
            let permit = match timeout_at(self.deadline, Arc::clone(&self.permits).acquire_owned())
                .await
            {
                Ok(Ok(permit)) => permit,
                // 截止時間已到或 semaphore 已關閉：剩下的項目都不再啟動
                _ => {
                    let unlaunched = std::iter::once(record).chain(items.by_ref());
                    for record in unlaunched {
                        self.fail(record.id, FailureCause::DeadlineExceeded).await;
                    }
                    break;
                }
            };

            let item_id = record.id.clone();
            let transformer = Arc::clone(&self.transformer);
            let success_tx = self.success_tx.clone();
            let failure_tx = self.failure_tx.clone();
            let request_id = self.request_id.clone();

            let handle = units.spawn(async move {
                let _permit = permit;
                process_item(&*transformer, record, &request_id, success_tx, failure_tx).await;
            });
            pending.insert(handle.id(), item_id);
        }

        let mut aborted = false;
        loop {
            let joined = if aborted {
                units.join_next_with_id().await
            } else {
                match timeout_at(self.deadline, units.join_next_with_id()).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        warn!(
                            request_id = %self.request_id,
                            unfinished = pending.len(),
                            "Batch deadline exceeded, aborting unfinished items"
                        );
                        units.abort_all();
                        aborted = true;
                        continue;
                    }
                }
            };

            match joined {
                None => break,
                Some(Ok((id, ()))) => {
                    pending.remove(&id);
                }
                Some(Err(join_error)) => {
                    let item_id = pending.remove(&join_error.id()).unwrap_or_default();
                    let cause = if join_error.is_panic() {
                        FailureCause::WorkerPanicked
                    } else {
                        FailureCause::DeadlineExceeded
                    };
                    self.fail(item_id, cause).await;
                }
            }
        }
        // self 在此被丟棄，success_tx / failure_tx 隨之關閉
    }

    async fn fail(&self, item_id: String, cause: FailureCause) {
        warn!(request_id = %self.request_id, item_id = %item_id, %cause, "Item failed");
        // 容量等於批次大小，且每筆最多一個結果，不會阻塞
        let _ = self.failure_tx.send(ItemFailure::new(item_id, cause)).await;
    }
}

async fn process_item(
    transformer: &dyn Transformer,
    record: InputRecord,
    request_id: &str,
    success_tx: mpsc::Sender<OutputRecord>,
    failure_tx: mpsc::Sender<ItemFailure>,
) {
    debug!(
        request_id = %request_id,
        item_id = %record.id,
        name = %record.name,
        "Processing user"
    );

    match transformer.transform(&record) {
        Ok(output) => {
            let _ = success_tx.send(output).await;
        }
        Err(failure) => {
            warn!(
                request_id = %request_id,
                item_id = %failure.item_id,
                cause = %failure.cause,
                "Item rejected by transformer"
            );
            let _ = failure_tx.send(failure).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transform::UserTransformer;
    use crate::domain::model::AgeGroup;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn user(id: &str, age: i64) -> InputRecord {
        InputRecord {
            id: id.to_string(),
            name: format!("User {}", id),
            email: format!("{}@example.com", id),
            age,
        }
    }

    fn batch_of(n: usize) -> BatchRequest {
        BatchRequest::new((0..n).map(|i| user(&format!("u{}", i), i as i64)).collect())
    }

    fn ctx() -> RequestContext {
        RequestContext::new("test-request", Duration::from_secs(30))
    }

    /// 記錄同時執行中的最大數量
    struct TrackingTransformer {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Transformer for TrackingTransformer {
        fn transform(&self, record: &InputRecord) -> Result<OutputRecord, ItemFailure> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            UserTransformer.transform(record)
        }
    }

    struct PanickyTransformer;

    impl Transformer for PanickyTransformer {
        fn transform(&self, record: &InputRecord) -> Result<OutputRecord, ItemFailure> {
            if record.id == "boom" {
                panic!("transformer blew up");
            }
            UserTransformer.transform(record)
        }
    }

    struct SlowTransformer;

    impl Transformer for SlowTransformer {
        fn transform(&self, record: &InputRecord) -> Result<OutputRecord, ItemFailure> {
            std::thread::sleep(Duration::from_millis(200));
            UserTransformer.transform(record)
        }
    }

    /// 計算實際被啟動的轉換次數
    struct CountingSlowTransformer {
        started: Arc<AtomicUsize>,
    }

    impl Transformer for CountingSlowTransformer {
        fn transform(&self, record: &InputRecord) -> Result<OutputRecord, ItemFailure> {
            self.started.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            UserTransformer.transform(record)
        }
    }

    #[tokio::test]
    async fn test_empty_batch_launches_nothing() {
        let coordinator = FanOutCoordinator::new(Arc::new(UserTransformer), 4);
        let outcome = coordinator.process(BatchRequest::default(), &ctx()).await;

        assert!(outcome.successes.is_empty());
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test]
    async fn test_all_items_succeed_as_a_set() {
        let coordinator = FanOutCoordinator::new(Arc::new(UserTransformer), 8);
        let batch = batch_of(50);
        let expected: HashSet<String> = batch.items.iter().map(|r| r.id.clone()).collect();

        let outcome = coordinator.process(batch, &ctx()).await;

        assert_eq!(outcome.successes.len(), 50);
        assert!(outcome.failures.is_empty());
        let received: HashSet<String> = outcome.successes.iter().map(|r| r.id.clone()).collect();
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn test_item_failure_is_isolated() {
        let coordinator = FanOutCoordinator::new(Arc::new(UserTransformer), 2);
        let batch = BatchRequest::new(vec![user("a", 20), user("", 30), user("c", 40)]);

        let outcome = coordinator.process(batch, &ctx()).await;

        assert_eq!(outcome.successes.len(), 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].cause, FailureCause::EmptyIdentifier);
        assert_eq!(outcome.total(), 3);

        let groups: HashSet<AgeGroup> = outcome.successes.iter().map(|r| r.age_group).collect();
        assert!(groups.contains(&AgeGroup::Under25));
        assert!(groups.contains(&AgeGroup::Over35));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_in_flight_units_are_capped() {
        let transformer = Arc::new(TrackingTransformer {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let coordinator = FanOutCoordinator::new(transformer.clone(), 2);

        let outcome = coordinator.process(batch_of(20), &ctx()).await;

        assert_eq!(outcome.successes.len(), 20);
        assert!(transformer.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_panicking_item_is_recorded_as_failure() {
        let coordinator = FanOutCoordinator::new(Arc::new(PanickyTransformer), 4);
        let batch = BatchRequest::new(vec![user("ok-1", 22), user("boom", 33), user("ok-2", 44)]);

        let outcome = coordinator.process(batch, &ctx()).await;

        assert_eq!(outcome.successes.len(), 2);
        assert_eq!(
            outcome.failures,
            vec![ItemFailure::new("boom", FailureCause::WorkerPanicked)]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_deadline_turns_unfinished_items_into_failures() {
        let coordinator = FanOutCoordinator::new(Arc::new(SlowTransformer), 1);
        let ctx = RequestContext::new("deadline-request", Duration::from_millis(50));

        let outcome = coordinator.process(batch_of(5), &ctx).await;

        assert_eq!(outcome.total(), 5);
        assert!(!outcome.failures.is_empty());
        assert!(outcome
            .failures
            .iter()
            .all(|f| f.cause == FailureCause::DeadlineExceeded));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dropping_the_caller_stops_launching_items() {
        let started = Arc::new(AtomicUsize::new(0));
        let coordinator = FanOutCoordinator::new(
            Arc::new(CountingSlowTransformer {
                started: Arc::clone(&started),
            }),
            1,
        );

        // 模擬連線中斷：process 的 future 在批次完成前被丟棄
        let abandoned =
            tokio::time::timeout(Duration::from_millis(75), coordinator.process(batch_of(20), &ctx()))
                .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(400)).await;
        let launched = started.load(Ordering::SeqCst);
        assert!(launched <= 3, "items kept launching after drop: {}", launched);
    }

    #[test]
    fn test_zero_cap_is_raised_to_one() {
        let coordinator = FanOutCoordinator::new(Arc::new(UserTransformer), 0);
        assert_eq!(coordinator.max_in_flight(), 1);
    }
}
