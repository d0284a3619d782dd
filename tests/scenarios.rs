//! Integration tests for the six concrete scenarios and the universal
//! invariants they exercise.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use worklane::{BatchStrategy, BoxError, DataSupplier, Job, LaborError, LaborStrategy, Stage};

#[tokio::test]
async fn identity_pass_through_with_no_strategies() {
    let job = Job::<i32>::new(1);
    let out = job
        .run(CancellationToken::new(), DataSupplier::new((1..=9).collect()))
        .await;

    assert_eq!(out.len(), 9);
    for r in &out {
        assert!(r.error.is_none());
        assert!((1..=9).contains(&r.value.unwrap()));
    }
}

struct VerbatimBatch;

#[async_trait]
impl BatchStrategy<i32> for VerbatimBatch {
    fn size(&self) -> usize {
        2
    }

    async fn reduce(&self, _cx: CancellationToken, mut group: Vec<i32>) -> Result<i32, BoxError> {
        Ok(group.pop().expect("groups handed to reduce are never empty"))
    }
}

#[tokio::test]
async fn batching_with_count_conservation() {
    let job = Job::<i32>::new(0).batch_strategy(VerbatimBatch);
    let out = job
        .run(CancellationToken::new(), DataSupplier::new((1..=9).collect()))
        .await;

    assert_eq!(out.len(), 9);
    for r in &out {
        assert!(r.error.is_none());
        assert!((1..=9).contains(&r.value.unwrap()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Item {
    Num(i32),
    NonNumeric,
}

struct IncrementUnlessNonNumeric;

#[async_trait]
impl LaborStrategy<Item> for IncrementUnlessNonNumeric {
    async fn work(&self, _cx: CancellationToken, value: Item) -> Result<Item, LaborError<Item>> {
        match value {
            Item::Num(n) => Ok(Item::Num(n + 1)),
            Item::NonNumeric => Err(LaborError::new("value is not numeric")),
        }
    }
}

#[tokio::test]
async fn labor_failure_is_tagged_and_isolated() {
    let mut input: Vec<Item> = (1..=8).map(Item::Num).collect();
    input.push(Item::NonNumeric);

    let job = Job::<Item>::new(0).labor_strategy(IncrementUnlessNonNumeric);
    let out = job.run(CancellationToken::new(), DataSupplier::new(input)).await;

    assert_eq!(out.len(), 9);
    let (ok, failed): (Vec<_>, Vec<_>) = out.into_iter().partition(|r| r.error.is_none());
    assert_eq!(ok.len(), 8);
    for r in &ok {
        assert!(matches!(r.value, Some(Item::Num(n)) if (2..=9).contains(&n)));
    }
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].error.as_ref().unwrap().stage(), Stage::Labor);
    assert_eq!(failed[0].param.as_single(), Some(&Item::NonNumeric));
}

struct IsEven;

#[async_trait]
impl LaborStrategy<i32> for IsEven {
    async fn work(&self, _cx: CancellationToken, value: i32) -> Result<i32, LaborError<i32>> {
        Ok(if value % 2 == 0 { 1 } else { 0 })
    }
}

#[tokio::test]
async fn labor_predicate_true_for_every_even_input() {
    let job = Job::<i32>::new(0).labor_strategy(IsEven);
    let out = job
        .run(CancellationToken::new(), DataSupplier::new(vec![2, 4, 6, 8]))
        .await;

    assert_eq!(out.len(), 4);
    for r in &out {
        assert!(r.error.is_none());
        assert_eq!(r.value, Some(1));
    }
}

struct SumUnlessNonNumeric;

#[async_trait]
impl BatchStrategy<Item> for SumUnlessNonNumeric {
    fn size(&self) -> usize {
        9
    }

    async fn reduce(&self, _cx: CancellationToken, group: Vec<Item>) -> Result<Item, BoxError> {
        let mut sum = 0;
        for item in &group {
            match item {
                Item::Num(n) => sum += n,
                Item::NonNumeric => return Err("group contains a non-numeric element".into()),
            }
        }
        Ok(Item::Num(sum))
    }
}

struct RetryOnceThenGiveUp;

impl worklane::RetryStrategy<Item> for RetryOnceThenGiveUp {
    fn worth(&self, _result: &worklane::JobResult<Item>) -> bool {
        true
    }

    fn forgo(&self) -> bool {
        true
    }
}

#[tokio::test]
async fn batch_failure_expands_to_one_tagged_result_per_element() {
    let mut input: Vec<Item> = (1..=8).map(Item::Num).collect();
    input.push(Item::NonNumeric);

    let job = Job::<Item>::new(0)
        .batch_strategy(SumUnlessNonNumeric)
        .retry_strategy(RetryOnceThenGiveUp);
    let out = job.run(CancellationToken::new(), DataSupplier::new(input)).await;

    assert_eq!(out.len(), 9);
    for r in &out {
        assert_eq!(r.error.as_ref().unwrap().stage(), Stage::Batch);
        assert!(r.param.as_single().is_some());
    }
}

struct IncrementFailingOddOnFirstAttempt {
    attempts: std::sync::Mutex<std::collections::HashMap<i32, u32>>,
}

#[async_trait]
impl LaborStrategy<i32> for IncrementFailingOddOnFirstAttempt {
    async fn work(&self, _cx: CancellationToken, value: i32) -> Result<i32, LaborError<i32>> {
        let tries = {
            let mut attempts = self.attempts.lock().unwrap();
            let entry = attempts.entry(value).or_insert(0);
            *entry += 1;
            *entry
        };
        if value % 2 != 0 && tries == 1 {
            Err(LaborError::new(format!("{value} failed on first attempt")))
        } else {
            Ok(value + 1)
        }
    }
}

struct RetryUntilRoundThree {
    round: std::sync::atomic::AtomicU32,
}

impl worklane::RetryStrategy<i32> for RetryUntilRoundThree {
    fn worth(&self, result: &worklane::JobResult<i32>) -> bool {
        result.error.is_some()
    }

    fn forgo(&self) -> bool {
        self.round.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1 >= 3
    }
}

#[tokio::test]
async fn labor_retry_converges_to_success() {
    let job = Job::<i32>::new(0)
        .labor_strategy(IncrementFailingOddOnFirstAttempt {
            attempts: std::sync::Mutex::new(std::collections::HashMap::new()),
        })
        .retry_strategy(RetryUntilRoundThree {
            round: std::sync::atomic::AtomicU32::new(0),
        });
    let out = job
        .run(CancellationToken::new(), DataSupplier::new((1..=9).collect()))
        .await;

    assert_eq!(out.len(), 9);
    for r in &out {
        assert!(r.error.is_none(), "{r:?}");
        assert!((2..=10).contains(&r.value.unwrap()));
    }
}
