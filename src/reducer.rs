//! Pairwise-merge reduction.
//!
//! Each round reads its divisor, optionally snapshots every member, splits
//! the members by position parity into a keep set (even positions) and a
//! burn set (odd positions), and submits both to the registry in one batch.
//! The next round runs on the keep set while it has more than one token and
//! the round's divisor is non-zero.
//!
//! Position 0 is never burned, so the survivor is always the first token of
//! the original input.

use serde::Serialize;

use crate::TokenId;
use crate::divisors::{Divisor, DivisorTable, Round};
use crate::errors::ReduceError;
use crate::registry::Registry;
use crate::snapshot::Snapshot;

/// Per-call settings carried through every round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReduceOptions {
    /// Divisor table index of the first round.
    pub start_round: Round,
    /// Record every round member and the survivor with the snapshot sink.
    pub snapshot: bool,
}

impl ReduceOptions {
    pub fn starting_at(start_round: Round) -> Self {
        Self {
            start_round,
            ..Self::default()
        }
    }

    pub fn with_snapshot(mut self, snapshot: bool) -> Self {
        self.snapshot = snapshot;
        self
    }
}

/// Keep and burn sets of one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Partition {
    pub keep: Vec<TokenId>,
    pub burn: Vec<TokenId>,
}

/// Split `tokens` by position parity, preserving order within each half.
///
/// `keep` gets `ceil(n/2)` tokens, `burn` gets `floor(n/2)`.
pub fn partition(tokens: &[TokenId]) -> Partition {
    let mut keep = Vec::with_capacity(tokens.len().div_ceil(2));
    let mut burn = Vec::with_capacity(tokens.len() / 2);
    for (index, &id) in tokens.iter().enumerate() {
        if index % 2 == 0 {
            keep.push(id);
        } else {
            burn.push(id);
        }
    }
    Partition { keep, burn }
}

fn should_continue(keep_len: usize, divisor: Divisor) -> bool {
    keep_len > 1 && divisor > 0
}

/// One round as it will be executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundPlan {
    pub round: Round,
    pub divisor: Divisor,
    pub keep: Vec<TokenId>,
    pub burn: Vec<TokenId>,
}

/// Every round of a reduction, computed without side effects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub rounds: Vec<RoundPlan>,
    pub survivor: TokenId,
    pub terminal_divisor: Divisor,
}

/// Compute the rounds a reduction of `tokens` would take.
///
/// Fails if the input is empty or if any divisor index the reduction reads,
/// including the terminal `round + 1` lookup, is outside `divisors`.
pub fn plan(
    tokens: &[TokenId],
    start_round: Round,
    divisors: &DivisorTable,
) -> Result<Plan, ReduceError> {
    if tokens.is_empty() {
        return Err(ReduceError::EmptyInput);
    }

    let mut rounds = Vec::new();
    let mut round = start_round;
    let mut current = tokens.to_vec();
    loop {
        let divisor = divisors.value_at(round)?;
        let Partition { keep, burn } = partition(&current);
        let next = should_continue(keep.len(), divisor);
        rounds.push(RoundPlan {
            round,
            divisor,
            keep: keep.clone(),
            burn,
        });

        if next {
            current = keep;
            round += 1;
            continue;
        }

        return Ok(Plan {
            rounds,
            survivor: keep[0],
            terminal_divisor: divisors.value_at(round + 1)?,
        });
    }
}

/// Result of a completed reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reduction {
    pub survivor: TokenId,
    /// Divisor of the round after the last one executed.
    pub terminal_divisor: Divisor,
    /// Number of merge batches submitted.
    pub rounds: usize,
}

/// Drives a reduction against a registry and a snapshot sink.
pub struct Reducer<'a, R: ?Sized, S: ?Sized> {
    registry: &'a R,
    snapshot: &'a S,
    divisors: &'a DivisorTable,
}

impl<'a, R, S> Reducer<'a, R, S>
where
    R: Registry + ?Sized,
    S: Snapshot + ?Sized,
{
    pub fn new(registry: &'a R, snapshot: &'a S, divisors: &'a DivisorTable) -> Self {
        Self {
            registry,
            snapshot,
            divisors,
        }
    }

    /// Reduce `tokens` to a single survivor.
    ///
    /// Rounds run strictly one after another. Any registry or snapshot
    /// failure aborts the reduction at that point and is returned as is;
    /// batches already applied are not rolled back.
    pub async fn reduce(
        &self,
        tokens: &[TokenId],
        options: ReduceOptions,
    ) -> Result<Reduction, ReduceError> {
        // Divisor lookups are checked up front so a short table fails
        // before anything is burned.
        let planned = plan(tokens, options.start_round, self.divisors)?;
        tracing::info!(
            tokens = tokens.len(),
            start_round = options.start_round,
            planned_rounds = planned.rounds.len(),
            snapshot = options.snapshot,
            "starting reduction"
        );

        let mut round = options.start_round;
        let mut current = tokens.to_vec();
        let mut merges = 0;
        loop {
            let divisor = self.divisors.value_at(round)?;

            if options.snapshot {
                for &id in &current {
                    self.snapshot.record(id, divisor).await?;
                }
            }

            let Partition { keep, burn } = partition(&current);
            tracing::info!(round, divisor, ?keep, ?burn, "merging round");
            self.registry.merge_batch(&keep, &burn).await?;
            merges += 1;

            if should_continue(keep.len(), divisor) {
                current = keep;
                round += 1;
                continue;
            }

            let survivor = keep[0];
            let terminal_divisor = self.divisors.value_at(round + 1)?;
            if options.snapshot {
                self.snapshot.record(survivor, terminal_divisor).await?;
            }

            tracing::info!(survivor, terminal_divisor, rounds = merges, "reduction complete");
            return Ok(Reduction {
                survivor,
                terminal_divisor,
                rounds: merges,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{DivisorError, RegistryError, SnapshotError};
    use crate::registry::{InMemoryRegistry, MergeBatch};
    use crate::snapshot::{MemorySnapshot, NoopSnapshot};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn table(values: &[Divisor]) -> DivisorTable {
        DivisorTable::new(values.to_vec()).unwrap()
    }

    fn batch(keep: &[TokenId], burn: &[TokenId]) -> MergeBatch {
        MergeBatch {
            keep: keep.to_vec(),
            burn: burn.to_vec(),
        }
    }

    fn ceil_log2(n: usize) -> usize {
        (usize::BITS - (n - 1).leading_zeros()) as usize
    }

    /// Fails the `fail_on`-th merge call (0-based).
    struct FailingRegistry {
        fail_on: usize,
        calls: AtomicUsize,
    }

    impl FailingRegistry {
        fn new(fail_on: usize) -> Self {
            Self {
                fail_on,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Registry for FailingRegistry {
        async fn merge_batch(&self, _keep: &[TokenId], _burn: &[TokenId]) -> Result<(), RegistryError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == self.fail_on {
                return Err(RegistryError::Rejected("transaction reverted".to_string()));
            }
            Ok(())
        }
    }

    struct FailingSnapshot;

    #[async_trait]
    impl Snapshot for FailingSnapshot {
        async fn record(&self, _id: TokenId, _divisor: Divisor) -> Result<(), SnapshotError> {
            Err(SnapshotError::Unavailable("renderer offline".to_string()))
        }
    }

    #[test]
    fn test_partition_even_and_odd_positions() {
        let p = partition(&[1, 2, 3, 4, 5]);
        assert_eq!(p.keep, vec![1, 3, 5]);
        assert_eq!(p.burn, vec![2, 4]);
    }

    #[test]
    fn test_partition_sizes_and_disjointness() {
        for n in 1..=33u64 {
            let tokens: Vec<TokenId> = (100..100 + n).collect();
            let p = partition(&tokens);
            let len = tokens.len();
            assert_eq!(p.keep.len(), len.div_ceil(2));
            assert_eq!(p.burn.len(), len / 2);
            assert!(p.keep.iter().all(|id| !p.burn.contains(id)));

            let mut all: Vec<TokenId> = p.keep.iter().chain(&p.burn).copied().collect();
            all.sort_unstable();
            assert_eq!(all, tokens);
        }
    }

    #[test]
    fn test_plan_concrete_scenario() {
        let plan = plan(&[1, 2, 3, 4, 5], 0, &table(&[100, 50, 25, 0])).unwrap();
        assert_eq!(
            plan.rounds,
            vec![
                RoundPlan { round: 0, divisor: 100, keep: vec![1, 3, 5], burn: vec![2, 4] },
                RoundPlan { round: 1, divisor: 50, keep: vec![1, 5], burn: vec![3] },
                RoundPlan { round: 2, divisor: 25, keep: vec![1], burn: vec![5] },
            ]
        );
        assert_eq!(plan.survivor, 1);
        assert_eq!(plan.terminal_divisor, 0);
    }

    #[test]
    fn test_plan_rejects_short_table() {
        let err = plan(&[1, 2, 3, 4], 0, &table(&[10, 5])).unwrap_err();
        assert!(matches!(
            err,
            ReduceError::Divisor(DivisorError::OutOfRange { round: 2, len: 2 })
        ));
    }

    #[tokio::test]
    async fn test_reduce_concrete_scenario() {
        let registry = InMemoryRegistry::with_tokens("alice", &[1, 2, 3, 4, 5]);
        let divisors = table(&[100, 50, 25, 0]);
        let reducer = Reducer::new(&registry, &NoopSnapshot, &divisors);

        let reduction = reducer
            .reduce(&[1, 2, 3, 4, 5], ReduceOptions::default())
            .await
            .unwrap();

        assert_eq!(reduction.survivor, 1);
        assert_eq!(reduction.terminal_divisor, 0);
        assert_eq!(reduction.rounds, 3);
        assert_eq!(
            registry.batches().await,
            vec![
                batch(&[1, 3, 5], &[2, 4]),
                batch(&[1, 5], &[3]),
                batch(&[1], &[5]),
            ]
        );
        assert_eq!(registry.live_tokens().await, vec![1]);
        assert_eq!(registry.level_of(1).await, Some(3));
    }

    #[tokio::test]
    async fn test_reduce_single_token() {
        let registry = InMemoryRegistry::with_tokens("alice", &[42]);
        let divisors = table(&[80, 40, 20]);
        let reducer = Reducer::new(&registry, &NoopSnapshot, &divisors);

        let reduction = reducer
            .reduce(&[42], ReduceOptions::starting_at(1))
            .await
            .unwrap();

        assert_eq!(reduction.survivor, 42);
        assert_eq!(reduction.terminal_divisor, 20);
        assert_eq!(reduction.rounds, 1);
        assert_eq!(registry.batches().await, vec![batch(&[42], &[])]);
    }

    #[tokio::test]
    async fn test_reduce_zero_divisor_stops_immediately() {
        let registry = InMemoryRegistry::with_tokens("alice", &[1, 2, 3, 4, 5, 6, 7, 8]);
        let divisors = table(&[0, 50, 25]);
        let reducer = Reducer::new(&registry, &NoopSnapshot, &divisors);

        let reduction = reducer
            .reduce(&[1, 2, 3, 4, 5, 6, 7, 8], ReduceOptions::default())
            .await
            .unwrap();

        assert_eq!(reduction.survivor, 1);
        assert_eq!(reduction.terminal_divisor, 50);
        assert_eq!(reduction.rounds, 1);
        assert_eq!(registry.live_tokens().await, vec![1, 3, 5, 7]);
    }

    #[tokio::test]
    async fn test_reduce_starts_at_offset_round() {
        let tokens = [10, 11, 12, 13];
        let registry = InMemoryRegistry::with_tokens("alice", &tokens);
        let divisors = DivisorTable::checks();
        let reducer = Reducer::new(&registry, &NoopSnapshot, &divisors);

        // Rounds 5 and 6 use divisors 4 and 1; the sentinel at 7 is terminal.
        let reduction = reducer
            .reduce(&tokens, ReduceOptions::starting_at(5))
            .await
            .unwrap();

        assert_eq!(reduction.rounds, 2);
        assert_eq!(reduction.survivor, 10);
        assert_eq!(reduction.terminal_divisor, 0);
        assert_eq!(
            registry.batches().await,
            vec![batch(&[10, 12], &[11, 13]), batch(&[10], &[12])]
        );
    }

    #[tokio::test]
    async fn test_reduce_survivor_is_first_token_and_rounds_bounded() {
        let divisors = DivisorTable::new(vec![1; 16]).unwrap();
        for n in 1..=64u64 {
            let tokens: Vec<TokenId> = (1..=n).rev().collect();
            let registry = InMemoryRegistry::with_tokens("alice", &tokens);
            let reducer = Reducer::new(&registry, &NoopSnapshot, &divisors);

            let reduction = reducer
                .reduce(&tokens, ReduceOptions::default())
                .await
                .unwrap();

            assert_eq!(reduction.survivor, tokens[0]);
            assert!(reduction.rounds <= ceil_log2(tokens.len()) + 1);
            assert_eq!(registry.live_tokens().await, vec![tokens[0]]);
        }
    }

    #[tokio::test]
    async fn test_reduce_snapshots_members_then_survivor() {
        let registry = InMemoryRegistry::with_tokens("alice", &[1, 2, 3]);
        let snapshot = MemorySnapshot::new();
        let divisors = table(&[80, 40, 20]);
        let reducer = Reducer::new(&registry, &snapshot, &divisors);

        let reduction = reducer
            .reduce(&[1, 2, 3], ReduceOptions::default().with_snapshot(true))
            .await
            .unwrap();

        assert_eq!(reduction.terminal_divisor, 20);
        assert_eq!(
            snapshot.records().await,
            vec![(1, 80), (2, 80), (3, 80), (1, 40), (3, 40), (1, 20)]
        );
    }

    #[tokio::test]
    async fn test_reduce_without_snapshot_flag_records_nothing() {
        let registry = InMemoryRegistry::with_tokens("alice", &[1, 2, 3]);
        let snapshot = MemorySnapshot::new();
        let divisors = DivisorTable::checks();
        let reducer = Reducer::new(&registry, &snapshot, &divisors);

        reducer
            .reduce(&[1, 2, 3], ReduceOptions::default())
            .await
            .unwrap();

        assert!(snapshot.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_reduce_registry_failure_stops_later_rounds() {
        let registry = FailingRegistry::new(1);
        let divisors = DivisorTable::checks();
        let reducer = Reducer::new(&registry, &NoopSnapshot, &divisors);

        let err = reducer
            .reduce(&[1, 2, 3, 4, 5, 6, 7, 8], ReduceOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReduceError::Registry(RegistryError::Rejected(ref msg)) if msg == "transaction reverted"
        ));
        assert_eq!(err.to_string(), "Registry rejected the batch: transaction reverted");
        assert_eq!(registry.calls(), 2);
    }

    #[tokio::test]
    async fn test_reduce_surfaces_registry_rejection() {
        // Token 2 is already gone, so the first batch is refused.
        let registry = InMemoryRegistry::with_tokens("alice", &[1, 2, 3]);
        registry.merge_batch(&[1], &[2]).await.unwrap();
        let divisors = DivisorTable::checks();
        let reducer = Reducer::new(&registry, &NoopSnapshot, &divisors);

        let err = reducer
            .reduce(&[1, 2, 3], ReduceOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReduceError::Registry(RegistryError::AlreadyBurned { token: 2 })
        ));
        assert!(registry.is_live(3).await);
    }

    #[tokio::test]
    async fn test_reduce_snapshot_failure_aborts_before_merge() {
        let registry = FailingRegistry::new(usize::MAX);
        let divisors = DivisorTable::checks();
        let reducer = Reducer::new(&registry, &FailingSnapshot, &divisors);

        let err = reducer
            .reduce(&[1, 2], ReduceOptions::default().with_snapshot(true))
            .await
            .unwrap_err();

        assert!(matches!(err, ReduceError::Snapshot(SnapshotError::Unavailable(_))));
        assert_eq!(registry.calls(), 0);
    }

    #[tokio::test]
    async fn test_reduce_rejects_empty_input() {
        let registry = FailingRegistry::new(usize::MAX);
        let divisors = DivisorTable::checks();
        let reducer = Reducer::new(&registry, &NoopSnapshot, &divisors);

        let err = reducer
            .reduce(&[], ReduceOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ReduceError::EmptyInput));
        assert_eq!(registry.calls(), 0);
    }

    #[tokio::test]
    async fn test_reduce_short_table_touches_nothing() {
        let registry = FailingRegistry::new(usize::MAX);
        let divisors = table(&[80, 40]);
        let reducer = Reducer::new(&registry, &NoopSnapshot, &divisors);

        let err = reducer
            .reduce(&[1, 2, 3, 4, 5], ReduceOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReduceError::Divisor(DivisorError::OutOfRange { round: 2, .. })
        ));
        assert_eq!(registry.calls(), 0);
    }

    #[tokio::test]
    async fn test_reduce_works_through_trait_objects() {
        let registry = InMemoryRegistry::with_tokens("alice", &[5, 6]);
        let dyn_registry: &dyn Registry = &registry;
        let dyn_snapshot: &dyn Snapshot = &NoopSnapshot;
        let divisors = DivisorTable::checks();
        let reducer = Reducer::new(dyn_registry, dyn_snapshot, &divisors);

        let reduction = reducer
            .reduce(&[5, 6], ReduceOptions::default())
            .await
            .unwrap();

        assert_eq!(reduction.survivor, 5);
        assert_eq!(reduction.terminal_divisor, 40);
    }
}
