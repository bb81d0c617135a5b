//! Driving rounds of concurrent probes.
//!
//! A benchmark consists of a fixed number of rounds. In each round one
//! probe task is spawned per registry entry; all tasks of a round run
//! in parallel and the round only completes once every one of them has
//! finished. The next round never starts before that barrier.
//!
//! Results are kept in one stats slot per registry index. The slots are
//! owned by the scheduler; probe tasks hand their outcome back through
//! the join and the scheduler applies it to the owning slot, so no two
//! writes to a slot are ever concurrent and no locking is needed.
//! Totals accumulate across rounds and are never reset.

#![warn(clippy::missing_docs_in_private_items)]

use crate::probe::{ProbeOutcome, Prober};
use crate::registry::Registry;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

//------------ Configuration Constants ---------------------------------------

/// The number of rounds a benchmark runs.
pub const ROUNDS: usize = 3;

//------------ ProgressSink --------------------------------------------------

/// Receives cosmetic progress updates from the scheduler.
///
/// The sink has no influence on scheduling or aggregation.
pub trait ProgressSink: Send + Sync {
    /// Called when a round starts.
    fn round_started(&self, round: usize, total: usize);

    /// Called after each probe task of the current round has finished.
    fn probe_finished(&self, done: usize, total: usize);
}

//------------ NullProgress --------------------------------------------------

/// Ignores all progress updates.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn round_started(&self, _round: usize, _total: usize) {}

    fn probe_finished(&self, _done: usize, _total: usize) {}
}

//------------ TermProgress --------------------------------------------------

/// Prints a round banner and a completion counter to stderr.
pub struct TermProgress;

impl ProgressSink for TermProgress {
    fn round_started(&self, round: usize, _total: usize) {
        eprintln!("Round {}", round);
    }

    fn probe_finished(&self, done: usize, total: usize) {
        eprint!("\r{}/{}", done, total);
        if done == total {
            eprintln!();
        }
        let _ = io::stderr().flush();
    }
}

//------------ ResolverStats -------------------------------------------------

/// Accumulated results for one resolver across all rounds.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ResolverStats {
    /// The number of successful probes.
    times: u32,

    /// The summed latency of the successful probes in milliseconds.
    elapsed_ms: u64,
}

impl ResolverStats {
    /// Creates stats from a success count and a latency total.
    pub fn new(times: u32, elapsed_ms: u64) -> Self {
        ResolverStats { times, elapsed_ms }
    }

    /// Returns the number of successful probes.
    pub fn times(&self) -> u32 {
        self.times
    }

    /// Returns the summed latency of the successful probes.
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// Returns the mean latency over the successful probes.
    ///
    /// Returns `None` if no probe has succeeded yet.
    pub fn mean_ms(&self) -> Option<f64> {
        if self.times == 0 {
            None
        } else {
            Some(self.elapsed_ms as f64 / self.times as f64)
        }
    }

    /// Folds one probe outcome into the totals.
    fn record(&mut self, outcome: &ProbeOutcome) {
        if let ProbeOutcome::Success { elapsed_ms } = *outcome {
            self.times += 1;
            self.elapsed_ms += elapsed_ms;
        }
    }
}

//------------ Benchmark -----------------------------------------------------

/// Runs rounds of concurrent probes over a registry.
pub struct Benchmark<P> {
    /// The prober shared by all probe tasks.
    prober: Arc<P>,

    /// How many rounds to run.
    rounds: usize,
}

impl<P: Prober + 'static> Benchmark<P> {
    /// Creates a benchmark running the default number of rounds.
    pub fn new(prober: P) -> Self {
        Self::with_rounds(prober, ROUNDS)
    }

    /// Creates a benchmark running `rounds` rounds.
    pub fn with_rounds(prober: P, rounds: usize) -> Self {
        Benchmark {
            prober: Arc::new(prober),
            rounds,
        }
    }

    /// Probes every endpoint once per round and returns the totals.
    ///
    /// The returned vector has one slot per registry index, in registry
    /// order. A failed probe leaves its slot untouched and never aborts
    /// the round or the run.
    pub async fn run(
        &self,
        registry: &Registry,
        progress: &dyn ProgressSink,
    ) -> Vec<ResolverStats> {
        let total = registry.len();
        let mut stats = vec![ResolverStats::default(); total];
        for round in 1..=self.rounds {
            progress.round_started(round, total);
            let mut tasks = JoinSet::new();
            for (index, endpoint) in registry.iter().enumerate() {
                let prober = self.prober.clone();
                let endpoint = endpoint.clone();
                tasks.spawn(async move {
                    (index, prober.probe(&endpoint).await)
                });
            }
            let mut done = 0;
            while let Some(task) = tasks.join_next().await {
                done += 1;
                progress.probe_finished(done, total);
                match task {
                    Ok((index, outcome)) => stats[index].record(&outcome),
                    Err(err) => warn!("probe task failed: {}", err),
                }
            }
            debug!("round {} of {} finished", round, self.rounds);
        }
        stats
    }
}

//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::probe::ProbeError;
    use crate::registry::ResolverEndpoint;
    use std::collections::HashMap;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Barrier;

    /// Shorthand for a successful outcome.
    fn ok(elapsed_ms: u64) -> ProbeOutcome {
        ProbeOutcome::Success { elapsed_ms }
    }

    /// Shorthand for a failed outcome.
    fn fail() -> ProbeOutcome {
        ProbeOutcome::Failure(ProbeError::Timeout)
    }

    /// A registry with `len` distinct endpoints.
    fn registry(len: usize) -> Registry {
        let input = (1..=len)
            .map(|i| format!("10.0.0.{}\n", i))
            .collect::<String>();
        Registry::from_reader(input.as_bytes()).expect("test registry")
    }

    /// Replays scripted outcomes, keyed by descriptor text.
    struct ScriptedProber {
        /// Outcome queues per stamp; one entry is popped per probe.
        outcomes: Mutex<HashMap<String, VecDeque<ProbeOutcome>>>,
    }

    impl ScriptedProber {
        fn new(
            script: impl IntoIterator<Item = (&'static str, Vec<ProbeOutcome>)>,
        ) -> Self {
            let outcomes = script
                .into_iter()
                .map(|(stamp, outcomes)| {
                    (stamp.to_string(), outcomes.into())
                })
                .collect();
            ScriptedProber {
                outcomes: Mutex::new(outcomes),
            }
        }
    }

    impl Prober for ScriptedProber {
        fn probe<'a>(
            &'a self,
            endpoint: &'a ResolverEndpoint,
        ) -> Pin<Box<dyn Future<Output = ProbeOutcome> + Send + 'a>> {
            Box::pin(async move {
                self.outcomes
                    .lock()
                    .expect("poisoned")
                    .get_mut(endpoint.stamp())
                    .and_then(|queue| queue.pop_front())
                    .unwrap_or_else(fail)
            })
        }
    }

    /// Waits on a barrier sized to the whole round before answering.
    struct BarrierProber {
        /// Released only when every probe of a round has started.
        barrier: Barrier,
    }

    impl Prober for BarrierProber {
        fn probe<'a>(
            &'a self,
            _endpoint: &'a ResolverEndpoint,
        ) -> Pin<Box<dyn Future<Output = ProbeOutcome> + Send + 'a>> {
            Box::pin(async move {
                self.barrier.wait().await;
                ok(1)
            })
        }
    }

    /// Counts progress callbacks.
    #[derive(Default)]
    struct CountingProgress {
        /// Number of `round_started` calls.
        rounds: AtomicUsize,

        /// Number of `probe_finished` calls.
        probes: AtomicUsize,
    }

    impl ProgressSink for CountingProgress {
        fn round_started(&self, _round: usize, _total: usize) {
            self.rounds.fetch_add(1, Ordering::Relaxed);
        }

        fn probe_finished(&self, _done: usize, _total: usize) {
            self.probes.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[tokio::test]
    async fn totals_accumulate_across_rounds() {
        let prober = ScriptedProber::new([
            ("10.0.0.1", vec![ok(10), ok(20), ok(30)]),
            ("10.0.0.2", vec![fail(), fail(), fail()]),
        ]);
        let stats = Benchmark::new(prober)
            .run(&registry(2), &NullProgress)
            .await;

        assert_eq!(stats[0], ResolverStats::new(3, 60));
        assert_eq!(stats[0].mean_ms(), Some(20.0));
        assert_eq!(stats[1], ResolverStats::new(0, 0));
        assert_eq!(stats[1].mean_ms(), None);
    }

    #[tokio::test]
    async fn partial_failures_leave_other_rounds_alone() {
        let prober = ScriptedProber::new([(
            "10.0.0.1",
            vec![ok(40), fail(), ok(20)],
        )]);
        let stats = Benchmark::new(prober)
            .run(&registry(1), &NullProgress)
            .await;

        assert_eq!(stats[0], ResolverStats::new(2, 60));
        assert!(stats[0].times() as usize <= ROUNDS);
    }

    #[tokio::test]
    async fn probes_of_a_round_run_concurrently() {
        // Every probe waits until all four probes of the round have
        // started. If the scheduler ran them one by one, the first
        // probe would block the round forever.
        let prober = BarrierProber {
            barrier: Barrier::new(4),
        };
        let benchmark = Benchmark::with_rounds(prober, 1);
        let stats = tokio::time::timeout(
            Duration::from_secs(5),
            benchmark.run(&registry(4), &NullProgress),
        )
        .await
        .expect("probes were serialized");

        assert!(stats.iter().all(|stat| stat.times() == 1));
    }

    #[tokio::test]
    async fn progress_is_reported_per_task() {
        let prober = ScriptedProber::new([]);
        let progress = CountingProgress::default();
        Benchmark::new(prober).run(&registry(5), &progress).await;

        assert_eq!(progress.rounds.load(Ordering::Relaxed), ROUNDS);
        assert_eq!(progress.probes.load(Ordering::Relaxed), ROUNDS * 5);
    }
}
