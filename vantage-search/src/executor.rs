//! Parallel variant execution with bounded concurrency.
//!
//! Every variant runs in its own Tokio task. A shared [`Semaphore`] caps how
//! many provider calls are in flight; transient failures are retried with a
//! linear backoff; one deadline governs the whole batch. Outcomes land in
//! slots indexed by submission order, so completion order never leaks into
//! what happens downstream.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::ProviderError;
use crate::provider::SearchProvider;
use crate::types::{ProviderOptions, QueryVariant, RawHit};

/// How one variant ended.
#[derive(Debug, Clone, PartialEq)]
pub enum VariantOutcome {
    /// The provider answered.
    Succeeded {
        /// Hits in provider order.
        hits: Vec<RawHit>,
        /// Attempts used, first try included.
        attempts: u32,
    },
    /// Every attempt failed with a transient error.
    Exhausted {
        /// Attempts used.
        attempts: u32,
        /// The error from the final attempt.
        last_error: ProviderError,
    },
    /// The provider reported a terminal error; not retried.
    Rejected {
        /// The terminal error.
        error: ProviderError,
    },
    /// The deadline passed before the variant finished.
    Cancelled,
    /// Not run: tier 1 already produced enough hits.
    Skipped,
}

impl VariantOutcome {
    /// Whether the variant ended in an error (cancellation included).
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Exhausted { .. } | Self::Rejected { .. } | Self::Cancelled
        )
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded { .. } => "succeeded",
            Self::Exhausted { .. } => "exhausted",
            Self::Rejected { .. } => "rejected",
            Self::Cancelled => "cancelled",
            Self::Skipped => "skipped",
        }
    }
}

/// A variant and its outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantReport {
    /// The variant as submitted.
    pub variant: QueryVariant,
    /// How it ended.
    pub outcome: VariantOutcome,
    /// Whether the variant got past admission and called the provider.
    pub dispatched: bool,
}

/// Outcomes for one batch, in submission order.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    /// One entry per submitted variant.
    pub reports: Vec<VariantReport>,
    /// Whether the deadline cut the batch short.
    pub deadline_exceeded: bool,
    /// Time spent in [`ParallelExecutor::execute`].
    pub elapsed: Duration,
}

impl ExecutionReport {
    /// Successful variants and their hits, in submission order.
    pub fn successes(&self) -> impl Iterator<Item = (&QueryVariant, &[RawHit])> {
        self.reports.iter().filter_map(|r| match &r.outcome {
            VariantOutcome::Succeeded { hits, .. } => Some((&r.variant, hits.as_slice())),
            _ => None,
        })
    }

    /// Variants that failed with a provider error, in submission order.
    pub fn provider_failures(&self) -> impl Iterator<Item = &QueryVariant> {
        self.reports.iter().filter_map(|r| match r.outcome {
            VariantOutcome::Exhausted { .. } | VariantOutcome::Rejected { .. } => Some(&r.variant),
            _ => None,
        })
    }

    /// Number of variants that succeeded.
    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    /// Number of variants that failed, cancellations included.
    pub fn failure_count(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_failure()).count()
    }

    /// Number of distinct tiers with at least one variant that reached the
    /// provider.
    pub fn tiers_dispatched(&self) -> usize {
        let mut tiers: Vec<u8> = self
            .reports
            .iter()
            .filter(|r| r.dispatched)
            .map(|r| r.variant.tier())
            .collect();
        tiers.sort_unstable();
        tiers.dedup();
        tiers.len()
    }
}

/// Retry and admission settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorSettings {
    /// Provider calls allowed in flight at once.
    pub max_concurrent: usize,
    /// Total attempts per variant.
    pub retry_attempts: u32,
    /// Attempt `n` is followed by a sleep of `n × backoff_unit`.
    pub backoff_unit: Duration,
    /// Tier-1 hits after which lower tiers are skipped. 0 disables.
    pub min_tier_results: usize,
}

impl From<&EngineConfig> for ExecutorSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent,
            retry_attempts: config.retry_attempts,
            backoff_unit: config.backoff_unit(),
            min_tier_results: config.min_tier_results,
        }
    }
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

/// Runs query variants against a provider.
///
/// The admission semaphore is shared by every batch this executor runs.
pub struct ParallelExecutor {
    provider: Arc<dyn SearchProvider>,
    semaphore: Arc<Semaphore>,
    settings: ExecutorSettings,
}

/// State shared by the tasks of one batch.
#[derive(Clone)]
struct BatchContext {
    provider: Arc<dyn SearchProvider>,
    semaphore: Arc<Semaphore>,
    settings: ExecutorSettings,
    options: ProviderOptions,
    cancel: CancellationToken,
    skip_lower_tiers: CancellationToken,
    tier_one_hits: Arc<AtomicUsize>,
}

impl ParallelExecutor {
    /// Create an executor over `provider`.
    pub fn new(provider: Arc<dyn SearchProvider>, settings: ExecutorSettings) -> Self {
        let semaphore = Arc::new(Semaphore::new(settings.max_concurrent.max(1)));
        Self {
            provider,
            semaphore,
            settings,
        }
    }

    /// The settings in force.
    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Run every variant and collect outcomes, returning no later than
    /// `deadline`.
    ///
    /// On deadline expiry outstanding tasks are cancelled and aborted, and
    /// their slots report [`VariantOutcome::Cancelled`].
    pub async fn execute(
        &self,
        variants: Vec<QueryVariant>,
        options: &ProviderOptions,
        deadline: Instant,
    ) -> ExecutionReport {
        let started = Instant::now();
        let ctx = BatchContext {
            provider: Arc::clone(&self.provider),
            semaphore: Arc::clone(&self.semaphore),
            settings: self.settings.clone(),
            options: options.clone(),
            cancel: CancellationToken::new(),
            skip_lower_tiers: CancellationToken::new(),
            tier_one_hits: Arc::new(AtomicUsize::new(0)),
        };

        let mut abort_handles = Vec::with_capacity(variants.len());
        let mut pending = FuturesUnordered::new();
        let dispatched: Vec<Arc<AtomicBool>> = variants
            .iter()
            .map(|_| Arc::new(AtomicBool::new(false)))
            .collect();
        for (slot, variant) in variants.iter().enumerate() {
            let handle = tokio::spawn(run_variant(
                ctx.clone(),
                variant.clone(),
                Arc::clone(&dispatched[slot]),
            ));
            abort_handles.push(handle.abort_handle());
            pending.push(async move { (slot, handle.await) });
        }

        let mut slots: Vec<Option<VariantOutcome>> = variants.iter().map(|_| None).collect();
        let mut deadline_exceeded = false;
        let expiry = tokio::time::sleep_until(deadline);
        tokio::pin!(expiry);

        loop {
            tokio::select! {
                next = pending.next() => match next {
                    Some((slot, Ok(outcome))) => slots[slot] = Some(outcome),
                    Some((slot, Err(e))) => {
                        tracing::warn!(error = %e, "variant task failed");
                        slots[slot] = Some(VariantOutcome::Rejected {
                            error: ProviderError::terminal(format!("variant task failed: {e}")),
                        });
                    }
                    None => break,
                },
                () = &mut expiry => {
                    deadline_exceeded = true;
                    ctx.cancel.cancel();
                    for handle in &abort_handles {
                        handle.abort();
                    }
                    break;
                }
            }
        }

        let reports: Vec<VariantReport> = variants
            .into_iter()
            .zip(slots)
            .zip(&dispatched)
            .map(|((variant, outcome), dispatched)| VariantReport {
                variant,
                outcome: outcome.unwrap_or(VariantOutcome::Cancelled),
                dispatched: dispatched.load(Ordering::SeqCst),
            })
            .collect();

        for report in &reports {
            tracing::debug!(
                tier = report.variant.tier(),
                intent = %report.variant.intent,
                outcome = report.outcome.label(),
                "variant finished"
            );
        }

        ExecutionReport {
            reports,
            deadline_exceeded,
            elapsed: started.elapsed(),
        }
    }
}

impl std::fmt::Debug for ParallelExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelExecutor")
            .field("provider", &self.provider.name())
            .field("settings", &self.settings)
            .finish()
    }
}

async fn run_variant(
    ctx: BatchContext,
    variant: QueryVariant,
    dispatched: Arc<AtomicBool>,
) -> VariantOutcome {
    let _permit = tokio::select! {
        biased;
        () = ctx.cancel.cancelled() => return VariantOutcome::Cancelled,
        permit = Arc::clone(&ctx.semaphore).acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return VariantOutcome::Cancelled,
        },
    };

    if variant.tier() > 1 && ctx.skip_lower_tiers.is_cancelled() {
        return VariantOutcome::Skipped;
    }
    dispatched.store(true, Ordering::SeqCst);

    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        tracing::trace!(variant = %variant.text, attempt, "provider call");

        let result = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => return VariantOutcome::Cancelled,
            result = ctx.provider.search(&variant.text, &ctx.options) => result,
        };

        match result {
            Ok(hits) => {
                if variant.tier() == 1 {
                    record_tier_one_hits(&ctx, hits.len());
                }
                return VariantOutcome::Succeeded {
                    hits,
                    attempts: attempt,
                };
            }
            Err(error) if !error.is_transient() => {
                tracing::debug!(attempt, error = %error, "terminal provider error");
                return VariantOutcome::Rejected { error };
            }
            Err(last_error) if attempt >= ctx.settings.retry_attempts => {
                tracing::debug!(attempt, error = %last_error, "retries exhausted");
                return VariantOutcome::Exhausted {
                    attempts: attempt,
                    last_error,
                };
            }
            Err(error) => {
                let backoff = ctx.settings.backoff_unit * attempt;
                tracing::debug!(attempt, backoff_ms = backoff.as_millis() as u64, error = %error, "retrying");
                tokio::select! {
                    biased;
                    () = ctx.cancel.cancelled() => return VariantOutcome::Cancelled,
                    () = tokio::time::sleep(backoff) => {}
                }
            }
        }
    }
}

/// Count tier-1 hits and, once enough arrived, close admission to lower
/// tiers. Runs while the caller still holds its permit, so any variant
/// admitted afterwards sees the flag.
fn record_tier_one_hits(ctx: &BatchContext, count: usize) {
    let threshold = ctx.settings.min_tier_results;
    if threshold == 0 {
        return;
    }
    let total = ctx.tier_one_hits.fetch_add(count, Ordering::SeqCst) + count;
    if total >= threshold && !ctx.skip_lower_tiers.is_cancelled() {
        tracing::debug!(total, threshold, "tier 1 satisfied, skipping lower tiers");
        ctx.skip_lower_tiers.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Intent;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Plays back a per-query script of responses, then repeats the last.
    struct ScriptedProvider {
        scripts: Mutex<HashMap<String, Vec<Result<Vec<RawHit>, ProviderError>>>>,
        calls: Mutex<HashMap<String, u32>>,
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(delay: Duration) -> Self {
            Self {
                scripts: Mutex::new(HashMap::new()),
                calls: Mutex::new(HashMap::new()),
                delay,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        fn script(self, query: &str, steps: Vec<Result<Vec<RawHit>, ProviderError>>) -> Self {
            self.scripts
                .lock()
                .expect("lock")
                .insert(query.to_string(), steps);
            self
        }

        fn calls(&self, query: &str) -> u32 {
            self.calls
                .lock()
                .expect("lock")
                .get(query)
                .copied()
                .unwrap_or(0)
        }
    }

    #[async_trait]
    impl SearchProvider for ScriptedProvider {
        async fn search(
            &self,
            query: &str,
            _options: &ProviderOptions,
        ) -> Result<Vec<RawHit>, ProviderError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            let call = {
                let mut calls = self.calls.lock().expect("lock");
                let n = calls.entry(query.to_string()).or_insert(0);
                *n += 1;
                *n as usize
            };
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let scripts = self.scripts.lock().expect("lock");
            match scripts.get(query) {
                Some(steps) if !steps.is_empty() => steps[(call - 1).min(steps.len() - 1)].clone(),
                _ => Ok(hits(query, 1)),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn hits(prefix: &str, n: usize) -> Vec<RawHit> {
        (0..n)
            .map(|i| RawHit {
                title: format!("{prefix} {i}"),
                snippet: String::new(),
                link: format!("https://{}.example/{i}", prefix.replace(' ', "-")),
                published: None,
            })
            .collect()
    }

    fn settings(max_concurrent: usize, min_tier_results: usize) -> ExecutorSettings {
        ExecutorSettings {
            max_concurrent,
            retry_attempts: 3,
            backoff_unit: Duration::from_secs(1),
            min_tier_results,
        }
    }

    fn variant(text: &str, intent: Intent) -> QueryVariant {
        QueryVariant::new(text, intent)
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(3600)
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_never_exceeds_limit() {
        let provider = Arc::new(ScriptedProvider::new(Duration::from_millis(100)));
        let executor = ParallelExecutor::new(provider.clone(), settings(3, 0));
        let variants: Vec<_> = (0..9)
            .map(|i| variant(&format!("q{i}"), Intent::Direct))
            .collect();

        let report = executor
            .execute(variants, &ProviderOptions::default(), far_deadline())
            .await;

        assert_eq!(report.success_count(), 9);
        assert!(provider.max_in_flight.load(Ordering::SeqCst) <= 3);
        assert!(provider.max_in_flight.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reports_follow_submission_order() {
        let provider = Arc::new(ScriptedProvider::new(Duration::from_millis(10)));
        let executor = ParallelExecutor::new(provider, settings(3, 0));
        let texts = ["alpha", "beta", "gamma", "delta"];
        let variants: Vec<_> = texts.iter().map(|t| variant(t, Intent::Direct)).collect();

        let report = executor
            .execute(variants, &ProviderOptions::default(), far_deadline())
            .await;
        let order: Vec<&str> = report
            .reports
            .iter()
            .map(|r| r.variant.text.as_str())
            .collect();
        assert_eq!(order, texts);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried_with_linear_backoff() {
        let provider = Arc::new(
            ScriptedProvider::new(Duration::ZERO).script(
                "flaky",
                vec![
                    Err(ProviderError::transient("HTTP 503")),
                    Err(ProviderError::transient("HTTP 503")),
                    Ok(hits("flaky", 2)),
                ],
            ),
        );
        let executor = ParallelExecutor::new(provider.clone(), settings(3, 0));
        let started = Instant::now();

        let report = executor
            .execute(
                vec![variant("flaky", Intent::Direct)],
                &ProviderOptions::default(),
                far_deadline(),
            )
            .await;

        assert!(matches!(
            report.reports[0].outcome,
            VariantOutcome::Succeeded { attempts: 3, .. }
        ));
        assert_eq!(provider.calls("flaky"), 3);
        // 1 unit after the first failure, 2 after the second.
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_errors_are_not_retried() {
        let provider = Arc::new(
            ScriptedProvider::new(Duration::ZERO)
                .script("bad", vec![Err(ProviderError::terminal("HTTP 400"))]),
        );
        let executor = ParallelExecutor::new(provider.clone(), settings(3, 0));

        let report = executor
            .execute(
                vec![variant("bad", Intent::Direct)],
                &ProviderOptions::default(),
                far_deadline(),
            )
            .await;

        assert!(matches!(
            report.reports[0].outcome,
            VariantOutcome::Rejected { .. }
        ));
        assert_eq!(provider.calls("bad"), 1);
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.provider_failures().count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_transient_errors_exhaust_attempts() {
        let provider = Arc::new(
            ScriptedProvider::new(Duration::ZERO)
                .script("down", vec![Err(ProviderError::transient("timeout"))]),
        );
        let executor = ParallelExecutor::new(provider.clone(), settings(3, 0));

        let report = executor
            .execute(
                vec![variant("down", Intent::Direct)],
                &ProviderOptions::default(),
                far_deadline(),
            )
            .await;

        match &report.reports[0].outcome {
            VariantOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                assert_eq!(*attempts, 3);
                assert!(last_error.is_transient());
            }
            other => panic!("expected exhausted, got {other:?}"),
        }
        assert_eq!(provider.calls("down"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cancels_slow_variants() {
        let provider = Arc::new(ScriptedProvider::new(Duration::from_secs(5)));
        let executor = ParallelExecutor::new(provider, settings(3, 0));
        let started = Instant::now();

        let report = executor
            .execute(
                vec![
                    variant("slow a", Intent::Direct),
                    variant("slow b", Intent::Direct),
                ],
                &ProviderOptions::default(),
                Instant::now() + Duration::from_secs(1),
            )
            .await;

        assert!(report.deadline_exceeded);
        assert!(report
            .reports
            .iter()
            .all(|r| r.outcome == VariantOutcome::Cancelled));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn variants_cut_off_before_admission_are_not_dispatched() {
        let provider = Arc::new(ScriptedProvider::new(Duration::from_secs(5)));
        let executor = ParallelExecutor::new(provider.clone(), settings(1, 0));

        let report = executor
            .execute(
                vec![
                    variant("slow direct", Intent::Direct),
                    variant("queued expert", Intent::Conceptual),
                    variant("queued related", Intent::Operational),
                ],
                &ProviderOptions::default(),
                Instant::now() + Duration::from_secs(1),
            )
            .await;

        assert!(report
            .reports
            .iter()
            .all(|r| r.outcome == VariantOutcome::Cancelled));
        assert!(report.reports[0].dispatched);
        assert!(!report.reports[1].dispatched);
        assert!(!report.reports[2].dispatched);
        assert_eq!(provider.calls("queued expert"), 0);
        assert_eq!(report.tiers_dispatched(), 1);
        assert_eq!(report.failure_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_interrupts_backoff() {
        let provider = Arc::new(
            ScriptedProvider::new(Duration::ZERO)
                .script("flaky", vec![Err(ProviderError::transient("HTTP 503"))]),
        );
        let executor = ParallelExecutor::new(provider.clone(), settings(3, 0));

        let report = executor
            .execute(
                vec![variant("flaky", Intent::Direct)],
                &ProviderOptions::default(),
                Instant::now() + Duration::from_millis(1500),
            )
            .await;

        assert_eq!(report.reports[0].outcome, VariantOutcome::Cancelled);
        assert_eq!(provider.calls("flaky"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn enough_tier_one_hits_skip_lower_tiers() {
        let provider = Arc::new(
            ScriptedProvider::new(Duration::from_millis(50)).script("direct", vec![Ok(hits("direct", 10))]),
        );
        let executor = ParallelExecutor::new(provider.clone(), settings(1, 8));

        let report = executor
            .execute(
                vec![
                    variant("direct", Intent::Direct),
                    variant("expert", Intent::Conceptual),
                    variant("related", Intent::Operational),
                ],
                &ProviderOptions::default(),
                far_deadline(),
            )
            .await;

        assert!(matches!(
            report.reports[0].outcome,
            VariantOutcome::Succeeded { .. }
        ));
        assert_eq!(report.reports[1].outcome, VariantOutcome::Skipped);
        assert_eq!(report.reports[2].outcome, VariantOutcome::Skipped);
        assert_eq!(provider.calls("expert"), 0);
        assert_eq!(report.tiers_dispatched(), 1);
        assert_eq!(report.failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn short_circuit_disabled_runs_every_tier() {
        let provider = Arc::new(
            ScriptedProvider::new(Duration::from_millis(50)).script("direct", vec![Ok(hits("direct", 10))]),
        );
        let executor = ParallelExecutor::new(provider, settings(1, 0));

        let report = executor
            .execute(
                vec![
                    variant("direct", Intent::Direct),
                    variant("expert", Intent::Conceptual),
                    variant("related", Intent::Operational),
                ],
                &ProviderOptions::default(),
                far_deadline(),
            )
            .await;

        assert_eq!(report.success_count(), 3);
        assert_eq!(report.tiers_dispatched(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_batch_returns_immediately() {
        let provider = Arc::new(ScriptedProvider::new(Duration::ZERO));
        let executor = ParallelExecutor::new(provider, ExecutorSettings::default());
        let report = executor
            .execute(Vec::new(), &ProviderOptions::default(), far_deadline())
            .await;
        assert!(report.reports.is_empty());
        assert!(!report.deadline_exceeded);
        assert_eq!(report.tiers_dispatched(), 0);
    }

    #[test]
    fn settings_follow_engine_config() {
        let config = EngineConfig {
            max_concurrent: 5,
            backoff_unit_ms: 250,
            ..EngineConfig::default()
        };
        let settings = ExecutorSettings::from(&config);
        assert_eq!(settings.max_concurrent, 5);
        assert_eq!(settings.backoff_unit, Duration::from_millis(250));
        assert_eq!(settings.retry_attempts, 3);
    }
}
