use super::collection::{ResultCollection, SqsResult};
use super::config::{IterationMode, IterationSettings};
use super::progress::{Progress, ProgressReporter};
use crate::core::kernel::{count_pairs, pair_objective, SitePair};
use crate::core::rank::{
    configuration_histogram, next_permutation, rank_permutation, total_permutations,
    unrank_permutation,
};
use crate::core::reduction::{
    expand_matrix, make_reindex_table, reduce_weight_matrices, reduced_parameter_count,
    ReducedTensors,
};
use num_bigint::BigUint;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Wall-clock statistics of one search worker.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub thread_id: usize,
    pub duration: Duration,
    pub iterations: u64,
}

/// Everything a finished search returns: the surviving candidates and the
/// per-worker timings.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub results: Vec<SqsResult>,
    pub timings: Vec<WorkerReport>,
}

/// Shared read-only state of one driver invocation, borrowed by every
/// worker.
struct SearchContext<'a> {
    settings: &'a IterationSettings,
    pair_list: &'a [SitePair],
    histogram: &'a [usize],
    total_permutations: &'a BigUint,
    reindex: &'a [usize],
    reduced: &'a ReducedTensors,
    reduced_size: usize,
    collection: &'a ResultCollection,
    reporter: &'a ProgressReporter<'a>,
}

/// Splits the iteration space `[0, total)` into one contiguous slice per
/// worker. The last worker absorbs the division remainder. In systematic
/// mode both endpoints are shifted by one: the permutation sequence is
/// addressed 1-based there, and each worker advances before it evaluates.
pub(crate) fn compute_ranks(
    total: &BigUint,
    num_threads: usize,
    mode: IterationMode,
) -> Vec<(BigUint, BigUint)> {
    let chunk = total / num_threads;
    (0..num_threads)
        .map(|thread_id| {
            let mut start = &chunk * thread_id;
            let mut end = &start + &chunk;
            if mode == IterationMode::Systematic {
                start += 1u32;
                end += 1u32;
            }
            if thread_id == num_threads - 1 {
                end = total.clone();
            }
            (start, end)
        })
        .collect()
}

/// Runs the full pair search described by `settings` and returns the
/// drained, deduplicated results together with per-worker timings.
#[instrument(skip_all, name = "pair_iterations")]
pub(crate) fn run_pair_iterations(
    settings: &IterationSettings,
    reporter: &ProgressReporter,
) -> SearchOutcome {
    let num_species = settings.num_species();
    let num_shells = settings.num_shells();
    let histogram = configuration_histogram(settings.packed_configuration(), num_species);
    let num_permutations = total_permutations(&histogram);
    let reindex = make_reindex_table(num_species);
    let (_, shell_weights) = settings.shell_indices_and_weights();
    let reduced = reduce_weight_matrices(
        shell_weights,
        settings.parameter_prefactors(),
        settings.parameter_weights(),
        settings.target_objective(),
        &reindex,
        num_species,
    );
    let reduced_size = num_shells * reduced_parameter_count(num_species);
    let collection = ResultCollection::new(settings.num_output_configurations());

    let total = match settings.mode() {
        IterationMode::Random => BigUint::from(settings.num_iterations()),
        IterationMode::Systematic => num_permutations.clone(),
    };
    let num_threads = current_num_threads();
    // all slices are fixed before any worker starts, so no worker can read
    // a partition that is still being written
    let ranges = compute_ranks(&total, num_threads, settings.mode());
    debug!(%total, num_threads, "partitioned iteration space");

    let context = SearchContext {
        settings,
        pair_list: settings.pair_list(),
        histogram: &histogram,
        total_permutations: &num_permutations,
        reindex: &reindex,
        reduced: &reduced,
        reduced_size,
        collection: &collection,
        reporter,
    };

    reporter.report(Progress::TaskStart {
        total: num_threads as u64,
    });

    #[cfg(feature = "parallel")]
    let timings: Vec<WorkerReport> = ranges
        .into_par_iter()
        .with_max_len(1)
        .enumerate()
        .map(|(thread_id, (start, end))| {
            let report = run_worker(&context, thread_id, start, end);
            reporter.report(Progress::TaskIncrement { amount: 1 });
            report
        })
        .collect();

    #[cfg(not(feature = "parallel"))]
    let timings: Vec<WorkerReport> = ranges
        .into_iter()
        .enumerate()
        .map(|(thread_id, (start, end))| {
            let report = run_worker(&context, thread_id, start, end);
            reporter.report(Progress::TaskIncrement { amount: 1 });
            report
        })
        .collect();

    reporter.report(Progress::TaskFinish);

    let results = drain_results(settings, &collection, &reindex);
    SearchOutcome { results, timings }
}

fn run_worker(
    context: &SearchContext,
    thread_id: usize,
    start: BigUint,
    end: BigUint,
) -> WorkerReport {
    let settings = context.settings;
    let num_species = settings.num_species();
    let mut configuration = settings.packed_configuration().to_vec();
    let mut parameters = vec![0.0; context.reduced_size];
    let mut best_local = context.collection.best_objective();

    let mut rng = match settings.mode() {
        IterationMode::Random => Some(StdRng::seed_from_u64(worker_seed(thread_id))),
        IterationMode::Systematic => {
            // the slice endpoints are 1-based here; rewind one step because
            // the loop advances before it evaluates
            let origin = &start - 1u32;
            unrank_permutation(
                &origin,
                context.histogram,
                context.total_permutations,
                &mut configuration,
            );
            None
        }
    };

    let started = Instant::now();
    let mut iterations = 0u64;
    let mut cursor = start;
    while cursor < end {
        match rng.as_mut() {
            Some(rng) => configuration.shuffle(rng),
            None => {
                next_permutation(&mut configuration);
            }
        }

        count_pairs(
            &configuration,
            context.pair_list,
            &mut parameters,
            context.reindex,
            num_species,
            true,
        );
        let objective = pair_objective(
            &mut parameters,
            &context.reduced.prefactors,
            &context.reduced.parameter_weights,
            &context.reduced.target_objectives,
        );

        if objective <= best_local {
            // double check against the shared watermark; a stale read only
            // admits an extra candidate that the drain filters again
            best_local = context.collection.best_objective();
            if objective <= best_local {
                context.collection.push(SqsResult {
                    objective,
                    rank: None,
                    configuration: configuration.clone(),
                    parameters: parameters.clone(),
                });
                context.collection.update_best_objective(objective);
                best_local = objective;
                context.reporter.report(Progress::StatusUpdate {
                    text: format!("best objective {objective:.6}"),
                });
            }
        }

        cursor += 1u32;
        iterations += 1;
    }

    WorkerReport {
        thread_id,
        duration: started.elapsed(),
        iterations,
    }
}

/// Attaches ranks, expands the parameter snapshots, and maps configurations
/// back to external species identifiers. Random-mode duplicates (the same
/// configuration drawn twice) are suppressed, first seen wins; systematic
/// slices are disjoint by construction, so every entry is kept there.
fn drain_results(
    settings: &IterationSettings,
    collection: &ResultCollection,
    reindex: &[usize],
) -> Vec<SqsResult> {
    let num_species = settings.num_species();
    let num_shells = settings.num_shells();
    let mut seen_ranks: HashSet<BigUint> = HashSet::new();

    let drained = collection.drain();
    let discovered = drained.len();
    let mut results = Vec::with_capacity(discovered);
    for mut result in drained {
        let rank = rank_permutation(&result.configuration, num_species);
        if settings.mode() == IterationMode::Random && !seen_ranks.insert(rank.clone()) {
            continue;
        }
        result.rank = Some(rank);
        result.parameters = expand_matrix(&result.parameters, num_species, num_shells, reindex);
        result.configuration = settings.unpack_configuration(&result.configuration);
        results.push(result);
    }
    debug!(discovered, kept = results.len(), "drained result buffer");
    results
}

/// Seeds a worker generator from a coarse wall-clock reading combined with
/// the worker index, giving the streams distinct states without requiring
/// reproducibility across runs.
fn worker_seed(thread_id: usize) -> u64 {
    let epoch_seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    epoch_seconds.wrapping_mul(thread_id as u64 + 1)
}

#[cfg(feature = "parallel")]
fn current_num_threads() -> usize {
    rayon::current_num_threads()
}

#[cfg(not(feature = "parallel"))]
fn current_num_threads() -> usize {
    1
}
