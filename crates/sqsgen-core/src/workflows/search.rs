use crate::engine::config::IterationSettings;
use crate::engine::driver;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::SearchOutcome;
use tracing::{debug, info, instrument};

/// Runs the pair SQS search described by `settings`.
///
/// The settings were validated at construction and the iteration loop is a
/// total function over them, so the search itself cannot fail; the returned
/// [`SearchOutcome`] carries the surviving candidates (ranked, expanded and
/// unpacked) and the per-worker timings.
#[instrument(skip_all, name = "sqs_search")]
pub fn run(settings: &IterationSettings, reporter: &ProgressReporter) -> SearchOutcome {
    let (shells, shell_weights) = settings.shell_indices_and_weights();
    info!(
        num_atoms = settings.num_atoms(),
        num_species = settings.num_species(),
        num_shells = settings.num_shells(),
        mode = ?settings.mode(),
        "starting pair SQS search"
    );
    for (shell, weight) in shells.iter().zip(shell_weights) {
        info!(shell, weight, "active shell");
    }

    reporter.report(Progress::PhaseStart { name: "Pair Search" });
    let outcome = driver::run_pair_iterations(settings, reporter);

    for report in &outcome.timings {
        let per_cycle = if report.iterations > 0 {
            report.duration.as_micros() as f64 / report.iterations as f64
        } else {
            0.0
        };
        debug!(
            thread_id = report.thread_id,
            loops = report.iterations,
            microseconds_per_cycle = per_cycle,
            "worker finished"
        );
    }
    info!(num_results = outcome.results.len(), "search complete");
    reporter.report(Progress::PhaseFinish);

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kernel::SitePair;
    use crate::engine::config::{IterationMode, ParameterTensors, SearchBudget};
    use num_bigint::BigUint;
    use std::collections::HashSet;

    /// Four sites on a ring of nearest-neighbor bonds, two cobalt and two
    /// nickel atoms. The targets reward a fully alternating decoration: the
    /// objective is 0 exactly for the configurations with four unlike bonds
    /// and 2.5 for every other arrangement of the composition.
    fn ring_settings(budget: SearchBudget) -> IterationSettings {
        let pair_list = vec![
            SitePair { i: 0, j: 1, shell: 0 },
            SitePair { i: 1, j: 2, shell: 0 },
            SitePair { i: 2, j: 3, shell: 0 },
            SitePair { i: 3, j: 0, shell: 0 },
        ];
        let tensors = ParameterTensors {
            prefactors: vec![vec![vec![1.0, 0.25], vec![0.25, 1.0]]],
            parameter_weights: vec![vec![1.0; 2]; 2],
            target_objective: vec![vec![vec![1.0, 0.0], vec![0.0, 1.0]]],
        };
        IterationSettings::new(
            vec![27, 28, 27, 28],
            pair_list,
            vec![1],
            vec![1.0],
            tensors,
            budget,
        )
        .unwrap()
    }

    fn systematic_budget(num_output_configurations: usize) -> SearchBudget {
        SearchBudget {
            num_iterations: 0,
            num_output_configurations,
            mode: IterationMode::Systematic,
        }
    }

    fn minimal_ranks(outcome: &SearchOutcome) -> HashSet<BigUint> {
        let best = outcome
            .results
            .iter()
            .map(|r| r.objective)
            .fold(f64::INFINITY, f64::min);
        outcome
            .results
            .iter()
            .filter(|r| r.objective == best)
            .map(|r| r.rank.clone().unwrap())
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn run_with_threads(settings: &IterationSettings, num_threads: usize) -> SearchOutcome {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .unwrap()
            .install(|| run(settings, &ProgressReporter::new()))
    }

    #[cfg(not(feature = "parallel"))]
    fn run_with_threads(settings: &IterationSettings, _num_threads: usize) -> SearchOutcome {
        run(settings, &ProgressReporter::new())
    }

    #[test]
    fn systematic_search_finds_the_alternating_ground_states() {
        let settings = ring_settings(systematic_budget(16));
        let outcome = run_with_threads(&settings, 1);

        let best = outcome
            .results
            .iter()
            .map(|r| r.objective)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(best, 0.0);

        // ranks 1 and 4 are the two alternating decorations of the ring
        let expected: HashSet<BigUint> = [BigUint::from(1u8), BigUint::from(4u8)].into();
        assert_eq!(minimal_ranks(&outcome), expected);

        let ground_states: HashSet<Vec<u8>> = outcome
            .results
            .iter()
            .filter(|r| r.objective == 0.0)
            .map(|r| r.configuration.clone())
            .collect();
        let expected_states: HashSet<Vec<u8>> =
            [vec![27, 28, 27, 28], vec![28, 27, 28, 27]].into();
        assert_eq!(ground_states, expected_states);
    }

    #[test]
    fn systematic_search_reports_one_timing_per_worker() {
        let settings = ring_settings(systematic_budget(16));
        let outcome = run_with_threads(&settings, 1);
        assert_eq!(outcome.timings.len(), 1);
        // six permutations of the composition, addressed 1-based with an
        // advance before every evaluation
        assert_eq!(outcome.timings[0].iterations, 5);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_systematic_search_discovers_the_serial_ground_states() {
        let settings = ring_settings(systematic_budget(16));
        let serial = run_with_threads(&settings, 1);
        let parallel = run_with_threads(&settings, 4);

        let serial_best = serial.results.iter().map(|r| r.objective).fold(f64::INFINITY, f64::min);
        let parallel_best =
            parallel.results.iter().map(|r| r.objective).fold(f64::INFINITY, f64::min);
        assert_eq!(serial_best, parallel_best);
        assert_eq!(minimal_ranks(&serial), minimal_ranks(&parallel));

        assert_eq!(parallel.timings.len(), 4);
        let total: u64 = parallel.timings.iter().map(|t| t.iterations).sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn random_search_results_have_pairwise_distinct_ranks() {
        let settings = ring_settings(SearchBudget {
            num_iterations: 10_000,
            num_output_configurations: 10,
            mode: IterationMode::Random,
        });
        let outcome = run(&settings, &ProgressReporter::new());

        assert!(!outcome.results.is_empty());
        let ranks: Vec<BigUint> = outcome
            .results
            .iter()
            .map(|r| r.rank.clone().unwrap())
            .collect();
        let distinct: HashSet<BigUint> = ranks.iter().cloned().collect();
        assert_eq!(distinct.len(), ranks.len());
        for rank in &ranks {
            assert!(rank < &BigUint::from(6u8));
        }

        let total: u64 = outcome.timings.iter().map(|t| t.iterations).sum();
        assert_eq!(total, 10_000);
    }

    #[test]
    fn every_result_carries_expanded_parameters() {
        let settings = ring_settings(systematic_budget(16));
        let outcome = run_with_threads(&settings, 1);
        for result in &outcome.results {
            // K * S * S with K = 1, S = 2
            assert_eq!(result.parameters.len(), 4);
            assert!(result.rank.is_some());
            assert_eq!(result.configuration.len(), 4);
            // expanded parameters stay mirrored across the diagonal
            assert_eq!(result.parameters[1], result.parameters[2]);
        }
    }
}
