//! Bond counting and objective evaluation, the innermost loop of the search.
//!
//! Both functions here run once per visited configuration and must not
//! allocate. Species pairs are addressed upper-triangularly: the smaller
//! packed index always comes first, and the reindex table maps the
//! `(si, sj)` cell to its slot in the flat per-shell parameter block.

use crate::core::reduction::{reduced_parameter_count, REINDEX_UNUSED};
use serde::{Deserialize, Serialize};

/// One ordered site pair of the flattened neighbor list, tagged with the
/// index of its coordination shell within the active-shell set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitePair {
    pub i: usize,
    pub j: usize,
    pub shell: usize,
}

/// Accumulates the per-shell bond histogram of `configuration` into `bonds`
/// (length `K * S*(S+1)/2`). With `clear` the buffer is zeroed first;
/// without it, counts accumulate on top of the existing contents.
pub fn count_pairs(
    configuration: &[u8],
    pair_list: &[SitePair],
    bonds: &mut [f64],
    reindex: &[usize],
    num_species: usize,
    clear: bool,
) {
    let num_params = reduced_parameter_count(num_species);
    if clear {
        bonds.fill(0.0);
    }
    for pair in pair_list {
        let mut si = configuration[pair.i] as usize;
        let mut sj = configuration[pair.j] as usize;
        if si > sj {
            std::mem::swap(&mut si, &mut sj);
        }
        let flat_index = reindex[si * num_species + sj];
        debug_assert_ne!(flat_index, REINDEX_UNUSED);
        bonds[pair.shell * num_params + flat_index] += 1.0;
    }
}

/// Transforms the bond counts into short-range-order parameters in place,
/// `b <- w * (1 - b * p)`, and returns the total absolute deviation from the
/// target parameters. The transformed `bonds` buffer is the SRO snapshot of
/// the configuration; the returned scalar is what the search minimizes.
pub fn pair_objective(
    bonds: &mut [f64],
    prefactors: &[f64],
    parameter_weights: &[f64],
    target_objectives: &[f64],
) -> f64 {
    let mut total = 0.0;
    for (index, bond) in bonds.iter_mut().enumerate() {
        *bond = parameter_weights[index] * (1.0 - *bond * prefactors[index]);
        total += (*bond - target_objectives[index]).abs();
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reduction::make_reindex_table;

    /// All six unordered site pairs of a 4-site cell, in one shell.
    fn complete_pair_list() -> Vec<SitePair> {
        let mut pairs = Vec::new();
        for i in 0..4 {
            for j in (i + 1)..4 {
                pairs.push(SitePair { i, j, shell: 0 });
            }
        }
        pairs
    }

    #[test]
    fn count_pairs_builds_the_bond_histogram() {
        let reindex = make_reindex_table(2);
        let mut bonds = vec![0.0; 3];
        count_pairs(&[0, 1, 0, 1], &complete_pair_list(), &mut bonds, &reindex, 2, true);
        // one 0-0 bond, four 0-1 bonds, one 1-1 bond
        assert_eq!(bonds, vec![1.0, 4.0, 1.0]);
    }

    #[test]
    fn count_pairs_accumulates_unless_cleared() {
        let reindex = make_reindex_table(2);
        let mut bonds = vec![0.0; 3];
        let pair_list = complete_pair_list();
        count_pairs(&[0, 1, 0, 1], &pair_list, &mut bonds, &reindex, 2, true);
        count_pairs(&[0, 1, 0, 1], &pair_list, &mut bonds, &reindex, 2, false);
        assert_eq!(bonds, vec![2.0, 8.0, 2.0]);

        count_pairs(&[0, 1, 0, 1], &pair_list, &mut bonds, &reindex, 2, true);
        assert_eq!(bonds, vec![1.0, 4.0, 1.0]);
    }

    #[test]
    fn count_pairs_is_invariant_under_pair_list_order() {
        let reindex = make_reindex_table(2);
        let pair_list = complete_pair_list();
        let mut reversed = pair_list.clone();
        reversed.reverse();

        let mut bonds_forward = vec![0.0; 3];
        let mut bonds_reversed = vec![0.0; 3];
        count_pairs(&[1, 0, 0, 1], &pair_list, &mut bonds_forward, &reindex, 2, true);
        count_pairs(&[1, 0, 0, 1], &reversed, &mut bonds_reversed, &reindex, 2, true);
        assert_eq!(bonds_forward, bonds_reversed);
    }

    #[test]
    fn count_pairs_orders_each_species_pair_canonically() {
        let reindex = make_reindex_table(2);
        let mut bonds = vec![0.0; 3];
        // both orientations of the same unlike pair land in the same cell
        let pair_list = [SitePair { i: 0, j: 1, shell: 0 }, SitePair { i: 1, j: 0, shell: 0 }];
        count_pairs(&[1, 0], &pair_list, &mut bonds, &reindex, 2, true);
        assert_eq!(bonds, vec![0.0, 2.0, 0.0]);
    }

    #[test]
    fn count_pairs_separates_shells() {
        let reindex = make_reindex_table(2);
        let mut bonds = vec![0.0; 6];
        let pair_list = [SitePair { i: 0, j: 1, shell: 0 }, SitePair { i: 0, j: 1, shell: 1 }];
        count_pairs(&[0, 1], &pair_list, &mut bonds, &reindex, 2, true);
        assert_eq!(bonds, vec![0.0, 1.0, 0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn pair_objective_transforms_bonds_and_sums_deviations() {
        let mut bonds = vec![1.0, 4.0, 1.0];
        let prefactors = vec![1.0 / 6.0; 3];
        let weights = vec![1.0; 3];
        let targets = vec![0.0; 3];
        let objective = pair_objective(&mut bonds, &prefactors, &weights, &targets);

        assert!((bonds[0] - 5.0 / 6.0).abs() < 1e-12);
        assert!((bonds[1] - 1.0 / 3.0).abs() < 1e-12);
        assert!((bonds[2] - 5.0 / 6.0).abs() < 1e-12);
        assert!((objective - 2.0).abs() < 1e-12);
    }

    #[test]
    fn pair_objective_applies_parameter_weights() {
        let mut bonds = vec![2.0, 2.0];
        let prefactors = vec![0.5, 0.5];
        let weights = vec![3.0, 0.0];
        let targets = vec![0.0, 0.0];
        // b = w * (1 - 2 * 0.5) = 0 in both cells, but only through the weight
        let objective = pair_objective(&mut bonds, &prefactors, &weights, &targets);
        assert_eq!(bonds, vec![0.0, 0.0]);
        assert_eq!(objective, 0.0);
    }

    #[test]
    fn pair_counting_is_deterministic() {
        let reindex = make_reindex_table(3);
        let configuration = [0u8, 2, 1, 1, 0, 2];
        let pair_list: Vec<SitePair> = (0..6)
            .flat_map(|i| ((i + 1)..6).map(move |j| SitePair { i, j, shell: (i + j) % 2 }))
            .collect();

        let mut first = vec![0.0; 12];
        let mut second = vec![0.0; 12];
        count_pairs(&configuration, &pair_list, &mut first, &reindex, 3, true);
        count_pairs(&configuration, &pair_list, &mut second, &reindex, 3, true);
        assert_eq!(first, second);
    }
}
