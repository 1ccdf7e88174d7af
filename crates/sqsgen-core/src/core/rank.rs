//! Lexicographic ranking and unranking of multiset permutations.
//!
//! A configuration is an ordered sequence of packed species indices. All
//! permutations of its multiset are ordered lexicographically; the *rank* of
//! a configuration is its 0-based position in that order. Ranks routinely
//! exceed 64-bit range (a 64-site cell already has more than `10^17`
//! arrangements), so all bookkeeping is done with [`BigUint`].

use num_bigint::BigUint;
use num_traits::{One, Zero};

/// Counts the occurrences of each packed species index.
pub fn configuration_histogram(configuration: &[u8], num_species: usize) -> Vec<usize> {
    let mut histogram = vec![0usize; num_species];
    for &species in configuration {
        histogram[species as usize] += 1;
    }
    histogram
}

pub fn factorial(n: usize) -> BigUint {
    (1..=n).fold(BigUint::one(), |acc, k| acc * k)
}

/// Number of distinct permutations of the multiset described by `histogram`,
/// `N! / prod(h[s]!)`. Returns 1 for empty and single-species multisets.
pub fn total_permutations(histogram: &[usize]) -> BigUint {
    let num_atoms: usize = histogram.iter().sum();
    let mut total = factorial(num_atoms);
    for &count in histogram {
        total /= factorial(count);
    }
    total
}

/// Lehmer-style rank of `configuration` within the lexicographic order of
/// its multiset permutations. The smallest (sorted ascending) permutation
/// has rank 0.
///
/// The scan keeps the permutation count of the remaining suffix up to date
/// incrementally; every division is exact.
pub fn rank_permutation(configuration: &[u8], num_species: usize) -> BigUint {
    let num_atoms = configuration.len();
    let mut histogram = configuration_histogram(configuration, num_species);
    let mut remaining = total_permutations(&histogram);
    let mut rank = BigUint::zero();

    for (position, &species) in configuration.iter().enumerate() {
        let length = num_atoms - position;
        let species = species as usize;
        for lower in 0..species {
            if histogram[lower] > 0 {
                // permutations of the remaining multiset that start with `lower`
                rank += &remaining * histogram[lower] / length;
            }
        }
        remaining = remaining * histogram[species] / length;
        histogram[species] -= 1;
    }
    rank
}

/// Inverse of [`rank_permutation`]: writes the permutation of `histogram`
/// with the given 0-based `rank` into `configuration`.
///
/// Panics if `rank >= total_permutations` or if `histogram` does not match
/// the configuration length; both indicate a caller bug, not a recoverable
/// condition.
pub fn unrank_permutation(
    rank: &BigUint,
    histogram: &[usize],
    total_permutations: &BigUint,
    configuration: &mut [u8],
) {
    assert!(
        rank < total_permutations,
        "rank {rank} is out of range for a multiset with {total_permutations} permutations"
    );
    debug_assert_eq!(histogram.iter().sum::<usize>(), configuration.len());

    let num_atoms = configuration.len();
    let mut histogram = histogram.to_vec();
    let mut remaining = total_permutations.clone();
    let mut rank = rank.clone();

    for position in 0..num_atoms {
        let length = num_atoms - position;
        let mut placed = false;
        for species in 0..histogram.len() {
            if histogram[species] == 0 {
                continue;
            }
            let block = &remaining * histogram[species] / length;
            if rank < block {
                configuration[position] = species as u8;
                histogram[species] -= 1;
                remaining = block;
                placed = true;
                break;
            }
            rank -= block;
        }
        assert!(placed, "histogram exhausted before the configuration was filled");
    }
}

/// Advances `configuration` to its next lexicographic permutation in place.
/// Returns `false` (leaving the sequence untouched) when it is already the
/// largest permutation.
pub fn next_permutation(configuration: &mut [u8]) -> bool {
    let len = configuration.len();
    if len < 2 {
        return false;
    }

    let mut pivot = len - 1;
    while pivot > 0 && configuration[pivot - 1] >= configuration[pivot] {
        pivot -= 1;
    }
    if pivot == 0 {
        return false;
    }

    let mut successor = len - 1;
    while configuration[successor] <= configuration[pivot - 1] {
        successor -= 1;
    }
    configuration.swap(pivot - 1, successor);
    configuration[pivot..].reverse();
    true
}
