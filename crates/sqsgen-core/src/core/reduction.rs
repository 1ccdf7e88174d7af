//! Reduction of the symmetric species-pair tensors to the flat layout the
//! kernel consumes.
//!
//! All parameter tensors (`prefactors`, `parameter_weights`,
//! `target_objective`) are symmetric in the species axes, so only the upper
//! triangle including the diagonal carries information: `P = S*(S+1)/2`
//! values per shell instead of `S*S`. The reduction happens once per search;
//! the inverse expansion runs once per emitted result.

/// Sentinel for below-diagonal cells of the reindex table. Never addressed
/// by the kernel, which canonicalizes every species pair before lookup.
pub const REINDEX_UNUSED: usize = usize::MAX;

/// Number of independent species-pair parameters per shell.
pub fn reduced_parameter_count(num_species: usize) -> usize {
    num_species * (num_species + 1) / 2
}

/// Maps the row-major cell `si * S + sj` (with `si <= sj`) of an `S x S`
/// species matrix to its slot in `[0, P)`.
pub fn make_reindex_table(num_species: usize) -> Vec<usize> {
    let mut table = vec![REINDEX_UNUSED; num_species * num_species];
    let mut next = 0;
    for si in 0..num_species {
        for sj in si..num_species {
            table[si * num_species + sj] = next;
            next += 1;
        }
    }
    table
}

/// Flat upper-triangular views of the three parameter tensors, each of
/// length `K * P`, indexed as `shell * P + reindex[si * S + sj]`.
#[derive(Debug, Clone)]
pub struct ReducedTensors {
    pub prefactors: Vec<f64>,
    pub parameter_weights: Vec<f64>,
    pub target_objectives: Vec<f64>,
}

/// Packs the full symmetric tensors into [`ReducedTensors`]. Shells follow
/// the active-shell order of `shell_weights`; the per-pair weight is the
/// shell weight times the species-pair weight.
pub fn reduce_weight_matrices(
    shell_weights: &[f64],
    prefactors: &[Vec<Vec<f64>>],
    parameter_weights: &[Vec<f64>],
    target_objectives: &[Vec<Vec<f64>>],
    reindex: &[usize],
    num_species: usize,
) -> ReducedTensors {
    let num_shells = shell_weights.len();
    let num_params = reduced_parameter_count(num_species);
    let reduced_size = num_shells * num_params;
    let mut reduced = ReducedTensors {
        prefactors: vec![0.0; reduced_size],
        parameter_weights: vec![0.0; reduced_size],
        target_objectives: vec![0.0; reduced_size],
    };

    for (shell, &shell_weight) in shell_weights.iter().enumerate() {
        for si in 0..num_species {
            for sj in si..num_species {
                let flat_index = reindex[si * num_species + sj];
                let offset = shell * num_params + flat_index;
                reduced.prefactors[offset] = prefactors[shell][si][sj];
                reduced.target_objectives[offset] = target_objectives[shell][si][sj];
                reduced.parameter_weights[offset] = shell_weight * parameter_weights[si][sj];
            }
        }
    }
    reduced
}

/// Inverse of the reduction for a single flat tensor: expands `matrix`
/// (length `K * P`) into the full row-major `K * S * S` vector, mirroring
/// each off-diagonal entry across the diagonal.
pub fn expand_matrix(
    matrix: &[f64],
    num_species: usize,
    num_shells: usize,
    reindex: &[usize],
) -> Vec<f64> {
    let num_params = reduced_parameter_count(num_species);
    debug_assert_eq!(matrix.len(), num_shells * num_params);

    let full_stride = num_species * num_species;
    let mut expanded = vec![0.0; num_shells * full_stride];
    for shell in 0..num_shells {
        let offset_full = shell * full_stride;
        let offset_compact = shell * num_params;
        for si in 0..num_species {
            for sj in si..num_species {
                let value = matrix[offset_compact + reindex[si * num_species + sj]];
                expanded[offset_full + si * num_species + sj] = value;
                if si != sj {
                    expanded[offset_full + sj * num_species + si] = value;
                }
            }
        }
    }
    expanded
}
