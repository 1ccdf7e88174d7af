use crate::core::kernel::SitePair;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum SettingsError {
    #[error("Configuration must contain at least one site")]
    EmptyConfiguration,

    #[error("At least one coordination shell must be active")]
    NoActiveShells,

    #[error("Got {num_weights} shell weights for {num_shells} active shells")]
    MisalignedShellWeights { num_shells: usize, num_weights: usize },

    #[error("Pair ({i}, {j}) references a site outside the {num_atoms}-atom configuration")]
    PairSiteOutOfRange { i: usize, j: usize, num_atoms: usize },

    #[error("Pair ({i}, {j}) carries shell index {shell}, but only {num_shells} shells are active")]
    PairShellOutOfRange {
        i: usize,
        j: usize,
        shell: usize,
        num_shells: usize,
    },

    #[error("Tensor '{name}' has shape {actual}, expected {expected}")]
    TensorShape {
        name: &'static str,
        expected: String,
        actual: String,
    },

    #[error("Tensor '{name}' is not symmetric in the species axes (mismatch at ({si}, {sj}))")]
    AsymmetricTensor {
        name: &'static str,
        si: usize,
        sj: usize,
    },
}

/// How the driver walks the configuration space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IterationMode {
    /// Shuffle the configuration independently at every step.
    Random,
    /// Enumerate all permutations of the composition in lexicographic order.
    Systematic,
}

/// The symmetric parameter tensors of a search problem, in full
/// (unreduced) form: `parameter_weights` is `S x S`, `prefactors` and
/// `target_objective` are `K x S x S`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterTensors {
    pub prefactors: Vec<Vec<Vec<f64>>>,
    pub parameter_weights: Vec<Vec<f64>>,
    pub target_objective: Vec<Vec<Vec<f64>>>,
}

/// Search-budget knobs: how many configurations to visit and how many to
/// keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchBudget {
    /// Steps per random-mode search. Ignored in systematic mode, where the
    /// multiset itself bounds the walk.
    pub num_iterations: u64,
    /// Capacity of the result buffer.
    pub num_output_configurations: usize,
    pub mode: IterationMode,
}

/// The immutable description of one search problem.
///
/// Constructed once via [`IterationSettings::new`], which packs the species
/// identifiers into the dense `[0, S)` range and validates every input;
/// afterwards the settings are read-only and shared by all workers.
#[derive(Debug, Clone)]
pub struct IterationSettings {
    packed_configuration: Vec<u8>,
    packing_indices: Vec<u8>,
    pair_list: Vec<SitePair>,
    shells: Vec<u32>,
    shell_weights: Vec<f64>,
    tensors: ParameterTensors,
    num_iterations: u64,
    num_output_configurations: usize,
    mode: IterationMode,
}

impl IterationSettings {
    /// Validates and packs a search problem.
    ///
    /// `configuration` carries external species identifiers (ordinal numbers
    /// of the elements); the distinct identifiers are sorted ascending and
    /// renumbered into `[0, S)`. A `num_output_configurations` of zero is
    /// treated as one.
    pub fn new(
        configuration: Vec<u8>,
        pair_list: Vec<SitePair>,
        shells: Vec<u32>,
        shell_weights: Vec<f64>,
        tensors: ParameterTensors,
        budget: SearchBudget,
    ) -> Result<Self, SettingsError> {
        if configuration.is_empty() {
            return Err(SettingsError::EmptyConfiguration);
        }
        if shells.is_empty() {
            return Err(SettingsError::NoActiveShells);
        }
        if shells.len() != shell_weights.len() {
            return Err(SettingsError::MisalignedShellWeights {
                num_shells: shells.len(),
                num_weights: shell_weights.len(),
            });
        }

        let (packed_configuration, packing_indices) = pack_configuration(&configuration);
        let num_atoms = packed_configuration.len();
        let num_species = packing_indices.len();
        let num_shells = shells.len();

        for pair in &pair_list {
            if pair.i >= num_atoms || pair.j >= num_atoms {
                return Err(SettingsError::PairSiteOutOfRange {
                    i: pair.i,
                    j: pair.j,
                    num_atoms,
                });
            }
            if pair.shell >= num_shells {
                return Err(SettingsError::PairShellOutOfRange {
                    i: pair.i,
                    j: pair.j,
                    shell: pair.shell,
                    num_shells,
                });
            }
        }

        validate_square("parameter_weights", &tensors.parameter_weights, num_species)?;
        validate_per_shell("prefactors", &tensors.prefactors, num_shells, num_species)?;
        validate_per_shell(
            "target_objective",
            &tensors.target_objective,
            num_shells,
            num_species,
        )?;

        Ok(Self {
            packed_configuration,
            packing_indices,
            pair_list,
            shells,
            shell_weights,
            tensors,
            num_iterations: budget.num_iterations,
            num_output_configurations: budget.num_output_configurations.max(1),
            mode: budget.mode,
        })
    }

    pub fn num_atoms(&self) -> usize {
        self.packed_configuration.len()
    }

    pub fn num_species(&self) -> usize {
        self.packing_indices.len()
    }

    pub fn num_shells(&self) -> usize {
        self.shells.len()
    }

    pub fn num_iterations(&self) -> u64 {
        self.num_iterations
    }

    pub fn num_output_configurations(&self) -> usize {
        self.num_output_configurations
    }

    pub fn mode(&self) -> IterationMode {
        self.mode
    }

    /// The configuration with species renumbered into `[0, S)`.
    pub fn packed_configuration(&self) -> &[u8] {
        &self.packed_configuration
    }

    /// Maps a packed configuration back to external species identifiers.
    pub fn unpack_configuration(&self, configuration: &[u8]) -> Vec<u8> {
        configuration
            .iter()
            .map(|&species| self.packing_indices[species as usize])
            .collect()
    }

    pub fn pair_list(&self) -> &[SitePair] {
        &self.pair_list
    }

    /// Active shell identifiers and their weights, aligned index-wise.
    pub fn shell_indices_and_weights(&self) -> (&[u32], &[f64]) {
        (&self.shells, &self.shell_weights)
    }

    pub fn parameter_prefactors(&self) -> &[Vec<Vec<f64>>] {
        &self.tensors.prefactors
    }

    pub fn parameter_weights(&self) -> &[Vec<f64>] {
        &self.tensors.parameter_weights
    }

    pub fn target_objective(&self) -> &[Vec<Vec<f64>>] {
        &self.tensors.target_objective
    }
}

fn pack_configuration(configuration: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut packing_indices: Vec<u8> = configuration.to_vec();
    packing_indices.sort_unstable();
    packing_indices.dedup();

    let packed = configuration
        .iter()
        .map(|species| {
            let dense = packing_indices
                .binary_search(species)
                .expect("packing table contains every input species");
            dense as u8
        })
        .collect();
    (packed, packing_indices)
}

fn validate_square(
    name: &'static str,
    matrix: &[Vec<f64>],
    num_species: usize,
) -> Result<(), SettingsError> {
    if matrix.len() != num_species || matrix.iter().any(|row| row.len() != num_species) {
        return Err(SettingsError::TensorShape {
            name,
            expected: format!("{num_species}x{num_species}"),
            actual: format!(
                "{}x{}",
                matrix.len(),
                matrix.iter().map(Vec::len).max().unwrap_or(0)
            ),
        });
    }
    for si in 0..num_species {
        for sj in (si + 1)..num_species {
            if matrix[si][sj] != matrix[sj][si] {
                return Err(SettingsError::AsymmetricTensor { name, si, sj });
            }
        }
    }
    Ok(())
}

fn validate_per_shell(
    name: &'static str,
    tensor: &[Vec<Vec<f64>>],
    num_shells: usize,
    num_species: usize,
) -> Result<(), SettingsError> {
    if tensor.len() != num_shells {
        return Err(SettingsError::TensorShape {
            name,
            expected: format!("{num_shells}x{num_species}x{num_species}"),
            actual: format!("{}x..", tensor.len()),
        });
    }
    for matrix in tensor {
        validate_square(name, matrix, num_species)?;
    }
    Ok(())
}
