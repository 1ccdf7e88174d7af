use crate::error::{CliError, Result};
use serde::Deserialize;
use sqsgen_core::core::kernel::SitePair;
use sqsgen_core::engine::config::{
    IterationMode, IterationSettings, ParameterTensors, SearchBudget,
};
use std::path::Path;
use tracing::info;

const DEFAULT_ITERATIONS: u64 = 100_000;
const DEFAULT_OUTPUT_CONFIGURATIONS: usize = 10;

/// One neighbor pair of the problem file: two site indices and the index of
/// the coordination shell the pair belongs to.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PairEntry {
    pub i: usize,
    pub j: usize,
    pub shell: usize,
}

/// The on-disk description of a search problem.
///
/// Carries exactly the inputs of the core settings model; the lattice
/// geometry itself is not part of the file, only the neighbor pairs derived
/// from it. Optional keys fall back to the conventional defaults, which are
/// logged when applied.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchDocument {
    /// Species identifiers (ordinal numbers), one per lattice site.
    pub configuration: Vec<u8>,
    pub pairs: Vec<PairEntry>,
    pub shells: Vec<u32>,
    pub shell_weights: Vec<f64>,
    pub parameter_weights: Vec<Vec<f64>>,
    pub prefactors: Vec<Vec<Vec<f64>>>,
    pub target_objective: Vec<Vec<Vec<f64>>>,
    pub iterations: Option<u64>,
    pub output_configurations: Option<usize>,
    pub mode: Option<IterationMode>,
}

impl SearchDocument {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|error| CliError::FileParsing {
            path: path.to_path_buf(),
            source: error.into(),
        })
    }

    /// Resolves the defaults and hands the document to the core settings
    /// model for validation and species packing.
    pub fn into_settings(self) -> Result<IterationSettings> {
        let mode = self.mode.unwrap_or_else(|| {
            info!("parameter 'mode' was not found, defaulting to: random");
            IterationMode::Random
        });
        let num_iterations = self.iterations.unwrap_or_else(|| {
            info!("parameter 'iterations' was not found, defaulting to: {DEFAULT_ITERATIONS}");
            DEFAULT_ITERATIONS
        });
        let num_output_configurations = self.output_configurations.unwrap_or_else(|| {
            info!(
                "parameter 'output_configurations' was not found, defaulting to: {DEFAULT_OUTPUT_CONFIGURATIONS}"
            );
            DEFAULT_OUTPUT_CONFIGURATIONS
        });

        let pair_list = self
            .pairs
            .iter()
            .map(|pair| SitePair {
                i: pair.i,
                j: pair.j,
                shell: pair.shell,
            })
            .collect();
        let tensors = ParameterTensors {
            prefactors: self.prefactors,
            parameter_weights: self.parameter_weights,
            target_objective: self.target_objective,
        };
        let budget = SearchBudget {
            num_iterations,
            num_output_configurations,
            mode,
        };

        IterationSettings::new(
            self.configuration,
            pair_list,
            self.shells,
            self.shell_weights,
            tensors,
            budget,
        )
        .map_err(CliError::from)
    }
}
