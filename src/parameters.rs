use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// How the disease-stage fraction tables are supplied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StageTableType {
    /// The calibrated pandemic influenza tables shipped with the crate.
    Reference,
    /// Explicit per-day tables, index `i` holding the fraction at offset
    /// `i + 1`.
    FromTables {
        latent: Vec<f64>,
        infectious: Vec<f64>,
        removed: Vec<f64>,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Params {
    /// Days a newly exposed cohort incubates before becoming infectious
    /// (tau 1).
    pub incubation_period: usize,
    /// Days an infectious cohort keeps circulating before removal (tau 2).
    pub infection_period: usize,
    /// Daily infectious contacts per infectious person (lambda). The same
    /// constant scales local transmission and travel imports so the two
    /// contributions stay commensurable.
    pub daily_infectious_contact_rate: f64,
    /// Fraction of every city's population that is susceptible when the
    /// simulation starts (alpha).
    pub initial_susceptible_fraction: f64,
    /// Fraction of newly ill people that show up in case reports (beta).
    pub reporting_fraction: f64,
    /// Number of day steps to run past day 0.
    pub days: usize,
    /// The city receiving the initial seed.
    pub index_city: String,
    /// Latent count in the index city on day 0.
    pub index_latent: f64,
    /// Infectious count in the index city on day 0.
    pub index_infectious: f64,
    /// Stage-fraction tables used to age cohorts through the compartments.
    pub stage_fractions: StageTableType,
    /// Path to the origin-destination passenger record file.
    pub travel_records_file: PathBuf,
    /// Path to the airport-to-city reference table.
    pub airport_directory_file: PathBuf,
    /// File name for the per-day compartments report, if one is wanted.
    pub compartments_report_name: Option<String>,
}

/// Check whether parameters provided in the input json are valid using our
/// knowledge of allowable parameter values. This prevents us from, say,
/// loading the whole travel network only to realize that we accidentally
/// set the contact rate to a negative number, which would surface much
/// later as nonsense compartment counts.
pub fn validate_inputs(parameters: &Params) -> Result<(), ModelError> {
    if parameters.incubation_period == 0 {
        return Err(ModelError::ModelError(
            "The incubation period must be at least one day.".to_string(),
        ));
    }
    if parameters.infection_period == 0 {
        return Err(ModelError::ModelError(
            "The infection period must be at least one day.".to_string(),
        ));
    }
    if parameters.daily_infectious_contact_rate < 0.0 {
        return Err(ModelError::ModelError(
            "The daily infectious contact rate must be non-negative.".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&parameters.initial_susceptible_fraction) {
        return Err(ModelError::ModelError(
            "The initial susceptible fraction must lie in [0, 1].".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&parameters.reporting_fraction) {
        return Err(ModelError::ModelError(
            "The reporting fraction must lie in [0, 1].".to_string(),
        ));
    }
    if parameters.index_latent < 0.0 || parameters.index_infectious < 0.0 {
        return Err(ModelError::ModelError(
            "The index-city seed counts must be non-negative.".to_string(),
        ));
    }
    Ok(())
}

/// Reads `Params` from a JSON file and validates them before use.
///
/// # Errors
/// - If the file cannot be read or parsed
/// - If the values fail [`validate_inputs`]
pub fn load_params(file_path: &Path) -> Result<Params, ModelError> {
    let parameters: Params = serde_json::from_str(&fs::read_to_string(file_path)?)?;
    validate_inputs(&parameters)?;
    Ok(parameters)
}
