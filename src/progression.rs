use crate::error::ModelError;
use crate::parameters::{Params, StageTableType};

/// Fractions of an exposure cohort found in each disease stage as a
/// function of whole days elapsed since the cohort became latent.
///
/// Offset 0 is the exposure day itself: the cohort is still counted as
/// susceptible, so all three fractions are 0 there. Offsets past the end of
/// the tables resolve to a fully removed cohort. The three fractions sum to
/// 1 at every in-range offset, which is what lets a city back-compute its
/// susceptible count from the conservation invariant.
pub trait StageFractions {
    /// Fraction of the cohort still latent at offset `t`.
    ///
    /// E.g., `latent_fraction(1)` -> 0.7 means that the day after exposure,
    /// 70% of the cohort has not yet become infectious.
    fn latent_fraction(&self, t: usize) -> f64;

    /// Fraction of the cohort infectious at offset `t`.
    fn infectious_fraction(&self, t: usize) -> f64;

    /// Fraction of the cohort removed (recovered and immune, or otherwise
    /// no longer circulating) at offset `t`. Non-decreasing in `t` and 1
    /// once the infectious period has fully resolved.
    fn removed_fraction(&self, t: usize) -> f64;
}

const FRACTION_SUM_TOLERANCE: f64 = 1e-9;

/// Stage fractions sampled at whole-day offsets `1..=n`, dataset-calibrated
/// lookup tables rather than parametric distributions.
pub struct EmpiricalStages {
    latent: Vec<f64>,
    infectious: Vec<f64>,
    removed: Vec<f64>,
}

impl EmpiricalStages {
    /// Creates stage-fraction tables from per-day samples. Index `i` of each
    /// table is the fraction at offset `i + 1`.
    ///
    /// # Errors
    /// - If the tables are empty or do not have the same length
    /// - If any value lies outside [0, 1]
    /// - If `latent` is not non-increasing, or is still positive past
    ///   `incubation_period + 1`
    /// - If `removed` is not non-decreasing, or does not end at 1
    /// - If the three fractions do not sum to 1 at some offset
    pub fn new(
        latent: Vec<f64>,
        infectious: Vec<f64>,
        removed: Vec<f64>,
        incubation_period: usize,
    ) -> Result<Self, ModelError> {
        if latent.is_empty() {
            return Err(ModelError::ModelError(
                "stage-fraction tables must not be empty.".to_string(),
            ));
        }
        if latent.len() != infectious.len() || latent.len() != removed.len() {
            return Err(ModelError::ModelError(
                "`latent`, `infectious` and `removed` must have the same length.".to_string(),
            ));
        }
        for table in [&latent, &infectious, &removed] {
            if table.iter().any(|&x| !(0.0..=1.0).contains(&x)) {
                return Err(ModelError::ModelError(
                    "stage fractions must lie in [0, 1].".to_string(),
                ));
            }
        }
        if latent.windows(2).any(|w| w[1] > w[0]) {
            return Err(ModelError::ModelError(
                "`latent` must be non-increasing.".to_string(),
            ));
        }
        if latent.iter().skip(incubation_period).any(|&x| x > 0.0) {
            return Err(ModelError::ModelError(format!(
                "`latent` must reach 0 by offset {}.",
                incubation_period + 1
            )));
        }
        if removed.windows(2).any(|w| w[1] < w[0]) {
            return Err(ModelError::ModelError(
                "`removed` must be non-decreasing.".to_string(),
            ));
        }
        // The past-end clamp returns 1, so the table has to get there.
        if (removed[removed.len() - 1] - 1.0).abs() > FRACTION_SUM_TOLERANCE {
            return Err(ModelError::ModelError(
                "`removed` must end at 1.".to_string(),
            ));
        }
        for t in 0..latent.len() {
            let sum = latent[t] + infectious[t] + removed[t];
            if (sum - 1.0).abs() > FRACTION_SUM_TOLERANCE {
                return Err(ModelError::ModelError(format!(
                    "stage fractions at offset {} sum to {sum} instead of 1.",
                    t + 1
                )));
            }
        }
        Ok(Self {
            latent,
            infectious,
            removed,
        })
    }

    /// The calibrated pandemic influenza tables: two days of incubation and
    /// an eight-day infectious period, fully resolved by offset 11.
    #[must_use]
    pub fn pandemic_influenza() -> Self {
        Self {
            latent: vec![0.70, 0.20, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            infectious: vec![0.30, 0.77, 0.82, 0.54, 0.30, 0.15, 0.08, 0.04, 0.02, 0.01, 0.0],
            removed: vec![0.00, 0.03, 0.18, 0.46, 0.70, 0.85, 0.92, 0.96, 0.98, 0.99, 1.0],
        }
    }

    fn lookup(table: &[f64], t: usize, past_end: f64) -> f64 {
        if t == 0 {
            0.0
        } else if t > table.len() {
            past_end
        } else {
            table[t - 1]
        }
    }
}

impl StageFractions for EmpiricalStages {
    fn latent_fraction(&self, t: usize) -> f64 {
        Self::lookup(&self.latent, t, 0.0)
    }
    fn infectious_fraction(&self, t: usize) -> f64 {
        Self::lookup(&self.infectious, t, 0.0)
    }
    fn removed_fraction(&self, t: usize) -> f64 {
        Self::lookup(&self.removed, t, 1.0)
    }
}

/// Builds the stage-fraction tables named by the parameters.
///
/// # Errors
/// If explicit tables fail the checks in [`EmpiricalStages::new`].
pub fn load_stage_fractions(parameters: &Params) -> Result<EmpiricalStages, ModelError> {
    match &parameters.stage_fractions {
        StageTableType::Reference => Ok(EmpiricalStages::pandemic_influenza()),
        StageTableType::FromTables {
            latent,
            infectious,
            removed,
        } => EmpiricalStages::new(
            latent.clone(),
            infectious.clone(),
            removed.clone(),
            parameters.incubation_period,
        ),
    }
}
