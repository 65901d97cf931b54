use crate::error::ModelError;
use crate::parameters::Params;
use crate::progression::StageFractions;
use crate::travel_network::TravelNetwork;

/// A city's disease-state counts for one day. Counts are people, stored as
/// `f64`: the model moves expected fractions of cohorts, not individuals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Compartments {
    pub susceptible: f64,
    pub latent: f64,
    pub infectious: f64,
    pub recovered: f64,
}

/// Tolerance for the compartments-sum-to-population invariant.
pub const CONSERVATION_TOLERANCE: f64 = 1e-6;

/// One metapopulation unit: a city's fixed population together with its
/// per-day compartment counts and the history of newly latent cohorts that
/// those counts are derived from.
///
/// Compartments for a day are always re-derived as a pure function of the
/// cohort history up to that day, never as a delta applied to running
/// totals. Cohorts are stored indexed by day and overwritten in place on
/// recomputation, so re-running overlapping or re-ordered day ranges
/// reproduces identical values.
pub struct City {
    name: String,
    population: f64,
    /// Cohorts that became latent before day 0; `seed_history[k]` became
    /// latent `k + 1` days before the simulation started.
    seed_history: Vec<f64>,
    /// Newly latent cohort recorded for each simulated day.
    new_latent: Vec<f64>,
    /// Compartment counts per simulated day.
    states: Vec<Compartments>,
}

impl City {
    #[must_use]
    pub fn new(name: &str, population: f64) -> Self {
        Self {
            name: name.to_string(),
            population,
            seed_history: Vec::new(),
            new_latent: Vec::new(),
            states: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn population(&self) -> f64 {
        self.population
    }

    /// Seeds this city with known latent and infectious counts for day 0.
    ///
    /// The counts are converted into an equivalent two-day pre-start cohort
    /// history by inverting the stage fractions at offsets 1 and 2, so the
    /// seeded people age through the same tables as every later cohort.
    /// The seed is drawn from the initially non-susceptible remainder of
    /// the population, leaving the susceptible pool at exactly its
    /// configured fraction on day 0.
    ///
    /// # Errors
    /// - If the stage fractions at offsets 1 and 2 are not invertible
    /// - If no non-negative pre-start history reproduces the given counts
    /// - If the seed does not fit in the non-susceptible remainder
    pub fn seed(
        &mut self,
        latent: f64,
        infectious: f64,
        stages: &impl StageFractions,
        parameters: &Params,
    ) -> Result<(), ModelError> {
        let f1 = stages.latent_fraction(1);
        let f2 = stages.latent_fraction(2);
        let g1 = stages.infectious_fraction(1);
        let g2 = stages.infectious_fraction(2);
        let determinant = f1 * g2 - f2 * g1;
        if determinant.abs() < 1e-12 {
            return Err(ModelError::ModelError(
                "stage fractions at offsets 1 and 2 cannot express a day-0 seed.".to_string(),
            ));
        }
        let day_before = (g2 * latent - f2 * infectious) / determinant;
        let two_days_before = (f1 * infectious - g1 * latent) / determinant;
        if day_before < 0.0 || two_days_before < 0.0 {
            return Err(ModelError::ModelError(format!(
                "no non-negative pre-start history reproduces latent {latent} and infectious {infectious} for `{}`.",
                self.name
            )));
        }
        let non_susceptible = (1.0 - parameters.initial_susceptible_fraction) * self.population;
        if day_before + two_days_before > non_susceptible {
            return Err(ModelError::ModelError(format!(
                "seed of {} people does not fit in the non-susceptible remainder of `{}`.",
                day_before + two_days_before,
                self.name
            )));
        }
        self.seed_history = vec![day_before, two_days_before];
        Ok(())
    }

    /// Re-derives this city's compartments for `day` as the superposition
    /// of every cohort recorded so far, each weighted by the stage
    /// fractions at its elapsed offset. A cohort recorded on day `d` is
    /// still susceptible on day `d` and enters the compartments from day
    /// `d + 1`. Susceptible is never accumulated directly; it is
    /// back-computed from the conservation invariant, so the four
    /// compartments sum to the population no matter how the convolution
    /// rounds.
    ///
    /// # Errors
    /// If cohorts or states for days before `day` have not been recorded
    /// yet.
    pub fn state_for_day(
        &mut self,
        day: usize,
        stages: &impl StageFractions,
        parameters: &Params,
    ) -> Result<Compartments, ModelError> {
        if day > self.new_latent.len() || day > self.states.len() {
            return Err(ModelError::ModelError(format!(
                "cannot compute day {day} for `{}`: cohorts are recorded only through day {}.",
                self.name,
                self.new_latent.len()
            )));
        }
        let seed_total: f64 = self.seed_history.iter().sum();
        let mut latent = 0.0;
        let mut infectious = 0.0;
        let mut recovered =
            (1.0 - parameters.initial_susceptible_fraction) * self.population - seed_total;
        for (k, cohort) in self.seed_history.iter().enumerate() {
            let offset = day + k + 1;
            latent += cohort * stages.latent_fraction(offset);
            infectious += cohort * stages.infectious_fraction(offset);
            recovered += cohort * stages.removed_fraction(offset);
        }
        for (cohort_day, cohort) in self.new_latent.iter().enumerate().take(day) {
            let offset = day - cohort_day;
            latent += cohort * stages.latent_fraction(offset);
            infectious += cohort * stages.infectious_fraction(offset);
            recovered += cohort * stages.removed_fraction(offset);
        }
        let susceptible = self.population - latent - infectious - recovered;
        let state = Compartments {
            susceptible,
            latent,
            infectious,
            recovered,
        };
        if day == self.states.len() {
            self.states.push(state);
        } else {
            self.states[day] = state;
        }
        Ok(state)
    }

    /// Newly latent infections generated within the city on `day` by local
    /// transmission: lambda * susceptible(day) * infectious(day) /
    /// population.
    ///
    /// # Errors
    /// If the compartments for `day` have not been computed.
    pub fn get_new_latent_local(&self, day: usize, parameters: &Params) -> Result<f64, ModelError> {
        let state = self.state_at(day)?;
        if self.population == 0.0 {
            return Ok(0.0);
        }
        Ok(parameters.daily_infectious_contact_rate * state.susceptible * state.infectious
            / self.population)
    }

    /// Newly latent infections imported by travelers from every other
    /// city: lambda * sum over sources of infectious(source) *
    /// passengers(source -> this) / population(source).
    ///
    /// `infectious_by_city` must be the matrix-ordered snapshot of every
    /// city's infectious count for the day being advanced; the propagation
    /// loop takes it before any cohort for that day is recorded, which is
    /// what keeps the update synchronous.
    ///
    /// # Errors
    /// If this city is not part of the network.
    #[allow(clippy::cast_precision_loss)]
    pub fn get_new_latent_imported(
        &self,
        parameters: &Params,
        network: &TravelNetwork,
        infectious_by_city: &[f64],
    ) -> Result<f64, ModelError> {
        let destination = network.city_index(&self.name)?;
        let mut pressure = 0.0;
        for (source, &infectious) in infectious_by_city.iter().enumerate() {
            if source == destination {
                continue;
            }
            let source_population = network.population(source);
            if source_population > 0.0 {
                pressure +=
                    infectious * network.passengers(source, destination) as f64 / source_population;
            }
        }
        Ok(parameters.daily_infectious_contact_rate * pressure)
    }

    /// Records the newly latent cohort for `day`, overwriting any earlier
    /// value for the same day. Callers clamp the cohort to the currently
    /// susceptible count so compartments can never go negative.
    ///
    /// # Errors
    /// If earlier days have no recorded cohort yet.
    pub fn record_new_latent(&mut self, day: usize, size: f64) -> Result<(), ModelError> {
        match day.cmp(&self.new_latent.len()) {
            std::cmp::Ordering::Less => self.new_latent[day] = size,
            std::cmp::Ordering::Equal => self.new_latent.push(size),
            std::cmp::Ordering::Greater => {
                return Err(ModelError::ModelError(format!(
                    "cannot record a cohort for day {day} of `{}`: cohorts are recorded only through day {}.",
                    self.name,
                    self.new_latent.len()
                )));
            }
        }
        Ok(())
    }

    /// Advances this city from `start_day` through `day` using local
    /// transmission only. The propagation loop layers travel imports on
    /// top of the same fine-grained operations; this interval form exists
    /// for studying one city in isolation.
    ///
    /// Repeating the call over overlapping or re-ordered sub-ranges of an
    /// already computed interval reproduces identical compartments.
    ///
    /// # Errors
    /// If `start_day` skips past days whose cohorts are not recorded yet.
    pub fn calculate_state_equations_for_day(
        &mut self,
        start_day: usize,
        day: usize,
        stages: &impl StageFractions,
        parameters: &Params,
    ) -> Result<(), ModelError> {
        for d in start_day..=day {
            let state = self.state_for_day(d, stages, parameters)?;
            let new_latent = self.get_new_latent_local(d, parameters)?;
            self.record_new_latent(d, new_latent.min(state.susceptible))?;
        }
        Ok(())
    }

    /// Sum of all four compartments at `day`. Always equal to the fixed
    /// city population when the model is healthy; used as a conservation
    /// probe.
    ///
    /// # Errors
    /// If the compartments for `day` have not been computed.
    pub fn calculate_city_population(&self, day: usize) -> Result<f64, ModelError> {
        let state = self.state_at(day)?;
        Ok(state.susceptible + state.latent + state.infectious + state.recovered)
    }

    /// Verifies the conservation invariant at `day`.
    ///
    /// # Errors
    /// A [`ModelError::Consistency`] if the compartments do not sum to the
    /// population within [`CONSERVATION_TOLERANCE`].
    pub fn check_conservation(&self, day: usize) -> Result<(), ModelError> {
        let total = self.calculate_city_population(day)?;
        if (total - self.population).abs() > CONSERVATION_TOLERANCE {
            return Err(ModelError::Consistency(format!(
                "`{}` compartments sum to {total} instead of {} on day {day}.",
                self.name, self.population
            )));
        }
        Ok(())
    }

    /// The compartments computed for `day`.
    ///
    /// # Errors
    /// If that day has not been computed yet.
    pub fn state_at(&self, day: usize) -> Result<&Compartments, ModelError> {
        self.states.get(day).ok_or_else(|| {
            ModelError::ModelError(format!(
                "day {day} of `{}` has not been computed.",
                self.name
            ))
        })
    }

    /// Days with computed compartments, i.e. days `0..days_computed()` can
    /// be queried.
    #[must_use]
    pub fn days_computed(&self) -> usize {
        self.states.len()
    }

    /// The compartments for the most recently computed day, if any.
    #[must_use]
    pub fn current(&self) -> Option<&Compartments> {
        self.states.last()
    }

    /// The newly latent cohort recorded for `day`, if any.
    #[must_use]
    pub fn new_latent_on(&self, day: usize) -> Option<f64> {
        self.new_latent.get(day).copied()
    }

    /// Newly reported cases for `day`: the reporting fraction applied to
    /// the day's new-latent cohort.
    #[must_use]
    pub fn reported_new_cases(&self, day: usize, parameters: &Params) -> Option<f64> {
        self.new_latent_on(day)
            .map(|cohort| parameters.reporting_fraction * cohort)
    }
}
