use log::{debug, trace};

use crate::city::City;
use crate::error::ModelError;
use crate::parameters::Params;
use crate::progression::{load_stage_fractions, EmpiricalStages};
use crate::travel_network::TravelNetwork;

/// Drives the day-by-day state update across every city in the network.
///
/// Updates are synchronous: each day, every city's compartments are
/// re-derived first, and only then is every city's new-latent cohort
/// computed from that complete snapshot of infectious counts. A cohort
/// recorded on day `d` first appears in compartments on day `d + 1`, so
/// all cross-city reads see fully written state and city iteration order
/// cannot affect results.
pub struct Simulation {
    parameters: Params,
    stages: EmpiricalStages,
    network: TravelNetwork,
    cities: Vec<City>,
}

impl Simulation {
    /// Builds per-city state from the network and seeds the index city
    /// named by the parameters.
    ///
    /// # Errors
    /// - If the stage tables fail validation
    /// - If the index city is not part of the network
    /// - If the index seed is infeasible (see [`City::seed`])
    pub fn new(parameters: Params, network: TravelNetwork) -> Result<Self, ModelError> {
        let stages = load_stage_fractions(&parameters)?;
        let mut cities: Vec<City> = (0..network.city_count())
            .map(|index| City::new(network.city_name(index), network.population(index)))
            .collect();
        let index = network.city_index(&parameters.index_city)?;
        cities[index].seed(
            parameters.index_latent,
            parameters.index_infectious,
            &stages,
            &parameters,
        )?;
        Ok(Self {
            parameters,
            stages,
            network,
            cities,
        })
    }

    /// Advances every city from `start_day` through `end_day` inclusive.
    /// Recomputing overlapping or re-ordered sub-ranges of an already
    /// simulated interval reproduces identical compartments, because each
    /// day is a pure function of the cohort history.
    ///
    /// # Errors
    /// - If `start_day` skips past days whose cohorts are not recorded yet
    /// - If any city's compartments stop summing to its population
    pub fn run(&mut self, start_day: usize, end_day: usize) -> Result<(), ModelError> {
        for day in start_day..=end_day {
            self.step(day)?;
        }
        Ok(())
    }

    fn step(&mut self, day: usize) -> Result<(), ModelError> {
        for city in &mut self.cities {
            city.state_for_day(day, &self.stages, &self.parameters)?;
            city.check_conservation(day)?;
        }
        let infectious_by_city = self
            .cities
            .iter()
            .map(|city| Ok(city.state_at(day)?.infectious))
            .collect::<Result<Vec<f64>, ModelError>>()?;
        for city in &mut self.cities {
            let local = city.get_new_latent_local(day, &self.parameters)?;
            let imported =
                city.get_new_latent_imported(&self.parameters, &self.network, &infectious_by_city)?;
            let available = city.state_at(day)?.susceptible;
            let cohort = (local + imported).min(available);
            trace!(
                "day {day} {}: new latent local {local:.3} imported {imported:.3}",
                city.name()
            );
            city.record_new_latent(day, cohort)?;
        }
        debug!("day {day} advanced for {} cities", self.cities.len());
        Ok(())
    }

    #[must_use]
    pub fn parameters(&self) -> &Params {
        &self.parameters
    }

    #[must_use]
    pub fn network(&self) -> &TravelNetwork {
        &self.network
    }

    #[must_use]
    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    /// The city with the given name.
    ///
    /// # Errors
    /// If the city is not part of the configured network.
    pub fn city(&self, name: &str) -> Result<&City, ModelError> {
        self.cities
            .iter()
            .find(|city| city.name() == name)
            .ok_or_else(|| ModelError::UnknownCity(name.to_string()))
    }
}
