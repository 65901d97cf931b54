// Re-export commonly used types at the crate root
pub use city::{City, Compartments, CONSERVATION_TOLERANCE};
pub use error::ModelError;
pub use parameters::{load_params, validate_inputs, Params, StageTableType};
pub use progression::{load_stage_fractions, EmpiricalStages, StageFractions};
pub use propagation_loop::Simulation;
pub use travel_network::{
    map_airports_to_cities, read_travel_records, AirportDirectory, TravelNetwork, TravelRecord,
};

pub mod city;
pub mod error;
pub mod parameters;
pub mod progression;
pub mod propagation_loop;
pub mod reports;
pub mod travel_network;
