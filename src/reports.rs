use std::path::Path;

use serde::Serialize;

use crate::error::ModelError;
use crate::propagation_loop::Simulation;

/// One row of the per-city per-day compartments report.
#[derive(Serialize, Debug)]
struct CompartmentsRow<'a> {
    day: usize,
    city: &'a str,
    susceptible: f64,
    latent: f64,
    infectious: f64,
    recovered: f64,
    reported_cases: f64,
}

/// Writes every computed day for every city as CSV, one row per city per
/// day. `reported_cases` is the day's new-latent cohort scaled by the
/// reporting fraction.
///
/// # Errors
/// If the file cannot be written.
pub fn write_compartments_report(simulation: &Simulation, path: &Path) -> Result<(), ModelError> {
    let mut writer = csv::Writer::from_path(path)?;
    for city in simulation.cities() {
        for day in 0..city.days_computed() {
            let state = city.state_at(day)?;
            writer.serialize(CompartmentsRow {
                day,
                city: city.name(),
                susceptible: state.susceptible,
                latent: state.latent,
                infectious: state.infectious,
                recovered: state.recovered,
                reported_cases: city
                    .reported_new_cases(day, simulation.parameters())
                    .unwrap_or(0.0),
            })?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod test {
    use std::io::Write;
    use std::path::PathBuf;

    use tempfile::{NamedTempFile, TempDir};

    use super::write_compartments_report;
    use crate::parameters::{Params, StageTableType};
    use crate::propagation_loop::Simulation;
    use crate::travel_network::{read_travel_records, AirportDirectory, TravelNetwork};

    fn persist_tmp_csv(content: &str) -> PathBuf {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let (_file, path) = file.keep().unwrap();
        path
    }

    #[test]
    fn test_report_has_a_row_per_city_per_day() {
        let directory = AirportDirectory::from_csv(&persist_tmp_csv(
            "airport,city,population\n\
             ABZ,Aberdeen,1000\n\
             BNE,Brisbane,1000",
        ))
        .unwrap();
        let records = read_travel_records(&persist_tmp_csv(
            "origin,destination,passengers\n\
             ABZ,BNE,730\n\
             BNE,ABZ,300",
        ))
        .unwrap();
        let parameters = Params {
            incubation_period: 2,
            infection_period: 8,
            daily_infectious_contact_rate: 1.055,
            initial_susceptible_fraction: 0.5,
            reporting_fraction: 0.9,
            days: 2,
            index_city: "Aberdeen".to_string(),
            index_latent: 10.0,
            index_infectious: 10.0,
            stage_fractions: StageTableType::Reference,
            travel_records_file: PathBuf::from("."),
            airport_directory_file: PathBuf::from("."),
            compartments_report_name: Some("compartments.csv".to_string()),
        };
        let mut simulation =
            Simulation::new(parameters, TravelNetwork::build(&directory, &records)).unwrap();
        simulation.run(0, 2).unwrap();

        let output_directory = TempDir::new().unwrap();
        let path = output_directory.path().join("compartments.csv");
        write_compartments_report(&simulation, &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(
            reader.headers().unwrap(),
            &csv::StringRecord::from(vec![
                "day",
                "city",
                "susceptible",
                "latent",
                "infectious",
                "recovered",
                "reported_cases",
            ])
        );
        assert_eq!(reader.records().count(), 2 * 3);
    }
}
