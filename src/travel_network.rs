use std::collections::HashMap;
use std::path::Path;

use indexmap::IndexMap;
use log::{debug, info};
use serde::Deserialize;

use crate::error::ModelError;

/// One origin-destination row from the passenger record file: the number
/// of passengers flown from one airport to another over the reference
/// period, one direction only.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TravelRecord {
    pub origin: String,
    pub destination: String,
    pub passengers: u64,
}

#[derive(Deserialize, Debug)]
struct DirectoryRecord {
    airport: String,
    city: String,
    population: f64,
}

/// The airport-to-city reference table. Each airport resolves to exactly
/// one city; a city may own several airports. Rows also carry the owning
/// city's population, the only external source of population counts.
#[derive(Debug, Clone)]
pub struct AirportDirectory {
    airport_to_city: HashMap<String, String>,
    /// Insertion order of this map fixes the city indexing used by the
    /// flow matrix.
    city_populations: IndexMap<String, f64>,
}

impl AirportDirectory {
    /// Reads the reference table from a CSV file with an
    /// `airport,city,population` header row.
    ///
    /// # Errors
    /// - If the file cannot be read or a row fails to parse
    /// - If a population is negative or not finite
    /// - If two rows disagree about a city's population
    pub fn from_csv(path: &Path) -> Result<Self, ModelError> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut airport_to_city = HashMap::new();
        let mut city_populations: IndexMap<String, f64> = IndexMap::new();
        for result in reader.deserialize() {
            let record: DirectoryRecord = result?;
            if !record.population.is_finite() || record.population < 0.0 {
                return Err(ModelError::ModelError(format!(
                    "population for `{}` must be a non-negative number.",
                    record.city
                )));
            }
            if let Some(&previous) = city_populations.get(&record.city) {
                if (previous - record.population).abs() > f64::EPSILON {
                    return Err(ModelError::ModelError(format!(
                        "conflicting populations for `{}`: {previous} and {}.",
                        record.city, record.population
                    )));
                }
            }
            city_populations.insert(record.city.clone(), record.population);
            airport_to_city.insert(record.airport, record.city);
        }
        Ok(Self {
            airport_to_city,
            city_populations,
        })
    }

    /// The city an airport code resolves to, if the code is known.
    #[must_use]
    pub fn city_of(&self, airport: &str) -> Option<&str> {
        self.airport_to_city.get(airport).map(String::as_str)
    }

    #[must_use]
    pub fn city_count(&self) -> usize {
        self.city_populations.len()
    }
}

/// Reads the raw origin-destination passenger rows from a CSV file with an
/// `origin,destination,passengers` header row. Airport codes are not
/// checked against any directory here; unmapped codes are resolved (and
/// skipped) during network construction.
///
/// # Errors
/// If the file cannot be read or a row fails to parse.
pub fn read_travel_records(path: &Path) -> Result<Vec<TravelRecord>, ModelError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut raw_record = csv::ByteRecord::new();
    let headers = reader.byte_headers()?.clone();
    let mut records = Vec::new();
    while reader.read_byte_record(&mut raw_record)? {
        let record: TravelRecord = raw_record.deserialize(Some(&headers))?;
        records.push(record);
    }
    Ok(records)
}

/// Resolves every record's airports to their owning cities, accumulating
/// each code into that city's airport set. Rows naming an airport the
/// directory does not know are skipped: the reference data is known to
/// contain unmapped codes, and dropping those rows instead of failing is
/// deliberate, documented behavior.
#[must_use]
pub fn map_airports_to_cities(
    directory: &AirportDirectory,
    records: &[TravelRecord],
) -> IndexMap<String, Vec<String>> {
    let mut city_airports: IndexMap<String, Vec<String>> = directory
        .city_populations
        .keys()
        .map(|city| (city.clone(), Vec::new()))
        .collect();
    let mut skipped = 0usize;
    for record in records {
        let (Some(origin_city), Some(destination_city)) = (
            directory.city_of(&record.origin),
            directory.city_of(&record.destination),
        ) else {
            skipped += 1;
            debug!(
                "skipping travel record {} -> {}: unmapped airport code",
                record.origin, record.destination
            );
            continue;
        };
        for (city, airport) in [
            (origin_city, &record.origin),
            (destination_city, &record.destination),
        ] {
            // Cities from `city_of` are always present in the directory map.
            if let Some(airports) = city_airports.get_mut(city) {
                if !airports.contains(airport) {
                    airports.push(airport.clone());
                }
            }
        }
    }
    if skipped > 0 {
        info!("skipped {skipped} travel records with unmapped airport codes");
    }
    city_airports
}

/// Directed passenger totals between cities: entry `[a][b]` sums every
/// record flying from an airport of city `a` to an airport of city `b`.
/// Rows with unmapped codes are skipped, matching
/// [`map_airports_to_cities`].
fn build_city_matrix(directory: &AirportDirectory, records: &[TravelRecord]) -> Vec<Vec<u64>> {
    let size = directory.city_count();
    let mut matrix = vec![vec![0u64; size]; size];
    for record in records {
        let (Some(origin_city), Some(destination_city)) = (
            directory.city_of(&record.origin),
            directory.city_of(&record.destination),
        ) else {
            continue;
        };
        let (Some(from), Some(to)) = (
            directory.city_populations.get_index_of(origin_city),
            directory.city_populations.get_index_of(destination_city),
        ) else {
            continue;
        };
        matrix[from][to] += record.passengers;
    }
    matrix
}

/// The static air-travel topology: an ordered city list, a directed
/// city-to-city passenger matrix, and each city's airport set. Built once
/// and shared read-only for the whole simulation.
#[derive(Debug, Clone)]
pub struct TravelNetwork {
    cities: IndexMap<String, f64>,
    city_airports: IndexMap<String, Vec<String>>,
    city_matrix: Vec<Vec<u64>>,
}

impl TravelNetwork {
    /// Builds the network from the reference directory and the raw records.
    /// Every directory city becomes a node, whether or not any record
    /// touches it.
    #[must_use]
    pub fn build(directory: &AirportDirectory, records: &[TravelRecord]) -> Self {
        Self {
            cities: directory.city_populations.clone(),
            city_airports: map_airports_to_cities(directory, records),
            city_matrix: build_city_matrix(directory, records),
        }
    }

    #[must_use]
    pub fn city_count(&self) -> usize {
        self.cities.len()
    }

    pub fn city_names(&self) -> impl Iterator<Item = &str> {
        self.cities.keys().map(String::as_str)
    }

    /// The matrix index of a city.
    ///
    /// # Errors
    /// If the city is not part of the configured network.
    pub fn city_index(&self, name: &str) -> Result<usize, ModelError> {
        self.cities
            .get_index_of(name)
            .ok_or_else(|| ModelError::UnknownCity(name.to_string()))
    }

    /// The name of the city at a matrix index. Panics if the index is out
    /// of range, like any slice access.
    #[must_use]
    pub fn city_name(&self, index: usize) -> &str {
        self.cities
            .get_index(index)
            .map(|(name, _)| name.as_str())
            .expect("city index out of range")
    }

    /// The population of the city at a matrix index.
    #[must_use]
    pub fn population(&self, index: usize) -> f64 {
        self.cities
            .get_index(index)
            .map(|(_, &population)| population)
            .expect("city index out of range")
    }

    /// The airport codes that resolve to a city, in first-seen order.
    ///
    /// # Errors
    /// If the city is not part of the configured network.
    pub fn airports_for_city(&self, name: &str) -> Result<&[String], ModelError> {
        self.city_airports
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| ModelError::UnknownCity(name.to_string()))
    }

    /// Directed passengers flown from city `from` to city `to`.
    #[must_use]
    pub fn passengers(&self, from: usize, to: usize) -> u64 {
        self.city_matrix[from][to]
    }

    /// The directed flow matrix; square with side [`Self::city_count`].
    #[must_use]
    pub fn city_matrix(&self) -> &[Vec<u64>] {
        &self.city_matrix
    }

    /// Combined bidirectional passenger total between two cities, over all
    /// airports belonging to each. Symmetric in its arguments.
    ///
    /// # Errors
    /// If either city is not part of the configured network.
    pub fn get_passengers_between_cities(&self, a: &str, b: &str) -> Result<u64, ModelError> {
        let a = self.city_index(a)?;
        let b = self.city_index(b)?;
        Ok(self.city_matrix[a][b] + self.city_matrix[b][a])
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;
    use std::path::PathBuf;

    use tempfile::NamedTempFile;

    use super::{map_airports_to_cities, read_travel_records, AirportDirectory, TravelNetwork};
    use crate::error::ModelError;

    const PASSENGERS_LAX_JFK: u64 = 996_370;
    const PASSENGERS_JFK_LAX: u64 = 986_385;
    const PASSENGERS_LGA_LAX: u64 = 3_850;
    const PASSENGERS_LAX_LGA: u64 = 2_602;

    fn persist_tmp_csv(content: &str) -> PathBuf {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let (_file, path) = file.keep().unwrap();
        path
    }

    fn reference_directory() -> AirportDirectory {
        let input = String::from(
            "airport,city,population\n\
             JFK,New York,11900000\n\
             JRB,New York,11900000\n\
             TSS,New York,11900000\n\
             LGA,New York,11900000\n\
             LAX,Los Angeles,9500000\n\
             HKG,Hong Kong,3900000",
        );
        AirportDirectory::from_csv(&persist_tmp_csv(&input)).unwrap()
    }

    fn reference_records_csv() -> String {
        format!(
            "origin,destination,passengers\n\
             LAX,JFK,{PASSENGERS_LAX_JFK}\n\
             JFK,LAX,{PASSENGERS_JFK_LAX}\n\
             LGA,LAX,{PASSENGERS_LGA_LAX}\n\
             LAX,LGA,{PASSENGERS_LAX_LGA}\n\
             JRB,HKG,1200\n\
             TSS,HKG,300\n\
             HKG,JFK,250000\n\
             XNA,JFK,9999"
        )
    }

    #[test]
    fn test_reading_air_travel_data() {
        let path = persist_tmp_csv(&reference_records_csv());
        let records = read_travel_records(&path).unwrap();
        let mut passengers_lax_jfk = 0;
        let mut passengers_jfk_lax = 0;
        for record in &records {
            if record.origin == "LAX" && record.destination == "JFK" {
                passengers_lax_jfk = record.passengers;
            }
            if record.origin == "JFK" && record.destination == "LAX" {
                passengers_jfk_lax = record.passengers;
            }
        }
        assert_eq!(
            passengers_lax_jfk, PASSENGERS_LAX_JFK,
            "Wrong passenger number for flights from LAX to JFK"
        );
        assert_eq!(
            passengers_jfk_lax, PASSENGERS_JFK_LAX,
            "Wrong passenger number for flights from JFK to LAX"
        );
    }

    #[test]
    fn test_size_of_city_list_and_matrix() {
        let directory = reference_directory();
        let records = read_travel_records(&persist_tmp_csv(&reference_records_csv())).unwrap();
        let network = TravelNetwork::build(&directory, &records);
        assert_eq!(network.city_count(), 3, "Wrong size of city list");
        let matrix = network.city_matrix();
        assert_eq!(
            matrix.len() * matrix[0].len(),
            3 * 3,
            "Wrong matrix size"
        );
    }

    #[test]
    fn test_mapping_airports_to_cities() {
        let directory = reference_directory();
        let records = read_travel_records(&persist_tmp_csv(&reference_records_csv())).unwrap();
        let airports = map_airports_to_cities(&directory, &records);
        let new_york_airports = ["JFK", "JRB", "TSS", "LGA"];
        for key in new_york_airports {
            assert!(
                airports["New York"].iter().any(|a| a == key),
                "Airport not in New York airports"
            );
        }
        assert_eq!(
            airports["New York"].len(),
            new_york_airports.len(),
            "Wrong length of airport list for New York"
        );
    }

    #[test]
    fn test_initiation_of_transportation_matrix() {
        let directory = reference_directory();
        let records = read_travel_records(&persist_tmp_csv(&reference_records_csv())).unwrap();
        let network = TravelNetwork::build(&directory, &records);
        let passengers_between_la_ny = PASSENGERS_LAX_JFK
            + PASSENGERS_JFK_LAX
            + PASSENGERS_LGA_LAX
            + PASSENGERS_LAX_LGA;
        assert_eq!(
            network
                .get_passengers_between_cities("Los Angeles", "New York")
                .unwrap(),
            passengers_between_la_ny,
            "Wrong passenger count between LA and NYC"
        );
    }

    #[test]
    fn test_passenger_totals_are_symmetric() {
        let directory = reference_directory();
        let records = read_travel_records(&persist_tmp_csv(&reference_records_csv())).unwrap();
        let network = TravelNetwork::build(&directory, &records);
        for a in network.city_names() {
            for b in network.city_names() {
                assert_eq!(
                    network.get_passengers_between_cities(a, b).unwrap(),
                    network.get_passengers_between_cities(b, a).unwrap(),
                );
            }
        }
    }

    #[test]
    fn test_unmapped_airport_rows_are_skipped() {
        let directory = reference_directory();
        let records = read_travel_records(&persist_tmp_csv(&reference_records_csv())).unwrap();
        let network = TravelNetwork::build(&directory, &records);
        // The XNA row resolves to no city, so only the mapped records
        // contribute flow between Hong Kong and New York.
        let hong_kong = network.city_index("Hong Kong").unwrap();
        let new_york = network.city_index("New York").unwrap();
        assert_eq!(network.passengers(hong_kong, new_york), 250_000);
        assert_eq!(network.passengers(new_york, hong_kong), 1_500);
        assert_eq!(
            network
                .get_passengers_between_cities("Hong Kong", "New York")
                .unwrap(),
            251_500
        );
    }

    #[test]
    fn test_unknown_city_query_fails() {
        let directory = reference_directory();
        let network = TravelNetwork::build(&directory, &[]);
        let e = network
            .get_passengers_between_cities("Atlantis", "New York")
            .err();
        match e {
            Some(ModelError::UnknownCity(name)) => assert_eq!(name, "Atlantis"),
            Some(ue) => panic!(
                "Expected an unknown-city error. Instead got {:?}",
                ue.to_string()
            ),
            None => panic!("Expected an error. Instead, the query succeeded."),
        }
    }

    #[test]
    fn test_conflicting_populations_rejected() {
        let input = String::from(
            "airport,city,population\n\
             JFK,New York,11900000\n\
             LGA,New York,8000000",
        );
        let e = AirportDirectory::from_csv(&persist_tmp_csv(&input)).err();
        assert!(matches!(e, Some(ModelError::ModelError(_))));
    }

    #[test]
    fn test_default_input_files() {
        let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
        let directory = AirportDirectory::from_csv(&root.join("input/airport_directory.csv"))
            .expect("Could not load airport directory");
        let records = read_travel_records(&root.join("input/travel_records.csv"))
            .expect("Could not load travel records");
        let network = TravelNetwork::build(&directory, &records);
        assert_eq!(network.city_count(), 6);
        assert_eq!(network.city_matrix().len(), 6);
        assert!(
            network
                .get_passengers_between_cities("Hong Kong", "Tokyo")
                .unwrap()
                > 0
        );
    }
}
