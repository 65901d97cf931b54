use std::fmt::Write as _;
use std::hint::black_box;
use std::io::Write as _;
use std::path::PathBuf;

use criterion::Criterion;
use epi_metapop::{
    read_travel_records, AirportDirectory, EmpiricalStages, Params, Simulation, StageFractions,
    StageTableType, TravelNetwork,
};
use tempfile::NamedTempFile;

fn persist_tmp_csv(content: &str) -> PathBuf {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    let (_file, path) = file.keep().unwrap();
    path
}

/// A fully connected network the size of the reference dataset.
fn synthetic_network(size: usize) -> TravelNetwork {
    let mut directory = String::from("airport,city,population\n");
    for i in 0..size {
        writeln!(directory, "A{i:02},City {i:02},1000000").unwrap();
    }
    let mut records = String::from("origin,destination,passengers\n");
    for i in 0..size {
        for j in 0..size {
            if i != j {
                writeln!(records, "A{i:02},A{j:02},{}", 10_000 + 137 * (i * size + j)).unwrap();
            }
        }
    }
    let directory = AirportDirectory::from_csv(&persist_tmp_csv(&directory)).unwrap();
    let records = read_travel_records(&persist_tmp_csv(&records)).unwrap();
    TravelNetwork::build(&directory, &records)
}

pub fn propagation_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagation_loop");

    let network = synthetic_network(52);
    let parameters = Params {
        incubation_period: 2,
        infection_period: 8,
        daily_infectious_contact_rate: 1.055,
        initial_susceptible_fraction: 0.6417,
        reporting_fraction: 0.9,
        days: 60,
        index_city: "City 00".to_string(),
        index_latent: 74.0,
        index_infectious: 81.0,
        stage_fractions: StageTableType::Reference,
        travel_records_file: PathBuf::from("."),
        airport_directory_file: PathBuf::from("."),
        compartments_report_name: None,
    };

    group.bench_function("run_60_days_52_cities", |b| {
        b.iter(|| {
            let mut simulation =
                Simulation::new(parameters.clone(), network.clone()).expect("Valid simulation");
            simulation.run(0, 60).expect("Simulation should run");
            black_box(simulation.cities().len());
        });
    });

    let stages = EmpiricalStages::pandemic_influenza();
    group.bench_function("stage_fraction_lookup", |b| {
        b.iter(|| {
            for t in 0..16 {
                black_box(stages.latent_fraction(black_box(t)));
                black_box(stages.infectious_fraction(black_box(t)));
                black_box(stages.removed_fraction(black_box(t)));
            }
        });
    });

    group.finish();
}
