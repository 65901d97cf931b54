use clap::Parser;
use log::info;
use std::path::PathBuf;

use epi_metapop::reports::write_compartments_report;
use epi_metapop::{
    load_params, read_travel_records, AirportDirectory, ModelError, Simulation, TravelNetwork,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// path to the input file
    #[arg(short, long)]
    input_file: PathBuf,

    /// path to the output directory
    #[arg(short, long)]
    output_directory: PathBuf,
}

fn initialize(args: &Args) -> Result<Simulation, ModelError> {
    let parameters = load_params(&args.input_file)?;
    let directory = AirportDirectory::from_csv(&parameters.airport_directory_file)?;
    let records = read_travel_records(&parameters.travel_records_file)?;
    let network = TravelNetwork::build(&directory, &records);
    info!(
        "travel network ready: {} cities, {} records",
        network.city_count(),
        records.len()
    );
    // make it easy for the user to see what the parameters are
    println!("{parameters:?}");
    Simulation::new(parameters, network)
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    let mut simulation = initialize(&args).expect("Error initializing.");
    let days = simulation.parameters().days;
    simulation.run(0, days).expect("Error running simulation.");
    if let Some(name) = simulation.parameters().compartments_report_name.clone() {
        let path = args.output_directory.join(name);
        write_compartments_report(&simulation, &path).expect("Error writing report.");
        info!("compartments report written to {}", path.display());
    }
}
