mod config;
mod decoder;
mod distance;
mod domain;
mod errors;
mod feed;
mod formulator;
mod orchestrator;
mod repair;
mod report;
mod solver;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::Args;
use distance::oracle::DistanceOracle;
use distance::planner::StaticGraphPlanner;
use domain::types::DEPOT;
use errors::Error;
use feed::Feed;
use orchestrator::Orchestrator;

#[tracing::instrument(name = "darp-solver", level = "info")]
fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_span_events(fmt::format::FmtSpan::NEW | fmt::format::FmtSpan::CLOSE))
        .init();

    let args = Args::parse();

    if let Err(err) = run(args) {
        error!("{err}");
        std::process::exit(err.exit_code());
    }
}

fn run(args: Args) -> Result<(), Error> {
    info!(horizon = args.horizon, tick_seconds = args.tick_seconds, "starting darp-solver");

    let feed = Feed::load(&args.requests, &args.vehicles)?;

    let mut locations: Vec<u64> = feed
        .pending_requests
        .iter()
        .flat_map(|p| [p.request.pickup, p.request.dropoff])
        .chain(feed.pending_vehicles.iter().map(|p| p.vehicle.origin))
        .collect();
    locations.push(DEPOT);
    locations.sort_unstable();
    locations.dedup();

    let planner = StaticGraphPlanner::complete(&locations, 60);
    let oracle = DistanceOracle::new(Box::new(planner));

    let mut orchestrator = Orchestrator::new(oracle, feed, &args);
    orchestrator.run()
}
