//! CLI argument parsing (ambient Config/CLI component, §6).

use clap::Parser;

use crate::formulator::{RunConfig, Weights};

#[derive(Debug, Parser)]
#[command(name = "darp-solver", about = "Online multi-objective dial-a-ride solver")]
pub struct Args {
    /// Objective weights `alpha beta gamma`.
    #[arg(long, num_args = 3, default_values_t = [1.0, 1.0, 1.0])]
    pub weight: Vec<f64>,

    /// Penalty applied per unvisited non-depot stop.
    #[arg(long, default_value_t = 1000.0)]
    pub penalty: f64,

    /// Maximum tolerated detour ratio (expected_travel_time / shortest_time).
    #[arg(long, default_value_t = 2.0)]
    pub detour: f64,

    /// Path to the request feed CSV.
    #[arg(long)]
    pub requests: String,

    /// Path to the vehicle feed CSV.
    #[arg(long)]
    pub vehicles: String,

    /// Virtual clock step, in seconds.
    #[arg(long, default_value_t = 60)]
    pub tick_seconds: u64,

    /// Simulated time horizon, in seconds since epoch; the run stops once
    /// `now` reaches it and the feed is drained.
    #[arg(long)]
    pub horizon: u64,

    /// Optional per-solve wall-clock deadline, in seconds.
    #[arg(long)]
    pub solve_time_limit: Option<f64>,
}

impl Args {
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            weights: Weights {
                alpha: self.weight[0],
                beta: self.weight[1],
                gamma: self.weight[2],
            },
            penalty: self.penalty,
            detour_limit: self.detour,
        }
    }
}
