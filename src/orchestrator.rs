//! Per-tick drive loop: admit arrivals, expire vehicles, solve, decode, repair,
//! commit, report (C7).

use tracing::info;

use crate::config::Args;
use crate::decoder;
use crate::distance::oracle::DistanceOracle;
use crate::domain::registry::Registry;
use crate::errors::Error;
use crate::feed::Feed;
use crate::formulator::{self, RunConfig};
use crate::repair;
use crate::report;
use crate::solver;

pub struct Orchestrator {
    pub now: u64,
    pub registry: Registry,
    pub oracle: DistanceOracle,
    pub feed: Feed,
    pub config: RunConfig,
    pub tick_seconds: u64,
    pub horizon: u64,
    pub solve_time_limit: Option<f64>,
}

impl Orchestrator {
    /// `now` starts at the earliest pending feed arrival rather than at the
    /// epoch, since feed timestamps are seconds-since-epoch and ticking up
    /// from 0 would spend millions of no-op ticks before the first arrival.
    pub fn new(oracle: DistanceOracle, feed: Feed, args: &Args) -> Self {
        let now = feed.next_event_time().unwrap_or(0);
        Orchestrator {
            now,
            registry: Registry::new(),
            oracle,
            feed,
            config: args.run_config(),
            tick_seconds: args.tick_seconds,
            horizon: args.horizon,
            solve_time_limit: args.solve_time_limit,
        }
    }

    /// Drive the simulation from the first pending arrival to the configured
    /// horizon.
    pub fn run(&mut self) -> Result<(), Error> {
        while self.now <= self.horizon {
            self.tick()?;
        }
        Ok(())
    }

    /// Run a single tick at the current virtual time, then advance `now`.
    pub fn tick(&mut self) -> Result<(), Error> {
        let (due_requests, due_vehicles) = self.feed.drain_due(self.now);
        for vehicle in due_vehicles {
            self.registry.admit_vehicle(vehicle, &mut self.oracle)?;
        }
        for request in due_requests {
            self.registry.admit_request(request, &mut self.oracle)?;
        }

        self.registry.expire(self.now);

        report::print_status(self.now, &self.registry);

        if !self.registry.vehicles.is_empty() {
            let formulation = formulator::build(&self.registry, &self.oracle, self.config)?;
            let outcome = solver::solve(&formulation, self.solve_time_limit)
                .map_err(|err| self.promote_committed_promise_violation(err))?;

            match outcome {
                solver::SolveOutcome::Solved(solved) => {
                    decoder::decode(&mut self.registry, &self.oracle, &formulation, &solved)?;
                    repair::repair(&mut self.registry, &self.oracle, self.config.detour_limit);

                    for vehicle in self.registry.vehicles.values_mut() {
                        vehicle.advance(self.now);
                    }

                    report::print_status(self.now, &self.registry);
                }
                solver::SolveOutcome::SkipTick => {
                    info!(now = self.now, "solve hit the time limit without an integer-feasible incumbent; registry unchanged this tick");
                }
            }
        }

        info!(now = self.now, "tick complete");
        self.now += self.tick_seconds;

        // Sleep through idle stretches: with no vehicle to route, nothing
        // above ran, so jump straight to the next arrival instead of ticking
        // one `tick_seconds` step at a time (§5 "sleeps when no work is pending").
        if self.registry.vehicles.is_empty() {
            if let Some(next) = self.feed.next_event_time() {
                if next > self.now {
                    self.now = next;
                }
            }
        }
        Ok(())
    }

    /// A model that is infeasible only because a vehicle's committed
    /// `next_loc` from the previous tick cannot be honored indicates
    /// corrupted inter-tick state (§7), not an ordinary infeasible instance.
    /// Surface that distinction for the operator when it applies.
    fn promote_committed_promise_violation(&self, err: Error) -> Error {
        if let Error::Infeasible { .. } = &err {
            if let Some(&vehicle_id) = self
                .registry
                .vehicles
                .values()
                .find(|v| v.next_loc.is_some())
                .map(|v| &v.id)
            {
                return Error::CommittedPromiseViolation { vehicle_id };
            }
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Args;
    use crate::distance::oracle::DistanceOracle;
    use crate::distance::planner::StaticGraphPlanner;
    use crate::domain::types::{Request, Vehicle, DEPOT};
    use crate::feed::{PendingRequest, PendingVehicle};
    use crate::formulator::Weights;

    fn config() -> RunConfig {
        RunConfig {
            weights: Weights { alpha: 1., beta: 1., gamma: 1. },
            penalty: 1000.,
            detour_limit: 2.0,
        }
    }

    fn orchestrator() -> Orchestrator {
        let oracle = DistanceOracle::new(Box::new(StaticGraphPlanner::complete(&[DEPOT, 1, 2, 3], 50)));
        Orchestrator {
            now: 0,
            registry: Registry::new(),
            oracle,
            feed: Feed { pending_requests: Vec::new(), pending_vehicles: Vec::new() },
            config: config(),
            tick_seconds: 60,
            horizon: 0,
            solve_time_limit: None,
        }
    }

    #[test]
    fn single_vehicle_single_request_gets_assigned_on_first_tick() {
        let mut o = orchestrator();
        o.registry.admit_vehicle(Vehicle::new(1, 0, 1, 600, 2), &mut o.oracle).unwrap();
        o.registry.admit_request(Request::new(1, 0, 2, 3, 1), &mut o.oracle).unwrap();

        o.tick().unwrap();

        assert_eq!(o.registry.requests[&1].assigned_vehicle, Some(1));
    }

    #[test]
    fn vehicle_expiry_before_solve_frees_its_on_board_rider() {
        let mut o = orchestrator();
        o.registry.admit_vehicle(Vehicle::new(1, 0, 1, 30, 2), &mut o.oracle).unwrap();
        o.registry.admit_request(Request::new(1, 0, 2, 3, 1), &mut o.oracle).unwrap();
        o.registry.requests.get_mut(&1).unwrap().assigned_vehicle = Some(1);
        o.registry.vehicles.get_mut(&1).unwrap().on_board.insert(1);

        o.now = 30;
        o.tick().unwrap();

        assert!(!o.registry.vehicles.contains_key(&1));
        assert_eq!(o.registry.requests[&1].assigned_vehicle, None);
    }

    #[test]
    fn capacity_below_party_size_forces_rejection() {
        let mut o = orchestrator();
        o.registry.admit_vehicle(Vehicle::new(1, 0, 1, 600, 1), &mut o.oracle).unwrap();
        o.registry.admit_request(Request::new(1, 0, 2, 3, 5), &mut o.oracle).unwrap();

        o.tick().unwrap();

        assert_eq!(o.registry.requests[&1].assigned_vehicle, None);
    }

    /// §8 boundary scenario 2: a capacity-1 vehicle cannot carry two
    /// competing party-1 requests in the same route; exactly one is served
    /// and the other is left unassigned (penalized).
    #[test]
    fn two_competing_requests_exceed_capacity_exactly_one_served() {
        let mut o = orchestrator();
        o.registry.admit_vehicle(Vehicle::new(1, 0, 1, 600, 1), &mut o.oracle).unwrap();
        o.registry.admit_request(Request::new(1, 0, 2, 3, 1), &mut o.oracle).unwrap();
        o.registry.admit_request(Request::new(2, 0, 3, 2, 1), &mut o.oracle).unwrap();

        o.tick().unwrap();

        let served = [
            o.registry.requests[&1].assigned_vehicle.is_some(),
            o.registry.requests[&2].assigned_vehicle.is_some(),
        ];
        assert_eq!(served.iter().filter(|&&s| s).count(), 1);
    }

    /// §8 boundary scenario 4: a vehicle's committed `next_loc` from a prior
    /// tick must still be honored even once a cheaper alternative exists.
    #[test]
    fn committed_promise_is_honored_across_ticks() {
        let mut o = orchestrator();
        o.registry.admit_vehicle(Vehicle::new(1, 0, 1, 600, 2), &mut o.oracle).unwrap();
        o.registry.admit_request(Request::new(1, 0, 2, 3, 1), &mut o.oracle).unwrap();

        o.tick().unwrap();
        assert_eq!(o.registry.requests[&1].assigned_vehicle, Some(1));
        assert!(o.registry.vehicles[&1].next_loc.is_some());

        // A cheaper, unrelated request arrives that a route skipping r1 could serve faster.
        o.registry.admit_request(Request::new(2, 60, 1, 1, 1), &mut o.oracle).unwrap();

        o.tick().unwrap();

        assert_eq!(o.registry.requests[&1].assigned_vehicle, Some(1));
        let route = &o.registry.vehicles[&1].route;
        let pu_pos = route.iter().position(|e| matches!(e.owner, crate::domain::types::StopOwner::RequestPickup(1)));
        let do_pos = route.iter().position(|e| matches!(e.owner, crate::domain::types::StopOwner::RequestDropoff(1)));
        assert!(pu_pos.is_some() && do_pos.is_some() && pu_pos < do_pos);
    }

    /// `new` must start the virtual clock at the first pending arrival, not
    /// at the epoch: feed timestamps are seconds-since-epoch, so ticking up
    /// from 0 would spend millions of no-op ticks first.
    #[test]
    fn new_starts_the_clock_at_the_earliest_pending_arrival() {
        let oracle = DistanceOracle::new(Box::new(StaticGraphPlanner::complete(&[DEPOT, 1, 2, 3], 50)));
        let feed = Feed {
            pending_requests: vec![PendingRequest { time: 1_720_000_100, request: Request::new(1, 1_720_000_100, 1, 2, 1) }],
            pending_vehicles: vec![PendingVehicle { time: 1_720_000_000, vehicle: Vehicle::new(1, 1_720_000_000, 1, 600, 2) }],
        };
        let args = Args {
            weight: vec![1., 1., 1.],
            penalty: 1000.,
            detour: 2.0,
            requests: String::new(),
            vehicles: String::new(),
            tick_seconds: 60,
            horizon: 1_720_100_000,
            solve_time_limit: None,
        };
        let o = Orchestrator::new(oracle, feed, &args);
        assert_eq!(o.now, 1_720_000_000);
    }

    /// With no vehicle admitted yet, a tick should skip straight to the next
    /// pending arrival rather than plodding forward one `tick_seconds` at a
    /// time through an idle stretch.
    #[test]
    fn idle_tick_fast_forwards_to_the_next_pending_arrival() {
        let mut o = orchestrator();
        o.now = 0;
        o.tick_seconds = 60;
        o.feed.pending_vehicles.push(PendingVehicle {
            time: 100_000,
            vehicle: Vehicle::new(1, 100_000, 1, 600, 2),
        });

        o.tick().unwrap();

        assert_eq!(o.now, 100_000);
    }
}
