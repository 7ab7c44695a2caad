//! Walks solved edges into ordered per-vehicle routes (C5).

use std::collections::HashMap;

use crate::domain::registry::Registry;
use crate::domain::types::{RouteEntry, StopOwner};
use crate::distance::oracle::DistanceOracle;
use crate::errors::Error;
use crate::formulator::Formulation;
use crate::solver::SolveResult;

/// Decode a solved, sub-tour-free incumbent into ordered routes, populating
/// each assigned request's expected waiting/travel time and each vehicle's
/// route, on-board set and detour ratios.
///
/// Every request in `registry` is first reset to the unassigned state; the
/// walk below then reassigns exactly the requests the solution actually
/// serves, so requests untouched by any walk correctly read as unvisited.
pub fn decode(registry: &mut Registry, oracle: &DistanceOracle, formulation: &Formulation, solved: &SolveResult) -> Result<(), Error> {
    for request in registry.requests.values_mut() {
        request.reset_plan();
    }

    let n = formulation.node_count();

    for (k, &vehicle_id) in formulation.vehicle_order.iter().enumerate() {
        let origin_idx = formulation
            .nodes
            .iter()
            .position(|node| matches!(node, Some(stop) if stop.owner == StopOwner::VehicleOrigin(vehicle_id)))
            .expect("vehicle must have an origin node in the formulation");

        let succ = successor_map_for_vehicle(formulation, solved, k);

        {
            let vehicle = registry.vehicles.get_mut(&vehicle_id).unwrap();
            vehicle.reset_plan();
            vehicle.route.push(RouteEntry {
                location: vehicle.origin,
                owner: StopOwner::VehicleOrigin(vehicle_id),
                cumulative_seconds: 0,
            });
        }

        let mut travel_time: u64 = 0;
        let mut current = origin_idx;
        let mut visited_guard = 0usize;

        loop {
            visited_guard += 1;
            if visited_guard > n + 1 {
                return Err(Error::InconsistentSolution(format!(
                    "vehicle {vehicle_id} walk did not terminate at depot"
                )));
            }

            let next = *succ.get(&current).ok_or_else(|| {
                Error::InconsistentSolution(format!(
                    "vehicle {vehicle_id} has no successor for node index {current} before reaching depot"
                ))
            })?;

            let from_loc = formulation.nodes[current].map(|s| s.location).unwrap_or(crate::domain::types::DEPOT);
            let to_loc = formulation.nodes[next].map(|s| s.location).unwrap_or(crate::domain::types::DEPOT);
            travel_time += oracle.cost(from_loc, to_loc);

            if next == 0 {
                let vehicle = registry.vehicles.get_mut(&vehicle_id).unwrap();
                vehicle.route.push(RouteEntry {
                    location: crate::domain::types::DEPOT,
                    owner: StopOwner::VehicleOrigin(vehicle_id),
                    cumulative_seconds: travel_time,
                });
                vehicle.travel_time = travel_time;
                break;
            }

            let stop = formulation.nodes[next].expect("non-depot node must carry a stop");
            match stop.owner {
                StopOwner::RequestPickup(request_id) => {
                    let request = registry.requests.get_mut(&request_id).unwrap();
                    request.expected_waiting_time = travel_time;
                    request.assigned_vehicle = Some(vehicle_id);
                    registry.vehicles.get_mut(&vehicle_id).unwrap().on_board.insert(request_id);
                }
                StopOwner::RequestDropoff(request_id) => {
                    let waiting = registry.requests[&request_id].expected_waiting_time;
                    let travel = travel_time.saturating_sub(waiting);
                    let shortest = registry.requests[&request_id].shortest_time;
                    let request = registry.requests.get_mut(&request_id).unwrap();
                    request.expected_travel_time = travel;
                    if shortest > 0 {
                        let ratio = travel as f64 / shortest as f64;
                        registry.vehicles.get_mut(&vehicle_id).unwrap().detour_ratio.insert(request_id, ratio);
                    }
                }
                StopOwner::VehicleOrigin(_) => {}
            }

            let vehicle = registry.vehicles.get_mut(&vehicle_id).unwrap();
            vehicle.route.push(RouteEntry {
                location: stop.location,
                owner: stop.owner,
                cumulative_seconds: travel_time,
            });

            current = next;
        }
    }

    Ok(())
}

fn successor_map_for_vehicle(formulation: &Formulation, solved: &SolveResult, vehicle_index: usize) -> HashMap<usize, usize> {
    let selected = solved.selected_edges();
    let n = formulation.node_count();
    let mut succ = HashMap::new();
    for i in 0..n {
        for j in 0..n {
            if i != j && selected.contains(&(i, j, vehicle_index)) {
                succ.insert(i, j);
            }
        }
    }
    succ
}
