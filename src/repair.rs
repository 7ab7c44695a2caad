//! Detects and repairs detour-ratio violations after decode (C6).

use crate::distance::oracle::DistanceOracle;
use crate::domain::registry::Registry;
use crate::domain::types::{RequestId, StopOwner, VehicleId};
use tracing::info;

/// Eject offenders and repair routes until every remaining on-board rider's
/// detour ratio is within `limit`, or only the committed `booking` rider
/// violates it (whose promise is honored regardless).
pub fn repair(registry: &mut Registry, oracle: &DistanceOracle, limit: f64) {
    let vehicle_ids: Vec<VehicleId> = registry.vehicles.keys().copied().collect();
    for vehicle_id in vehicle_ids {
        repair_vehicle(registry, oracle, vehicle_id, limit);
    }
}

fn repair_vehicle(registry: &mut Registry, oracle: &DistanceOracle, vehicle_id: VehicleId, limit: f64) {
    loop {
        let vehicle = match registry.vehicles.get(&vehicle_id) {
            Some(v) => v,
            None => return,
        };
        if !vehicle.has_detour_violation(limit) {
            return;
        }

        let booking_id = vehicle.next_loc.and_then(|stop| match stop.owner {
            StopOwner::RequestPickup(rid) | StopOwner::RequestDropoff(rid) => Some(rid),
            StopOwner::VehicleOrigin(_) => None,
        });

        let mut candidates: Vec<RequestId> = vehicle
            .detour_ratio
            .iter()
            .filter(|(_, &ratio)| ratio > limit)
            .map(|(&rid, _)| rid)
            .collect();

        if let Some(booking) = booking_id {
            if candidates.contains(&booking) {
                registry.vehicles.get_mut(&vehicle_id).unwrap().detour_ratio.remove(&booking);
                candidates.retain(|&rid| rid != booking);
                if candidates.is_empty() {
                    continue;
                }
            }
        }

        if candidates.is_empty() {
            return;
        }

        let min_cap = *candidates
            .iter()
            .min_by_key(|&&rid| {
                let r = &registry.requests[&rid];
                (r.party_size, r.request_time, r.id)
            })
            .unwrap();

        eject(registry, oracle, vehicle_id, min_cap);
    }
}

/// Remove `request_id`'s pickup and drop-off stops from `vehicle_id`'s route,
/// recompute cumulative times from the oracle, zero the request's plan state,
/// and return it to the unassigned pool.
fn eject(registry: &mut Registry, oracle: &DistanceOracle, vehicle_id: VehicleId, request_id: RequestId) {
    info!(vehicle_id, request_id, "ejecting request: detour ratio exceeded limit");

    if let Some(request) = registry.requests.get_mut(&request_id) {
        request.reset_plan();
    }

    let vehicle = registry.vehicles.get_mut(&vehicle_id).unwrap();
    vehicle.on_board.remove(&request_id);
    vehicle.detour_ratio.remove(&request_id);
    vehicle.route.retain(|entry| match entry.owner {
        StopOwner::RequestPickup(rid) | StopOwner::RequestDropoff(rid) => rid != request_id,
        StopOwner::VehicleOrigin(_) => true,
    });

    // The route's first entry is always the vehicle's own origin (§3), which
    // is a starting point rather than a destination reached by travel; only
    // the entries after it accumulate cost.
    let mut cumulative = 0u64;
    let mut prev_loc = vehicle.origin;
    for (idx, entry) in vehicle.route.iter_mut().enumerate() {
        if idx == 0 {
            entry.cumulative_seconds = 0;
            continue;
        }
        cumulative += oracle.cost(prev_loc, entry.location);
        entry.cumulative_seconds = cumulative;
        prev_loc = entry.location;
    }
    vehicle.travel_time = cumulative;
}
