//! Append-only collection of active requests and vehicles (C2).

use std::collections::HashMap;

use tracing::info;

use crate::distance::oracle::DistanceOracle;
use crate::domain::types::{Request, RequestId, Vehicle, VehicleId, DEPOT};
use crate::errors::Error;

/// The current set of active requests and vehicles, plus the distance oracle
/// that backs them. Deduplicates by id and expires vehicles whose shift ended.
#[derive(Debug, Default)]
pub struct Registry {
    pub requests: HashMap<RequestId, Request>,
    pub vehicles: HashMap<VehicleId, Vehicle>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            requests: HashMap::new(),
            vehicles: HashMap::new(),
        }
    }

    fn known_locations(&self) -> Vec<u64> {
        let mut locs: Vec<u64> = Vec::with_capacity(self.requests.len() * 2 + self.vehicles.len());
        for r in self.requests.values() {
            locs.push(r.pickup);
            locs.push(r.dropoff);
        }
        for v in self.vehicles.values() {
            locs.push(v.origin);
        }
        locs.push(DEPOT);
        locs
    }

    /// Admit a request: rejects duplicate ids, warms the oracle for every pair
    /// this request forms with all known locations and the depot, and stamps
    /// `shortest_time`.
    pub fn admit_request(
        &mut self,
        mut request: Request,
        oracle: &mut DistanceOracle,
    ) -> Result<(), Error> {
        if self.requests.contains_key(&request.id) {
            return Err(Error::DuplicateRequestId(request.id));
        }

        let known = self.known_locations();
        for &loc in &known {
            oracle.ensure(request.pickup, loc);
            oracle.ensure(loc, request.pickup);
            oracle.ensure(request.dropoff, loc);
            oracle.ensure(loc, request.dropoff);
        }
        oracle.ensure(request.pickup, request.dropoff);
        oracle.ensure(request.dropoff, request.pickup);

        request.shortest_time = oracle.cost(request.pickup, request.dropoff);
        info!(request_id = request.id, "admitted request");
        self.requests.insert(request.id, request);
        Ok(())
    }

    /// Admit a vehicle: rejects duplicate ids, warms the oracle for its origin
    /// against every known location and the depot.
    pub fn admit_vehicle(
        &mut self,
        vehicle: Vehicle,
        oracle: &mut DistanceOracle,
    ) -> Result<(), Error> {
        if self.vehicles.contains_key(&vehicle.id) {
            return Err(Error::DuplicateVehicleId(vehicle.id));
        }

        let known = self.known_locations();
        for &loc in &known {
            oracle.ensure(vehicle.origin, loc);
            oracle.ensure(loc, vehicle.origin);
        }

        info!(vehicle_id = vehicle.id, "admitted vehicle");
        self.vehicles.insert(vehicle.id, vehicle);
        Ok(())
    }

    /// Remove vehicles whose shift has ended by `now`. Any rider still on board
    /// such a vehicle is returned to the unassigned pool so the next
    /// formulation can re-serve or penalize them.
    pub fn expire(&mut self, now: u64) {
        let expired_ids: Vec<VehicleId> = self
            .vehicles
            .values()
            .filter(|v| v.expired(now))
            .map(|v| v.id)
            .collect();

        for id in expired_ids {
            if let Some(vehicle) = self.vehicles.remove(&id) {
                for request_id in &vehicle.on_board {
                    if let Some(request) = self.requests.get_mut(request_id) {
                        request.reset_plan();
                    }
                }
                info!(vehicle_id = id, "vehicle expired, shift ended");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::oracle::DistanceOracle;
    use crate::distance::planner::StaticGraphPlanner;

    fn oracle() -> DistanceOracle {
        DistanceOracle::new(Box::new(StaticGraphPlanner::complete(&[1, 2, 3, 4], 100)))
    }

    #[test]
    fn duplicate_request_id_is_rejected() {
        let mut reg = Registry::new();
        let mut o = oracle();
        reg.admit_request(Request::new(1, 0, 1, 2, 1), &mut o).unwrap();
        let err = reg
            .admit_request(Request::new(1, 0, 3, 4, 1), &mut o)
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateRequestId(1)));
    }

    #[test]
    fn duplicate_vehicle_id_is_rejected() {
        let mut reg = Registry::new();
        let mut o = oracle();
        reg.admit_vehicle(Vehicle::new(1, 0, 1, 600, 4), &mut o).unwrap();
        let err = reg
            .admit_vehicle(Vehicle::new(1, 0, 2, 600, 4), &mut o)
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateVehicleId(1)));
    }

    #[test]
    fn admitting_request_stamps_shortest_time() {
        let mut reg = Registry::new();
        let mut o = oracle();
        reg.admit_request(Request::new(1, 0, 1, 2, 1), &mut o).unwrap();
        assert_eq!(reg.requests[&1].shortest_time, 100);
    }

    #[test]
    fn expiring_vehicle_frees_its_on_board_riders() {
        let mut reg = Registry::new();
        let mut o = oracle();
        reg.admit_vehicle(Vehicle::new(1, 0, 1, 300, 4), &mut o).unwrap();
        reg.admit_request(Request::new(1, 0, 2, 3, 1), &mut o).unwrap();
        reg.requests.get_mut(&1).unwrap().assigned_vehicle = Some(1);
        reg.vehicles.get_mut(&1).unwrap().on_board.insert(1);

        reg.expire(300);

        assert!(!reg.vehicles.contains_key(&1));
        assert_eq!(reg.requests[&1].assigned_vehicle, None);
    }

    #[test]
    fn expiring_vehicle_with_no_riders_leaves_others_untouched() {
        let mut reg = Registry::new();
        let mut o = oracle();
        reg.admit_vehicle(Vehicle::new(1, 0, 1, 300, 4), &mut o).unwrap();
        reg.admit_vehicle(Vehicle::new(2, 0, 2, 9999, 4), &mut o).unwrap();

        reg.expire(300);

        assert!(!reg.vehicles.contains_key(&1));
        assert!(reg.vehicles.contains_key(&2));
    }
}
