//! Core entities of the routing graph: locations, stops, requests and vehicles.

use std::collections::{HashMap, HashSet};

/// An opaque road-network location id. `0` is reserved for the artificial depot.
pub type Location = u64;

/// The sentinel location that every route starts from (implicitly) and ends at.
pub const DEPOT: Location = 0;

pub type RequestId = u64;
pub type VehicleId = u64;

/// Which entity a [`Stop`] belongs to. Modeled as a tagged variant rather than
/// a shared base type so the decoder and formulator can match on it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopOwner {
    VehicleOrigin(VehicleId),
    RequestPickup(RequestId),
    RequestDropoff(RequestId),
}

/// A node of the routing graph: a location paired with the entity that owns it.
/// Two requests sharing a pickup location are still distinct stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stop {
    pub location: Location,
    pub owner: StopOwner,
}

impl Stop {
    pub fn new(location: Location, owner: StopOwner) -> Self {
        Stop { location, owner }
    }
}

/// A passenger request. Identity fields never change after admission; the
/// remaining fields are plan state rewritten every tick by the decoder/repair loop.
#[derive(Debug, Clone)]
pub struct Request {
    pub id: RequestId,
    pub request_time: u64,
    pub pickup: Location,
    pub dropoff: Location,
    pub party_size: u32,

    pub shortest_time: u64,
    pub expected_waiting_time: u64,
    pub expected_travel_time: u64,
    pub assigned_vehicle: Option<VehicleId>,
    pub picked_up: bool,
    pub dropped_off: bool,
}

impl Request {
    pub fn new(
        id: RequestId,
        request_time: u64,
        pickup: Location,
        dropoff: Location,
        party_size: u32,
    ) -> Self {
        Request {
            id,
            request_time,
            pickup,
            dropoff,
            party_size,
            shortest_time: 0,
            expected_waiting_time: 0,
            expected_travel_time: 0,
            assigned_vehicle: None,
            picked_up: false,
            dropped_off: false,
        }
    }

    /// Clear plan state, returning the request to the unassigned pool.
    pub fn reset_plan(&mut self) {
        self.expected_waiting_time = 0;
        self.expected_travel_time = 0;
        self.assigned_vehicle = None;
        self.picked_up = false;
        self.dropped_off = false;
    }
}

/// One entry of a committed vehicle route: the stop visited, its owner, and the
/// cumulative travel time (seconds since the vehicle's origin) at arrival.
#[derive(Debug, Clone, Copy)]
pub struct RouteEntry {
    pub location: Location,
    pub owner: StopOwner,
    pub cumulative_seconds: u64,
}

/// A vehicle. Identity fields are fixed at admission; the rest is plan state
/// rebuilt by the decoder and repair loop every tick.
#[derive(Debug, Clone)]
pub struct Vehicle {
    pub id: VehicleId,
    pub start_time: u64,
    pub origin: Location,
    pub working_time_seconds: u64,
    pub capacity: u32,

    pub route: Vec<RouteEntry>,
    pub on_board: HashSet<RequestId>,
    pub detour_ratio: HashMap<RequestId, f64>,
    pub travel_time: u64,
    /// The stop the vehicle currently occupies (or its origin, before the first solve).
    pub here: Stop,
    /// The stop a committed edge says the vehicle is heading to next, if any.
    pub next_loc: Option<Stop>,
}

impl Vehicle {
    pub fn new(
        id: VehicleId,
        start_time: u64,
        origin: Location,
        working_time_seconds: u64,
        capacity: u32,
    ) -> Self {
        let here = Stop::new(origin, StopOwner::VehicleOrigin(id));
        Vehicle {
            id,
            start_time,
            origin,
            working_time_seconds,
            capacity,
            route: Vec::new(),
            on_board: HashSet::new(),
            detour_ratio: HashMap::new(),
            travel_time: 0,
            here,
            next_loc: None,
        }
    }

    /// Whether this vehicle's shift has ended by `now`.
    pub fn expired(&self, now: u64) -> bool {
        self.start_time + self.working_time_seconds <= now
    }

    /// Seats currently occupied, recomputed from `on_board` rather than tracked
    /// incrementally (the original `num_users` bookkeeping had a membership-test
    /// bug; recomputation sidesteps it entirely).
    pub fn occupied_seats(&self, requests: &HashMap<RequestId, Request>) -> u32 {
        self.on_board
            .iter()
            .filter_map(|id| requests.get(id))
            .map(|r| r.party_size)
            .sum()
    }

    /// True if any on-board rider's detour ratio exceeds `limit`.
    pub fn has_detour_violation(&self, limit: f64) -> bool {
        self.detour_ratio.values().any(|&ratio| ratio > limit)
    }

    /// Reset plan state ahead of a fresh decode, keeping identity and the
    /// previously committed `(here, next_loc)` promise intact.
    pub fn reset_plan(&mut self) {
        self.route.clear();
        self.on_board.clear();
        self.detour_ratio.clear();
        self.travel_time = 0;
    }

    /// Advance `here`/`next_loc` to the committed route's first stop whose
    /// cumulative time strictly exceeds elapsed shift time (§4.7 step 4).
    pub fn advance(&mut self, now: u64) {
        let elapsed = now.saturating_sub(self.start_time);
        match self.route.iter().position(|e| e.cumulative_seconds > elapsed) {
            Some(0) => {
                self.here = Stop::new(self.origin, StopOwner::VehicleOrigin(self.id));
                self.next_loc = Some(Stop::new(self.route[0].location, self.route[0].owner));
            }
            Some(idx) => {
                let prev = self.route[idx - 1];
                self.here = Stop::new(prev.location, prev.owner);
                self.next_loc = Some(Stop::new(self.route[idx].location, self.route[idx].owner));
            }
            None => {
                if let Some(last) = self.route.last() {
                    self.here = Stop::new(last.location, last.owner);
                }
                self.next_loc = None;
            }
        }
    }
}
