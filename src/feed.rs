//! CSV-driven request/vehicle feed (ambient Feed component, §3.1/§6).

use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::domain::types::{Location, Request, RequestId, Vehicle, VehicleId};
use crate::errors::Error;

const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

fn parse_timestamp(raw: &str) -> Result<u64, Error> {
    let parsed = NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map_err(|e| Error::Feed(csv::Error::from(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))))?;
    Ok(parsed.and_utc().timestamp().max(0) as u64)
}

#[derive(Debug, Deserialize)]
struct RequestRow {
    time: String,
    id: RequestId,
    #[serde(rename = "pick up")]
    pickup: Location,
    #[serde(rename = "drop off")]
    dropoff: Location,
    num: u32,
}

#[derive(Debug, Deserialize)]
struct VehicleRow {
    time: String,
    id: VehicleId,
    location: Location,
    #[serde(rename = "working time")]
    working_time: u64,
    capacity: u32,
}

/// A request admission queued for a future tick, ordered by arrival time.
pub struct PendingRequest {
    pub time: u64,
    pub request: Request,
}

/// A vehicle admission queued for a future tick, ordered by arrival time.
pub struct PendingVehicle {
    pub time: u64,
    pub vehicle: Vehicle,
}

/// Reads the request/vehicle CSV feeds up front and hands rows to the
/// orchestrator in arrival order, draining as each tick admits them.
pub struct Feed {
    pub pending_requests: Vec<PendingRequest>,
    pub pending_vehicles: Vec<PendingVehicle>,
}

impl Feed {
    pub fn load(requests_path: &str, vehicles_path: &str) -> Result<Self, Error> {
        let mut pending_requests = Vec::new();
        let mut reader = csv::Reader::from_path(requests_path)?;
        for record in reader.deserialize::<RequestRow>() {
            let row = record?;
            let time = parse_timestamp(&row.time)?;
            pending_requests.push(PendingRequest {
                time,
                request: Request::new(row.id, time, row.pickup, row.dropoff, row.num),
            });
        }
        pending_requests.sort_by_key(|p| p.time);

        let mut pending_vehicles = Vec::new();
        let mut reader = csv::Reader::from_path(vehicles_path)?;
        for record in reader.deserialize::<VehicleRow>() {
            let row = record?;
            let time = parse_timestamp(&row.time)?;
            pending_vehicles.push(PendingVehicle {
                time,
                vehicle: Vehicle::new(row.id, time, row.location, row.working_time, row.capacity),
            });
        }
        pending_vehicles.sort_by_key(|p| p.time);

        Ok(Feed { pending_requests, pending_vehicles })
    }

    /// Remove and return every pending request/vehicle whose arrival time is
    /// `<= now`, in arrival order. Both lists are kept sorted by arrival time,
    /// so due rows are always a prefix.
    pub fn drain_due(&mut self, now: u64) -> (Vec<Request>, Vec<Vehicle>) {
        let split = self.pending_requests.iter().take_while(|p| p.time <= now).count();
        let due_requests = self.pending_requests.drain(..split).map(|p| p.request).collect();

        let split = self.pending_vehicles.iter().take_while(|p| p.time <= now).count();
        let due_vehicles = self.pending_vehicles.drain(..split).map(|p| p.vehicle).collect();

        (due_requests, due_vehicles)
    }

    /// The arrival time of the earliest still-pending request or vehicle, if
    /// any. Both lists are kept sorted, so this is just their fronts' minimum.
    pub fn next_event_time(&self) -> Option<u64> {
        let next_request = self.pending_requests.first().map(|p| p.time);
        let next_vehicle = self.pending_vehicles.first().map(|p| p.time);
        match (next_request, next_vehicle) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }
}
