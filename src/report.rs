//! Pretty-printed "[Calls]" / "[Vehicles]" status tables (ambient Report component).

use colored::*;

use crate::domain::registry::Registry;

/// Render the current registry snapshot to stdout, mirroring the teacher's
/// colored before/after-optimization logging cadence.
pub fn print_status(now: u64, registry: &Registry) {
    println!("{}", format!("=== tick {now} ===").bold());
    print_calls(registry);
    print_vehicles(registry);
}

fn print_calls(registry: &Registry) {
    println!("{}", "[Calls]".cyan().bold());
    let mut ids: Vec<_> = registry.requests.keys().copied().collect();
    ids.sort_unstable();
    for id in ids {
        let r = &registry.requests[&id];
        let line = format!(
            "  #{id} party={} pickup={} dropoff={} vehicle={:?} wait={} travel={}",
            r.party_size, r.pickup, r.dropoff, r.assigned_vehicle, r.expected_waiting_time, r.expected_travel_time
        );
        match r.assigned_vehicle {
            Some(_) => println!("{}", line.green()),
            None => println!("{}", line.yellow()),
        }
    }
}

fn print_vehicles(registry: &Registry) {
    println!("{}", "[Vehicles]".cyan().bold());
    let mut ids: Vec<_> = registry.vehicles.keys().copied().collect();
    ids.sort_unstable();
    for id in ids {
        let v = &registry.vehicles[&id];
        let load: u32 = v.occupied_seats(&registry.requests);
        let line = format!(
            "  #{id} here={} next={:?} load={}/{} travel_time={}/{}",
            v.here.location, v.next_loc.map(|s| s.location), load, v.capacity, v.travel_time, v.working_time_seconds
        );
        if load > v.capacity {
            println!("{}", line.red());
        } else {
            println!("{line}");
        }
    }
}
