//! Builds the node set, indexes, variables, objective and constraints of the
//! routing program from a registry snapshot (C3).

use std::collections::HashMap;

use good_lp::{variable, Constraint, Expression, ProblemVariables, Variable};
use itertools::Itertools;

use crate::distance::oracle::DistanceOracle;
use crate::domain::registry::Registry;
use crate::domain::types::{Stop, StopOwner, VehicleId, DEPOT};
use crate::errors::Error;

/// Caller-supplied objective weights (§4.3: `alpha`, `beta`, `gamma`).
#[derive(Debug, Clone, Copy)]
pub struct Weights {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

/// Per-run configuration consumed by the formulator.
#[derive(Debug, Clone, Copy)]
pub struct RunConfig {
    pub weights: Weights,
    pub penalty: f64,
    pub detour_limit: f64,
}

/// A node of the indexed routing graph. `None` at index 0 denotes the depot.
pub type Node = Option<Stop>;

/// The indexed problem built from a registry snapshot, together with the
/// variables and constraints needed to solve it.
pub struct Formulation {
    pub vars: ProblemVariables,
    pub objective: Expression,
    pub base_constraints: Vec<Constraint>,

    pub nodes: Vec<Node>,
    pub vehicle_order: Vec<VehicleId>,

    /// `e[(i, j, k)]`
    pub e: HashMap<(usize, usize, usize), Variable>,
    /// `p[(i, k)]`
    pub p: HashMap<(usize, usize), Variable>,
    /// `u[i]`, `i != 0`
    pub u: HashMap<usize, Variable>,
}

impl Formulation {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicle_order.len()
    }
}

/// The location a node index resolves to; the depot node (index 0) carries
/// no `Stop`, so it resolves to the depot sentinel directly.
fn loc_of(nodes: &[Node], idx: usize) -> crate::domain::types::Location {
    match nodes[idx] {
        Some(stop) => stop.location,
        None => DEPOT,
    }
}

/// Build the MIP formulation from the current registry snapshot. Vehicles
/// whose shift has already ended must be expired by the caller before this
/// runs (§4.2).
pub fn build(registry: &Registry, oracle: &DistanceOracle, config: RunConfig) -> Result<Formulation, Error> {
    let vehicle_order: Vec<VehicleId> = registry.vehicles.keys().copied().sorted().collect();
    let nv = vehicle_order.len();

    // --- node indexing: depot first, then one stop per origin/pickup/dropoff ---
    let mut nodes: Vec<Node> = vec![None];
    let mut index_of: HashMap<Stop, usize> = HashMap::new();

    let mut origins: Vec<usize> = Vec::with_capacity(nv);
    for &vid in &vehicle_order {
        let vehicle = &registry.vehicles[&vid];
        let stop = Stop::new(vehicle.origin, StopOwner::VehicleOrigin(vid));
        let idx = nodes.len();
        nodes.push(Some(stop));
        index_of.insert(stop, idx);
        origins.push(idx);
    }

    let request_order: Vec<u64> = registry.requests.keys().copied().sorted().collect();
    let mut pickups: Vec<usize> = Vec::with_capacity(request_order.len());
    let mut dropoffs: Vec<usize> = Vec::with_capacity(request_order.len());
    for &rid in &request_order {
        let request = &registry.requests[&rid];
        let pu_stop = Stop::new(request.pickup, StopOwner::RequestPickup(rid));
        let pu_idx = nodes.len();
        nodes.push(Some(pu_stop));
        index_of.insert(pu_stop, pu_idx);
        pickups.push(pu_idx);

        let do_stop = Stop::new(request.dropoff, StopOwner::RequestDropoff(rid));
        let do_idx = nodes.len();
        nodes.push(Some(do_stop));
        index_of.insert(do_stop, do_idx);
        dropoffs.push(do_idx);
    }

    let n = nodes.len();

    // --- variables ---
    let mut vars = ProblemVariables::new();
    let mut e: HashMap<(usize, usize, usize), Variable> = HashMap::new();
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            for k in 0..nv {
                e.insert((i, j, k), vars.add(variable().binary()));
            }
        }
    }

    let mut p: HashMap<(usize, usize), Variable> = HashMap::new();
    for i in 0..n {
        for k in 0..nv {
            p.insert((i, k), vars.add(variable().binary()));
        }
    }

    let mut u: HashMap<usize, Variable> = HashMap::new();
    for i in 1..n {
        u.insert(i, vars.add(variable().binary()));
    }

    let mut s: HashMap<usize, Variable> = HashMap::new();
    for i in 1..n {
        s.insert(i, vars.add(variable().min(1).max(n as f64).integer()));
    }

    // --- objective ---
    let mut objective = Expression::from(0.);
    for ((i, j, _k), &var) in &e {
        let cost = oracle.cost(loc_of(&nodes, *i), loc_of(&nodes, *j));
        objective += config.weights.alpha * cost as f64 * var;
    }
    for &pu_idx in &pickups {
        let request = request_at(registry, nodes[pu_idx]);
        for k in 0..nv {
            let var = p[&(pu_idx, k)];
            objective += config.weights.beta * (-(request.party_size as f64)) * var;
        }
    }
    for i in 1..n {
        objective += config.weights.gamma * config.penalty * u[&i];
    }

    // --- constraints ---
    let mut cons: Vec<Constraint> = Vec::new();

    // 1. unique servicer
    for i in 1..n {
        let sum: Expression = (0..nv).map(|k| p[&(i, k)]).sum();
        cons.push(sum.leq(1.));
    }

    // 2 & 3. flow conservation, excluding origins and depot
    for i in 1..n {
        if origins.contains(&i) {
            continue;
        }
        for k in 0..nv {
            let out_sum: Expression = (0..n).filter(|&j| j != i).map(|j| e[&(i, j, k)]).sum();
            cons.push(out_sum.eq(p[&(i, k)]));

            let in_sum: Expression = (0..n).filter(|&j| j != i).map(|j| e[&(j, i, k)]).sum();
            cons.push(in_sum.eq(p[&(i, k)]));
        }
    }

    // 4. depot boundary
    let depot_servicer_sum: Expression = (0..nv).map(|k| p[&(0, k)]).sum();
    cons.push(depot_servicer_sum.eq(nv as f64));
    for k in 0..nv {
        let into_depot: Expression = (1..n).map(|i| e[&(i, 0, k)]).sum();
        cons.push(into_depot.eq(1.));
        let out_of_depot: Expression = (1..n).map(|j| e[&(0, j, k)]).sum();
        cons.push(out_of_depot.eq(0.));
    }

    // 5. origin pinning: vehicle k's own origin is serviced by k and has one
    // outgoing edge under k; no vehicle edge enters ANY origin (intentional,
    // §9: origins are one-shot source nodes, not merely "not its own").
    for (k, &origin_idx) in origins.iter().enumerate() {
        cons.push(Expression::from(p[&(origin_idx, k)]).eq(1.));
        let out_sum: Expression = (0..n).filter(|&j| j != origin_idx).map(|j| e[&(origin_idx, j, k)]).sum();
        cons.push(out_sum.eq(p[&(origin_idx, k)]));
    }
    for &origin_idx in &origins {
        let in_sum: Expression = (0..n)
            .filter(|&i| i != origin_idx)
            .flat_map(|i| (0..nv).map(move |k| (i, k)))
            .map(|(i, k)| e[&(i, origin_idx, k)])
            .sum();
        cons.push(in_sum.eq(0.));
    }

    // 6. working-time budget
    for (k, &vid) in vehicle_order.iter().enumerate() {
        let vehicle = &registry.vehicles[&vid];
        let total: Expression = (0..n)
            .flat_map(|i| (0..n).filter(move |&j| j != i).map(move |j| (i, j)))
            .map(|(i, j)| {
                let cost = oracle.cost(loc_of(&nodes, i), loc_of(&nodes, j));
                cost as f64 * e[&(i, j, k)]
            })
            .sum();
        cons.push(total.leq(vehicle.working_time_seconds as f64));
    }

    // 7. capacity
    for (k, &vid) in vehicle_order.iter().enumerate() {
        let vehicle = &registry.vehicles[&vid];
        let load: Expression = pickups
            .iter()
            .map(|&i| {
                let request = request_at(registry, nodes[i]);
                request.party_size as f64 * p[&(i, k)]
            })
            .sum();
        cons.push(load.leq(vehicle.capacity as f64));
    }

    // 8. penalty indicator
    for i in 1..n {
        let servicer_sum: Expression = (0..nv).map(|k| p[&(i, k)]).sum();
        cons.push((1. - servicer_sum).eq(u[&i]));
    }

    // 9. pair co-assignment
    for (&pu_idx, &do_idx) in pickups.iter().zip(dropoffs.iter()) {
        for k in 0..nv {
            cons.push(Expression::from(p[&(pu_idx, k)]).eq(p[&(do_idx, k)]));
        }
    }

    // 10. MTZ order
    for k in 0..nv {
        for i in 1..n {
            for j in 1..n {
                if i == j {
                    continue;
                }
                let edge = e[&(i, j, k)];
                cons.push((s[&i] - s[&j] - (n as f64) * (1. - edge)).leq(-1.));
            }
        }
    }
    for (&pu_idx, &do_idx) in pickups.iter().zip(dropoffs.iter()) {
        cons.push((s[&pu_idx] + 1.).leq(s[&do_idx]));
    }

    // --- warm-start / commitment (§4.3) ---
    for (k, &vid) in vehicle_order.iter().enumerate() {
        let vehicle = &registry.vehicles[&vid];
        for &request_id in &vehicle.on_board {
            if let Some(&pu_idx) = index_of.get(&Stop::new(
                registry.requests[&request_id].pickup,
                StopOwner::RequestPickup(request_id),
            )) {
                cons.push(Expression::from(p[&(pu_idx, k)]).eq(1.));
            }
        }
        if let Some(next) = vehicle.next_loc {
            if let (Some(&here_idx), Some(&next_idx)) = (index_of.get(&vehicle.here), index_of.get(&next)) {
                cons.push(Expression::from(e[&(here_idx, next_idx, k)]).eq(1.));
            }
        }
    }

    Ok(Formulation {
        vars,
        objective,
        base_constraints: cons,
        nodes,
        vehicle_order,
        e,
        p,
        u,
    })
}

fn request_at(registry: &Registry, node: Node) -> &crate::domain::types::Request {
    match node.expect("request_at called on depot node").owner {
        StopOwner::RequestPickup(id) | StopOwner::RequestDropoff(id) => &registry.requests[&id],
        StopOwner::VehicleOrigin(_) => panic!("request_at called on a vehicle-origin stop"),
    }
}
