//! Sub-tour detection and lazy-cut generation (C4).
//!
//! Pure and stateless given an edge-selection snapshot: the same routine
//! works whether invoked from this crate's outer cut-and-resolve loop or from
//! a true in-solver lazy-constraint callback on a backend that has one.

use std::collections::HashSet;

use good_lp::{Constraint, Expression, Variable};

use crate::formulator::Formulation;

/// A bad sub-tour found for one vehicle: the node set forming a disconnected
/// cycle, excluding the depot.
#[derive(Debug, Clone)]
pub struct BadSubtour {
    pub vehicle_index: usize,
    pub nodes: Vec<usize>,
}

/// Peel connected components from the selected edges of vehicle `k`, treating
/// each edge as undirected so that a route split across an arbitrary visit
/// order (a node with both a predecessor and a successor) still merges into
/// one component. Flow conservation bounds every non-depot node to at most
/// one predecessor and one successor under a given vehicle, so a node's
/// neighborhood is at most two nodes; a component is a bad sub-tour iff it
/// has at least 2 nodes, excludes the depot, and is a strict subset of all
/// nodes.
fn find_bad_subtours_for_vehicle(
    node_count: usize,
    vehicle_index: usize,
    selected: &HashSet<(usize, usize, usize)>,
) -> Vec<Vec<usize>> {
    let mut unvisited: HashSet<usize> = (0..node_count).collect();
    let mut components = Vec::new();

    while let Some(&start) = unvisited.iter().next() {
        let mut component = Vec::new();
        let mut stack = vec![start];
        unvisited.remove(&start);

        while let Some(current) = stack.pop() {
            component.push(current);

            let neighbors: Vec<usize> = (0..node_count)
                .filter(|&j| {
                    unvisited.contains(&j)
                        && (selected.contains(&(current, j, vehicle_index))
                            || selected.contains(&(j, current, vehicle_index)))
                })
                .collect();
            for j in neighbors {
                unvisited.remove(&j);
                stack.push(j);
            }
        }
        components.push(component);
    }

    components
        .into_iter()
        .filter(|c| c.len() >= 2 && c.len() < node_count && !c.contains(&0))
        .collect()
}

/// Scan every vehicle's selected edges for bad sub-tours.
pub fn find_bad_subtours(
    node_count: usize,
    vehicle_count: usize,
    selected: &HashSet<(usize, usize, usize)>,
) -> Vec<BadSubtour> {
    (0..vehicle_count)
        .flat_map(|k| {
            find_bad_subtours_for_vehicle(node_count, k, selected)
                .into_iter()
                .map(move |nodes| BadSubtour { vehicle_index: k, nodes })
        })
        .collect()
}

/// Build the lazy cut `sum_{i,j in T, i != j} e[i,j,k] <= |T| - 1` for a bad
/// sub-tour.
pub fn cut_for(formulation: &Formulation, subtour: &BadSubtour) -> Constraint {
    let vars: Vec<Variable> = subtour
        .nodes
        .iter()
        .flat_map(|&i| subtour.nodes.iter().filter(move |&&j| j != i).map(move |&j| (i, j)))
        .map(|(i, j)| formulation.e[&(i, j, subtour.vehicle_index)])
        .collect();

    let sum: Expression = vars.into_iter().sum();
    sum.leq((subtour.nodes.len() - 1) as f64)
}
