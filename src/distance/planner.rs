//! Pluggable shortest-path planner (ambient, consumed only as a pure function).
//!
//! The optimizer consumes a planner only through `init()` + `astar(a, b)`.
//! Applications may substitute a contraction-hierarchy or true-heuristic
//! planner without touching the [`DistanceOracle`](crate::distance::oracle::DistanceOracle).

use std::collections::{BinaryHeap, HashMap};
use std::cmp::Reverse;

use crate::domain::types::Location;

/// A shortest-path provider. Must be deterministic and side-effect free across
/// calls other than the internal reset performed by `init`.
pub trait ShortestPathPlanner {
    /// Reset any internal per-query search state.
    fn init(&mut self);

    /// Shortest travel time from `from` to `to` in seconds, or `None` if
    /// unreachable.
    fn astar(&mut self, from: Location, to: Location) -> Option<u64>;
}

/// A plain weighted adjacency-list graph, searched with a zero-heuristic A*
/// (equivalent to Dijkstra) on every query. Grounded on the same
/// binary-heap shortest-path shape used by a standard `DijkstraRouter`.
pub struct StaticGraphPlanner {
    edges: HashMap<Location, Vec<(Location, u64)>>,
}

impl StaticGraphPlanner {
    pub fn new() -> Self {
        StaticGraphPlanner { edges: HashMap::new() }
    }

    /// Add a directed edge with the given weight in seconds.
    pub fn add_edge(&mut self, from: Location, to: Location, seconds: u64) {
        self.edges.entry(from).or_default().push((to, seconds));
    }

    /// Add edges in both directions.
    pub fn add_bidirectional_edge(&mut self, a: Location, b: Location, seconds: u64) {
        self.add_edge(a, b, seconds);
        self.add_edge(b, a, seconds);
    }

    /// Build a fully-connected graph over `locations` with uniform edge
    /// weight `seconds`, useful as a demo/fixture planner when no road graph
    /// is supplied.
    pub fn complete(locations: &[Location], seconds: u64) -> Self {
        let mut g = StaticGraphPlanner::new();
        for &a in locations {
            for &b in locations {
                if a != b {
                    g.add_edge(a, b, seconds);
                }
            }
        }
        g
    }
}

impl Default for StaticGraphPlanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ShortestPathPlanner for StaticGraphPlanner {
    fn init(&mut self) {
        // No per-query search state survives between calls; nothing to reset.
    }

    fn astar(&mut self, from: Location, to: Location) -> Option<u64> {
        if from == to {
            return Some(0);
        }

        let mut dist: HashMap<Location, u64> = HashMap::new();
        let mut heap: BinaryHeap<Reverse<(u64, Location)>> = BinaryHeap::new();
        dist.insert(from, 0);
        heap.push(Reverse((0, from)));

        while let Some(Reverse((d, node))) = heap.pop() {
            if node == to {
                return Some(d);
            }
            if d > *dist.get(&node).unwrap_or(&u64::MAX) {
                continue;
            }
            if let Some(neighbours) = self.edges.get(&node) {
                for &(next, weight) in neighbours {
                    let next_dist = d + weight;
                    if next_dist < *dist.get(&next).unwrap_or(&u64::MAX) {
                        dist.insert(next, next_dist);
                        heap.push(Reverse((next_dist, next)));
                    }
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_shortest_path_through_intermediate_node() {
        let mut g = StaticGraphPlanner::new();
        g.add_bidirectional_edge(1, 2, 10);
        g.add_bidirectional_edge(2, 3, 10);
        g.add_bidirectional_edge(1, 3, 100);

        assert_eq!(g.astar(1, 3), Some(20));
    }

    #[test]
    fn unreachable_pair_returns_none() {
        let mut g = StaticGraphPlanner::new();
        g.add_bidirectional_edge(1, 2, 10);
        g.add_bidirectional_edge(3, 4, 10);

        assert_eq!(g.astar(1, 4), None);
    }

    #[test]
    fn same_location_is_zero_cost() {
        let mut g = StaticGraphPlanner::new();
        assert_eq!(g.astar(5, 5), Some(0));
    }

    #[test]
    fn complete_graph_has_uniform_cost_between_any_pair() {
        let mut g = StaticGraphPlanner::complete(&[1, 2, 3], 50);
        assert_eq!(g.astar(1, 2), Some(50));
        assert_eq!(g.astar(2, 3), Some(50));
    }
}
