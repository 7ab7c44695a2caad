//! Memoized point-to-point travel-time provider (C1).

use std::collections::HashMap;

use crate::distance::planner::ShortestPathPlanner;
use crate::domain::types::{Location, DEPOT};

/// A cost representing "unreachable" — large enough that the working-time
/// budget constraint (§4.3 constraint 6) forbids any route crossing it,
/// without propagating a hard process error (§7: oracle failure is not fatal).
pub const UNREACHABLE_COST: u64 = 1_000_000_000;

/// Sparse, not-assumed-symmetric `(Location, Location) -> seconds` table,
/// backed by a [`ShortestPathPlanner`]. Entries are additively grown and never
/// evicted within a run; this is the only source of edge costs consumed by
/// the formulator and the repair loop.
pub struct DistanceOracle {
    planner: Box<dyn ShortestPathPlanner>,
    table: HashMap<(Location, Location), u64>,
}

impl DistanceOracle {
    pub fn new(planner: Box<dyn ShortestPathPlanner>) -> Self {
        DistanceOracle {
            planner,
            table: HashMap::new(),
        }
    }

    /// Compute and store the cost for `(a, b)` if absent. A no-op if already
    /// memoized.
    pub fn ensure(&mut self, a: Location, b: Location) {
        if self.table.contains_key(&(a, b)) {
            return;
        }

        let cost = if a == DEPOT || b == DEPOT {
            0
        } else {
            self.planner.init();
            self.planner.astar(a, b).unwrap_or(UNREACHABLE_COST)
        };

        self.table.insert((a, b), cost);
    }

    /// Read the memoized cost for `(a, b)`. Panics if `ensure` was never
    /// called for this pair — callers (formulator, decoder, repair loop) are
    /// expected to warm the oracle during admission before reading from it.
    pub fn cost(&self, a: Location, b: Location) -> u64 {
        if a == DEPOT || b == DEPOT {
            return 0;
        }
        *self
            .table
            .get(&(a, b))
            .unwrap_or_else(|| panic!("distance oracle queried for un-warmed pair ({a}, {b})"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::planner::StaticGraphPlanner;

    #[test]
    fn depot_pairs_are_always_zero_cost() {
        let mut oracle = DistanceOracle::new(Box::new(StaticGraphPlanner::complete(&[1, 2], 50)));
        oracle.ensure(DEPOT, 1);
        assert_eq!(oracle.cost(DEPOT, 1), 0);
        assert_eq!(oracle.cost(1, DEPOT), 0);
    }

    #[test]
    fn ensure_memoizes_planner_result() {
        let mut oracle = DistanceOracle::new(Box::new(StaticGraphPlanner::complete(&[1, 2], 77)));
        oracle.ensure(1, 2);
        assert_eq!(oracle.cost(1, 2), 77);
    }

    #[test]
    fn unreachable_pair_becomes_prohibitive_cost() {
        let mut planner = StaticGraphPlanner::new();
        planner.add_bidirectional_edge(1, 2, 10);
        let mut oracle = DistanceOracle::new(Box::new(planner));
        oracle.ensure(1, 3);
        assert_eq!(oracle.cost(1, 3), UNREACHABLE_COST);
    }

    #[test]
    fn repeated_ensure_does_not_change_memoized_value() {
        let mut oracle = DistanceOracle::new(Box::new(StaticGraphPlanner::complete(&[1, 2], 10)));
        oracle.ensure(1, 2);
        oracle.ensure(1, 2);
        assert_eq!(oracle.cost(1, 2), 10);
    }
}
