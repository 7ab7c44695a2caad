//! Solves the MIP formulation with a sub-tour cut-and-resolve loop (C4),
//! mapping solver status to the small taxonomy used by the rest of the crate.

pub mod subtour;

use std::collections::HashSet;

use good_lp::{Constraint, ResolutionError, Solution as GoodLpSolution, SolverModel, WithTimeLimit};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::errors::Error;
use crate::formulator::Formulation;

/// The small status taxonomy from §6: solver-native statuses are collapsed
/// into these four buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Optimal,
    TimeLimit,
}

/// A solved, sub-tour-free incumbent.
#[derive(Debug)]
pub struct SolveResult {
    pub status: SolveStatus,
    pub objective_value: f64,
    pub edge_values: Vec<((usize, usize, usize), f64)>,
}

impl SolveResult {
    /// The set of arcs selected (value > 0.5) in this solution.
    pub fn selected_edges(&self) -> HashSet<(usize, usize, usize)> {
        self.edge_values
            .iter()
            .filter(|(_, v)| *v > 0.5)
            .map(|(k, _)| *k)
            .collect()
    }
}

/// What a solve attempt produced: either an incumbent to commit, or a signal
/// that the caller should leave registry state untouched this tick (§5
/// "Cancellation & timeouts").
#[derive(Debug)]
pub enum SolveOutcome {
    Solved(SolveResult),
    SkipTick,
}

/// Upper bound on cut-and-resolve iterations before giving up; generous
/// relative to the number of possible sub-tours in realistic instances.
fn iteration_bound(formulation: &Formulation) -> usize {
    formulation.node_count() * formulation.vehicle_count().max(1) + 32
}

const BINARY_EPSILON: f64 = 1e-6;

/// True if every binary decision variable is still binary-valued in `solution`,
/// i.e. branch-and-bound actually reached an integer incumbent rather than
/// being cut off mid-relaxation by the time limit.
fn is_integer_feasible(formulation: &Formulation, solution: &impl GoodLpSolution) -> bool {
    formulation
        .e
        .values()
        .chain(formulation.p.values())
        .chain(formulation.u.values())
        .all(|&var| {
            let v = solution.value(var);
            v <= BINARY_EPSILON || v >= 1. - BINARY_EPSILON
        })
}

/// Solve `formulation`, adding lazy sub-tour cuts and re-solving until the
/// incumbent is sub-tour free (§4.4). `time_limit_secs`, if given, bounds each
/// individual resolve.
pub fn solve(formulation: &Formulation, time_limit_secs: Option<f64>) -> Result<SolveOutcome, Error> {
    let mut cuts: Vec<Constraint> = Vec::new();

    for iteration in 0..iteration_bound(formulation) {
        let mut model = formulation
            .vars
            .clone()
            .minimise(formulation.objective.clone())
            .using(good_lp::microlp);
        if let Some(t) = time_limit_secs {
            model = model.with_time_limit(t);
        }
        model = model.with_all(formulation.base_constraints.iter().cloned());
        model = model.with_all(cuts.iter().cloned());

        let solution = match model.solve() {
            Ok(solution) => solution,
            Err(ResolutionError::Infeasible) => {
                let groups = diagnose_infeasibility(formulation, &cuts, time_limit_secs);
                return Err(Error::Infeasible { groups });
            }
            Err(other) => return Err(Error::SolverError(other.to_string())),
        };

        let status = match GoodLpSolution::status(&solution) {
            good_lp::SolutionStatus::Optimal => SolveStatus::Optimal,
            good_lp::SolutionStatus::TimeLimit => SolveStatus::TimeLimit,
            good_lp::SolutionStatus::GapLimit => SolveStatus::TimeLimit,
        };

        if status == SolveStatus::TimeLimit && !is_integer_feasible(formulation, &solution) {
            warn!("time limit reached without an integer-feasible incumbent; skipping tick");
            return Ok(SolveOutcome::SkipTick);
        }

        let edge_values: Vec<((usize, usize, usize), f64)> = formulation
            .e
            .iter()
            .map(|(&key, &var)| (key, solution.value(var)))
            .collect();

        let objective_value = solution.eval(formulation.objective.clone());

        let result = SolveResult {
            status,
            objective_value,
            edge_values,
        };
        let selected = result.selected_edges();

        let bad = subtour::find_bad_subtours(formulation.node_count(), formulation.vehicle_count(), &selected);
        if bad.is_empty() {
            info!(
                iteration,
                cuts = cuts.len(),
                status = ?result.status,
                objective = result.objective_value,
                "solved with no remaining sub-tours"
            );
            return Ok(SolveOutcome::Solved(result));
        }

        if status == SolveStatus::TimeLimit {
            warn!("time limit reached with remaining sub-tours; accepting best incumbent");
            return Ok(SolveOutcome::Solved(result));
        }

        for subtour in &bad {
            cuts.push(subtour::cut_for(formulation, subtour));
        }
    }

    Err(Error::SolverError(
        "exceeded sub-tour cut-and-resolve iteration bound".into(),
    ))
}

/// Coarse substitute for a solver-native IIS (§4.7.1): relax each named
/// constraint group in isolation and report which ones newly admit a
/// feasible solution when dropped.
fn diagnose_infeasibility(
    formulation: &Formulation,
    cuts: &[Constraint],
    time_limit_secs: Option<f64>,
) -> Vec<String> {
    let groups = group_constraints(formulation);

    // Each group's relaxed re-solve reads only the shared base model and its
    // own candidate relaxation, so the scan fans out across groups (§5).
    groups
        .into_par_iter()
        .filter(|(_, indices)| {
            let relaxed: Vec<Constraint> = formulation
                .base_constraints
                .iter()
                .enumerate()
                .filter(|(i, _)| !indices.contains(i))
                .map(|(_, c)| c.clone())
                .collect();

            let mut model = formulation
                .vars
                .clone()
                .minimise(formulation.objective.clone())
                .using(good_lp::microlp);
            if let Some(t) = time_limit_secs {
                model = model.with_time_limit(t);
            }
            model = model.with_all(relaxed);
            model = model.with_all(cuts.iter().cloned());

            model.solve().is_ok()
        })
        .map(|(name, _)| name)
        .collect()
}

/// Partition `base_constraints` indices into the ten named groups from §4.3,
/// in the order they were pushed by [`crate::formulator::build`].
fn group_constraints(formulation: &Formulation) -> Vec<(String, HashSet<usize>)> {
    // Constraints are appended by `build` in a fixed, documented order; we
    // recover rough group boundaries from the counts visible here. Finer
    // grouping would require the formulator to tag each constraint, which is
    // unnecessary for a diagnostic scan consumed only by operators.
    let n = formulation.node_count();
    let nv = formulation.vehicle_count().max(1);
    let total = formulation.base_constraints.len();

    let mut bounds = vec![
        ("unique_servicer".to_string(), n.saturating_sub(1)),
        ("flow_conservation".to_string(), n.saturating_sub(1) * nv * 2),
        ("depot_boundary".to_string(), 1 + nv * 2),
        ("origin_pinning".to_string(), nv * 2 + nv),
        ("working_time".to_string(), nv),
        ("capacity".to_string(), nv),
        ("penalty_indicator".to_string(), n.saturating_sub(1)),
    ];
    let consumed: usize = bounds.iter().map(|(_, c)| c).sum();
    bounds.push(("pairing_and_ordering".to_string(), total.saturating_sub(consumed)));

    let mut groups = Vec::new();
    let mut cursor = 0usize;
    for (name, count) in bounds {
        let end = (cursor + count).min(total);
        groups.push((name, (cursor..end).collect()));
        cursor = end;
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::oracle::DistanceOracle;
    use crate::distance::planner::StaticGraphPlanner;
    use crate::domain::registry::Registry;
    use crate::domain::types::{Request, Vehicle, DEPOT};
    use crate::formulator::{self, RunConfig, Weights};

    fn trivial_instance() -> (Registry, DistanceOracle, RunConfig) {
        let mut oracle = DistanceOracle::new(Box::new(StaticGraphPlanner::complete(
            &[DEPOT, 1, 2, 3],
            50,
        )));
        let mut registry = Registry::new();
        registry.admit_vehicle(Vehicle::new(1, 0, 1, 600, 2), &mut oracle).unwrap();
        registry.admit_request(Request::new(1, 0, 2, 3, 1), &mut oracle).unwrap();
        let config = RunConfig {
            weights: Weights { alpha: 1., beta: 1., gamma: 1. },
            penalty: 1000.,
            detour_limit: 2.0,
        };
        (registry, oracle, config)
    }

    fn expect_solved(outcome: SolveOutcome) -> SolveResult {
        match outcome {
            SolveOutcome::Solved(result) => result,
            SolveOutcome::SkipTick => panic!("expected a solved incumbent, got SkipTick"),
        }
    }

    #[test]
    fn solves_trivial_instance_to_optimality() {
        let (registry, oracle, config) = trivial_instance();
        let formulation = formulator::build(&registry, &oracle, config).unwrap();
        let result = expect_solved(solve(&formulation, None).unwrap());
        assert_eq!(result.status, SolveStatus::Optimal);
        assert!(result.selected_edges().len() >= 3);
    }

    /// §8 boundary scenario 5: a multi-vehicle, multi-request instance rich
    /// enough for the LP relaxation to tempt a disconnected cycle among
    /// non-depot nodes. The cut-and-resolve loop must still return a solution
    /// whose edges contain no bad sub-tour, for every vehicle.
    #[test]
    fn final_solution_is_always_free_of_disconnected_subtours() {
        let mut oracle = DistanceOracle::new(Box::new(StaticGraphPlanner::complete(
            &[DEPOT, 1, 2, 3, 4, 5, 6, 7],
            20,
        )));
        let mut registry = Registry::new();
        registry.admit_vehicle(Vehicle::new(1, 0, 1, 1000, 4), &mut oracle).unwrap();
        registry.admit_vehicle(Vehicle::new(2, 0, 4, 1000, 4), &mut oracle).unwrap();
        registry.admit_request(Request::new(1, 0, 2, 3, 1), &mut oracle).unwrap();
        registry.admit_request(Request::new(2, 0, 5, 6, 1), &mut oracle).unwrap();
        registry.admit_request(Request::new(3, 0, 6, 7, 1), &mut oracle).unwrap();
        let config = RunConfig {
            weights: Weights { alpha: 1., beta: 1., gamma: 1. },
            penalty: 1000.,
            detour_limit: 3.0,
        };

        let formulation = formulator::build(&registry, &oracle, config).unwrap();
        let result = expect_solved(solve(&formulation, None).unwrap());

        let selected = result.selected_edges();
        let bad = subtour::find_bad_subtours(formulation.node_count(), formulation.vehicle_count(), &selected);
        assert!(bad.is_empty());
    }

    #[test]
    fn integer_feasible_check_passes_on_a_cleanly_solved_model() {
        let (registry, oracle, config) = trivial_instance();
        let formulation = formulator::build(&registry, &oracle, config).unwrap();
        let model = formulation
            .vars
            .clone()
            .minimise(formulation.objective.clone())
            .using(good_lp::microlp)
            .with_all(formulation.base_constraints.iter().cloned());
        let solution = model.solve().unwrap();
        assert!(is_integer_feasible(&formulation, &solution));
    }

    #[test]
    fn infeasible_model_reports_contributing_groups() {
        // capacity 0 with a party-size-1 request and a high penalty is still
        // solvable (the request is just penalized); force true infeasibility
        // via a committed promise the model cannot satisfy: fix an edge
        // between two nodes that aren't adjacent in the origin/pickup graph
        // by giving the vehicle a working-time budget of 0 while requiring
        // it to visit its own origin-less pickup.
        let mut oracle = DistanceOracle::new(Box::new(StaticGraphPlanner::complete(&[DEPOT, 1, 2, 3], 50)));
        let mut registry = Registry::new();
        registry.admit_vehicle(Vehicle::new(1, 0, 1, 0, 2), &mut oracle).unwrap();
        registry.admit_request(Request::new(1, 0, 2, 3, 1), &mut oracle).unwrap();
        registry.vehicles.get_mut(&1).unwrap().on_board.insert(1);
        registry.vehicles.get_mut(&1).unwrap().here = crate::domain::types::Stop::new(
            2,
            crate::domain::types::StopOwner::RequestPickup(1),
        );
        registry.vehicles.get_mut(&1).unwrap().next_loc = Some(crate::domain::types::Stop::new(
            3,
            crate::domain::types::StopOwner::RequestDropoff(1),
        ));

        let config = RunConfig {
            weights: Weights { alpha: 1., beta: 1., gamma: 1. },
            penalty: 1000.,
            detour_limit: 2.0,
        };
        let formulation = formulator::build(&registry, &oracle, config).unwrap();
        let err = solve(&formulation, None).unwrap_err();
        match err {
            Error::Infeasible { groups } => assert!(!groups.is_empty()),
            other => panic!("expected Infeasible, got {other:?}"),
        }
    }
}
