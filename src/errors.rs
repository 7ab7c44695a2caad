//! Typed error taxonomy (§7) with a process exit-code mapping.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("duplicate request id {0}")]
    DuplicateRequestId(u64),

    #[error("duplicate vehicle id {0}")]
    DuplicateVehicleId(u64),

    #[error("model is infeasible; contributing constraint groups: {groups:?}")]
    Infeasible { groups: Vec<String> },

    #[error("solver returned non-optimal, non-infeasible status: {0}")]
    SolverError(String),

    #[error("solver returned an inconsistent solution: {0}")]
    InconsistentSolution(String),

    #[error("honoring the committed promise for vehicle {vehicle_id} would make the model infeasible")]
    CommittedPromiseViolation { vehicle_id: u64 },

    #[error("failed to read feed: {0}")]
    Feed(#[from] csv::Error),
}

impl Error {
    /// Process exit code for this error, per §6's CLI contract.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::DuplicateRequestId(_) | Error::DuplicateVehicleId(_) => 2,
            Error::Infeasible { .. } => 3,
            Error::SolverError(_) => 4,
            Error::InconsistentSolution(_) => 5,
            Error::CommittedPromiseViolation { .. } => 6,
            Error::Feed(_) => 7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_ids_map_to_exit_code_two() {
        assert_eq!(Error::DuplicateRequestId(1).exit_code(), 2);
        assert_eq!(Error::DuplicateVehicleId(1).exit_code(), 2);
    }

    #[test]
    fn infeasible_maps_to_exit_code_three() {
        let err = Error::Infeasible { groups: vec!["capacity".into()] };
        assert_eq!(err.exit_code(), 3);
    }
}
