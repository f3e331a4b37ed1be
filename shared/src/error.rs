use crate::vehicle::NetRole;
use thiserror::Error;

/// Why the authority refused a move. A rejected move changes nothing.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum MoveRejection {
    #[error("invalid move input (throttle {throttle}, steering {steering_throw})")]
    InvalidInput { throttle: f32, steering_throw: f32 },

    #[error("move duration {delta_time} is not a positive number of seconds")]
    BadDuration { delta_time: f32 },

    #[error("client running ahead: simulated {proposed:.3}s against world time {world_time:.3}s")]
    RunningAhead { proposed: f64, world_time: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum VehicleError {
    #[error(transparent)]
    Rejected(#[from] MoveRejection),

    #[error("no kart with id {0}")]
    UnknownVehicle(u32),

    #[error("{operation} needs the {expected} role but this vehicle is {actual}")]
    WrongRole {
        operation: &'static str,
        expected: NetRole,
        actual: NetRole,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_messages() {
        let invalid = MoveRejection::InvalidInput {
            throttle: 1.2,
            steering_throw: 0.0,
        };
        assert!(invalid.to_string().contains("1.2"));

        let ahead = MoveRejection::RunningAhead {
            proposed: 2.5,
            world_time: 2.0,
        };
        assert_eq!(
            ahead.to_string(),
            "client running ahead: simulated 2.500s against world time 2.000s"
        );
    }

    #[test]
    fn test_vehicle_error_wraps_rejection() {
        let err: VehicleError = MoveRejection::RunningAhead {
            proposed: 1.0,
            world_time: 0.5,
        }
        .into();
        assert!(matches!(err, VehicleError::Rejected(_)));

        let wrong = VehicleError::WrongRole {
            operation: "receive_move",
            expected: NetRole::Authority,
            actual: NetRole::Observer,
        };
        assert_eq!(
            wrong.to_string(),
            "receive_move needs the Authority role but this vehicle is Observer"
        );
    }
}
