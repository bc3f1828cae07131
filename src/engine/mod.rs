pub mod allowance;
pub mod couriers;
pub mod dispatch;
pub mod intake;
pub mod ledger;

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::models::order::Timing;

pub(crate) fn require_role(actor: &Actor, role: Role, action: &str) -> Result<(), AppError> {
    if actor.role == role {
        Ok(())
    } else {
        Err(AppError::ConflictingState(format!(
            "{action} is not allowed for {:?}",
            actor.role
        )))
    }
}

pub(crate) fn validate_bags(bags_count: i32) -> Result<(), AppError> {
    if bags_count <= 0 {
        return Err(AppError::ValidationFailed(
            "bags_count must be > 0".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_timing(timing: &Timing, now: DateTime<Utc>) -> Result<(), AppError> {
    match timing {
        Timing::Asap => Ok(()),
        Timing::Scheduled { at } if *at > now => Ok(()),
        Timing::Scheduled { .. } => Err(AppError::ValidationFailed(
            "scheduled_at must be in the future".to_string(),
        )),
    }
}
