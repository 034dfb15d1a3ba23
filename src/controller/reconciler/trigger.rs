//! # Trigger Gate
//!
//! Every status write is itself a watch event. The gate decides whether a
//! delivered object needs a pass, so the controller does not re-run records
//! whose last pass already covers their current spec.

use crate::constants::RECONCILE_ANNOTATION;
use crate::controller::backoff::RetrySchedule;
use crate::crd::{Condition, ConditionState, ManagedResource};
use kube::ResourceExt;
use std::time::Duration;

/// Outcome of the gate for one delivered object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Converge now
    Run,
    /// The last pass covers this object; wait for the next change
    Skip,
    /// A retry is already scheduled; check again after the delay
    Defer(Duration),
}

/// Decide whether `obj` needs a reconciliation pass
pub fn evaluate<K: ManagedResource>(obj: &K, schedule: RetrySchedule) -> Trigger {
    let Some(status) = obj.resource_status() else {
        return Trigger::Run;
    };
    if status.observed_generation != obj.meta().generation {
        return Trigger::Run;
    }
    if status.reconcile_request.as_ref() != obj.annotations().get(RECONCILE_ANNOTATION) {
        return Trigger::Run;
    }

    match status.latest().and_then(Condition::state) {
        Some(ConditionState::Ready) => Trigger::Skip,
        Some(ConditionState::Failed) => match schedule {
            RetrySchedule::Pending(remaining) => Trigger::Defer(remaining),
            RetrySchedule::Halted => Trigger::Skip,
            RetrySchedule::Idle => Trigger::Run,
        },
        None => Trigger::Run,
    }
}
