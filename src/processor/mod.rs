//! Per-body processing before transmission
//!
//! A [`BodyProcessor`] inspects one body and may alter it. An
//! [`AmbiguityEvaluator`] is the narrower, pure case: it only decides
//! whether one ambiguity bit applies, and [`Flagging`] turns it into a
//! processor that sets the bit. Evaluators cannot judge a body with
//! missing joints; they report "no" rather than failing.

mod arm;
mod sitting;

pub use arm::{ArmSide, MissingArmEvaluator};
pub use sitting::SittingEvaluator;

use crate::body::{AmbiguityFlags, BodyRecord};

/// Processes one body, returning whether it was altered
pub trait BodyProcessor: Send + Sync {
    fn process(&self, body: &mut BodyRecord) -> bool;
}

/// Pure predicate governing one ambiguity flag
pub trait AmbiguityEvaluator: Send + Sync {
    /// The flag this evaluator sets
    fn flag(&self) -> AmbiguityFlags;

    /// Whether the flag applies to `body`
    fn should_flag(&self, body: &BodyRecord) -> bool;
}

/// Adapter that ORs an evaluator's flag into bodies it matches
#[derive(Debug, Clone)]
pub struct Flagging<E>(pub E);

impl<E: AmbiguityEvaluator> BodyProcessor for Flagging<E> {
    fn process(&self, body: &mut BodyRecord) -> bool {
        if !self.0.should_flag(body) {
            return false;
        }
        let flag = self.0.flag();
        let altered = !body.ambiguity.contains(flag);
        body.ambiguity.insert(flag);
        altered
    }
}

/// Run every processor over every body in order
///
/// Returns the number of bodies altered by at least one processor.
pub fn process_bodies(processors: &[Box<dyn BodyProcessor>], bodies: &mut [BodyRecord]) -> usize {
    let mut altered = 0;
    for body in bodies.iter_mut() {
        let mut changed = false;
        for processor in processors {
            changed |= processor.process(body);
        }
        if changed {
            altered += 1;
        }
    }
    altered
}

/// Set each evaluator's flag on every body it matches
///
/// Returns the number of bodies that gained at least one flag.
pub fn apply_evaluators(evaluators: &[Box<dyn AmbiguityEvaluator>], bodies: &mut [BodyRecord]) -> usize {
    let mut flagged = 0;
    for body in bodies.iter_mut() {
        let before = body.ambiguity;
        for evaluator in evaluators {
            if evaluator.should_flag(body) {
                body.ambiguity.insert(evaluator.flag());
            }
        }
        if body.ambiguity != before {
            flagged += 1;
        }
    }
    flagged
}
