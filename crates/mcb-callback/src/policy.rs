//! Approve/reject/wait decisions.
//!
//! This is test scaffolding for exercising the node's retry paths, not a
//! security control. The sampler is a seedable, non-cryptographic generator;
//! signature nonces come from the OS source inside `mcb_crypto::signature`
//! and never from here.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::Action;

/// Wait-time hint, in seconds, attached to every WAIT decision.
pub const WAIT_TIME_SECS: &str = "60";

/// Key generation ceremonies are never randomly rejected.
pub const KEYGEN_REQUEST: &str = "keygen";

const APPROVE_BELOW: f64 = 0.80;
const REJECT_BELOW: f64 = 0.90;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    pub wait_time: Option<String>,
}

impl Decision {
    fn from_action(action: Action) -> Self {
        let wait_time = (action == Action::Wait).then(|| WAIT_TIME_SECS.to_string());
        Self { action, wait_time }
    }
}

/// Map one uniform draw in `[0, 1)` to an action.
pub fn action_for_draw(r: f64) -> Action {
    if r < APPROVE_BELOW {
        Action::Approve
    } else if r < REJECT_BELOW {
        Action::Reject
    } else {
        Action::Wait
    }
}

pub struct DecisionPolicy {
    random_reject: bool,
    sampler: Mutex<StdRng>,
}

impl DecisionPolicy {
    pub fn new(random_reject: bool) -> Self {
        Self::with_rng(random_reject, StdRng::from_entropy())
    }

    /// Fixed seed, for reproducible decision sequences.
    pub fn seeded(random_reject: bool, seed: u64) -> Self {
        Self::with_rng(random_reject, StdRng::seed_from_u64(seed))
    }

    fn with_rng(random_reject: bool, rng: StdRng) -> Self {
        Self {
            random_reject,
            sampler: Mutex::new(rng),
        }
    }

    pub fn decide(&self, request_type: &str) -> Decision {
        if !self.random_reject || request_type == KEYGEN_REQUEST {
            return Decision::from_action(Action::Approve);
        }
        let r: f64 = {
            // A poisoned sampler still holds a usable generator
            let mut rng = self.sampler.lock().unwrap_or_else(|e| e.into_inner());
            rng.gen()
        };
        Decision::from_action(action_for_draw(r))
    }
}
