pub mod environment;
pub mod error;
pub mod instruction;
pub mod measure;
pub mod multiclass;
pub mod params;
pub mod population;
pub mod program;
pub mod registers;
pub mod sampler;
pub mod symreg;

use fastrand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

pub use crate::error::{Error, Result};

// Draws a uniform index in [0, ceiling). A ceiling of zero returns zero rather than
// panicking, so callers can pass `len - offset` expressions without guarding.
pub(crate) fn random_below(rng: &mut Rng, ceiling: usize) -> usize {
    if ceiling == 0 {
        0
    } else {
        rng.usize(..ceiling)
    }
}

// Ephemeral random constant for floating-point registers: uniform in [-1, 1).
pub(crate) fn random_constant_value(rng: &mut Rng) -> f64 {
    (2.0 * rng.f64()) - 1.0
}

pub fn get_seed_value() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}
