//! Deterministic random number generation
//!
//! Uses xorshift64* algorithm for fast, deterministic random number generation.
//! CRITICAL: All randomness in the simulator MUST go through this module.
//! Mobility and job generation draw from the same stream, so the order in
//! which the engine consumes numbers is part of the reproducibility contract.

mod xorshift;

pub use xorshift::RngManager;
