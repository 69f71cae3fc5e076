//! Segmented-mission state machine (C8, spec §4.8): chains C7 solves
//! across checkpoints, freezing the executed prefix of each segment and
//! replanning the remainder from live vehicle positions.

pub mod state;
pub mod validate;

pub use state::{CutOutcome, MissionState};
pub use validate::validate_mission;
