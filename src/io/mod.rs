//! External wire formats (spec §6): environment snapshots, solutions,
//! and the segmented-mission on-disk JSON, plus legacy-import
//! reconciliation. Persistence itself — where bytes are read from or
//! written to — is explicitly out of scope (spec §1); these functions
//! only convert between in-memory records and JSON text.

pub mod wire;

pub use wire::{export_mission, import_mission, WireEnvironment};
