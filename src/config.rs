//! Tunable constants and the runtime solve policy.
//!
//! Mirrors the teacher crate's `config::constant` module: numeric knobs the
//! rest of the crate imports by name instead of re-deriving inline.

pub mod constant {
    /// Point-equality tolerance for geometry predicates.
    pub const EPSILON_GEOM: f64 = 1e-6;

    /// Matrix-vs-trajectory reconciliation tolerance, expressed as an
    /// absolute term; callers combine it with a relative term
    /// (`1e-6 * length`) per spec §8 property 1.
    pub const EPSILON_LENGTH: f64 = 1e-3;

    /// Escape-point clearance added outside a threat disk's radius.
    pub const THREAT_MARGIN: f64 = 0.5;

    /// Default Held-Karp candidate cap `K`; above this the greedy
    /// fallback runs instead of the exact DP (spec §4.5).
    pub const DEFAULT_CANDIDATE_CAP: usize = 12;

    /// Default soft per-vehicle allocation cap used by the `efficient`
    /// and `exclusive` strategies (spec §4.4).
    pub const DEFAULT_SOFT_ALLOCATION_CAP: usize = 12;

    /// Default bound on the per-solve worker pool: `min(8, #enabled
    /// vehicles)` per spec §5.
    pub const DEFAULT_WORKER_POOL_CAP: usize = 8;

    /// `ε` added to the insertion-delta-length denominator in the
    /// `efficient` allocator's value ratio, to avoid division by zero
    /// for a target that lands exactly on an existing leg.
    pub const AUCTION_EPSILON: f64 = 1e-3;

    /// Default per-vehicle solver deadline.
    pub const DEFAULT_VEHICLE_TIMEOUT_MS: u64 = 2_000;

    /// Bounded iteration cap for 2-opt uncrossing (spec §4.6).
    pub const TWO_OPT_ITERATION_CAP: usize = 200;
}

/// Allocation strategy tag (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStrategy {
    #[default]
    Efficient,
    Greedy,
    Balanced,
    Geographic,
    Exclusive,
}

/// Which post-optimizers to run, and in what (fixed) order — spec §4.6/§5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PostOptFlags {
    pub insert_missed: bool,
    pub trajectory_swap: bool,
    pub two_opt: bool,
}

impl Default for PostOptFlags {
    fn default() -> Self {
        PostOptFlags {
            insert_missed: true,
            trajectory_swap: true,
            two_opt: true,
        }
    }
}

/// Runtime-overridable solve policy (spec §6 "Solve policy").
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SolvePolicy {
    pub strategy: AllocationStrategy,
    pub post_opt: PostOptFlags,
    pub per_vehicle_timeout_ms: u64,
    pub max_candidates: usize,
    pub allocation_cap: usize,
}

impl Default for SolvePolicy {
    fn default() -> Self {
        SolvePolicy {
            strategy: AllocationStrategy::default(),
            post_opt: PostOptFlags::default(),
            per_vehicle_timeout_ms: constant::DEFAULT_VEHICLE_TIMEOUT_MS,
            max_candidates: constant::DEFAULT_CANDIDATE_CAP,
            allocation_cap: constant::DEFAULT_SOFT_ALLOCATION_CAP,
        }
    }
}
