//! Allocator (C4): partitions targets across vehicles under eligibility,
//! priority, and fuel-efficiency constraints (spec §4.4).

mod strategies;

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::SolvePolicy;
use crate::distance::DistanceMatrix;
use crate::domain::{Environment, Exclusion, ExclusionReason, Target, TargetId, VehicleContract, VehicleId};
use strategies::StrategyContext;

#[derive(Debug, Clone, Default)]
pub struct AllocationResult {
    pub assignment: BTreeMap<VehicleId, Vec<TargetId>>,
    pub excluded: Vec<Exclusion>,
}

/// Runs eligibility derivation (spec §4.7 step 2) then the chosen
/// strategy (spec §4.4). `cap_override` lets a caller (e.g. a post
/// optimizer, or a policy that explicitly relaxes the cap) bypass the
/// soft per-vehicle cap; absent an override, the cap is mandatory
/// because the exact DP in C5 is exponential in candidate count.
pub fn allocate(
    env: &Environment,
    vehicles: &[VehicleContract],
    matrix: &DistanceMatrix,
    policy: &SolvePolicy,
    cap_override: Option<usize>,
) -> AllocationResult {
    let cap = cap_override.unwrap_or(policy.allocation_cap);
    let enabled: Vec<&VehicleContract> = vehicles.iter().filter(|v| v.enabled).collect();

    let mut eligible: BTreeMap<TargetId, Vec<VehicleId>> = BTreeMap::new();
    let mut excluded = Vec::new();

    for t in &env.targets {
        if env.is_threatened(&t.position) {
            excluded.push(Exclusion { target_id: t.id.clone(), reason: ExclusionReason::InThreatZone });
            continue;
        }

        let sensor_ok: Vec<&VehicleContract> = enabled
            .iter()
            .filter(|v| v.eligibility.allows(&t.sensor_class))
            .copied()
            .collect();
        if sensor_ok.is_empty() {
            excluded.push(Exclusion { target_id: t.id.clone(), reason: ExclusionReason::NotEligible });
            continue;
        }

        let priority_ok: Vec<VehicleId> = sensor_ok
            .iter()
            .filter(|v| v.priority_filter.is_none_or(|f| f.matches(t.priority)))
            .map(|v| v.id.clone())
            .collect();
        if priority_ok.is_empty() {
            excluded.push(Exclusion { target_id: t.id.clone(), reason: ExclusionReason::PriorityFiltered });
            continue;
        }

        eligible.insert(t.id.clone(), priority_ok);
    }

    let candidate_targets: Vec<&Target> = env.targets.iter().filter(|t| eligible.contains_key(&t.id)).collect();

    let ctx = StrategyContext { env, matrix, vehicles, cap };
    let (assignment, at_cap_or_dominated) = strategies::assign(policy.strategy, &candidate_targets, &eligible, &ctx);

    debug!(
        strategy = ?policy.strategy,
        assigned = assignment.values().map(|v| v.len()).sum::<usize>(),
        excluded = excluded.len() + at_cap_or_dominated.len(),
        "allocation complete"
    );

    // The value-ratio auctions (`efficient`, and the remainder phase of
    // `exclusive`) lose a target to direct value competition; the
    // count/nearest-based strategies just hit a hard slot limit.
    let reason = match policy.strategy {
        crate::config::AllocationStrategy::Efficient | crate::config::AllocationStrategy::Exclusive => {
            ExclusionReason::DominatedLowValue
        }
        _ => ExclusionReason::CandidateLimit,
    };
    for tid in at_cap_or_dominated {
        excluded.push(Exclusion { target_id: tid, reason });
    }

    AllocationResult { assignment, excluded }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AllocationStrategy;
    use crate::distance::DistanceService;
    use crate::domain::{Airport, Eligibility, EndpointMode, NodeId, Threat};
    use crate::geometry::Point;

    fn base_env() -> Environment {
        Environment {
            airports: vec![Airport { id: "A".into(), position: Point::new(0.0, 0.0) }],
            targets: vec![
                Target { id: "T1".into(), position: Point::new(10.0, 0.0), priority: 5, sensor_class: "eo".into() },
                Target { id: "T2".into(), position: Point::new(0.0, 10.0), priority: 5, sensor_class: "ir".into() },
            ],
            threats: vec![],
            synthetic_starts: Default::default(),
        }
    }

    fn vehicle(id: &str, eligibility: Eligibility) -> VehicleContract {
        VehicleContract {
            id: id.into(),
            enabled: true,
            fuel_budget: 1000.0,
            start: NodeId::Airport("A".into()),
            end: EndpointMode::Return,
            eligibility,
            priority_filter: None,
            frozen_edges: vec![],
        }
    }

    #[test]
    fn eligibility_filters_by_sensor_class() {
        let env = base_env();
        let vehicles = vec![vehicle("D1", Eligibility::Classes(["eo".to_string()].into_iter().collect()))];
        let nodes = env.all_nodes();
        let mut svc = DistanceService::new();
        let matrix = svc.matrix(&env, &nodes);
        let policy = SolvePolicy { strategy: AllocationStrategy::Greedy, ..Default::default() };
        let result = allocate(&env, &vehicles, matrix, &policy, None);
        assert_eq!(result.assignment["D1"], vec!["T1".to_string()]);
        assert!(result.excluded.iter().any(|e| e.target_id == "T2" && e.reason == ExclusionReason::NotEligible));
    }

    #[test]
    fn threatened_target_is_excluded_up_front() {
        let mut env = base_env();
        env.threats.push(Threat { id: "Z".into(), center: Point::new(10.0, 0.0), radius: 1.0 });
        let vehicles = vec![vehicle("D1", Eligibility::All)];
        let nodes = env.all_nodes();
        let mut svc = DistanceService::new();
        let matrix = svc.matrix(&env, &nodes);
        let policy = SolvePolicy::default();
        let result = allocate(&env, &vehicles, matrix, &policy, None);
        assert!(result.excluded.iter().any(|e| e.target_id == "T1" && e.reason == ExclusionReason::InThreatZone));
    }
}
