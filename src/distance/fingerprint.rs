//! Environment fingerprinting (spec §4.2): a fingerprint over node
//! positions and threat disks keys the distance-matrix cache. An
//! unchanged fingerprint means the previously computed matrix can be
//! reused without recomputation.

use std::hash::{Hash, Hasher};

use crate::domain::{Environment, NodeId};

fn hash_f64(h: &mut impl Hasher, v: f64) {
    // Normalize -0.0 to 0.0 so bit-identical values hash identically
    // regardless of sign-of-zero quirks from upstream arithmetic.
    let v = if v == 0.0 { 0.0 } else { v };
    v.to_bits().hash(h);
}

pub fn fingerprint(env: &Environment, nodes: &[NodeId]) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();

    for node in nodes {
        node.hash(&mut hasher);
        if let Some(p) = env.position_of(node) {
            hash_f64(&mut hasher, p.x);
            hash_f64(&mut hasher, p.y);
        }
    }

    let mut threats: Vec<_> = env.threats.iter().collect();
    threats.sort_by(|a, b| a.id.cmp(&b.id));
    for t in threats {
        t.id.hash(&mut hasher);
        hash_f64(&mut hasher, t.center.x);
        hash_f64(&mut hasher, t.center.y);
        hash_f64(&mut hasher, t.radius);
    }

    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Airport, Threat};
    use crate::geometry::Point;

    fn env() -> Environment {
        Environment {
            airports: vec![Airport { id: "A".into(), position: Point::new(0.0, 0.0) }],
            targets: vec![],
            threats: vec![Threat { id: "T1".into(), center: Point::new(1.0, 1.0), radius: 2.0 }],
            synthetic_starts: Default::default(),
        }
    }

    #[test]
    fn identical_inputs_fingerprint_identically() {
        let e = env();
        let nodes = vec![NodeId::Airport("A".into())];
        assert_eq!(fingerprint(&e, &nodes), fingerprint(&e, &nodes));
    }

    #[test]
    fn moving_a_threat_changes_fingerprint() {
        let e = env();
        let mut e2 = env();
        e2.threats[0].radius = 3.0;
        let nodes = vec![NodeId::Airport("A".into())];
        assert_ne!(fingerprint(&e, &nodes), fingerprint(&e2, &nodes));
    }
}
