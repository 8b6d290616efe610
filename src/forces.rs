//! Gravitational accelerations, either summed exactly over every pair or
//! approximated through the Barnes-Hut quadtree.
//!
//! Both paths write straight into `BodyStore::acc`. The stored value is an
//! acceleration: `G * m_j * r / |r|^3` summed over the other bodies, so the
//! receiving body's own mass never enters.

use bevy::log::{info, warn};
use bevy::math::DVec2;

use crate::bodies::BodyStore;
use crate::quadtree::{BuildStats, QuadTree};
use crate::resources::SimConfig;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ForceMode {
    /// Exact O(N^2) pairwise summation.
    Direct,
    /// Tree traversal with the given opening angle.
    Tree { theta: f64 },
}

impl ForceMode {
    pub fn select(n: usize, config: &SimConfig) -> Self {
        if config.uses_tree(n) {
            ForceMode::Tree {
                theta: config.theta_for(n),
            }
        } else {
            ForceMode::Direct
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForceStats {
    pub mode: ForceMode,
    /// Present when the tree was rebuilt for this evaluation.
    pub build: Option<BuildStats>,
    /// Nodes approximated because opening them would overflow the traversal stack.
    pub stack_overflows: usize,
    /// The tree went from healthy to degraded, or back, with this build.
    pub degradation_changed: bool,
}

/// Fills in accelerations, picking the mode from the body count.
pub fn compute_accelerations(
    store: &mut BodyStore,
    tree: &mut QuadTree,
    config: &SimConfig,
) -> ForceStats {
    let mode = ForceMode::select(store.len(), config);
    compute_accelerations_with(mode, store, tree, config)
}

pub fn compute_accelerations_with(
    mode: ForceMode,
    store: &mut BodyStore,
    tree: &mut QuadTree,
    config: &SimConfig,
) -> ForceStats {
    match mode {
        ForceMode::Direct => {
            direct_accelerations(store, config);
            ForceStats {
                mode,
                build: None,
                stack_overflows: 0,
                degradation_changed: false,
            }
        }
        ForceMode::Tree { theta } => {
            let was_degraded = tree.stats().is_degraded();
            let build = tree.build(store, config);
            let degradation_changed = build.is_degraded() != was_degraded;
            if degradation_changed && build.is_degraded() {
                warn!(
                    "quadtree degraded: {} of {} bodies unplaced ({} refused allocations, {} depth-capped nodes, {} nodes)",
                    build.unplaced,
                    build.bodies,
                    build.refused_allocations,
                    build.depth_capped,
                    build.nodes
                );
            } else if degradation_changed {
                info!("quadtree recovered: all {} bodies placed", build.bodies);
            }

            let mut stack_overflows = 0;
            for i in 0..store.len() {
                let (acc, overflows) = tree.acceleration_at(store.pos[i], theta, config);
                store.acc[i] = acc;
                stack_overflows += overflows;
            }
            if stack_overflows > 0 {
                warn!("traversal stack full {stack_overflows} times, nodes approximated early");
            }

            ForceStats {
                mode,
                build: Some(build),
                stack_overflows,
                degradation_changed,
            }
        }
    }
}

/// Visits each unordered pair once and applies the pull to both bodies.
fn direct_accelerations(store: &mut BodyStore, config: &SimConfig) {
    let n = store.len();
    store.acc.fill(DVec2::ZERO);

    for i in 0..n {
        let xi = store.pos[i];
        let mi = store.mass[i];
        let mut acc_i = DVec2::ZERO;

        for j in (i + 1)..n {
            let r = store.pos[j] - xi;
            let r2 = r.length_squared() + config.softening;
            let inv_r = r2.sqrt().recip();
            let pull = r * (config.g * inv_r * inv_r * inv_r);

            acc_i += pull * store.mass[j];
            store.acc[j] -= pull * mi;
        }

        store.acc[i] += acc_i;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn random_store(seed: u64, n: usize) -> BodyStore {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut store = BodyStore::default();
        for _ in 0..n {
            let position = DVec2::new(rng.random_range(-50.0..50.0), rng.random_range(-50.0..50.0));
            store.push(position, DVec2::ZERO, rng.random_range(0.5..2.0));
        }
        store
    }

    /// Sum of per-body error magnitudes relative to the sum of exact magnitudes.
    fn relative_error(approx: &[DVec2], exact: &[DVec2]) -> f64 {
        let error: f64 = approx.iter().zip(exact).map(|(a, b)| (*a - *b).length()).sum();
        let scale: f64 = exact.iter().map(|a| a.length()).sum();
        error / scale
    }

    fn accelerations(mode: ForceMode, store: &BodyStore) -> Vec<DVec2> {
        let mut store = store.clone();
        let mut tree = QuadTree::default();
        compute_accelerations_with(mode, &mut store, &mut tree, &SimConfig::default());
        store.acc
    }

    #[test]
    fn mode_follows_body_count() {
        let config = SimConfig::default();
        assert_eq!(ForceMode::select(0, &config), ForceMode::Direct);
        assert_eq!(ForceMode::select(200, &config), ForceMode::Direct);
        assert_eq!(ForceMode::select(201, &config), ForceMode::Tree { theta: 0.7 });
        assert_eq!(ForceMode::select(10_001, &config), ForceMode::Tree { theta: 1.2 });
    }

    #[test]
    fn tree_converges_to_direct_as_theta_shrinks() {
        let store = random_store(42, 150);
        let exact = accelerations(ForceMode::Direct, &store);

        let coarse = relative_error(&accelerations(ForceMode::Tree { theta: 0.7 }, &store), &exact);
        let fine = relative_error(&accelerations(ForceMode::Tree { theta: 0.2 }, &store), &exact);
        let opened = relative_error(&accelerations(ForceMode::Tree { theta: 1e-6 }, &store), &exact);

        assert!(coarse < 0.05, "theta 0.7 error too large: {coarse}");
        assert!(fine < coarse, "error did not shrink: {fine} vs {coarse}");
        assert!(opened < 1e-10, "fully opened tree should be exact: {opened}");
    }

    #[test]
    fn direct_mode_conserves_momentum() {
        let mut store = random_store(5, 60);
        let mut tree = QuadTree::default();
        compute_accelerations(&mut store, &mut tree, &SimConfig::default());

        let net = store
            .acc
            .iter()
            .zip(&store.mass)
            .fold(DVec2::ZERO, |sum, (a, m)| sum + *a * *m);
        assert!(net.length() < 1e-10, "net force {net:?}");
    }

    #[test]
    fn pull_points_at_the_other_body() {
        let mut store = BodyStore::default();
        store.push(DVec2::ZERO, DVec2::ZERO, 1.0);
        store.push(DVec2::new(3.0, 0.0), DVec2::ZERO, 2.0);
        let mut tree = QuadTree::default();
        let config = SimConfig::default();
        compute_accelerations(&mut store, &mut tree, &config);

        let expected = 2.0 / (9.0 + config.softening) * (3.0 / (9.0 + config.softening).sqrt());
        assert!((store.acc[0].x - expected).abs() < 1e-12);
        assert!((store.acc[1].x + expected / 2.0).abs() < 1e-12);
        assert_eq!(store.acc[0].y, 0.0);
    }

    #[test]
    fn isolated_body_has_no_acceleration_in_either_mode() {
        for mode in [ForceMode::Direct, ForceMode::Tree { theta: 0.7 }] {
            let mut store = BodyStore::default();
            store.push(DVec2::new(1.0, 1.0), DVec2::new(0.3, 0.0), 4.0);
            store.acc[0] = DVec2::new(9.0, 9.0);
            let mut tree = QuadTree::default();
            compute_accelerations_with(mode, &mut store, &mut tree, &SimConfig::default());
            assert_eq!(store.acc[0], DVec2::ZERO, "{mode:?}");
        }
    }

    #[test]
    fn large_populations_use_the_tree() {
        let mut store = random_store(9, 500);
        let mut tree = QuadTree::default();
        let stats = compute_accelerations(&mut store, &mut tree, &SimConfig::default());

        assert_eq!(stats.mode, ForceMode::Tree { theta: 0.7 });
        let build = stats.build.unwrap();
        assert_eq!(build.bodies, 500);
        assert_eq!(build.unplaced, 0);
        assert_eq!(stats.stack_overflows, 0);
        assert!(store.acc.iter().all(|a| a.is_finite()));
    }

    #[test]
    fn degradation_is_flagged_only_when_it_starts_or_ends() {
        let mut store = random_store(13, 300);
        let mut tree = QuadTree::default();
        let tight = SimConfig {
            node_capacity: 64,
            ..SimConfig::default()
        };

        let first = compute_accelerations(&mut store, &mut tree, &tight);
        assert!(first.build.unwrap().is_degraded());
        assert!(first.degradation_changed);

        let second = compute_accelerations(&mut store, &mut tree, &tight);
        assert!(second.build.unwrap().is_degraded());
        assert!(!second.degradation_changed);

        let recovered = compute_accelerations(&mut store, &mut tree, &SimConfig::default());
        assert!(!recovered.build.unwrap().is_degraded());
        assert!(recovered.degradation_changed);

        let healthy = compute_accelerations(&mut store, &mut tree, &SimConfig::default());
        assert!(!healthy.degradation_changed);
    }
}
