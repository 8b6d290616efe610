use serde::{Deserialize, Serialize};

// --- Simulation Defaults ---
/// Default gravitational constant (folded into every acceleration once).
pub const DEFAULT_G: f64 = 1.0;
/// Added to squared distances to keep close encounters finite.
pub const SOFTENING: f64 = 1e-4;
/// Bodies at or below this count use exact pairwise summation.
pub const DIRECT_THRESHOLD: usize = 200;
/// Default Barnes-Hut opening angle.
pub const DEFAULT_THETA: f64 = 0.7;
/// Opening angle used once the population grows past [`WIDE_THETA_ABOVE`].
pub const WIDE_THETA: f64 = 1.2;
pub const WIDE_THETA_ABOVE: usize = 10_000;
/// Potential energy is only summed at or below this body count.
pub const POTENTIAL_ENERGY_MAX_BODIES: usize = 500;
/// Upper bound on quadtree nodes allocated in a single build.
pub const DEFAULT_NODE_CAPACITY: usize = 4_000_000;
/// Deepest level a quadtree node may be subdivided to.
pub const DEFAULT_MAX_TREE_DEPTH: usize = 64;
/// Root half-width is `max(width, height) * ROOT_MARGIN + ROOT_PADDING`.
pub const ROOT_MARGIN: f64 = 0.55;
pub const ROOT_PADDING: f64 = 0.1;

/// Tunable simulation parameters.
///
/// Every field has a default, so a host can deserialize a partial config such
/// as `{"node_capacity": 100000}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub g: f64,
    pub softening: f64,
    pub direct_threshold: usize,
    pub theta: f64,
    pub wide_theta: f64,
    pub wide_theta_above: usize,
    pub potential_energy_max_bodies: usize,
    pub node_capacity: usize,
    pub max_tree_depth: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            g: DEFAULT_G,
            softening: SOFTENING,
            direct_threshold: DIRECT_THRESHOLD,
            theta: DEFAULT_THETA,
            wide_theta: WIDE_THETA,
            wide_theta_above: WIDE_THETA_ABOVE,
            potential_energy_max_bodies: POTENTIAL_ENERGY_MAX_BODIES,
            node_capacity: DEFAULT_NODE_CAPACITY,
            max_tree_depth: DEFAULT_MAX_TREE_DEPTH,
        }
    }
}

impl SimConfig {
    /// Opening angle for a population of `n` bodies. A step, never interpolated.
    pub fn theta_for(&self, n: usize) -> f64 {
        if n > self.wide_theta_above {
            self.wide_theta
        } else {
            self.theta
        }
    }

    pub fn uses_tree(&self, n: usize) -> bool {
        n > self.direct_threshold
    }

    pub fn includes_potential(&self, n: usize) -> bool {
        n <= self.potential_energy_max_bodies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theta_widens_as_a_step() {
        let config = SimConfig::default();
        assert_eq!(config.theta_for(10_000), DEFAULT_THETA);
        assert_eq!(config.theta_for(10_001), WIDE_THETA);
        assert_eq!(config.theta_for(1), DEFAULT_THETA);
    }

    #[test]
    fn thresholds_are_inclusive_below() {
        let config = SimConfig::default();
        assert!(!config.uses_tree(200));
        assert!(config.uses_tree(201));
        assert!(config.includes_potential(500));
        assert!(!config.includes_potential(501));
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let config: SimConfig =
            serde_json::from_str(r#"{"node_capacity": 1024, "theta": 0.5}"#).unwrap();
        assert_eq!(config.node_capacity, 1024);
        assert_eq!(config.theta, 0.5);
        assert_eq!(config.g, DEFAULT_G);
        assert_eq!(config.max_tree_depth, DEFAULT_MAX_TREE_DEPTH);
    }
}
