use bevy::math::DVec2;
use serde::Serialize;

use crate::bodies::BodyStore;
use crate::resources::SimConfig;

/// Energy diagnostic for drift monitoring.
///
/// Potential energy is O(N^2) and is only summed while the population is at
/// or below [`SimConfig::potential_energy_max_bodies`]. Above that,
/// `potential` is `None` and [`EnergyReport::total`] is kinetic energy alone:
/// a partial figure, useful for watching trends but not a conserved quantity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct EnergyReport {
    pub kinetic: f64,
    pub potential: Option<f64>,
}

impl EnergyReport {
    pub fn measure(store: &BodyStore, config: &SimConfig) -> Self {
        let kinetic = store
            .vel
            .iter()
            .zip(&store.mass)
            .map(|(v, m)| 0.5 * m * v.length_squared())
            .sum();

        let potential = config
            .includes_potential(store.len())
            .then(|| potential_energy(&store.pos, &store.mass, config));

        Self { kinetic, potential }
    }

    pub fn total(&self) -> f64 {
        self.kinetic + self.potential.unwrap_or(0.0)
    }

    /// True when the potential term was skipped.
    pub fn is_partial(&self) -> bool {
        self.potential.is_none()
    }
}

fn potential_energy(pos: &[DVec2], mass: &[f64], config: &SimConfig) -> f64 {
    let mut pe = 0.0;
    for i in 0..pos.len() {
        for j in (i + 1)..pos.len() {
            let r = ((pos[j] - pos[i]).length_squared() + config.softening).sqrt();
            pe -= config.g * mass[i] * mass[j] / r;
        }
    }
    pe
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_has_zero_energy() {
        let report = EnergyReport::measure(&BodyStore::default(), &SimConfig::default());
        assert_eq!(report.total(), 0.0);
        assert_eq!(report.potential, Some(0.0));
        assert!(!report.is_partial());
    }

    #[test]
    fn single_body_has_no_potential() {
        let mut store = BodyStore::default();
        store.push(DVec2::new(5.0, 5.0), DVec2::new(3.0, 4.0), 2.0);
        let report = EnergyReport::measure(&store, &SimConfig::default());

        assert_eq!(report.kinetic, 25.0);
        assert_eq!(report.potential, Some(0.0));
        assert_eq!(report.total(), 25.0);
    }

    #[test]
    fn pair_potential_is_softened() {
        let mut store = BodyStore::default();
        store.push(DVec2::ZERO, DVec2::ZERO, 2.0);
        store.push(DVec2::new(0.0, 2.0), DVec2::ZERO, 3.0);
        let config = SimConfig::default();
        let report = EnergyReport::measure(&store, &config);

        let expected = -6.0 / (4.0 + config.softening).sqrt();
        assert!((report.total() - expected).abs() < 1e-12);
    }

    #[test]
    fn large_populations_report_kinetic_only() {
        let mut store = BodyStore::default();
        for i in 0..501 {
            store.push(DVec2::new(i as f64, 0.0), DVec2::new(1.0, 0.0), 2.0);
        }
        let report = EnergyReport::measure(&store, &SimConfig::default());

        assert!(report.is_partial());
        assert_eq!(report.total(), 501.0);
    }
}
