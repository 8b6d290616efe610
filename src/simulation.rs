//! A self-contained simulation context.
//!
//! Everything one simulation needs (bodies, the quadtree pool, the clock and
//! its diagnostics) lives in [`Simulation`]. Independent simulations can
//! coexist, and each operation runs to completion before returning.

use bevy::log::debug;
use bevy::math::DVec2;
use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::bodies::BodyStore;
use crate::energy::EnergyReport;
use crate::error::{SimError, SimResult};
use crate::forces::{ForceStats, compute_accelerations};
use crate::integrator::leapfrog_step;
use crate::quadtree::QuadTree;
use crate::resources::SimConfig;

/// Running totals of how force evaluation has behaved. Only the totals
/// cross the worker boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub force_evaluations: u64,
    pub tree_builds: u64,
    pub degraded_builds: u64,
    pub unplaced_total: u64,
    pub stack_overflows_total: u64,
    #[serde(skip)]
    pub last: Option<ForceStats>,
}

impl Diagnostics {
    fn record(&mut self, stats: ForceStats) {
        self.force_evaluations += 1;
        if let Some(build) = stats.build {
            self.tree_builds += 1;
            if build.is_degraded() {
                self.degraded_builds += 1;
                self.unplaced_total += build.unplaced as u64;
            }
        }
        self.stack_overflows_total += stats.stack_overflows as u64;
        self.last = Some(stats);
    }
}

/// State handed back after `init` and `step`. The position buffer is a
/// fresh copy; the simulation keeps no reference to it.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub positions: Vec<f64>,
    pub n: usize,
    pub energy: EnergyReport,
    pub time: f64,
    pub diagnostics: Diagnostics,
}

#[derive(Resource, Debug, Default)]
pub struct Simulation {
    config: SimConfig,
    bodies: BodyStore,
    tree: QuadTree,
    time: f64,
    diagnostics: Diagnostics,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Replaces every body, resets the clock and evaluates initial forces.
    pub fn init(
        &mut self,
        n: usize,
        x: &[f64],
        y: &[f64],
        vx: &[f64],
        vy: &[f64],
        mass: &[f64],
    ) -> SimResult<Snapshot> {
        self.bodies.replace(n, x, y, vx, vy, mass)?;
        self.time = 0.0;
        self.refresh_forces();
        debug!("initialized simulation with {n} bodies");
        Ok(self.snapshot())
    }

    /// Advances `substeps` leapfrog steps of `dt` each.
    pub fn step(&mut self, dt: f64, substeps: u32) -> SimResult<Snapshot> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(SimError::InvalidInput(format!(
                "timestep must be finite and positive, got {dt}"
            )));
        }
        if substeps == 0 {
            return Err(SimError::InvalidInput(
                "substeps must be at least 1".to_string(),
            ));
        }

        for _ in 0..substeps {
            let stats = leapfrog_step(&mut self.bodies, &mut self.tree, &self.config, dt);
            self.diagnostics.record(stats);
            self.time += dt;
        }
        Ok(self.snapshot())
    }

    /// Appends one body and re-evaluates forces so the next step starts from
    /// valid accelerations. Returns the new body count and energy.
    pub fn add_body(&mut self, position: DVec2, velocity: DVec2, mass: f64) -> (usize, EnergyReport) {
        self.bodies.push(position, velocity, mass);
        self.refresh_forces();
        (self.bodies.len(), self.energy())
    }

    /// Drops every body, releases the tree pool and resets the clock.
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.tree = QuadTree::default();
        self.time = 0.0;
        debug!("cleared simulation");
    }

    pub fn energy(&self) -> EnergyReport {
        EnergyReport::measure(&self.bodies, &self.config)
    }

    pub fn positions(&self) -> Vec<f64> {
        self.bodies.positions_interleaved()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            positions: self.positions(),
            n: self.bodies.len(),
            energy: self.energy(),
            time: self.time,
            diagnostics: self.diagnostics,
        }
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn bodies(&self) -> &BodyStore {
        &self.bodies
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics
    }

    fn refresh_forces(&mut self) {
        let stats = compute_accelerations(&mut self.bodies, &mut self.tree, &self.config);
        self.diagnostics.record(stats);
    }
}
