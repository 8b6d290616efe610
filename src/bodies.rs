//! Structure-of-arrays storage for every body in a simulation.
//!
//! A body is nothing more than an index into the parallel arrays below. All
//! four arrays always have the same length.

use bevy::math::DVec2;

use crate::error::{SimError, SimResult};

#[derive(Debug, Default, Clone)]
pub struct BodyStore {
    pub pos: Vec<DVec2>,
    pub vel: Vec<DVec2>,
    pub acc: Vec<DVec2>,
    pub mass: Vec<f64>,
}

impl BodyStore {
    /// Replaces every body with the given columns. Each column must hold `n` values.
    pub fn replace(
        &mut self,
        n: usize,
        x: &[f64],
        y: &[f64],
        vx: &[f64],
        vy: &[f64],
        mass: &[f64],
    ) -> SimResult<()> {
        for (name, column) in [("x", x), ("y", y), ("vx", vx), ("vy", vy), ("mass", mass)] {
            if column.len() != n {
                return Err(SimError::InvalidInput(format!(
                    "`{name}` has {} values but the body count is {n}",
                    column.len()
                )));
            }
        }

        self.pos = x.iter().zip(y).map(|(&x, &y)| DVec2::new(x, y)).collect();
        self.vel = vx.iter().zip(vy).map(|(&x, &y)| DVec2::new(x, y)).collect();
        self.acc = vec![DVec2::ZERO; n];
        self.mass = mass.to_vec();
        Ok(())
    }

    /// Appends one body, keeping every existing value. Its acceleration starts at zero.
    pub fn push(&mut self, position: DVec2, velocity: DVec2, mass: f64) {
        self.pos.push(position);
        self.vel.push(velocity);
        self.acc.push(DVec2::ZERO);
        self.mass.push(mass);
    }

    /// Drops every body and releases the backing storage.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn len(&self) -> usize {
        self.mass.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mass.is_empty()
    }

    /// Copies positions into a fresh `[x0, y0, x1, y1, ...]` buffer owned by the caller.
    pub fn positions_interleaved(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.len() * 2);
        for p in &self.pos {
            out.push(p.x);
            out.push(p.y);
        }
        out
    }

    pub fn total_mass(&self) -> f64 {
        self.mass.iter().sum()
    }

    pub fn momentum(&self) -> DVec2 {
        self.vel
            .iter()
            .zip(&self.mass)
            .fold(DVec2::ZERO, |acc, (v, m)| acc + *v * *m)
    }

    /// Angular momentum about the origin (the z component).
    pub fn angular_momentum(&self) -> f64 {
        self.pos
            .iter()
            .zip(&self.vel)
            .zip(&self.mass)
            .map(|((p, v), m)| m * p.perp_dot(*v))
            .sum()
    }
}
