//! Kick-drift-kick leapfrog.
//!
//! The first half-kick uses the accelerations left behind by the previous
//! step (or by `init`/`add_body`), so forces are evaluated exactly once per
//! step, between the drift and the second half-kick.

use crate::bodies::BodyStore;
use crate::forces::{ForceStats, compute_accelerations};
use crate::quadtree::QuadTree;
use crate::resources::SimConfig;

pub fn leapfrog_step(
    store: &mut BodyStore,
    tree: &mut QuadTree,
    config: &SimConfig,
    dt: f64,
) -> ForceStats {
    let half_dt = 0.5 * dt;

    // v_{n+1/2} = v_n + dt/2 * a_n
    for (v, a) in store.vel.iter_mut().zip(&store.acc) {
        *v += *a * half_dt;
    }

    // x_{n+1} = x_n + dt * v_{n+1/2}
    for (x, v) in store.pos.iter_mut().zip(&store.vel) {
        *x += *v * dt;
    }

    let stats = compute_accelerations(store, tree, config);

    // v_{n+1} = v_{n+1/2} + dt/2 * a_{n+1}
    for (v, a) in store.vel.iter_mut().zip(&store.acc) {
        *v += *a * half_dt;
    }

    stats
}
