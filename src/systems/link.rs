use bevy::prelude::*;

use crate::components::BodyIndex;
use crate::error::{SimError, SimResult};
use crate::messages::{Request, Response};
use crate::simulation::Diagnostics;
use crate::worker::PhysicsWorker;

/// World units to pixels when drawing bodies.
pub const PIXELS_PER_UNIT: f32 = 40.0;
/// Radius of a body sprite in pixels.
pub const BODY_RADIUS: f32 = 1.5;

/// How far each step request advances the simulation.
#[derive(Resource, Clone, Copy, Debug)]
pub struct PhysicsSettings {
    pub dt: f64,
    pub substeps: u32,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            dt: 0.002,
            substeps: 4,
        }
    }
}

/// Host end of the worker channel.
#[derive(Resource)]
pub struct WorkerLink {
    worker: PhysicsWorker,
    pending: usize,
}

impl WorkerLink {
    pub fn new(worker: PhysicsWorker) -> Self {
        Self { worker, pending: 0 }
    }

    pub fn send(&mut self, request: Request) -> SimResult<()> {
        let expects_reply = request != Request::Unknown;
        self.worker.send(request)?;
        if expects_reply {
            self.pending += 1;
        }
        Ok(())
    }

    /// Requests sent that have not been answered yet.
    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn is_connected(&self) -> bool {
        !self.worker.is_disconnected()
    }
}

/// Most recent state reported by the worker.
#[derive(Resource, Debug, Default)]
pub struct LatestFrame {
    pub positions: Vec<f64>,
    pub n: usize,
    pub energy: f64,
    pub potential_included: bool,
    pub sim_time: f64,
    /// Energy the drift is measured against, with whether it included potential.
    pub baseline: Option<(f64, bool)>,
    pub failures: u64,
    /// Worker totals as of the last `positions` reply.
    pub diagnostics: Diagnostics,
    /// Set when `positions` changed and sprites need updating.
    pub dirty: bool,
}

impl LatestFrame {
    pub fn ingest(&mut self, response: Response) {
        match response {
            Response::Positions {
                data,
                n,
                energy,
                potential_included,
                sim_time,
                diagnostics,
            } => {
                let comparable = matches!(self.baseline, Some((_, flag)) if flag == potential_included);
                if sim_time == 0.0 || !comparable {
                    self.baseline = Some((energy, potential_included));
                }
                self.positions = data;
                self.n = n;
                self.energy = energy;
                self.potential_included = potential_included;
                self.sim_time = sim_time;
                self.diagnostics = diagnostics;
                self.dirty = true;
            }
            Response::BodyAdded {
                n,
                energy,
                potential_included,
            } => {
                self.n = n;
                self.energy = energy;
                self.potential_included = potential_included;
                self.baseline = Some((energy, potential_included));
            }
            Response::Cleared => {
                *self = Self {
                    failures: self.failures,
                    diagnostics: self.diagnostics,
                    dirty: true,
                    ..Self::default()
                };
            }
        }
    }

    /// Relative change in energy since the baseline was taken.
    pub fn relative_drift(&self) -> Option<f64> {
        let (baseline, _) = self.baseline?;
        (baseline != 0.0).then(|| (self.energy - baseline) / baseline.abs())
    }
}

/// Shared sprite assets for bodies.
#[derive(Resource, Clone)]
pub struct BodyVisuals {
    pub mesh: Handle<Mesh>,
    pub material: Handle<ColorMaterial>,
}

pub fn setup_body_visuals(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<ColorMaterial>>,
) {
    commands.insert_resource(BodyVisuals {
        mesh: meshes.add(Circle::new(BODY_RADIUS)),
        material: materials.add(ColorMaterial::from(Color::hsl(210.0, 0.8, 0.7))),
    });
}

/// Drains every reply the worker has produced since the last frame.
///
/// A dead worker is reported once. Its outstanding requests stay pending,
/// so `request_step` stops sending.
pub fn apply_responses(mut link: ResMut<WorkerLink>, mut frame: ResMut<LatestFrame>) {
    while let Some(reply) = link.worker.try_recv() {
        match reply {
            Ok(response) => {
                link.pending = link.pending.saturating_sub(1);
                frame.ingest(response);
            }
            Err(SimError::Disconnected) => {
                frame.failures += 1;
                error!("physics worker disconnected");
                break;
            }
            Err(err) => {
                link.pending = link.pending.saturating_sub(1);
                frame.failures += 1;
                warn!("physics worker reply: {err}");
            }
        }
    }
}

/// Keeps exactly one request in flight: a new step goes out once the last
/// reply has come back.
pub fn request_step(mut link: ResMut<WorkerLink>, settings: Res<PhysicsSettings>) {
    if link.pending > 0 {
        return;
    }
    let step = Request::Step {
        dt: settings.dt,
        substeps: settings.substeps,
    };
    if let Err(err) = link.send(step) {
        warn!("could not request a step: {err}");
    }
}

/// Moves body sprites to the latest positions, spawning or despawning
/// sprites when the body count changed.
pub fn sync_body_sprites(
    mut commands: Commands,
    mut frame: ResMut<LatestFrame>,
    visuals: Res<BodyVisuals>,
    mut bodies: Query<(Entity, &BodyIndex, &mut Transform)>,
) {
    if !frame.dirty {
        return;
    }
    frame.dirty = false;

    let n = frame.positions.len() / 2;
    let mut spawned = 0;
    for (entity, index, mut transform) in bodies.iter_mut() {
        if **index >= n {
            commands.entity(entity).despawn();
            continue;
        }
        transform.translation = to_screen(&frame.positions, **index);
        spawned = spawned.max(**index + 1);
    }

    for i in spawned..n {
        commands.spawn((
            Mesh2d(visuals.mesh.clone()),
            MeshMaterial2d(visuals.material.clone()),
            Transform::from_translation(to_screen(&frame.positions, i)),
            BodyIndex(i),
        ));
    }
}

fn to_screen(positions: &[f64], i: usize) -> Vec3 {
    Vec3::new(
        positions[2 * i] as f32 * PIXELS_PER_UNIT,
        positions[2 * i + 1] as f32 * PIXELS_PER_UNIT,
        0.0,
    )
}
