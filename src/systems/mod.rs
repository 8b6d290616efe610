mod link;
mod ui;

pub use self::link::*;
pub use self::ui::*;

use bevy::prelude::*;

use crate::resources::SimConfig;
use crate::worker::PhysicsWorker;

/// Starts a physics worker and keeps body sprites in step with it.
#[derive(Default)]
pub struct PhysicsWorkerPlugin {
    pub config: SimConfig,
}

impl Plugin for PhysicsWorkerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PhysicsSettings>()
            .init_resource::<LatestFrame>()
            .add_systems(Startup, setup_body_visuals)
            .add_systems(
                Update,
                (apply_responses, sync_body_sprites, request_step)
                    .chain()
                    .run_if(resource_exists::<WorkerLink>),
            );

        match PhysicsWorker::spawn(self.config.clone()) {
            Ok(worker) => {
                app.insert_resource(WorkerLink::new(worker));
            }
            Err(err) => error!("physics worker unavailable: {err}"),
        }
    }
}
