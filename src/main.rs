use bevy::prelude::*;
use bevy::window::WindowResolution;
use bevy_egui::{EguiPlugin, EguiPrimaryContextPass};
use rand::{Rng, SeedableRng, rngs::StdRng};

use nbody_worker::Request;
use nbody_worker::systems::{PhysicsWorkerPlugin, WorkerLink, diagnostics_window};

/// Bodies orbiting the central mass.
const NUM_BODIES: usize = 2000;
const CENTRAL_MASS: f64 = 1000.0;
const DISC_INNER: f64 = 1.0;
const DISC_OUTER: f64 = 10.0;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Barnes-Hut N-Body".into(),
                resolution: WindowResolution::new(1000, 1000),
                ..default()
            }),
            ..default()
        }))
        .add_plugins(EguiPlugin::default())
        .add_plugins(PhysicsWorkerPlugin::default())
        .insert_resource(ClearColor(Color::BLACK))
        .add_systems(Startup, setup_scene)
        .add_systems(EguiPrimaryContextPass, diagnostics_window)
        .run();
}

/// Builds a rotating disc of light bodies around one heavy body.
fn disc_initial_conditions(rng: &mut impl Rng, count: usize) -> Request {
    let n = count + 1;
    let (mut x, mut y) = (Vec::with_capacity(n), Vec::with_capacity(n));
    let (mut vx, mut vy) = (Vec::with_capacity(n), Vec::with_capacity(n));
    let mut mass = Vec::with_capacity(n);

    for _ in 0..count {
        let angle = rng.random_range(0.0..std::f64::consts::TAU);
        let dist = rng.random_range(DISC_INNER..DISC_OUTER);
        let speed = (CENTRAL_MASS / dist).sqrt();

        x.push(angle.cos() * dist);
        y.push(angle.sin() * dist);
        vx.push(-angle.sin() * speed);
        vy.push(angle.cos() * speed);
        mass.push(rng.random_range(0.01..0.05));
    }

    x.push(0.0);
    y.push(0.0);
    vx.push(0.0);
    vy.push(0.0);
    mass.push(CENTRAL_MASS);

    Request::Init {
        n,
        x,
        y,
        vx,
        vy,
        mass,
    }
}

fn setup_scene(mut commands: Commands, link: Option<ResMut<WorkerLink>>) {
    commands.spawn(Camera2d);

    let Some(mut link) = link else {
        return;
    };
    let mut rng = StdRng::from_os_rng();
    if let Err(err) = link.send(disc_initial_conditions(&mut rng, NUM_BODIES)) {
        error!("could not initialize the simulation: {err}");
    }
}
