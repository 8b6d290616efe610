//! Two-dimensional gravitational N-body simulation for interactive viewers.
//!
//! Small populations are integrated with exact pairwise forces; larger ones
//! go through a Barnes-Hut quadtree rebuilt every step. A [`Simulation`] is
//! driven through [`messages::Request`]s, either directly or on a
//! [`PhysicsWorker`] thread.

pub mod bodies;
pub mod components;
pub mod energy;
pub mod error;
pub mod forces;
pub mod integrator;
pub mod messages;
pub mod quadtree;
pub mod resources;
pub mod simulation;
pub mod systems;
pub mod worker;

pub use energy::EnergyReport;
pub use error::{SimError, SimResult};
pub use messages::{Request, Response, handle, handle_json};
pub use resources::SimConfig;
pub use simulation::{Diagnostics, Simulation, Snapshot};
pub use worker::PhysicsWorker;
