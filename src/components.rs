use bevy::prelude::*;

/// Index of the simulated body a sprite stands for.
#[derive(Component, Clone, Copy, Debug, PartialEq, Eq, Deref)]
pub struct BodyIndex(pub usize);
