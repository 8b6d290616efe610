use bevy::prelude::*;
use bevy_egui::EguiContexts;
use bevy_egui::egui;

use crate::systems::link::{LatestFrame, PhysicsSettings, WorkerLink};

/// Read-only readout of what the physics worker last reported.
pub fn diagnostics_window(
    mut contexts: EguiContexts,
    frame: Res<LatestFrame>,
    settings: Res<PhysicsSettings>,
    link: Option<Res<WorkerLink>>,
    mut frames_rendered: Local<usize>,
) {
    if *frames_rendered < 5 {
        *frames_rendered += 1;
        return;
    }

    if let Ok(ctx) = contexts.ctx_mut() {
        egui::Window::new("Simulation")
            .default_pos(egui::pos2(10.0, 10.0))
            .resizable(false)
            .show(ctx, |ui| {
                ui.label(format!("Bodies: {}", frame.n));
                ui.label(format!("Time: {:.3}", frame.sim_time));
                ui.label(format!(
                    "Step: {} x {}",
                    settings.substeps, settings.dt
                ));

                ui.separator();
                if frame.potential_included {
                    ui.label(format!("Energy: {:.6}", frame.energy));
                } else {
                    ui.label(format!("Kinetic energy: {:.6}", frame.energy));
                    ui.small("Potential skipped at this body count");
                }
                if let Some(drift) = frame.relative_drift() {
                    ui.label(format!("Drift: {:+.3e}", drift));
                }

                ui.separator();
                match link {
                    Some(link) if link.is_connected() => {
                        ui.label(format!("Requests in flight: {}", link.pending()))
                    }
                    Some(_) => ui.colored_label(egui::Color32::RED, "Physics worker stopped"),
                    None => ui.colored_label(egui::Color32::RED, "Physics worker not running"),
                };

                let totals = &frame.diagnostics;
                ui.label(format!(
                    "Force evaluations: {} ({} tree builds)",
                    totals.force_evaluations, totals.tree_builds
                ));
                if totals.degraded_builds > 0 {
                    ui.colored_label(
                        egui::Color32::YELLOW,
                        format!(
                            "Degraded builds: {} ({} bodies unplaced)",
                            totals.degraded_builds, totals.unplaced_total
                        ),
                    );
                }
                if totals.stack_overflows_total > 0 {
                    ui.colored_label(
                        egui::Color32::YELLOW,
                        format!("Traversal stack overflows: {}", totals.stack_overflows_total),
                    );
                }
                if frame.failures > 0 {
                    ui.colored_label(
                        egui::Color32::YELLOW,
                        format!("Rejected requests: {}", frame.failures),
                    );
                }
            });
    }
}
