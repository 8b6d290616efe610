//! Request/response boundary between a host and a [`Simulation`].
//!
//! Messages are tagged by a `"type"` field so they can travel as JSON:
//!
//! ```json
//! {"type": "init", "n": 2, "x": [0, 1], "y": [0, 0], "vx": [0, 0], "vy": [0, 0], "mass": [1, 1]}
//! {"type": "step", "dt": 0.01, "substeps": 4}
//! {"type": "addBody", "x": 3, "y": 0, "vx": 0, "vy": 1, "mass": 0.5}
//! {"type": "clear"}
//! ```
//!
//! Requests with any other `type` decode to [`Request::Unknown`] and are
//! ignored without a response.

use bevy::log::debug;
use bevy::math::DVec2;
use serde::{Deserialize, Serialize};

use crate::error::SimResult;
use crate::simulation::{Diagnostics, Simulation, Snapshot};

fn default_substeps() -> u32 {
    1
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Request {
    Init {
        n: usize,
        x: Vec<f64>,
        y: Vec<f64>,
        vx: Vec<f64>,
        vy: Vec<f64>,
        mass: Vec<f64>,
    },
    Step {
        dt: f64,
        #[serde(default = "default_substeps")]
        substeps: u32,
    },
    AddBody {
        x: f64,
        y: f64,
        vx: f64,
        vy: f64,
        mass: f64,
    },
    Clear,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Response {
    /// Interleaved `[x0, y0, x1, y1, ...]` positions. `energy` is kinetic
    /// only when `potential_included` is false. `diagnostics` carries the
    /// worker's running force-evaluation totals.
    #[serde(rename_all = "camelCase")]
    Positions {
        data: Vec<f64>,
        n: usize,
        energy: f64,
        potential_included: bool,
        sim_time: f64,
        #[serde(default)]
        diagnostics: Diagnostics,
    },
    #[serde(rename_all = "camelCase")]
    BodyAdded {
        n: usize,
        energy: f64,
        potential_included: bool,
    },
    Cleared,
}

impl From<Snapshot> for Response {
    fn from(snapshot: Snapshot) -> Self {
        Response::Positions {
            data: snapshot.positions,
            n: snapshot.n,
            energy: snapshot.energy.total(),
            potential_included: !snapshot.energy.is_partial(),
            sim_time: snapshot.time,
            diagnostics: snapshot.diagnostics,
        }
    }
}

impl Response {
    pub fn to_json(&self) -> SimResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Runs one request to completion. Unknown requests produce `Ok(None)`.
pub fn handle(sim: &mut Simulation, request: Request) -> SimResult<Option<Response>> {
    let response: Response = match request {
        Request::Init {
            n,
            x,
            y,
            vx,
            vy,
            mass,
        } => sim.init(n, &x, &y, &vx, &vy, &mass)?.into(),
        Request::Step { dt, substeps } => sim.step(dt, substeps)?.into(),
        Request::AddBody {
            x,
            y,
            vx,
            vy,
            mass,
        } => {
            let (n, energy) = sim.add_body(DVec2::new(x, y), DVec2::new(vx, vy), mass);
            Response::BodyAdded {
                n,
                energy: energy.total(),
                potential_included: !energy.is_partial(),
            }
        }
        Request::Clear => {
            sim.clear();
            Response::Cleared
        }
        Request::Unknown => {
            debug!("ignoring request of unknown type");
            return Ok(None);
        }
    };
    Ok(Some(response))
}

/// Decodes a JSON request and runs it.
pub fn handle_json(sim: &mut Simulation, json: &str) -> SimResult<Option<Response>> {
    let request: Request = serde_json::from_str(json)?;
    handle(sim, request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;

    const INIT: &str = r#"{"type":"init","n":2,"x":[-1,1],"y":[0,0],"vx":[0,0],"vy":[-0.5,0.5],"mass":[1,1]}"#;

    #[test]
    fn init_returns_positions() {
        let mut sim = Simulation::default();
        let response = handle_json(&mut sim, INIT).unwrap().unwrap();

        match response {
            Response::Positions {
                data,
                n,
                energy,
                potential_included,
                sim_time,
                diagnostics,
            } => {
                assert_eq!(data, vec![-1.0, 0.0, 1.0, 0.0]);
                assert_eq!(n, 2);
                assert!(energy < 0.0);
                assert!(potential_included);
                assert_eq!(sim_time, 0.0);
                assert_eq!(diagnostics.force_evaluations, 1);
                assert_eq!(diagnostics.tree_builds, 0);
            }
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn step_defaults_to_one_substep() {
        let request: Request = serde_json::from_str(r#"{"type":"step","dt":0.5}"#).unwrap();
        assert_eq!(
            request,
            Request::Step {
                dt: 0.5,
                substeps: 1
            }
        );

        let mut sim = Simulation::default();
        handle_json(&mut sim, INIT).unwrap();
        let response = handle(&mut sim, request).unwrap().unwrap();
        let Response::Positions { sim_time, .. } = response else {
            panic!("expected positions");
        };
        assert_eq!(sim_time, 0.5);
    }

    #[test]
    fn add_body_and_clear() {
        let mut sim = Simulation::default();
        handle_json(&mut sim, INIT).unwrap();

        let added = handle_json(
            &mut sim,
            r#"{"type":"addBody","x":0,"y":3,"vx":0,"vy":0,"mass":2}"#,
        )
        .unwrap();
        assert!(matches!(added, Some(Response::BodyAdded { n: 3, .. })));

        let cleared = handle_json(&mut sim, r#"{"type":"clear"}"#).unwrap();
        assert_eq!(cleared, Some(Response::Cleared));
        assert!(sim.is_empty());
    }

    #[test]
    fn unknown_requests_are_ignored() {
        let mut sim = Simulation::default();
        handle_json(&mut sim, INIT).unwrap();

        let response = handle_json(&mut sim, r#"{"type":"rewind","steps":3}"#).unwrap();
        assert_eq!(response, None);
        assert_eq!(sim.len(), 2);
    }

    #[test]
    fn invalid_requests_surface_errors() {
        let mut sim = Simulation::default();
        let err = handle_json(&mut sim, r#"{"type":"step","dt":-1}"#).unwrap_err();
        assert!(matches!(err, SimError::InvalidInput(_)));

        let err = handle_json(&mut sim, r#"{"type":"step","dt":0.1,"substeps":0}"#).unwrap_err();
        assert!(matches!(err, SimError::InvalidInput(_)));

        let err = handle_json(&mut sim, r#"{"type":"init","n":3,"x":[0]}"#).unwrap_err();
        assert!(matches!(err, SimError::Decode(_)));

        let err = handle_json(
            &mut sim,
            r#"{"type":"init","n":2,"x":[0],"y":[0],"vx":[0],"vy":[0],"mass":[1]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SimError::InvalidInput(_)));
    }

    #[test]
    fn responses_use_camel_case_fields() {
        let json = Response::BodyAdded {
            n: 1,
            energy: 2.0,
            potential_included: true,
        }
        .to_json()
        .unwrap();
        assert_eq!(
            json,
            r#"{"type":"bodyAdded","n":1,"energy":2.0,"potentialIncluded":true}"#
        );

        let positions: Response = serde_json::from_str(
            r#"{"type":"positions","data":[1.0,2.0],"n":1,"energy":0.5,"potentialIncluded":false,"simTime":3.0}"#,
        )
        .unwrap();
        assert!(matches!(positions, Response::Positions { sim_time, .. } if sim_time == 3.0));
    }

    #[test]
    fn positions_carry_diagnostic_totals() {
        let mut sim = Simulation::default();
        handle_json(&mut sim, INIT).unwrap();
        let response = handle_json(&mut sim, r#"{"type":"step","dt":0.1,"substeps":3}"#)
            .unwrap()
            .unwrap();

        let json = response.to_json().unwrap();
        let totals = r#""diagnostics":{"forceEvaluations":4,"treeBuilds":0,"degradedBuilds":0,"unplacedTotal":0,"stackOverflowsTotal":0}"#;
        assert!(json.contains(totals), "{json}");

        let Response::Positions { diagnostics, .. } = response else {
            panic!("expected positions");
        };
        assert_eq!(diagnostics.force_evaluations, 4);
        assert!(diagnostics.last.is_some());
    }
}
