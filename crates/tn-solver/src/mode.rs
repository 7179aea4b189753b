//! Design and offdesign operating modes.
//!
//! A design run fixes the `design` quantities of every object and leaves
//! its `offdesign` quantities free. An offdesign run swaps the two: the
//! design quantities are released and the offdesign quantities are fixed
//! at the values of the design point. Objects flagged `local_design` or
//! `local_offdesign` stay in that mode whatever the network runs.

use serde::{Deserialize, Serialize};
use tn_components::Component;
use tn_graph::{Connection, ConnectionAttr, Spec};
use tracing::info;

use crate::error::SolverResult;
use crate::network::Network;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveMode {
    #[default]
    #[serde(rename = "design")]
    Design,
    #[serde(rename = "offdesign")]
    Offdesign,
}

impl SolveMode {
    /// Mode an object with the given local flags runs in.
    pub fn effective(self, local_design: bool, local_offdesign: bool) -> SolveMode {
        match self {
            SolveMode::Design if local_offdesign => SolveMode::Offdesign,
            SolveMode::Offdesign if local_design => SolveMode::Design,
            mode => mode,
        }
    }
}

fn apply_to_connection(conn: &mut Connection, mode: SolveMode) -> SolverResult<()> {
    let mode = mode.effective(conn.local_design(), conn.local_offdesign());
    let (release, fix) = match mode {
        SolveMode::Design => (conn.offdesign_keys().to_vec(), conn.design_keys().to_vec()),
        SolveMode::Offdesign => (conn.design_keys().to_vec(), conn.offdesign_keys().to_vec()),
    };
    conn.set_attr(
        release
            .into_iter()
            .map(|key| ConnectionAttr::Property(key, Spec::Free)),
    )?;
    for key in fix {
        let c = conn.prop(key);
        if mode == SolveMode::Offdesign || (!c.is_set && c.design.is_finite()) {
            conn.fix_at_design(key)?;
        }
    }
    conn.check_overspecification()?;
    Ok(())
}

fn apply_to_component(comp: &mut Component, mode: SolveMode) -> SolverResult<()> {
    let mode = mode.effective(comp.local_design(), comp.local_offdesign());
    let (release, fix) = match mode {
        SolveMode::Design => (comp.offdesign_keys().to_vec(), comp.design_keys().to_vec()),
        SolveMode::Offdesign => (comp.design_keys().to_vec(), comp.offdesign_keys().to_vec()),
    };
    for key in release {
        comp.release(key)?;
    }
    for key in fix {
        let restore = comp
            .param(key)
            .is_some_and(|p| !p.is_set && p.design.is_finite());
        if mode == SolveMode::Offdesign || restore {
            comp.fix_at_design(key)?;
        }
    }
    Ok(())
}

impl Network {
    /// Switch every object into `mode`. On error the network is unchanged.
    pub(crate) fn apply_mode(&mut self, mode: SolveMode) -> SolverResult<()> {
        if mode == SolveMode::Offdesign {
            if let Some(state) = self.design_state.clone() {
                self.load_design_values(&state)?;
            }
        }

        let mut connections = self.connections.clone();
        for (_, conn) in connections.iter_mut() {
            apply_to_connection(conn, mode)?;
        }
        let mut components = self.components.clone();
        for comp in &mut components {
            apply_to_component(comp, mode)?;
        }
        self.connections = connections;
        self.components = components;
        info!(?mode, "operating mode applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_flags_override_the_network_mode() {
        assert_eq!(SolveMode::Design.effective(false, true), SolveMode::Offdesign);
        assert_eq!(SolveMode::Offdesign.effective(true, false), SolveMode::Design);
        assert_eq!(SolveMode::Offdesign.effective(false, true), SolveMode::Offdesign);
        assert_eq!(SolveMode::Design.effective(false, false), SolveMode::Design);
    }
}
