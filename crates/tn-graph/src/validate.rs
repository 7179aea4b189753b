//! Connector validation for new connections.

use tn_core::CompId;

use crate::connection::Connector;
use crate::error::{GraphError, GraphResult};
use crate::registry::ConnectionRegistry;

/// Check that a connection from `source` to `target` may be added:
/// the ends belong to different components, name existing connectors and
/// neither connector is in use yet.
pub fn validate_connectors<S: AsRef<str>>(
    registry: &ConnectionRegistry,
    source: &Connector,
    source_outlets: &[S],
    target: &Connector,
    target_inlets: &[S],
) -> GraphResult<()> {
    if source.comp == target.comp {
        return Err(GraphError::InvalidConnector {
            what: format!("component {} cannot be connected to itself", source.comp),
        });
    }
    if !source_outlets.iter().any(|o| o.as_ref() == source.id) {
        return Err(GraphError::InvalidConnector {
            what: format!("component {} has no outlet '{}'", source.comp, source.id),
        });
    }
    if !target_inlets.iter().any(|i| i.as_ref() == target.id) {
        return Err(GraphError::InvalidConnector {
            what: format!("component {} has no inlet '{}'", target.comp, target.id),
        });
    }
    for (_, conn) in registry.iter() {
        if conn.source() == source {
            return Err(GraphError::InvalidConnector {
                what: format!(
                    "outlet '{}' of component {} is already used by connection '{}'",
                    source.id,
                    source.comp,
                    conn.label()
                ),
            });
        }
        if conn.target() == target {
            return Err(GraphError::InvalidConnector {
                what: format!(
                    "inlet '{}' of component {} is already used by connection '{}'",
                    target.id,
                    target.comp,
                    conn.label()
                ),
            });
        }
    }
    Ok(())
}

/// Connector ids of `comp` not yet attached to any connection.
pub fn unconnected<S: AsRef<str>>(
    registry: &ConnectionRegistry,
    comp: CompId,
    ids: &[S],
    outlets: bool,
) -> Vec<String> {
    ids.iter()
        .map(AsRef::as_ref)
        .filter(|id| {
            !registry.iter().any(|(_, c)| {
                let end = if outlets { c.source() } else { c.target() };
                end.comp == comp && end.id == *id
            })
        })
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::tests::water;

    fn conn(comp: u32, id: &str) -> Connector {
        Connector::new(CompId::from_index(comp), id)
    }

    #[test]
    fn self_loops_and_unknown_connectors_are_rejected() {
        let reg = ConnectionRegistry::new();
        let outs = ["out1"];
        let ins = ["in1"];
        assert!(validate_connectors(&reg, &conn(0, "out1"), &outs, &conn(1, "in1"), &ins).is_ok());
        assert!(validate_connectors(&reg, &conn(0, "out1"), &outs, &conn(0, "in1"), &ins).is_err());
        assert!(validate_connectors(&reg, &conn(0, "out2"), &outs, &conn(1, "in1"), &ins).is_err());
        assert!(matches!(
            validate_connectors(&reg, &conn(0, "out1"), &outs, &conn(1, "in9"), &ins),
            Err(GraphError::InvalidConnector { .. })
        ));
    }

    #[test]
    fn connectors_are_used_once() {
        let mut reg = ConnectionRegistry::new();
        // the test helper connects out1 of component 0 to in1 of component 1
        reg.insert(water("c1")).unwrap();
        let outs = ["out1", "out2"];
        let ins = ["in1", "in2"];
        assert!(validate_connectors(&reg, &conn(0, "out1"), &outs, &conn(2, "in1"), &ins).is_err());
        assert!(validate_connectors(&reg, &conn(3, "out1"), &outs, &conn(1, "in1"), &ins).is_err());
        assert!(validate_connectors(&reg, &conn(0, "out2"), &outs, &conn(1, "in2"), &ins).is_ok());
        assert_eq!(
            unconnected(&reg, CompId::from_index(0), &outs, true),
            vec!["out2".to_string()]
        );
        assert_eq!(
            unconnected(&reg, CompId::from_index(1), &ins, false),
            vec!["in2".to_string()]
        );
    }
}
