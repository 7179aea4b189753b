//! Owner of all connections of a network.
//!
//! Connections are stored densely in insertion order and addressed by
//! [`ConnId`]; references between connections are ids into this registry.

use std::collections::BTreeMap;

use tn_core::ConnId;

use crate::attrs::{ConnectionAttr, Spec};
use crate::connection::Connection;
use crate::error::{GraphError, GraphResult};
use crate::reference::Reference;

#[derive(Clone, Debug, Default)]
pub struct ConnectionRegistry {
    conns: Vec<Connection>,
    by_label: BTreeMap<String, ConnId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection; labels are unique within a registry.
    pub fn insert(&mut self, conn: Connection) -> GraphResult<ConnId> {
        if self.by_label.contains_key(conn.label()) {
            return Err(GraphError::config(format!(
                "a connection labelled '{}' already exists",
                conn.label()
            )));
        }
        let id = ConnId::from_index(self.conns.len() as u32);
        self.by_label.insert(conn.label().to_string(), id);
        self.conns.push(conn);
        Ok(id)
    }

    pub fn get(&self, id: ConnId) -> GraphResult<&Connection> {
        self.conns
            .get(id.slot())
            .ok_or(GraphError::UnknownConnection { id })
    }

    pub fn get_mut(&mut self, id: ConnId) -> GraphResult<&mut Connection> {
        self.conns
            .get_mut(id.slot())
            .ok_or(GraphError::UnknownConnection { id })
    }

    pub fn id_of(&self, label: &str) -> GraphResult<ConnId> {
        self.by_label
            .get(label)
            .copied()
            .ok_or_else(|| GraphError::UnknownLabel {
                label: label.to_string(),
            })
    }

    pub fn by_label(&self, label: &str) -> GraphResult<&Connection> {
        self.get(self.id_of(label)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConnId, &Connection)> {
        self.conns
            .iter()
            .enumerate()
            .map(|(i, c)| (ConnId::from_index(i as u32), c))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ConnId, &mut Connection)> {
        self.conns
            .iter_mut()
            .enumerate()
            .map(|(i, c)| (ConnId::from_index(i as u32), c))
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }

    /// A reference must point at another registered connection.
    pub fn validate_reference(&self, owner: ConnId, reference: &Reference) -> GraphResult<()> {
        let target = reference.target();
        if target.slot() >= self.conns.len() {
            return Err(GraphError::InvalidReference { target });
        }
        if target == owner {
            return Err(GraphError::config(format!(
                "connection '{}' cannot reference itself",
                self.get(owner)?.label()
            )));
        }
        Ok(())
    }

    /// Validate references, then apply `attrs` atomically to connection `id`.
    pub fn set_attr(
        &mut self,
        id: ConnId,
        attrs: impl IntoIterator<Item = ConnectionAttr>,
    ) -> GraphResult<()> {
        let attrs: Vec<ConnectionAttr> = attrs.into_iter().collect();
        for attr in &attrs {
            if let ConnectionAttr::Property(_, Spec::Ref(r)) = attr {
                self.validate_reference(id, r)?;
            }
        }
        self.get_mut(id)?.set_attr(attrs)
    }

    /// Run `f` on every connection, stopping at the first error.
    pub fn try_for_each_mut<F>(&mut self, mut f: F) -> GraphResult<()>
    where
        F: FnMut(ConnId, &mut Connection) -> GraphResult<()>,
    {
        for (id, conn) in self.iter_mut() {
            f(id, conn)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::PropKey;
    use crate::connection::tests::water;

    fn two() -> (ConnectionRegistry, ConnId, ConnId) {
        let mut reg = ConnectionRegistry::new();
        let a = reg.insert(water("a")).unwrap();
        let b = reg.insert(water("b")).unwrap();
        (reg, a, b)
    }

    #[test]
    fn labels_are_unique_and_resolvable() {
        let (mut reg, a, b) = two();
        assert_eq!(reg.id_of("a").unwrap(), a);
        assert_eq!(reg.by_label("b").unwrap().label(), "b");
        assert_ne!(a, b);
        assert!(matches!(
            reg.insert(water("a")),
            Err(GraphError::Configuration { .. })
        ));
        assert_eq!(reg.len(), 2);
        assert!(matches!(
            reg.id_of("zz"),
            Err(GraphError::UnknownLabel { .. })
        ));
    }

    #[test]
    fn references_must_target_another_registered_connection() {
        let (mut reg, a, b) = two();
        let to_self = Reference::new(a, 1.0, 0.0).unwrap();
        assert!(reg
            .set_attr(a, [ConnectionAttr::property(PropKey::M, to_self)])
            .is_err());
        let dangling = Reference::new(ConnId::from_index(7), 1.0, 0.0).unwrap();
        assert_eq!(
            reg.set_attr(a, [ConnectionAttr::property(PropKey::M, dangling)]),
            Err(GraphError::InvalidReference {
                target: ConnId::from_index(7)
            })
        );
        assert!(reg.get(a).unwrap().reference(PropKey::M).is_none());

        let ok = Reference::new(b, 2.0, 1.0).unwrap();
        reg.set_attr(a, [ConnectionAttr::property(PropKey::M, ok)])
            .unwrap();
        assert_eq!(reg.get(a).unwrap().reference(PropKey::M), Some(&ok));
    }
}
