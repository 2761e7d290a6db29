//! Attribute-level comparison of stored and incoming entities.

use std::collections::BTreeSet;

use crate::errors::{GraphError, GraphResult};
use crate::models::{AttributeChange, ChangeKind, Entity, PropertyValue};

/// Pseudo-attribute reported when a placeholder is replaced by its real
/// declaration.
pub const PROVISIONAL_ATTRIBUTE: &str = "provisional";

/// Decides which attribute changes matter.
#[derive(Clone, Debug, Default)]
pub struct Differ {
    ephemeral: Vec<String>,
}

impl Differ {
    pub fn new(ephemeral: &[String]) -> Self {
        Self {
            ephemeral: ephemeral.to_vec(),
        }
    }

    /// Timestamps and update markers are tracked but never significant.
    pub fn is_ephemeral(&self, name: &str) -> bool {
        name.ends_with("_at")
            || name.contains("timestamp")
            || name.starts_with("last_")
            || self.ephemeral.iter().any(|e| e == name)
    }

    /// Pairwise comparison over the union of attribute names, in name order.
    ///
    /// A value whose declared type differs between the two sides is an
    /// [`GraphError::AttributeConflict`]; the caller turns it into a
    /// `CONFLICT` outcome.
    pub fn diff(&self, stored: &Entity, incoming: &Entity) -> GraphResult<Vec<AttributeChange>> {
        let mut changes = Vec::new();
        if stored.provisional && !incoming.provisional {
            changes.push(AttributeChange {
                name: PROVISIONAL_ATTRIBUTE.to_string(),
                change: ChangeKind::Modified,
                old: Some(PropertyValue::Bool(true)),
                new: Some(PropertyValue::Bool(false)),
                significant: true,
            });
        }

        let names: BTreeSet<&String> = stored
            .properties
            .keys()
            .chain(incoming.properties.keys())
            .collect();
        for name in names {
            let old = stored.properties.get(name);
            let new = incoming.properties.get(name);
            let change = match (old, new) {
                (None, None) => continue,
                (None, Some(_)) => ChangeKind::Added,
                (Some(_), None) => ChangeKind::Removed,
                (Some(a), Some(b)) if std::mem::discriminant(a) != std::mem::discriminant(b) => {
                    return Err(GraphError::AttributeConflict {
                        entity_id: incoming.id.clone(),
                        attribute: name.clone(),
                        stored: a.type_name(),
                        incoming: b.type_name(),
                    });
                }
                (Some(a), Some(b)) if a == b => continue,
                (Some(_), Some(_)) => ChangeKind::Modified,
            };
            changes.push(AttributeChange {
                name: name.clone(),
                change,
                old: old.cloned(),
                new: new.cloned(),
                significant: !self.is_ephemeral(name),
            });
        }
        Ok(changes)
    }
}

pub fn has_significant(changes: &[AttributeChange]) -> bool {
    changes.iter().any(|c| c.significant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityKind;

    fn entity(props: &[(&str, PropertyValue)]) -> Entity {
        Entity {
            id: "cls:com.example:Foo".to_string(),
            kind: EntityKind::Class,
            provisional: false,
            properties: props
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn identical_entities_have_no_changes() {
        let a = entity(&[("name", "Foo".into()), ("is_external", false.into())]);
        assert!(Differ::default().diff(&a, &a.clone()).unwrap().is_empty());
    }

    #[test]
    fn added_removed_and_modified() {
        let stored = entity(&[("name", "Foo".into()), ("visibility", "public".into())]);
        let incoming = entity(&[("name", "Bar".into()), ("modifiers", vec!["final".to_string()].into())]);
        let changes = Differ::default().diff(&stored, &incoming).unwrap();
        let summary: Vec<(&str, ChangeKind)> =
            changes.iter().map(|c| (c.name.as_str(), c.change)).collect();
        assert_eq!(
            summary,
            vec![
                ("modifiers", ChangeKind::Added),
                ("name", ChangeKind::Modified),
                ("visibility", ChangeKind::Removed),
            ]
        );
        assert!(changes.iter().all(|c| c.significant));
    }

    #[test]
    fn ephemeral_changes_are_not_significant() {
        let differ = Differ::new(&["revision".to_string()]);
        let stored = entity(&[
            ("indexed_at", "2024-01-01T00:00:00Z".into()),
            ("last_seen", "a".into()),
            ("build_timestamp", "1".into()),
            ("revision", 1i64.into()),
        ]);
        let incoming = entity(&[
            ("indexed_at", "2024-02-01T00:00:00Z".into()),
            ("last_seen", "b".into()),
            ("build_timestamp", "2".into()),
            ("revision", 2i64.into()),
        ]);
        let changes = differ.diff(&stored, &incoming).unwrap();
        assert_eq!(changes.len(), 4);
        assert!(!has_significant(&changes));
    }

    #[test]
    fn type_mismatch_is_a_conflict() {
        let stored = entity(&[("line", 3i64.into())]);
        let incoming = entity(&[("line", "3".into())]);
        match Differ::default().diff(&stored, &incoming) {
            Err(GraphError::AttributeConflict {
                attribute,
                stored,
                incoming,
                ..
            }) => {
                assert_eq!(attribute, "line");
                assert_eq!(stored, "int");
                assert_eq!(incoming, "text");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn placeholder_replacement_is_significant() {
        let mut stored = entity(&[("name", "Foo".into())]);
        stored.provisional = true;
        let incoming = entity(&[("name", "Foo".into())]);
        let changes = Differ::default().diff(&stored, &incoming).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].name, PROVISIONAL_ATTRIBUTE);
        assert!(has_significant(&changes));
    }
}
