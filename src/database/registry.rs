//! Entity registry with two-phase relationship resolution
//!
//! Each entity publishes an [`EntityShape`] describing its table, columns and
//! the entities it references *by name*. Entity modules therefore never
//! import each other. Shapes are registered first; once every shape is
//! known, [`Registry::resolve`] links the names into [`Relation`] edges and
//! orders the tables so that parents come before children.

use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Entity {0} is registered twice")]
    DuplicateEntity(String),

    #[error("Entity {entity} declares relationship {relationship} to unknown entity {target}")]
    UnknownEntity {
        entity: String,
        relationship: String,
        target: String,
    },

    #[error("Entity {entity} has no column {column}")]
    UnknownColumn { entity: String, column: String },

    #[error("Relationship cycle between entities: {}", .0.join(", "))]
    Cycle(Vec<String>),
}

/// Storage type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Generated integer primary key
    PrimaryKey,
    Integer,
    Real,
    Text,
    Boolean,
    Timestamp,
    Json,
}

impl ColumnType {
    pub fn sql(&self) -> &'static str {
        match self {
            Self::PrimaryKey => "INTEGER PRIMARY KEY AUTOINCREMENT",
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text | Self::Timestamp | Self::Json => "TEXT",
            Self::Boolean => "BOOLEAN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
    pub unique: bool,
}

impl Column {
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
            unique: false,
        }
    }

    pub const fn primary_key(name: &'static str) -> Self {
        Self::new(name, ColumnType::PrimaryKey)
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// What happens to child rows when their parent row is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    Cascade,
    Restrict,
}

impl OnDelete {
    pub fn sql(&self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::Restrict => "RESTRICT",
        }
    }
}

/// A reference from one entity to another, declared by the target's name
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipDecl {
    pub name: &'static str,
    pub target: &'static str,
    pub foreign_key: &'static str,
    pub on_delete: OnDelete,
}

impl RelationshipDecl {
    pub const fn belongs_to(
        name: &'static str,
        target: &'static str,
        foreign_key: &'static str,
        on_delete: OnDelete,
    ) -> Self {
        Self {
            name,
            target,
            foreign_key,
            on_delete,
        }
    }
}

/// Table layout of one entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityShape {
    pub name: &'static str,
    pub table: &'static str,
    pub columns: Vec<Column>,
    pub relationships: Vec<RelationshipDecl>,
}

impl EntityShape {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.ty == ColumnType::PrimaryKey)
    }
}

/// A resolved foreign-key edge from a child entity to its parent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub name: &'static str,
    pub child: &'static str,
    pub child_table: &'static str,
    pub foreign_key: &'static str,
    pub parent: &'static str,
    pub parent_table: &'static str,
    pub parent_key: &'static str,
    pub on_delete: OnDelete,
}

/// Phase one: collects entity shapes without looking at their relationships.
#[derive(Debug, Default)]
pub struct Registry {
    shapes: Vec<EntityShape>,
    index: HashMap<&'static str, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, shape: EntityShape) -> Result<&mut Self, SchemaError> {
        if self.index.contains_key(shape.name) {
            return Err(SchemaError::DuplicateEntity(shape.name.to_string()));
        }
        self.index.insert(shape.name, self.shapes.len());
        self.shapes.push(shape);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Phase two: link relationship names into edges and order the tables.
    pub fn resolve(self) -> Result<ResolvedSchema, SchemaError> {
        let mut relations = Vec::new();

        for shape in &self.shapes {
            for decl in &shape.relationships {
                let parent = self
                    .index
                    .get(decl.target)
                    .map(|&i| &self.shapes[i])
                    .ok_or_else(|| SchemaError::UnknownEntity {
                        entity: shape.name.to_string(),
                        relationship: decl.name.to_string(),
                        target: decl.target.to_string(),
                    })?;

                if shape.column(decl.foreign_key).is_none() {
                    return Err(SchemaError::UnknownColumn {
                        entity: shape.name.to_string(),
                        column: decl.foreign_key.to_string(),
                    });
                }
                let parent_key = parent.primary_key().ok_or_else(|| SchemaError::UnknownColumn {
                    entity: parent.name.to_string(),
                    column: "primary key".to_string(),
                })?;

                relations.push(Relation {
                    name: decl.name,
                    child: shape.name,
                    child_table: shape.table,
                    foreign_key: decl.foreign_key,
                    parent: parent.name,
                    parent_table: parent.table,
                    parent_key: parent_key.name,
                    on_delete: decl.on_delete,
                });
            }
        }

        let order = creation_order(&self.shapes, &relations)?;
        let mut slots: Vec<Option<EntityShape>> = self.shapes.into_iter().map(Some).collect();
        let entities = order
            .into_iter()
            .filter_map(|i| slots[i].take())
            .collect();

        Ok(ResolvedSchema {
            entities,
            relations,
        })
    }
}

/// Kahn's algorithm over parent -> child edges, stable in registration order.
/// Self references do not constrain the order.
fn creation_order(shapes: &[EntityShape], relations: &[Relation]) -> Result<Vec<usize>, SchemaError> {
    let position: HashMap<&str, usize> = shapes.iter().enumerate().map(|(i, s)| (s.name, i)).collect();
    let mut pending_parents = vec![BTreeSet::new(); shapes.len()];
    for rel in relations.iter().filter(|r| r.child != r.parent) {
        pending_parents[position[rel.child]].insert(position[rel.parent]);
    }

    let mut order = Vec::with_capacity(shapes.len());
    let mut placed = vec![false; shapes.len()];

    while order.len() < shapes.len() {
        let next = (0..shapes.len()).find(|&i| !placed[i] && pending_parents[i].is_empty());
        let Some(next) = next else {
            let stuck = (0..shapes.len())
                .filter(|&i| !placed[i])
                .map(|i| shapes[i].name.to_string())
                .collect();
            return Err(SchemaError::Cycle(stuck));
        };
        placed[next] = true;
        order.push(next);
        for parents in pending_parents.iter_mut() {
            parents.remove(&next);
        }
    }

    Ok(order)
}

/// The linked schema: entities in creation order plus their relations.
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    entities: Vec<EntityShape>,
    relations: Vec<Relation>,
}

impl ResolvedSchema {
    /// Entities ordered so that every parent precedes its children
    pub fn entities(&self) -> &[EntityShape] {
        &self.entities
    }

    pub fn entity(&self, name: &str) -> Option<&EntityShape> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Relations in which `entity` is the child
    pub fn parents_of<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a Relation> + 'a {
        self.relations.iter().filter(move |r| r.child == entity)
    }

    /// Relations in which `entity` is the parent
    pub fn children_of<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a Relation> + 'a {
        self.relations.iter().filter(move |r| r.parent == entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(name: &'static str, table: &'static str, parents: &[(&'static str, &'static str)]) -> EntityShape {
        let mut columns = vec![Column::primary_key("id")];
        let mut relationships = Vec::new();
        for &(target, fk) in parents {
            columns.push(Column::new(fk, ColumnType::Integer));
            relationships.push(RelationshipDecl::belongs_to(target, target, fk, OnDelete::Cascade));
        }
        EntityShape {
            name,
            table,
            columns,
            relationships,
        }
    }

    #[test]
    fn test_children_registered_before_parents_resolve() {
        let mut registry = Registry::new();
        registry
            .register(shape("Alert", "alerts", &[("Device", "device_id")]))
            .unwrap()
            .register(shape("Device", "devices", &[("User", "user_id")]))
            .unwrap()
            .register(shape("User", "users", &[]))
            .unwrap();

        let schema = registry.resolve().unwrap();
        let names: Vec<_> = schema.entities().iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["User", "Device", "Alert"]);

        let device_parent: Vec<_> = schema.parents_of("Device").collect();
        assert_eq!(device_parent.len(), 1);
        assert_eq!(device_parent[0].parent_table, "users");
        assert_eq!(device_parent[0].parent_key, "id");
        assert_eq!(schema.children_of("Device").count(), 1);
        assert_eq!(schema.children_of("Alert").count(), 0);
    }

    #[test]
    fn test_unknown_target_is_rejected() {
        let mut registry = Registry::new();
        registry
            .register(shape("Device", "devices", &[("User", "user_id")]))
            .unwrap();

        let err = registry.resolve().unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnknownEntity {
                entity: "Device".into(),
                relationship: "User".into(),
                target: "User".into(),
            }
        );
    }

    #[test]
    fn test_duplicate_entity_is_rejected() {
        let mut registry = Registry::new();
        registry.register(shape("User", "users", &[])).unwrap();
        let err = registry.register(shape("User", "people", &[])).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateEntity("User".into()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_missing_foreign_key_column_is_rejected() {
        let mut device = shape("Device", "devices", &[]);
        device.relationships.push(RelationshipDecl::belongs_to(
            "owner",
            "User",
            "owner_id",
            OnDelete::Restrict,
        ));

        let mut registry = Registry::new();
        registry.register(shape("User", "users", &[])).unwrap();
        registry.register(device).unwrap();

        assert!(matches!(
            registry.resolve(),
            Err(SchemaError::UnknownColumn { column, .. }) if column == "owner_id"
        ));
    }

    #[test]
    fn test_cycle_is_reported() {
        let mut registry = Registry::new();
        registry.register(shape("A", "a", &[("B", "b_id")])).unwrap();
        registry.register(shape("B", "b", &[("A", "a_id")])).unwrap();
        registry.register(shape("C", "c", &[])).unwrap();

        assert_eq!(
            registry.resolve().unwrap_err(),
            SchemaError::Cycle(vec!["A".into(), "B".into()])
        );
    }

    #[test]
    fn test_self_reference_does_not_block_ordering() {
        let mut registry = Registry::new();
        registry
            .register(shape("Node", "nodes", &[("Node", "parent_id")]))
            .unwrap();
        let schema = registry.resolve().unwrap();
        assert_eq!(schema.entities().len(), 1);
        assert_eq!(schema.relations()[0].parent, "Node");
    }
}
