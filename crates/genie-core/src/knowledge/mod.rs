//! Immutable entity/attribute tables and the dense probability matrix.
//!
//! Loaded once at startup from a snapshot produced by the data preparation
//! pipeline, then shared read-only by every concurrent game.

mod attribute;
mod entity;
mod matrix;
mod snapshot;

pub use attribute::{Attribute, AttributeId, Category};
pub use entity::{Entity, EntityId};
pub use matrix::{AttributeProb, ProbabilityMatrix};
pub use snapshot::{AttributeRecord, EntityRecord, KnowledgeSnapshot, LoadError};

use std::path::Path;

/// Read-only view over entities, attributes and the probability matrix.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    entities: Vec<Entity>,
    attributes: Vec<Attribute>,
    matrix: ProbabilityMatrix,
    prior: Vec<f64>,
}

impl KnowledgeBase {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        Self::from_snapshot(KnowledgeSnapshot::load(path)?)
    }

    pub fn from_snapshot(snapshot: KnowledgeSnapshot) -> Result<Self, LoadError> {
        let (entities, attributes, matrix) = snapshot.into_tables()?;
        let prior = popularity_prior(&entities);
        Ok(Self {
            entities,
            attributes,
            matrix,
            prior,
        })
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn probability(&self, entity: EntityId, attribute: AttributeId) -> AttributeProb {
        self.matrix.get(entity, attribute)
    }

    pub fn entity(&self, id: EntityId) -> &Entity {
        &self.entities[id.index()]
    }

    pub fn attribute(&self, id: AttributeId) -> &Attribute {
        &self.attributes[id.index()]
    }

    pub fn entity_name(&self, id: EntityId) -> &str {
        self.entities[id.index()].name()
    }

    pub fn attribute_text(&self, id: AttributeId) -> &str {
        self.attributes[id.index()].text()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn matrix(&self) -> &ProbabilityMatrix {
        &self.matrix
    }

    /// Starting belief over entities: normalized popularity, or uniform when
    /// the snapshot carries no popularity signal. Always sums to 1.
    pub fn prior(&self) -> &[f64] {
        &self.prior
    }
}

fn popularity_prior(entities: &[Entity]) -> Vec<f64> {
    let total: f64 = entities.iter().map(Entity::popularity).sum();
    if total <= 0.0 {
        let uniform = 1.0 / entities.len() as f64;
        return vec![uniform; entities.len()];
    }
    entities
        .iter()
        .map(|entity| entity.popularity() / total)
        .collect()
}
