use core::fmt;
use serde::{Deserialize, Serialize};

/// Row index of a candidate in the knowledge base.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct EntityId(pub u32);

impl EntityId {
    pub const fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// A candidate the engine may eventually guess. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    id: EntityId,
    name: String,
    popularity: f64,
}

impl Entity {
    pub fn new(id: EntityId, name: String, popularity: f64) -> Self {
        Self {
            id,
            name,
            popularity,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw popularity weight (normalized sitelink count in the source data).
    /// Feeds the prior; zero everywhere falls back to a uniform prior.
    pub fn popularity(&self) -> f64 {
        self.popularity
    }
}

#[cfg(test)]
mod tests {
    use super::{Entity, EntityId};

    #[test]
    fn id_round_trips_through_index() {
        let id = EntityId::from_index(17);
        assert_eq!(id.index(), 17);
        assert_eq!(id, EntityId(17));
        assert_eq!(id.to_string(), "E17");
    }

    #[test]
    fn entity_exposes_fields() {
        let entity = Entity::new(EntityId(3), "Marie Curie".to_string(), 0.4);
        assert_eq!(entity.id(), EntityId(3));
        assert_eq!(entity.name(), "Marie Curie");
        assert_eq!(entity.popularity(), 0.4);
    }
}
