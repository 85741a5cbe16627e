use crate::knowledge::attribute::{Attribute, AttributeId, Category};
use crate::knowledge::entity::{Entity, EntityId};
use crate::knowledge::matrix::{AttributeProb, ProbabilityMatrix};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk form of a finalized knowledge base, produced by the data
/// preparation pipeline. Matrix cells are nullable: `null` marks missing
/// data and loads as [`AttributeProb::Unknown`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeSnapshot {
    pub entities: Vec<EntityRecord>,
    pub attributes: Vec<AttributeRecord>,
    pub matrix: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityRecord {
    pub name: String,
    #[serde(default)]
    pub popularity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttributeRecord {
    pub text: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

impl KnowledgeSnapshot {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, LoadError> {
        serde_json::from_str(raw).map_err(LoadError::Parse)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Validate the snapshot and convert it into loaded tables plus the dense
    /// matrix. Every inconsistency is a hard failure: the process must not
    /// start on a malformed knowledge base.
    pub(crate) fn into_tables(
        self,
    ) -> Result<(Vec<Entity>, Vec<Attribute>, ProbabilityMatrix), LoadError> {
        if self.entities.is_empty() {
            return Err(LoadError::EmptyEntities);
        }
        if self.attributes.is_empty() {
            return Err(LoadError::EmptyAttributes);
        }
        if self.matrix.len() != self.entities.len() {
            return Err(LoadError::RowCountMismatch {
                expected: self.entities.len(),
                found: self.matrix.len(),
            });
        }

        let mut entities = Vec::with_capacity(self.entities.len());
        for (row, record) in self.entities.into_iter().enumerate() {
            if record.name.trim().is_empty() {
                return Err(LoadError::EmptyEntityName { row });
            }
            if !record.popularity.is_finite() || record.popularity < 0.0 {
                return Err(LoadError::InvalidPopularity {
                    row,
                    value: record.popularity,
                });
            }
            entities.push(Entity::new(
                EntityId::from_index(row),
                record.name,
                record.popularity,
            ));
        }

        let mut attributes = Vec::with_capacity(self.attributes.len());
        for (column, record) in self.attributes.into_iter().enumerate() {
            if record.text.trim().is_empty() {
                return Err(LoadError::EmptyAttributeText { column });
            }
            let category = match record.category {
                None => None,
                Some(label) => Some(Category::from_label(&label).ok_or(
                    LoadError::UnknownCategory {
                        column,
                        label: label.clone(),
                    },
                )?),
            };
            attributes.push(Attribute::new(
                AttributeId::from_index(column),
                record.text,
                category,
                record.value,
            ));
        }

        let attribute_count = attributes.len();
        let mut cells = Vec::with_capacity(entities.len() * attribute_count);
        for (row, row_cells) in self.matrix.into_iter().enumerate() {
            if row_cells.len() != attribute_count {
                return Err(LoadError::ColumnCountMismatch {
                    row,
                    expected: attribute_count,
                    found: row_cells.len(),
                });
            }
            for (column, cell) in row_cells.into_iter().enumerate() {
                match cell {
                    None => cells.push(AttributeProb::Unknown),
                    Some(value) => {
                        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                            return Err(LoadError::ProbabilityOutOfRange {
                                entity: row,
                                attribute: column,
                                value,
                            });
                        }
                        cells.push(AttributeProb::Known(value));
                    }
                }
            }
        }

        let matrix = ProbabilityMatrix::new(entities.len(), attribute_count, cells);
        Ok((entities, attributes, matrix))
    }
}

/// Fatal construction failures. A knowledge base that fails to load must
/// abort startup rather than serve partial data.
#[derive(Debug)]
pub enum LoadError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    EmptyEntities,
    EmptyAttributes,
    RowCountMismatch {
        expected: usize,
        found: usize,
    },
    ColumnCountMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },
    ProbabilityOutOfRange {
        entity: usize,
        attribute: usize,
        value: f64,
    },
    EmptyEntityName {
        row: usize,
    },
    EmptyAttributeText {
        column: usize,
    },
    InvalidPopularity {
        row: usize,
        value: f64,
    },
    UnknownCategory {
        column: usize,
        label: String,
    },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io { path, source } => {
                write!(f, "failed to read snapshot {}: {source}", path.display())
            }
            LoadError::Parse(source) => write!(f, "failed to parse snapshot: {source}"),
            LoadError::EmptyEntities => write!(f, "snapshot contains no entities"),
            LoadError::EmptyAttributes => write!(f, "snapshot contains no attributes"),
            LoadError::RowCountMismatch { expected, found } => write!(
                f,
                "matrix has {found} rows but the snapshot lists {expected} entities"
            ),
            LoadError::ColumnCountMismatch {
                row,
                expected,
                found,
            } => write!(
                f,
                "matrix row {row} has {found} columns but the snapshot lists {expected} attributes"
            ),
            LoadError::ProbabilityOutOfRange {
                entity,
                attribute,
                value,
            } => write!(
                f,
                "probability {value} at entity {entity}, attribute {attribute} lies outside [0, 1]"
            ),
            LoadError::EmptyEntityName { row } => write!(f, "entity {row} has an empty name"),
            LoadError::EmptyAttributeText { column } => {
                write!(f, "attribute {column} has empty question text")
            }
            LoadError::InvalidPopularity { row, value } => {
                write!(f, "entity {row} has invalid popularity {value}")
            }
            LoadError::UnknownCategory { column, label } => {
                write!(f, "attribute {column} names unknown category '{label}'")
            }
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Io { source, .. } => Some(source),
            LoadError::Parse(source) => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic_snapshot() -> KnowledgeSnapshot {
        KnowledgeSnapshot {
            entities: vec![
                EntityRecord {
                    name: "Ada Lovelace".to_string(),
                    popularity: 2.0,
                },
                EntityRecord {
                    name: "Alan Turing".to_string(),
                    popularity: 3.0,
                },
            ],
            attributes: vec![
                AttributeRecord {
                    text: "Is gender female?".to_string(),
                    category: Some("gender".to_string()),
                    value: Some("female".to_string()),
                },
                AttributeRecord {
                    text: "Is occupation mathematician?".to_string(),
                    category: Some("occupation".to_string()),
                    value: Some("mathematician".to_string()),
                },
            ],
            matrix: vec![vec![Some(1.0), Some(1.0)], vec![Some(0.0), None]],
        }
    }

    #[test]
    fn valid_snapshot_converts() {
        let (entities, attributes, matrix) = basic_snapshot().into_tables().expect("valid");
        assert_eq!(entities.len(), 2);
        assert_eq!(attributes.len(), 2);
        assert_eq!(matrix.get(EntityId(1), AttributeId(1)), AttributeProb::Unknown);
        assert_eq!(attributes[0].category(), Some(Category::Gender));
    }

    #[test]
    fn json_round_trip_preserves_nulls() {
        let snapshot = basic_snapshot();
        let json = snapshot.to_json().expect("serialize");
        let restored = KnowledgeSnapshot::from_json(&json).expect("parse");
        assert_eq!(restored, snapshot);
        assert_eq!(restored.matrix[1][1], None);
    }

    #[test]
    fn rejects_row_count_mismatch() {
        let mut snapshot = basic_snapshot();
        snapshot.matrix.pop();
        assert!(matches!(
            snapshot.into_tables(),
            Err(LoadError::RowCountMismatch {
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn rejects_ragged_rows() {
        let mut snapshot = basic_snapshot();
        snapshot.matrix[1].pop();
        assert!(matches!(
            snapshot.into_tables(),
            Err(LoadError::ColumnCountMismatch { row: 1, .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_probability() {
        let mut snapshot = basic_snapshot();
        snapshot.matrix[0][0] = Some(1.5);
        assert!(matches!(
            snapshot.into_tables(),
            Err(LoadError::ProbabilityOutOfRange {
                entity: 0,
                attribute: 0,
                ..
            })
        ));
    }

    #[test]
    fn rejects_nan_probability() {
        let mut snapshot = basic_snapshot();
        snapshot.matrix[0][1] = Some(f64::NAN);
        assert!(matches!(
            snapshot.into_tables(),
            Err(LoadError::ProbabilityOutOfRange { .. })
        ));
    }

    #[test]
    fn rejects_unknown_category_label() {
        let mut snapshot = basic_snapshot();
        snapshot.attributes[0].category = Some("era".to_string());
        assert!(matches!(
            snapshot.into_tables(),
            Err(LoadError::UnknownCategory { column: 0, .. })
        ));
    }

    #[test]
    fn rejects_negative_popularity() {
        let mut snapshot = basic_snapshot();
        snapshot.entities[1].popularity = -1.0;
        assert!(matches!(
            snapshot.into_tables(),
            Err(LoadError::InvalidPopularity { row: 1, .. })
        ));
    }

    #[test]
    fn rejects_empty_tables() {
        let mut snapshot = basic_snapshot();
        snapshot.entities.clear();
        assert!(matches!(snapshot.into_tables(), Err(LoadError::EmptyEntities)));

        let mut snapshot = basic_snapshot();
        snapshot.attributes.clear();
        assert!(matches!(
            snapshot.into_tables(),
            Err(LoadError::EmptyAttributes)
        ));
    }
}
