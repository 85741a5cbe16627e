use core::fmt;
use serde::{Deserialize, Serialize};

/// Column index of a question in the knowledge base.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct AttributeId(pub u32);

impl AttributeId {
    pub const fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{}", self.0)
    }
}

/// Question family used by the expert-system selection rules: resolve a
/// category once it gets a yes, cap how often one category is probed, and
/// avoid asking the same category twice in a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Gender = 0,
    Country = 1,
    Occupation = 2,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Gender, Category::Country, Category::Occupation];
    pub const COUNT: usize = 3;

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Category::Gender => "gender",
            Category::Country => "country",
            Category::Occupation => "occupation",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "gender" => Some(Category::Gender),
            "country" => Some(Category::Country),
            "occupation" => Some(Category::Occupation),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A yes/no-style question usable against every candidate. Immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    id: AttributeId,
    text: String,
    category: Option<Category>,
    value: Option<String>,
}

impl Attribute {
    pub fn new(
        id: AttributeId,
        text: String,
        category: Option<Category>,
        value: Option<String>,
    ) -> Self {
        Self {
            id,
            text,
            category,
            value,
        }
    }

    pub fn id(&self) -> AttributeId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }

    /// The value part of a categorical question ("male", "France", ...).
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// True for placeholder questions like "Is gender Unknown?" which carry
    /// no information and are never worth asking outright.
    pub fn is_unknown_value(&self) -> bool {
        self.value
            .as_deref()
            .is_some_and(|value| value.eq_ignore_ascii_case("unknown"))
    }
}
