//! Axis mapping model.
//!
//! # Responsibility
//! - Name the visual planes a projection can bind data to.
//! - Declare the LATCH dimensions and their textual forms.
//!
//! # Invariants
//! - `AxisBinding` keeps the raw dimension text as entered; resolution to a
//!   `Dimension` happens in the projection config builder.
//! - `AxisMapping` iterates planes in a stable order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Visual plane a dimension can be assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plane {
    X,
    Y,
    Z,
    Color,
    Size,
}

impl Plane {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
            Self::Color => "color",
            Self::Size => "size",
        }
    }
}

impl Display for Plane {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic data dimension (LATCH).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Location,
    Alphabet,
    Time,
    Category,
    Hierarchy,
}

/// Fallback for unrecognized dimension input.
pub const DEFAULT_DIMENSION: Dimension = Dimension::Category;

impl Dimension {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::Alphabet => "alphabet",
            Self::Time => "time",
            Self::Category => "category",
            Self::Hierarchy => "hierarchy",
        }
    }

    /// Single-letter LATCH abbreviation.
    pub fn abbreviation(self) -> &'static str {
        match self {
            Self::Location => "L",
            Self::Alphabet => "A",
            Self::Time => "T",
            Self::Category => "C",
            Self::Hierarchy => "H",
        }
    }

    /// Facet used when a binding does not name a usable one.
    pub fn default_facet(self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::Alphabet => "name",
            Self::Time => "modified_at",
            Self::Category => "folder",
            Self::Hierarchy => "parent_id",
        }
    }

    /// Sort order renderers apply when nothing else is requested.
    pub fn default_sort(self) -> SortOrder {
        match self {
            Self::Time => SortOrder::Descending,
            Self::Location | Self::Alphabet | Self::Category | Self::Hierarchy => {
                SortOrder::Ascending
            }
        }
    }
}

impl Display for Dimension {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses one dimension from its full name or LATCH letter, case-insensitive.
pub fn parse_dimension(value: &str) -> Result<Dimension, DimensionParseError> {
    let normalized = value.trim().to_ascii_lowercase();
    if normalized.is_empty() {
        return Err(DimensionParseError::Empty);
    }

    match normalized.as_str() {
        "l" | "location" => Ok(Dimension::Location),
        "a" | "alphabet" => Ok(Dimension::Alphabet),
        "t" | "time" => Ok(Dimension::Time),
        "c" | "category" => Ok(Dimension::Category),
        "h" | "hierarchy" => Ok(Dimension::Hierarchy),
        _ => Err(DimensionParseError::Unrecognized(value.trim().to_string())),
    }
}

/// Dimension parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimensionParseError {
    Empty,
    Unrecognized(String),
}

impl Display for DimensionParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "dimension cannot be empty"),
            Self::Unrecognized(value) => write!(
                f,
                "unrecognized dimension `{value}`; expected one of L|A|T|C|H or its full name"
            ),
        }
    }
}

impl Error for DimensionParseError {}

/// Sort direction for one plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Raw assignment of one dimension + facet to a plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisBinding {
    /// Dimension text as provided by the caller (`"T"`, `"time"`, ...).
    pub dimension: String,
    /// Record field the dimension is read from.
    pub facet: String,
}

impl AxisBinding {
    pub fn new(dimension: impl Into<String>, facet: impl Into<String>) -> Self {
        Self {
            dimension: dimension.into(),
            facet: facet.into(),
        }
    }

    /// Binding using the canonical name of `dimension`.
    pub fn of(dimension: Dimension, facet: impl Into<String>) -> Self {
        Self::new(dimension.as_str(), facet)
    }
}

/// Plane → binding assignment for one projection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AxisMapping {
    bindings: BTreeMap<Plane, AxisBinding>,
}

impl AxisMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style plane assignment.
    pub fn with(mut self, plane: Plane, binding: AxisBinding) -> Self {
        self.bindings.insert(plane, binding);
        self
    }

    pub fn set(&mut self, plane: Plane, binding: AxisBinding) {
        self.bindings.insert(plane, binding);
    }

    pub fn remove(&mut self, plane: Plane) -> Option<AxisBinding> {
        self.bindings.remove(&plane)
    }

    pub fn get(&self, plane: Plane) -> Option<&AxisBinding> {
        self.bindings.get(&plane)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Plane, &AxisBinding)> {
        self.bindings.iter().map(|(plane, binding)| (*plane, binding))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
