//! Projection config builder.
//!
//! # Responsibility
//! - Resolve an abstract axis mapping into a concrete render configuration.
//! - Carry selection and filters through to the renderer.
//!
//! # Invariants
//! - Pure and deterministic: equal inputs give equal configs.
//! - Never fails; bad input is normalized and recorded as a `ConfigError`.
//! - Every plane in `ViewType::required_planes` is present in the output.

use crate::model::axis::{
    parse_dimension, AxisBinding, AxisMapping, Dimension, Plane, SortOrder, DEFAULT_DIMENSION,
};
use crate::model::row::EntityId;
use crate::model::view_state::{FilterSpec, SelectionState, ViewType};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

static FACET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").expect("valid facet regex"));

/// Input the builder had to normalize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    UnknownDimension {
        plane: Plane,
        input: String,
        fallback: Dimension,
    },
    InvalidFacet {
        plane: Plane,
        input: String,
        fallback: String,
    },
    MissingPlane {
        plane: Plane,
        fallback: Dimension,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownDimension {
                plane,
                input,
                fallback,
            } => write!(
                f,
                "plane {plane}: unrecognized dimension `{input}`, using `{fallback}`"
            ),
            Self::InvalidFacet {
                plane,
                input,
                fallback,
            } => write!(f, "plane {plane}: invalid facet `{input}`, using `{fallback}`"),
            Self::MissingPlane { plane, fallback } => {
                write!(f, "plane {plane}: required but unmapped, using `{fallback}`")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Resolved assignment of one plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaneAssignment {
    pub dimension: Dimension,
    pub facet: String,
    pub sort: SortOrder,
}

/// Layout family a renderer draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    Matrix,
    Tree,
    Columns,
}

/// Styling hints per projection type.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionStyle {
    pub layout: LayoutKind,
    pub card_width: f64,
    pub card_height: f64,
    pub gap: f64,
    pub show_group_headers: bool,
    /// Horizontal offset per hierarchy level; `0.0` for flat layouts.
    pub indent: f64,
}

impl ProjectionStyle {
    fn for_view(view_type: ViewType) -> Self {
        match view_type {
            ViewType::Grid => Self {
                layout: LayoutKind::Matrix,
                card_width: 160.0,
                card_height: 96.0,
                gap: 12.0,
                show_group_headers: true,
                indent: 0.0,
            },
            ViewType::List => Self {
                layout: LayoutKind::Tree,
                card_width: 480.0,
                card_height: 32.0,
                gap: 4.0,
                show_group_headers: false,
                indent: 20.0,
            },
            ViewType::Board => Self {
                layout: LayoutKind::Columns,
                card_width: 240.0,
                card_height: 80.0,
                gap: 8.0,
                show_group_headers: true,
                indent: 0.0,
            },
        }
    }
}

/// Concrete configuration a renderer draws one projection with.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionConfig {
    pub view_type: ViewType,
    pub planes: BTreeMap<Plane, PlaneAssignment>,
    pub selected_ids: BTreeSet<EntityId>,
    pub filters: Vec<FilterSpec>,
    pub style: ProjectionStyle,
    /// Normalizations applied while building.
    pub warnings: Vec<ConfigError>,
}

impl ProjectionConfig {
    pub fn plane(&self, plane: Plane) -> Option<&PlaneAssignment> {
        self.planes.get(&plane)
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Builds the render configuration of `view_type` for `mapping`.
pub fn build_projection_config(
    view_type: ViewType,
    mapping: &AxisMapping,
    selection: &SelectionState,
    filters: &[FilterSpec],
) -> ProjectionConfig {
    let mut warnings = Vec::new();
    let mut planes = BTreeMap::new();

    for (plane, binding) in mapping.iter() {
        planes.insert(plane, resolve_binding(plane, binding, &mut warnings));
    }

    let defaults = view_type.default_axis_mapping();
    for plane in view_type.required_planes() {
        if planes.contains_key(plane) {
            continue;
        }
        let fallback = defaults
            .get(*plane)
            .cloned()
            .unwrap_or_else(|| AxisBinding::of(DEFAULT_DIMENSION, DEFAULT_DIMENSION.default_facet()));
        let assignment = resolve_binding(*plane, &fallback, &mut warnings);
        warnings.push(ConfigError::MissingPlane {
            plane: *plane,
            fallback: assignment.dimension,
        });
        planes.insert(*plane, assignment);
    }

    for warning in &warnings {
        warn!("event=projection_config module=projection status=normalized view={view_type} detail={warning}");
    }

    ProjectionConfig {
        view_type,
        planes,
        selected_ids: selection.selected_ids.iter().cloned().collect(),
        filters: filters.to_vec(),
        style: ProjectionStyle::for_view(view_type),
        warnings,
    }
}

fn resolve_binding(
    plane: Plane,
    binding: &AxisBinding,
    warnings: &mut Vec<ConfigError>,
) -> PlaneAssignment {
    let dimension = match parse_dimension(&binding.dimension) {
        Ok(dimension) => dimension,
        Err(_) => {
            warnings.push(ConfigError::UnknownDimension {
                plane,
                input: binding.dimension.clone(),
                fallback: DEFAULT_DIMENSION,
            });
            DEFAULT_DIMENSION
        }
    };

    let facet = binding.facet.trim();
    let facet = if FACET_RE.is_match(facet) {
        facet.to_string()
    } else {
        let fallback = dimension.default_facet().to_string();
        warnings.push(ConfigError::InvalidFacet {
            plane,
            input: binding.facet.clone(),
            fallback: fallback.clone(),
        });
        fallback
    };

    PlaneAssignment {
        dimension,
        facet,
        sort: dimension.default_sort(),
    }
}

#[cfg(test)]
mod tests {
    use super::{build_projection_config, ConfigError, LayoutKind};
    use crate::model::axis::{AxisBinding, AxisMapping, Dimension, Plane, SortOrder};
    use crate::model::view_state::{
        FilterOperator, FilterSpec, SelectionState, ViewType,
    };

    fn selection(ids: &[&str]) -> SelectionState {
        SelectionState {
            selected_ids: ids.iter().map(|id| id.to_string()).collect(),
            ..SelectionState::default()
        }
    }

    #[test]
    fn resolves_abbreviations_and_default_sorts() {
        let mapping = AxisMapping::new()
            .with(Plane::X, AxisBinding::new("C", "folder"))
            .with(Plane::Y, AxisBinding::new("t", "modified_at"));
        let config = build_projection_config(ViewType::Grid, &mapping, &selection(&[]), &[]);

        assert!(config.is_clean());
        let x = config.plane(Plane::X).expect("x plane");
        assert_eq!(x.dimension, Dimension::Category);
        assert_eq!(x.sort, SortOrder::Ascending);
        let y = config.plane(Plane::Y).expect("y plane");
        assert_eq!(y.dimension, Dimension::Time);
        assert_eq!(y.sort, SortOrder::Descending);
        assert_eq!(config.style.layout, LayoutKind::Matrix);
    }

    #[test]
    fn unknown_dimension_falls_back_to_category_with_warning() {
        let mapping = AxisMapping::new().with(Plane::Y, AxisBinding::new("Q", "status"));
        let config = build_projection_config(ViewType::List, &mapping, &selection(&[]), &[]);

        let y = config.plane(Plane::Y).expect("y plane");
        assert_eq!(y.dimension, Dimension::Category);
        assert_eq!(y.facet, "status");
        assert_eq!(
            config.warnings,
            vec![ConfigError::UnknownDimension {
                plane: Plane::Y,
                input: "Q".to_string(),
                fallback: Dimension::Category,
            }]
        );
    }

    #[test]
    fn invalid_facet_uses_dimension_default() {
        let mapping = AxisMapping::new().with(Plane::Y, AxisBinding::new("H", "  "));
        let config = build_projection_config(ViewType::List, &mapping, &selection(&[]), &[]);
        assert_eq!(config.plane(Plane::Y).expect("y plane").facet, "parent_id");
        assert!(matches!(
            config.warnings.as_slice(),
            [ConfigError::InvalidFacet { plane: Plane::Y, .. }]
        ));
    }

    #[test]
    fn missing_required_planes_are_filled_from_view_defaults() {
        let config = build_projection_config(
            ViewType::Board,
            &AxisMapping::new(),
            &selection(&[]),
            &[],
        );
        let x = config.plane(Plane::X).expect("board needs x");
        assert_eq!(x.dimension, Dimension::Category);
        assert_eq!(x.facet, "status");
        assert!(matches!(
            config.warnings.as_slice(),
            [ConfigError::MissingPlane { plane: Plane::X, .. }]
        ));
    }

    #[test]
    fn carries_selection_and_filters_deterministically() {
        let filters = vec![FilterSpec::new(
            Dimension::Category,
            "folder",
            FilterOperator::Equals,
            "work",
        )];
        let mapping = ViewType::Grid.default_axis_mapping();
        let first = build_projection_config(ViewType::Grid, &mapping, &selection(&["b", "a"]), &filters);
        let second = build_projection_config(ViewType::Grid, &mapping, &selection(&["a", "b"]), &filters);

        assert_eq!(first, second);
        assert_eq!(
            first.selected_ids.iter().cloned().collect::<Vec<_>>(),
            vec!["a".to_string(), "b".to_string()]
        );
        assert_eq!(first.filters, filters);
    }
}
