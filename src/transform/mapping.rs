//! Mapping from coordinate-system names to transformations, and the
//! rules for attaching such a mapping to an element.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Transformation;
use crate::error::{Result, SpatialDataError};
use crate::model::Axis;

/// Name of the coordinate system elements are mapped into by default.
pub const DEFAULT_COORDINATE_SYSTEM: &str = "global";

/// Coordinate-system name -> transformation into that system.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transformations(BTreeMap<String, Transformation>);

impl Transformations {
    pub fn new() -> Self {
        Self::default()
    }

    /// `{"global": Identity}`.
    pub fn global_identity() -> Self {
        Self::new().with(DEFAULT_COORDINATE_SYSTEM, Transformation::Identity)
    }

    /// Adds a transformation (builder style).
    pub fn with(mut self, coordinate_system: impl Into<String>, t: Transformation) -> Self {
        self.0.insert(coordinate_system.into(), t);
        self
    }

    pub fn get(&self, coordinate_system: &str) -> Option<&Transformation> {
        self.0.get(coordinate_system)
    }

    pub fn insert(
        &mut self,
        coordinate_system: impl Into<String>,
        t: Transformation,
    ) -> Option<Transformation> {
        self.0.insert(coordinate_system.into(), t)
    }

    pub fn remove(&mut self, coordinate_system: &str) -> Option<Transformation> {
        self.0.remove(coordinate_system)
    }

    pub fn contains(&self, coordinate_system: &str) -> bool {
        self.0.contains_key(coordinate_system)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Coordinate-system names, sorted.
    pub fn coordinate_systems(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Transformation)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Checks names and transformations against the axes of an element.
    pub fn check(&self, axes: &[Axis]) -> Result<()> {
        for (name, t) in &self.0 {
            if name.trim().is_empty() {
                return Err(SpatialDataError::InvalidTransformation(
                    "coordinate system names must be non-empty".into(),
                ));
            }
            t.validate()?;
            t.check_axes(axes)?;
        }
        Ok(())
    }
}

impl FromIterator<(String, Transformation)> for Transformations {
    fn from_iter<I: IntoIterator<Item = (String, Transformation)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Access to the transformation metadata an element carries.
pub trait HasTransformations {
    fn transformations(&self) -> &Transformations;

    fn transformations_mut(&mut self) -> &mut Transformations;

    /// Axes a transformation attached to this element may refer to.
    fn element_axes(&self) -> Vec<Axis>;
}

/// Resolves the authoritative transformation mapping of an element.
///
/// - element metadata and `transformations` both non-empty: error
/// - exactly one non-empty: that one is attached
/// - neither: `{"global": Identity}`
///
/// The element is only modified once every check has passed.
pub fn parse_transformations<E: HasTransformations + ?Sized>(
    element: &mut E,
    transformations: Option<Transformations>,
) -> Result<()> {
    let supplied = transformations.filter(|t| !t.is_empty());
    let in_element = !element.transformations().is_empty();
    let axes = element.element_axes();

    let parsed = match (in_element, supplied) {
        (true, Some(_)) => {
            return Err(SpatialDataError::AmbiguousSpecification(
                "transformations are both specified for the element and also passed as an \
                 argument to the parser; specify them only once"
                    .into(),
            ));
        }
        (true, None) => {
            element.transformations().check(&axes)?;
            return Ok(());
        }
        (false, Some(t)) => t,
        (false, None) => Transformations::global_identity(),
    };
    parsed.check(&axes)?;
    *element.transformations_mut() = parsed;
    Ok(())
}

/// Sets (or replaces) the transformation into one coordinate system.
pub fn set_transformation<E: HasTransformations + ?Sized>(
    element: &mut E,
    t: Transformation,
    coordinate_system: &str,
) -> Result<()> {
    let single = Transformations::new().with(coordinate_system, t);
    single.check(&element.element_axes())?;
    element.transformations_mut().0.extend(single.0);
    Ok(())
}

pub fn get_transformation<'a, E: HasTransformations + ?Sized>(
    element: &'a E,
    coordinate_system: &str,
) -> Option<&'a Transformation> {
    element.transformations().get(coordinate_system)
}

/// Removes the transformation into `coordinate_system`.
///
/// An element must stay mapped into at least one coordinate system, so
/// removing the last one is refused.
pub fn remove_transformation<E: HasTransformations + ?Sized>(
    element: &mut E,
    coordinate_system: &str,
) -> Result<Transformation> {
    let current = element.transformations();
    if !current.contains(coordinate_system) {
        return Err(SpatialDataError::InvalidTransformation(format!(
            "element is not mapped into `{coordinate_system}`"
        )));
    }
    if current.len() == 1 {
        return Err(SpatialDataError::InvalidTransformation(format!(
            "cannot remove `{coordinate_system}`: it is the only coordinate system of the element"
        )));
    }
    element
        .transformations_mut()
        .remove(coordinate_system)
        .ok_or(SpatialDataError::ElementNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    #[derive(Default)]
    struct Dummy {
        transformations: Transformations,
    }

    impl HasTransformations for Dummy {
        fn transformations(&self) -> &Transformations {
            &self.transformations
        }

        fn transformations_mut(&mut self) -> &mut Transformations {
            &mut self.transformations
        }

        fn element_axes(&self) -> Vec<Axis> {
            vec![Axis::Y, Axis::X]
        }
    }

    #[test]
    fn test_default_is_global_identity() {
        let mut d = Dummy::default();
        parse_transformations(&mut d, None).unwrap();
        assert_eq!(d.transformations, Transformations::global_identity());
    }

    #[test]
    fn test_empty_argument_counts_as_absent() {
        let mut d = Dummy::default();
        parse_transformations(&mut d, Some(Transformations::new())).unwrap();
        assert!(d.transformations.contains(DEFAULT_COORDINATE_SYSTEM));
    }

    #[test]
    fn test_argument_wins_when_element_empty() {
        let mut d = Dummy::default();
        let t = Transformations::new().with("aligned", Transformation::Identity);
        parse_transformations(&mut d, Some(t.clone())).unwrap();
        assert_eq!(d.transformations, t);
    }

    #[test]
    fn test_both_sources_rejected() {
        let mut d = Dummy {
            transformations: Transformations::new().with("a", Transformation::Identity),
        };
        let before = d.transformations.clone();
        let err = parse_transformations(&mut d, Some(Transformations::global_identity()))
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(d.transformations, before);
    }

    #[test]
    fn test_reparse_without_argument_is_noop() {
        let mut d = Dummy::default();
        parse_transformations(&mut d, None).unwrap();
        let first = d.transformations.clone();
        parse_transformations(&mut d, None).unwrap();
        assert_eq!(d.transformations, first);
    }

    #[test]
    fn test_axes_must_belong_to_element() {
        let mut d = Dummy::default();
        let t = Transformations::new().with("s", Transformation::scale([2.0], [Axis::Z]).unwrap());
        assert!(parse_transformations(&mut d, Some(t)).is_err());
        assert!(d.transformations.is_empty());
    }

    #[test]
    fn test_set_and_remove() {
        let mut d = Dummy::default();
        parse_transformations(&mut d, None).unwrap();
        set_transformation(&mut d, Transformation::scale([2.0], [Axis::X]).unwrap(), "space0")
            .unwrap();
        assert_eq!(d.transformations.len(), 2);
        assert!(get_transformation(&d, "space0").is_some());
        remove_transformation(&mut d, "space0").unwrap();
        assert!(remove_transformation(&mut d, DEFAULT_COORDINATE_SYSTEM).is_err());
        assert!(remove_transformation(&mut d, "missing").is_err());
    }
}
