//! The [`SpatialData`] container.
//!
//! Elements live in an arena and are referred to by [`ElementId`]
//! handles. Each of the four collections (images, labels, points, shapes)
//! maps names to handles; binding the same handle under two names is an
//! explicit [`SpatialData::alias`], never an accident of sharing.

mod concat;
mod filter;
pub mod io_json;

pub use concat::{concatenate, concatenate_tables, MERGED_REGION_KEY};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{Result, SpatialDataError};
use crate::model::{
    get_schema, ElementKind, Points, RasterElement, Shapes, SpatialElement, Table, TableModel,
};
use crate::transform::{HasTransformations, Transformation};

/// Identity-stable handle of an element stored in a container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(usize);

/// A multi-modal spatial dataset.
#[derive(Clone, Debug, Default)]
pub struct SpatialData {
    arena: Vec<Option<SpatialElement>>,
    bindings: BTreeMap<ElementKind, BTreeMap<String, ElementId>>,
    table: Option<Table>,
}

impl SpatialData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, name: impl Into<String>, image: RasterElement) -> Result<Self> {
        self.add_image(name, image)?;
        Ok(self)
    }

    pub fn with_labels(mut self, name: impl Into<String>, labels: RasterElement) -> Result<Self> {
        self.add_labels(name, labels)?;
        Ok(self)
    }

    pub fn with_points(mut self, name: impl Into<String>, points: Points) -> Result<Self> {
        self.add_points(name, points)?;
        Ok(self)
    }

    pub fn with_shapes(mut self, name: impl Into<String>, shapes: Shapes) -> Result<Self> {
        self.add_shapes(name, shapes)?;
        Ok(self)
    }

    pub fn with_table(mut self, table: Table) -> Result<Self> {
        self.set_table(table)?;
        Ok(self)
    }

    pub fn add_image(&mut self, name: impl Into<String>, image: RasterElement) -> Result<ElementId> {
        self.insert(ElementKind::Images, name, image)
    }

    pub fn add_labels(&mut self, name: impl Into<String>, labels: RasterElement) -> Result<ElementId> {
        self.insert(ElementKind::Labels, name, labels)
    }

    pub fn add_points(&mut self, name: impl Into<String>, points: Points) -> Result<ElementId> {
        self.insert(ElementKind::Points, name, points)
    }

    pub fn add_shapes(&mut self, name: impl Into<String>, shapes: Shapes) -> Result<ElementId> {
        self.insert(ElementKind::Shapes, name, shapes)
    }

    /// Validates an element and binds it under `kind/name`.
    pub fn insert(
        &mut self,
        kind: ElementKind,
        name: impl Into<String>,
        element: impl Into<SpatialElement>,
    ) -> Result<ElementId> {
        let name = name.into();
        let element = element.into();
        self.check_binding(kind, &name, &element)?;
        let id = ElementId(self.arena.len());
        self.arena.push(Some(element));
        self.bind(kind, name, id);
        Ok(id)
    }

    /// Binds an element already in the container under a second name.
    pub fn alias(&mut self, kind: ElementKind, name: impl Into<String>, id: ElementId) -> Result<()> {
        let name = name.into();
        let element = self.get(id).ok_or(SpatialDataError::ElementNotFound)?;
        self.check_binding(kind, &name, element)?;
        self.bind(kind, name, id);
        Ok(())
    }

    fn check_binding(&self, kind: ElementKind, name: &str, element: &SpatialElement) -> Result<()> {
        if name.is_empty() {
            return Err(SpatialDataError::UnsupportedInput(
                "element names must be non-empty".into(),
            ));
        }
        let schema = get_schema(element)?;
        if !kind.accepts(schema) {
            return Err(SpatialDataError::UnsupportedInput(format!(
                "a {} element cannot be stored in `{kind}`",
                schema.name()
            )));
        }
        if self.id(kind, name).is_some() {
            return Err(SpatialDataError::DuplicateName {
                kind: kind.as_str(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn bind(&mut self, kind: ElementKind, name: String, id: ElementId) {
        self.bindings.entry(kind).or_default().insert(name, id);
    }

    /// Unbinds `kind/name` and returns its element.
    ///
    /// The element stays in the container if another name is bound to it.
    pub fn remove(&mut self, kind: ElementKind, name: &str) -> Result<SpatialElement> {
        let id = self
            .bindings
            .get_mut(&kind)
            .and_then(|names| names.remove(name))
            .ok_or(SpatialDataError::ElementNotFound)?;
        if self.references_region(kind, name) {
            log::warn!("removed `{kind}/{name}` is still annotated by the table");
        }
        let still_bound = self.bindings.values().flat_map(|m| m.values()).any(|i| *i == id);
        let slot = self.arena.get_mut(id.0).ok_or(SpatialDataError::ElementNotFound)?;
        if still_bound {
            slot.clone().ok_or(SpatialDataError::ElementNotFound)
        } else {
            slot.take().ok_or(SpatialDataError::ElementNotFound)
        }
    }

    pub fn get(&self, id: ElementId) -> Option<&SpatialElement> {
        self.arena.get(id.0)?.as_ref()
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut SpatialElement> {
        self.arena.get_mut(id.0)?.as_mut()
    }

    pub fn id(&self, kind: ElementKind, name: &str) -> Option<ElementId> {
        self.bindings.get(&kind)?.get(name).copied()
    }

    pub fn element(&self, kind: ElementKind, name: &str) -> Option<&SpatialElement> {
        self.get(self.id(kind, name)?)
    }

    pub fn element_mut(&mut self, kind: ElementKind, name: &str) -> Option<&mut SpatialElement> {
        let id = self.id(kind, name)?;
        self.get_mut(id)
    }

    /// Every binding as `(kind, name, element)`, by kind and then name.
    pub fn iter(&self) -> impl Iterator<Item = (ElementKind, &str, &SpatialElement)> {
        self.bindings.iter().flat_map(move |(kind, names)| {
            names
                .iter()
                .filter_map(move |(name, id)| Some((*kind, name.as_str(), self.get(*id)?)))
        })
    }

    /// Names bound in one collection, sorted.
    pub fn names(&self, kind: ElementKind) -> Vec<&str> {
        self.bindings
            .get(&kind)
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn images(&self) -> impl Iterator<Item = (&str, &RasterElement)> {
        self.of_kind(ElementKind::Images).filter_map(|(n, e)| Some((n, e.as_raster()?)))
    }

    pub fn labels(&self) -> impl Iterator<Item = (&str, &RasterElement)> {
        self.of_kind(ElementKind::Labels).filter_map(|(n, e)| Some((n, e.as_raster()?)))
    }

    pub fn points(&self) -> impl Iterator<Item = (&str, &Points)> {
        self.of_kind(ElementKind::Points).filter_map(|(n, e)| Some((n, e.as_points()?)))
    }

    pub fn shapes(&self) -> impl Iterator<Item = (&str, &Shapes)> {
        self.of_kind(ElementKind::Shapes).filter_map(|(n, e)| Some((n, e.as_shapes()?)))
    }

    fn of_kind(&self, kind: ElementKind) -> impl Iterator<Item = (&str, &SpatialElement)> {
        self.iter()
            .filter(move |(k, _, _)| *k == kind)
            .map(|(_, n, e)| (n, e))
    }

    pub fn get_image(&self, name: &str) -> Option<&RasterElement> {
        self.element(ElementKind::Images, name)?.as_raster()
    }

    pub fn get_labels(&self, name: &str) -> Option<&RasterElement> {
        self.element(ElementKind::Labels, name)?.as_raster()
    }

    pub fn get_points(&self, name: &str) -> Option<&Points> {
        self.element(ElementKind::Points, name)?.as_points()
    }

    pub fn get_shapes(&self, name: &str) -> Option<&Shapes> {
        self.element(ElementKind::Shapes, name)?.as_shapes()
    }

    /// Number of bindings (an aliased element counts once per name).
    pub fn len(&self) -> usize {
        self.bindings.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0 && self.table.is_none()
    }

    /// Every `(kind, name)` bound to `id`.
    pub fn locate_all(&self, id: ElementId) -> Vec<(ElementKind, String)> {
        self.bindings
            .iter()
            .flat_map(|(kind, names)| {
                names
                    .iter()
                    .filter(move |(_, i)| **i == id)
                    .map(move |(name, _)| (*kind, name.clone()))
            })
            .collect()
    }

    /// The single `(name, kind)` bound to `id`.
    ///
    /// Fails when the element is not bound, or is bound under more than
    /// one name.
    pub fn locate(&self, id: ElementId) -> Result<(String, ElementKind)> {
        let mut found = self.locate_all(id);
        match found.len() {
            0 => Err(SpatialDataError::ElementNotFound),
            1 => {
                let (kind, name) = found.remove(0);
                Ok((name, kind))
            }
            _ => Err(SpatialDataError::AmbiguousElement {
                bindings: found.iter().map(|(k, n)| format!("{k}/{n}")).collect(),
            }),
        }
    }

    /// Union of the coordinate systems of every element, sorted.
    pub fn coordinate_systems(&self) -> Vec<String> {
        self.arena
            .iter()
            .flatten()
            .flat_map(|e| e.transformations().coordinate_systems())
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// `kind/name` paths of the elements mapped into `coordinate_system`.
    pub fn element_paths_in_coordinate_system(&self, coordinate_system: &str) -> Vec<String> {
        self.iter()
            .filter(|(_, _, e)| e.transformations().contains(coordinate_system))
            .map(|(kind, name, _)| format!("{kind}/{name}"))
            .collect()
    }

    /// Transformation of each element into `coordinate_system`.
    pub fn transformations_to(
        &self,
        coordinate_system: &str,
    ) -> Vec<(ElementKind, &str, &Transformation)> {
        self.iter()
            .filter_map(|(kind, name, e)| {
                Some((kind, name, e.transformations().get(coordinate_system)?))
            })
            .collect()
    }

    /// Sets the transformation of `kind/name` into `coordinate_system`.
    ///
    /// Aliased names see the change too.
    pub fn set_transformation(
        &mut self,
        kind: ElementKind,
        name: &str,
        t: Transformation,
        coordinate_system: &str,
    ) -> Result<()> {
        let element = self
            .element_mut(kind, name)
            .ok_or(SpatialDataError::ElementNotFound)?;
        crate::transform::set_transformation(element, t, coordinate_system)
    }

    pub fn table(&self) -> Option<&Table> {
        self.table.as_ref()
    }

    /// Mutable access to the table. Changes are not re-validated until
    /// the table is set again or the container is validated.
    pub fn table_mut(&mut self) -> Option<&mut Table> {
        self.table.as_mut()
    }

    /// Validates and stores the table, replacing any previous one.
    pub fn set_table(&mut self, table: Table) -> Result<()> {
        TableModel::validate_linkage(&table)?;
        for region in self.dangling_regions(&table) {
            log::warn!("table annotates `{region}`, which is not an element of the container");
        }
        self.table = Some(table);
        Ok(())
    }

    pub fn take_table(&mut self) -> Option<Table> {
        self.table.take()
    }

    /// True if `region` names an element, either as `kind/name` or as a
    /// bare name.
    pub fn has_region(&self, region: &str) -> bool {
        match region.split_once('/') {
            Some((kind, name)) => kind
                .parse::<ElementKind>()
                .is_ok_and(|k| self.id(k, name).is_some()),
            None => ElementKind::ALL.iter().any(|k| self.id(*k, region).is_some()),
        }
    }

    /// Regions of `table` that name no element of this container.
    pub fn dangling_regions<'t>(&self, table: &'t Table) -> Vec<&'t str> {
        table
            .attrs
            .as_ref()
            .map(|a| a.regions())
            .unwrap_or_default()
            .into_iter()
            .filter(|r| !self.has_region(r))
            .collect()
    }

    fn references_region(&self, kind: ElementKind, name: &str) -> bool {
        let path = format!("{kind}/{name}");
        self.table
            .as_ref()
            .and_then(|t| t.attrs.as_ref())
            .is_some_and(|a| a.regions().iter().any(|r| *r == path || *r == name))
    }
}

impl fmt::Display for SpatialData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SpatialData object with:")?;
        for kind in ElementKind::ALL {
            let names = self.names(kind);
            if names.is_empty() {
                continue;
            }
            writeln!(f, "├── {}", capitalize(kind.as_str()))?;
            for name in names {
                if let Some(element) = self.element(kind, name) {
                    writeln!(f, "│     ├── '{name}': {}", element.summary())?;
                }
            }
        }
        if let Some(table) = &self.table {
            writeln!(f, "└── Table")?;
            writeln!(f, "      └── {} x {}", table.n_obs(), table.n_vars())?;
        }
        write!(f, "with coordinate systems: {:?}", self.coordinate_systems())
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
