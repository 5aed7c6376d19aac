use std::collections::BTreeMap;

use super::{ElementId, SpatialData};
use crate::model::ElementKind;
use crate::transform::HasTransformations;

impl SpatialData {
    /// Keeps the elements mapped into at least one of `coordinate_systems`.
    ///
    /// With `filter_table`, the table keeps only the rows annotating a
    /// surviving element; otherwise it is carried over unchanged. A table
    /// without region linkage is never filtered. Unknown coordinate
    /// systems simply match nothing.
    pub fn filter_by_coordinate_system(
        &self,
        coordinate_systems: &[&str],
        filter_table: bool,
    ) -> SpatialData {
        let mut out = SpatialData::new();
        let mut copied: BTreeMap<ElementId, ElementId> = BTreeMap::new();

        for (kind, names) in &self.bindings {
            for (name, id) in names {
                let Some(element) = self.get(*id) else {
                    continue;
                };
                let keep = coordinate_systems
                    .iter()
                    .any(|cs| element.transformations().contains(cs));
                if !keep {
                    continue;
                }
                let new_id = *copied.entry(*id).or_insert_with(|| {
                    out.arena.push(Some(element.clone()));
                    ElementId(out.arena.len() - 1)
                });
                out.bind(*kind, name.clone(), new_id);
            }
        }

        let table = self.table.as_ref().map(|table| {
            if !filter_table {
                return table.clone();
            }
            match table.row_regions() {
                Some(regions) => {
                    let rows: Vec<usize> = regions
                        .iter()
                        .enumerate()
                        .filter(|(_, r)| out.has_region(r))
                        .map(|(i, _)| i)
                        .collect();
                    log::debug!(
                        "table filtered to {} of {} rows",
                        rows.len(),
                        table.n_obs()
                    );
                    table.take_rows(&rows)
                }
                None => table.clone(),
            }
        });
        out.table = table;
        out
    }

    /// Shorthand for filtering by a single coordinate system.
    pub fn filter_by_single_coordinate_system(
        &self,
        coordinate_system: &str,
        filter_table: bool,
    ) -> SpatialData {
        self.filter_by_coordinate_system(&[coordinate_system], filter_table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        DenseArray, Geometry, Polygon, RasterModel, RasterParseOptions, ShapesModel,
        ShapesParseOptions,
    };
    use crate::transform::Transformation;

    fn sdata() -> SpatialData {
        let image = RasterModel::Labels2D
            .parse_array(DenseArray::zeros(&[4, 4]), RasterParseOptions::new())
            .unwrap();
        let poly = ShapesModel::parse_geometries(
            vec![Geometry::Polygon(Polygon::new(vec![
                [0.0, 0.0],
                [1.0, 0.0],
                [1.0, 1.0],
                [0.0, 0.0],
            ]))],
            ShapesParseOptions::new(),
        )
        .unwrap();
        let mut sdata = SpatialData::new()
            .with_labels("labels", image)
            .unwrap()
            .with_shapes("poly", poly)
            .unwrap();
        sdata
            .set_transformation(ElementKind::Shapes, "poly", Transformation::Identity, "space0")
            .unwrap();
        sdata
    }

    #[test]
    fn test_filter_keeps_mapped_elements() {
        let s = sdata();
        assert_eq!(s.filter_by_coordinate_system(&["global"], false).len(), 2);
        assert_eq!(s.filter_by_single_coordinate_system("space0", false).len(), 1);
        assert!(s.filter_by_coordinate_system(&["nowhere"], true).is_empty());
    }

    #[test]
    fn test_filter_preserves_aliasing() {
        let mut s = sdata();
        let id = s.id(ElementKind::Shapes, "poly").unwrap();
        s.alias(ElementKind::Shapes, "poly_alias", id).unwrap();
        let f = s.filter_by_coordinate_system(&["space0"], false);
        let new_id = f.id(ElementKind::Shapes, "poly").unwrap();
        assert_eq!(f.id(ElementKind::Shapes, "poly_alias"), Some(new_id));
        assert_eq!(f.locate_all(new_id).len(), 2);
    }
}
