#![allow(dead_code)]

use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

use spatialdata::dataset::SpatialData;
use spatialdata::model::{
    Axis, Column, DataFrame, DenseArray, Geometry, PointsModel, PointsParseOptions, ShapesModel,
    ShapesParseOptions, Table, TableLinkage, TableModel,
};
use spatialdata::transform::{Transformation, Transformations};

pub const EPS: f64 = 1e-9;

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

pub fn assert_points_close(a: &[Vec<f64>], b: &[Vec<f64>], eps: f64) -> Result<(), String> {
    if a.len() != b.len() {
        return Err(format!("{} points vs {}", a.len(), b.len()));
    }
    for (i, (p, q)) in a.iter().zip(b).enumerate() {
        let close = p.len() == q.len()
            && p.iter()
                .zip(q)
                .all(|(x, y)| (x - y).abs() <= eps * (1.0 + x.abs().max(y.abs())));
        if !close {
            return Err(format!("point {i}: {p:?} vs {q:?}"));
        }
    }
    Ok(())
}

/// A value in `[0.1, 10)` with a random sign.
fn nonzero() -> BoxedStrategy<f64> {
    (0.1f64..10.0, any::<bool>())
        .prop_map(|(v, negative)| if negative { -v } else { v })
        .boxed()
}

/// Scale, translation or affine over the 2D axes `[y, x]`.
pub fn arb_transformation_2d() -> BoxedStrategy<Transformation> {
    let axes = vec![Axis::Y, Axis::X];
    let scale = {
        let axes = axes.clone();
        (nonzero(), nonzero())
            .prop_map(move |(a, b)| Transformation::scale([a, b], axes.clone()).unwrap())
    };
    let translation = {
        let axes = axes.clone();
        (-100.0f64..100.0, -100.0f64..100.0)
            .prop_map(move |(a, b)| Transformation::translation([a, b], axes.clone()).unwrap())
    };
    let rotation = (0.0f64..std::f64::consts::TAU, -10.0f64..10.0).prop_map(move |(theta, t)| {
        let (s, c) = theta.sin_cos();
        Transformation::affine(
            vec![vec![c, -s, t], vec![s, c, -t], vec![0.0, 0.0, 1.0]],
            axes.clone(),
        )
        .unwrap()
    });
    prop_oneof![
        Just(Transformation::Identity),
        scale,
        translation,
        rotation
    ]
    .boxed()
}

/// One to three named coordinate systems over `[y, x]`.
pub fn arb_transformations_2d() -> BoxedStrategy<Transformations> {
    prop::collection::btree_map("[a-z]{1,8}", arb_transformation_2d(), 1..4)
        .prop_map(|m| m.into_iter().collect())
        .boxed()
}

pub fn arb_points_2d(max: usize) -> BoxedStrategy<Vec<Vec<f64>>> {
    prop::collection::vec(prop::collection::vec(-1000.0f64..1000.0, 2), 1..=max).boxed()
}

/// Circles with random centers and radii.
pub fn arb_circles(max: usize) -> BoxedStrategy<spatialdata::model::Shapes> {
    prop::collection::vec(((-50.0f64..50.0, -50.0f64..50.0), 0.1f64..5.0), 1..=max)
        .prop_map(|rows| {
            let (centers, radius): (Vec<_>, Vec<_>) = rows.into_iter().unzip();
            ShapesModel::parse_geometries(
                centers.into_iter().map(|(x, y)| Geometry::Point([x, y])).collect(),
                ShapesParseOptions::new().with_radius(radius),
            )
            .unwrap()
        })
        .boxed()
}

/// 2D points annotated with a categorical `gene` column.
pub fn arb_points(max: usize) -> BoxedStrategy<spatialdata::model::Points> {
    prop::collection::vec((-50.0f64..50.0, -50.0f64..50.0, 0usize..4), 1..=max)
        .prop_map(|rows| {
            let coords = DenseArray::from_rows(
                &rows.iter().map(|(x, y, _)| vec![*x, *y]).collect::<Vec<_>>(),
            )
            .unwrap();
            let genes: Vec<String> = rows.iter().map(|(_, _, g)| format!("gene{g}")).collect();
            let annotation = DataFrame::new()
                .with_column("gene", Column::strings(&genes))
                .unwrap();
            PointsModel::parse_array(
                &coords,
                Some(&annotation),
                PointsParseOptions::new().with_feature_key("gene"),
            )
            .unwrap()
        })
        .boxed()
}

/// A table whose every row annotates `region`.
pub fn single_region_table(region: &str, n: usize, n_vars: usize) -> Table {
    let obs = DataFrame::new()
        .with_column("instance_id", Column::Int64((0..n as i64).collect()))
        .unwrap();
    let x = DenseArray::from_fn(&[n, n_vars], |i| (i[0] * n_vars + i[1]) as f64);
    TableModel::parse(
        Table::new(x, obs).unwrap(),
        TableLinkage::single(region, "instance_id"),
    )
    .unwrap()
}

/// `(region, rows)` pairs for single-region tables.
pub fn arb_table_specs(max_tables: usize) -> BoxedStrategy<Vec<(String, usize)>> {
    prop::collection::vec(("[a-d]", 1usize..20), 1..=max_tables)
        .prop_map(|specs| {
            specs
                .into_iter()
                .map(|(r, n)| (format!("shapes/{r}"), n))
                .collect()
        })
        .boxed()
}

/// A container with random circles and points under distinct names.
pub fn arb_container() -> BoxedStrategy<SpatialData> {
    (
        prop::collection::vec(arb_circles(8), 0..3),
        prop::collection::vec(arb_points(12), 0..3),
    )
        .prop_map(|(circles, points)| {
            let mut sdata = SpatialData::new();
            for (i, shapes) in circles.into_iter().enumerate() {
                sdata.add_shapes(format!("circles_{i}"), shapes).unwrap();
            }
            for (i, p) in points.into_iter().enumerate() {
                sdata.add_points(format!("points_{i}"), p).unwrap();
            }
            sdata
        })
        .boxed()
}
