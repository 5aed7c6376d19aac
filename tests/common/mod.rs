#![allow(dead_code)]

use spatialdata::dataset::SpatialData;
use spatialdata::model::{
    Column, DataFrame, DenseArray, Geometry, LabeledArray, Points, PointsModel,
    PointsParseOptions, Polygon, RasterElement, RasterModel, RasterParseOptions, ScaleFactor,
    Shapes, ShapesModel, ShapesParseOptions, Table, TableLinkage, TableModel,
};

/// Deterministic values in `[-1, 1)` so fixtures are reproducible.
pub fn noise(shape: &[usize], seed: u64) -> DenseArray {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    DenseArray::from_fn(shape, |_| {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((state >> 33) as f64 / (1u64 << 31) as f64) - 1.0
    })
}

fn scales(factors: &[usize]) -> Vec<ScaleFactor> {
    factors.iter().map(|f| ScaleFactor::Uniform(*f)).collect()
}

fn opts(dims: &[&str], factors: &[usize]) -> RasterParseOptions {
    RasterParseOptions::new()
        .with_dims(dims)
        .with_scale_factors(scales(factors))
}

pub fn images() -> Vec<(&'static str, RasterElement)> {
    let dims_2d = ["c", "y", "x"];
    let dims_3d = ["z", "y", "x", "c"];
    let labeled = |shape: &[usize], dims: &[&str], seed| {
        LabeledArray::new(noise(shape, seed), dims)
    };
    vec![
        (
            "image2d",
            RasterModel::Image2D
                .parse_array(noise(&[3, 64, 64], 1), opts(&dims_2d, &[]))
                .unwrap(),
        ),
        (
            "image2d_multiscale",
            RasterModel::Image2D
                .parse_array(noise(&[3, 64, 64], 2), opts(&dims_2d, &[2, 2]))
                .unwrap(),
        ),
        (
            "image2d_labeled",
            RasterModel::Image2D
                .parse_labeled(labeled(&[3, 64, 64], &dims_2d[..], 3), RasterParseOptions::new())
                .unwrap(),
        ),
        (
            "image3d",
            RasterModel::Image3D
                .parse_array(noise(&[2, 16, 16, 3], 4), opts(&dims_3d, &[]))
                .unwrap(),
        ),
        (
            "image3d_multiscale",
            RasterModel::Image3D
                .parse_labeled(
                    labeled(&[2, 16, 16, 3], &dims_3d[..], 5),
                    RasterParseOptions::new().with_scale_factors(scales(&[2])),
                )
                .unwrap(),
        ),
    ]
}

pub fn labels() -> Vec<(&'static str, RasterElement)> {
    vec![
        (
            "labels2d",
            RasterModel::Labels2D
                .parse_array(noise(&[64, 64], 6), opts(&["y", "x"], &[]))
                .unwrap(),
        ),
        (
            "labels2d_multiscale",
            RasterModel::Labels2D
                .parse_array(noise(&[64, 64], 7), opts(&["y", "x"], &[2, 4]))
                .unwrap(),
        ),
        (
            "labels3d",
            RasterModel::Labels3D
                .parse_array(noise(&[10, 16, 16], 8), opts(&["z", "y", "x"], &[]))
                .unwrap(),
        ),
        (
            "labels3d_multiscale",
            RasterModel::Labels3D
                .parse_array(noise(&[10, 16, 16], 9), opts(&["z", "y", "x"], &[2, 4]))
                .unwrap(),
        ),
    ]
}

fn square(sign: f64) -> Polygon {
    Polygon::new(vec![
        [0.0, 0.0],
        [0.0, sign],
        [sign, sign],
        [sign, 0.0],
        [0.0, 0.0],
    ])
}

fn triangle() -> Polygon {
    Polygon::new(vec![[0.0, 0.0], [0.0, 1.0], [1.0, 10.0], [0.0, 0.0]])
}

pub fn shapes() -> Vec<(&'static str, Shapes)> {
    let poly = ShapesModel::parse_geometries(
        vec![
            Geometry::Polygon(square(1.0)),
            Geometry::Polygon(square(-1.0)),
            Geometry::Polygon(triangle()),
        ],
        ShapesParseOptions::new(),
    )
    .unwrap();
    let multipoly = ShapesModel::parse_geometries(
        vec![
            Geometry::MultiPolygon(vec![square(1.0), square(-1.0)]),
            Geometry::MultiPolygon(vec![triangle(), square(1.0)]),
        ],
        ShapesParseOptions::new(),
    )
    .unwrap();
    let circles = ShapesModel::parse_geometries(
        [[0.0, 1.0], [1.0, 1.0], [3.0, 4.0], [4.0, 2.0], [5.0, 6.0]]
            .into_iter()
            .map(Geometry::Point)
            .collect(),
        ShapesParseOptions::new().with_radius([1.0, 0.5, 2.0, 1.5, 0.25]),
    )
    .unwrap();
    vec![("poly", poly), ("multipoly", multipoly), ("circles", circles)]
}

pub fn points() -> Vec<(&'static str, Points)> {
    (0..2)
        .map(|i| {
            let coords = noise(&[100, 2], 10 + i);
            let genes: Vec<&str> = (0..100).map(|r| if r % 3 == 0 { "a" } else { "b" }).collect();
            let annotation = DataFrame::new()
                .with_column("genes", Column::strings(&genes))
                .unwrap()
                .with_column("instance_id", Column::Int64((0..100).map(|r| r % 10).collect()))
                .unwrap();
            let points = PointsModel::parse_array(
                &coords,
                Some(&annotation),
                PointsParseOptions::new()
                    .with_feature_key("genes")
                    .with_instance_key("instance_id"),
            )
            .unwrap();
            (if i == 0 { "points_0" } else { "points_1" }, points)
        })
        .collect()
}

/// A 100 x 10 table with obs columns `a`, `b`, `c` and `instance_id`.
///
/// With a list of regions, rows cycle through them in the `region_key`
/// column.
pub fn table(regions: &[&str], region_key: Option<&str>) -> Table {
    let n = 100;
    let obs_values = noise(&[n, 3], 42);
    let mut obs = DataFrame::new();
    for (j, name) in ["a", "b", "c"].iter().enumerate() {
        let values = (0..n).map(|i| obs_values.row(i)[j]).collect();
        obs.insert(*name, Column::Float64(values)).unwrap();
    }
    obs.insert("instance_id", Column::Int64((0..n as i64).collect()))
        .unwrap();
    let mut table = Table::new(noise(&[n, 10], 43), obs).unwrap();

    let linkage = match regions {
        [] => TableLinkage::none(),
        [single] if region_key.is_none() => TableLinkage::single(*single, "instance_id"),
        many => {
            let key = region_key.unwrap_or("annotated_region");
            let column: Vec<&str> = (0..n).map(|i| many[i % many.len()]).collect();
            table.set_obs_column(key, Column::strings(&column)).unwrap();
            TableLinkage::multiple(many, key, "instance_id")
        }
    };
    TableModel::parse(table, linkage).unwrap()
}

/// Every element kind, plus a table annotating `sample1`.
pub fn full_sdata() -> SpatialData {
    let mut sdata = SpatialData::new();
    for (name, image) in images() {
        sdata.add_image(name, image).unwrap();
    }
    for (name, labels) in labels() {
        sdata.add_labels(name, labels).unwrap();
    }
    for (name, shapes) in shapes() {
        sdata.add_shapes(name, shapes).unwrap();
    }
    for (name, points) in points() {
        sdata.add_points(name, points).unwrap();
    }
    sdata.set_table(table(&["sample1"], None)).unwrap();
    sdata
}
