//! Fuzz target for GeoJSON shapes parsing.

#![no_main]

use libfuzzer_sys::fuzz_target;
use spatialdata::model::{ShapesModel, ShapesParseOptions};

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    if let Ok(shapes) = ShapesModel::parse_geojson_slice(data, ShapesParseOptions::new()) {
        let _ = ShapesModel::validate(&shapes);
    }
});
