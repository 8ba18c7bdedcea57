use crate::Merger;
use geojson::GeoJson;
use std::str::FromStr;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

/// Merges touching Polygon/MultiPolygon features of a GeoJSON string and
/// returns the dissolved FeatureCollection as a string.
#[wasm_bindgen]
pub fn dissolve(geojson_str: &str, precision: Option<f64>) -> Result<String, JsValue> {
    let geojson = GeoJson::from_str(geojson_str)
        .map_err(|e| JsValue::from_str(&format!("Failed to parse GeoJSON: {}", e)))?;

    let mut merger = Merger::new();
    merger.coordinate_precision = precision;

    match geojson {
        GeoJson::FeatureCollection(fc) => {
            for feature in fc.features {
                if let Some(geom) = feature.geometry {
                    if let Ok(geo_geom) = geom.try_into() {
                        merger.add_geometry(geo_geom);
                    }
                }
            }
        }
        GeoJson::Feature(feature) => {
            if let Some(geom) = feature.geometry {
                if let Ok(geo_geom) = geom.try_into() {
                    merger.add_geometry(geo_geom);
                }
            }
        }
        GeoJson::Geometry(geometry) => {
            if let Ok(geo_geom) = geometry.try_into() {
                merger.add_geometry(geo_geom);
            }
        }
    }

    let output = merger
        .merge()
        .map_err(|e| JsValue::from_str(&format!("Merge failed: {}", e)))?;

    let fc = output.to_feature_collection();
    serde_json::to_string(&fc)
        .map_err(|e| JsValue::from_str(&format!("Serialization failed: {}", e)))
}
