//! GeoJSON representation of tree feature records.

use std::collections::HashSet;

use serde_json::{json, Map, Value};
use thiserror::Error;

use super::features::TreeFeatures;

/// Errors that can occur while building an export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("duplicate tree label {0} in export batch")]
    DuplicateLabel(u32),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Build a GeoJSON `FeatureCollection` with one `Point` per tree at its centroid.
///
/// Every record field except the centroid goes into `properties`; an infinite
/// density becomes `null`. Labels must be unique within the batch.
pub fn features_to_geojson(features: &[TreeFeatures]) -> Result<Value, ExportError> {
    let mut seen = HashSet::with_capacity(features.len());
    let mut out = Vec::with_capacity(features.len());

    for tree in features {
        if !seen.insert(tree.label) {
            return Err(ExportError::DuplicateLabel(tree.label));
        }

        let mut properties: Map<String, Value> = match serde_json::to_value(tree)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        properties.remove("centroid_x");
        properties.remove("centroid_y");

        out.push(json!({
            "type": "Feature",
            "geometry": {
                "type": "Point",
                "coordinates": [tree.centroid_x, tree.centroid_y],
            },
            "properties": properties,
        }));
    }

    Ok(json!({
        "type": "FeatureCollection",
        "features": out,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(label: u32, density: f64) -> TreeFeatures {
        TreeFeatures {
            label,
            height: 12.5,
            point_count: 40,
            footprint: 8.0,
            p95_height: 12.0,
            p50_height: 9.0,
            density,
            centroid_x: 100.0 + label as f64,
            centroid_y: 200.0,
        }
    }

    #[test]
    fn test_feature_collection_shape() {
        let fc = features_to_geojson(&[tree(0, 5.0), tree(3, 5.0)]).unwrap();

        assert_eq!(fc["type"], "FeatureCollection");
        let features = fc["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);

        let second = &features[1];
        assert_eq!(second["geometry"]["type"], "Point");
        assert_eq!(second["geometry"]["coordinates"][0], 103.0);
        assert_eq!(second["geometry"]["coordinates"][1], 200.0);
        assert_eq!(second["properties"]["label"], 3);
        assert_eq!(second["properties"]["point_count"], 40);
        assert!(second["properties"].get("centroid_x").is_none());
    }

    #[test]
    fn test_infinite_density_is_null() {
        let fc = features_to_geojson(&[tree(1, f64::INFINITY)]).unwrap();
        assert!(fc["features"][0]["properties"]["density"].is_null());
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let result = features_to_geojson(&[tree(2, 1.0), tree(2, 1.0)]);
        assert!(matches!(result, Err(ExportError::DuplicateLabel(2))));
    }

    #[test]
    fn test_empty_batch() {
        let fc = features_to_geojson(&[]).unwrap();
        assert_eq!(fc["features"].as_array().unwrap().len(), 0);
    }
}
