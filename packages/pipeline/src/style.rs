//! Output layer style descriptors.
//!
//! Cosmetic sidecars written next to each vector output so a host viewer
//! can color the layer without inspecting the data. Not part of the data
//! contract; the values mirror the conventional NLCD palette and a
//! graduated runoff ramp for curve numbers.

use serde::Serialize;

/// How a style classifies features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StyleKind {
    /// One color per discrete attribute value.
    Categorized,
    /// Color ramp over numeric ranges.
    Graduated,
}

/// One style class: a value (or upper bound) with its color and label.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleClass {
    pub value: String,
    pub label: String,
    /// Hex RGB, `#rrggbb`.
    pub color: String,
}

/// A style descriptor for one output layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleDescriptor {
    /// Attribute the classification reads.
    pub attribute: String,
    pub kind: StyleKind,
    pub classes: Vec<StyleClass>,
}

/// Graduated ramp for the curve number layer (higher = more runoff).
#[must_use]
pub fn curve_number_style() -> StyleDescriptor {
    let ramp = [
        ("40", "low runoff", "#1a9641"),
        ("60", "moderate runoff", "#a6d96a"),
        ("75", "elevated runoff", "#ffffbf"),
        ("90", "high runoff", "#fdae61"),
        ("100", "very high runoff", "#d7191c"),
    ];
    StyleDescriptor {
        attribute: "curve_number".to_string(),
        kind: StyleKind::Graduated,
        classes: ramp
            .into_iter()
            .map(|(value, label, color)| StyleClass {
                value: value.to_string(),
                label: label.to_string(),
                color: color.to_string(),
            })
            .collect(),
    }
}

/// Conventional NLCD class palette for the soils-free land cover layer.
#[must_use]
pub fn land_cover_style() -> StyleDescriptor {
    let palette = [
        ("11", "Open Water", "#466b9f"),
        ("21", "Developed, Open Space", "#dec5c5"),
        ("22", "Developed, Low Intensity", "#d99282"),
        ("23", "Developed, Medium Intensity", "#eb0000"),
        ("24", "Developed, High Intensity", "#ab0000"),
        ("31", "Barren Land", "#b3ac9f"),
        ("41", "Deciduous Forest", "#68ab5f"),
        ("42", "Evergreen Forest", "#1c5f2c"),
        ("43", "Mixed Forest", "#b5c58f"),
        ("52", "Shrub/Scrub", "#ccb879"),
        ("71", "Grassland/Herbaceous", "#dfdfc2"),
        ("81", "Pasture/Hay", "#dcd939"),
        ("82", "Cultivated Crops", "#ab6c28"),
        ("90", "Woody Wetlands", "#b8d9eb"),
        ("95", "Emergent Herbaceous Wetlands", "#6c9fb8"),
    ];
    StyleDescriptor {
        attribute: "land_cover".to_string(),
        kind: StyleKind::Categorized,
        classes: palette
            .into_iter()
            .map(|(value, label, color)| StyleClass {
                value: value.to_string(),
                label: label.to_string(),
                color: color.to_string(),
            })
            .collect(),
    }
}
