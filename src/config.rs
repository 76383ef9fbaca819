//! Router settings and their JSON overlay.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_6};
use std::path::Path;

use crate::error::ConfigError;

/// Settings for grouping edges that travel a shared corridor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundlingSettings {
    /// Weight of one unit of saved ink against one unit of added path length.
    pub ink_importance: f64,
    /// Gap between neighbouring strands of a bundle.
    pub edge_separation: f64,
    pub max_bundle_size: usize,
    /// Fraction of the shorter path that must run in the shared corridor.
    pub min_overlap_ratio: f64,
    /// How many times a bundle spacing may be halved before members fall back
    /// to their own routes.
    pub max_spacing_halvings: u32,
}

impl Default for BundlingSettings {
    fn default() -> Self {
        Self {
            ink_importance: 1.0,
            edge_separation: 1.0,
            max_bundle_size: 16,
            min_overlap_ratio: 0.3,
            max_spacing_halvings: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittingConfig {
    /// Upper bound for the rounding radius at a polyline corner.
    pub max_corner_radius: f64,
    /// Position of the cubic control points between the rounding ends and the
    /// corner, as a fraction of that distance.
    pub control_point_ratio: f64,
    pub max_radius_halvings: u32,
}

impl Default for FittingConfig {
    fn default() -> Self {
        Self {
            max_corner_radius: 30.0,
            control_point_ratio: 0.55,
            max_radius_halvings: 6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RectilinearConfig {
    /// Radius of the quarter arcs replacing corners; zero keeps sharp corners.
    pub corner_fit_radius: f64,
    /// Extra cost of one 90 degree turn, in length units.
    pub bend_penalty: f64,
    /// Spacing of side ports shared by parallel edges.
    pub edge_separation: f64,
}

impl Default for RectilinearConfig {
    fn default() -> Self {
        Self {
            corner_fit_radius: 3.0,
            bend_penalty: 10.0,
            edge_separation: 4.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Hard clearance kept between curves and node boundaries.
    pub tight_padding: f64,
    /// Padding of the polygons the visibility graph is built on.
    pub loose_padding: f64,
    /// Half-angle of the visibility cones, in radians.
    pub cone_half_angle: f64,
    /// Extra search cost per radian of turn; zero disables it.
    pub bend_penalty: f64,
    /// Spacing between parallel edges of the same node pair.
    pub edge_separation: f64,
    pub bundling: Option<BundlingSettings>,
    pub fitting: FittingConfig,
    pub rectilinear: RectilinearConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            tight_padding: 2.0,
            loose_padding: 4.0,
            cone_half_angle: FRAC_PI_6,
            bend_penalty: 0.0,
            edge_separation: 2.0,
            bundling: None,
            fitting: FittingConfig::default(),
            rectilinear: RectilinearConfig::default(),
        }
    }
}

fn check(section: &'static str, field: &'static str, value: f64, ok: bool) -> Result<(), ConfigError> {
    if ok && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            section,
            field,
            value,
        })
    }
}

impl RouterConfig {
    pub fn with_paddings(tight_padding: f64, loose_padding: f64, cone_half_angle: f64) -> Self {
        Self {
            tight_padding,
            loose_padding,
            cone_half_angle,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tight_padding.is_finite() && self.tight_padding > 0.0) {
            return Err(ConfigError::TightPadding(self.tight_padding));
        }
        if !(self.loose_padding.is_finite() && self.loose_padding >= self.tight_padding) {
            return Err(ConfigError::LoosePadding {
                loose: self.loose_padding,
                tight: self.tight_padding,
            });
        }
        if !(self.cone_half_angle > 0.0 && self.cone_half_angle <= FRAC_PI_2) {
            return Err(ConfigError::ConeAngle(self.cone_half_angle));
        }
        check("router", "bendPenalty", self.bend_penalty, self.bend_penalty >= 0.0)?;
        check("router", "edgeSeparation", self.edge_separation, self.edge_separation >= 0.0)?;
        if let Some(bundling) = &self.bundling {
            check("bundling", "inkImportance", bundling.ink_importance, bundling.ink_importance >= 0.0)?;
            check(
                "bundling",
                "edgeSeparation",
                bundling.edge_separation,
                bundling.edge_separation >= 0.0,
            )?;
            check(
                "bundling",
                "maxBundleSize",
                bundling.max_bundle_size as f64,
                bundling.max_bundle_size >= 2,
            )?;
            check(
                "bundling",
                "minOverlapRatio",
                bundling.min_overlap_ratio,
                bundling.min_overlap_ratio > 0.0 && bundling.min_overlap_ratio <= 1.0,
            )?;
        }
        let fitting = &self.fitting;
        check("fitting", "maxCornerRadius", fitting.max_corner_radius, fitting.max_corner_radius >= 0.0)?;
        check(
            "fitting",
            "controlPointRatio",
            fitting.control_point_ratio,
            fitting.control_point_ratio > 0.0 && fitting.control_point_ratio <= 1.0,
        )?;
        let rect = &self.rectilinear;
        check("rectilinear", "cornerFitRadius", rect.corner_fit_radius, rect.corner_fit_radius >= 0.0)?;
        check("rectilinear", "bendPenalty", rect.bend_penalty, rect.bend_penalty >= 0.0)?;
        check("rectilinear", "edgeSeparation", rect.edge_separation, rect.edge_separation >= 0.0)?;
        Ok(())
    }
}

/// Loose padding for a layout whose nodes are `node_separation` apart: a
/// quarter of the gap left after both tight paddings, never below `tight`.
pub fn compute_loose_padding(node_separation: f64, tight_padding: f64) -> f64 {
    let free = node_separation - 2.0 * tight_padding;
    if free <= 0.0 {
        tight_padding
    } else {
        tight_padding + free * 0.25
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BundlingFile {
    ink_importance: Option<f64>,
    edge_separation: Option<f64>,
    max_bundle_size: Option<usize>,
    min_overlap_ratio: Option<f64>,
    max_spacing_halvings: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FittingFile {
    max_corner_radius: Option<f64>,
    control_point_ratio: Option<f64>,
    max_radius_halvings: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RectilinearFile {
    corner_fit_radius: Option<f64>,
    bend_penalty: Option<f64>,
    edge_separation: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    tight_padding: Option<f64>,
    loose_padding: Option<f64>,
    node_separation: Option<f64>,
    cone_half_angle: Option<f64>,
    cone_half_angle_degrees: Option<f64>,
    bend_penalty: Option<f64>,
    edge_separation: Option<f64>,
    bundling: Option<BundlingFile>,
    fitting: Option<FittingFile>,
    rectilinear: Option<RectilinearFile>,
}

/// Default settings overlaid with the camelCase JSON file at `path`. A
/// `bundling` object in the file turns bundling on. When the file gives a
/// `nodeSeparation` but no `loosePadding`, the loose padding is derived with
/// [`compute_loose_padding`].
pub fn load_config(path: Option<&Path>) -> anyhow::Result<RouterConfig> {
    let config = RouterConfig::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading router config {}", path.display()))?;
    let config = parse_config(&contents)
        .with_context(|| format!("parsing router config {}", path.display()))?;
    Ok(config)
}

fn parse_config(contents: &str) -> anyhow::Result<RouterConfig> {
    let mut config = RouterConfig::default();
    let parsed: ConfigFile = serde_json::from_str(contents)?;

    if let Some(v) = parsed.tight_padding {
        config.tight_padding = v;
    }
    if let Some(v) = parsed.loose_padding {
        config.loose_padding = v;
    } else if let Some(sep) = parsed.node_separation {
        config.loose_padding = compute_loose_padding(sep, config.tight_padding);
    } else if config.loose_padding < config.tight_padding {
        config.loose_padding = config.tight_padding;
    }
    if let Some(v) = parsed.cone_half_angle {
        config.cone_half_angle = v;
    } else if let Some(deg) = parsed.cone_half_angle_degrees {
        config.cone_half_angle = deg.to_radians();
    }
    if let Some(v) = parsed.bend_penalty {
        config.bend_penalty = v;
    }
    if let Some(v) = parsed.edge_separation {
        config.edge_separation = v;
    }
    if let Some(file) = parsed.bundling {
        let mut bundling = BundlingSettings::default();
        if let Some(v) = file.ink_importance {
            bundling.ink_importance = v;
        }
        if let Some(v) = file.edge_separation {
            bundling.edge_separation = v;
        }
        if let Some(v) = file.max_bundle_size {
            bundling.max_bundle_size = v;
        }
        if let Some(v) = file.min_overlap_ratio {
            bundling.min_overlap_ratio = v;
        }
        if let Some(v) = file.max_spacing_halvings {
            bundling.max_spacing_halvings = v;
        }
        config.bundling = Some(bundling);
    }
    if let Some(file) = parsed.fitting {
        if let Some(v) = file.max_corner_radius {
            config.fitting.max_corner_radius = v;
        }
        if let Some(v) = file.control_point_ratio {
            config.fitting.control_point_ratio = v;
        }
        if let Some(v) = file.max_radius_halvings {
            config.fitting.max_radius_halvings = v;
        }
    }
    if let Some(file) = parsed.rectilinear {
        if let Some(v) = file.corner_fit_radius {
            config.rectilinear.corner_fit_radius = v;
        }
        if let Some(v) = file.bend_penalty {
            config.rectilinear.bend_penalty = v;
        }
        if let Some(v) = file.edge_separation {
            config.rectilinear.edge_separation = v;
        }
    }

    config.validate()?;
    Ok(config)
}
