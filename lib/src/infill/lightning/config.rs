//! Lightning infill configuration.

use super::distance_field::{sample_cell_size, SAMPLES_PER_RADIUS};
use super::{LightningError, LightningResult};
use crate::{scale, Coord, CoordF};
use serde::{Deserialize, Serialize};

/// Configuration for lightning infill generation.
///
/// Lengths are in mm, angles in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightningConfig {
    /// Infill extrusion width (mm). Also the inset from the slice to the
    /// infill outline.
    pub extrusion_width: CoordF,

    /// Infill density as a fraction in (0, 1].
    pub fill_density: CoordF,

    /// Layer height (mm).
    pub layer_height: CoordF,

    /// Overhang angle from vertical (degrees). Sets how far a wall holds up
    /// the layer above it.
    pub overhang_angle: CoordF,

    /// Angle (degrees) setting how much of each tree is pruned per layer.
    pub prune_angle: CoordF,

    /// Angle (degrees) setting how far a node may move per layer when trees
    /// are straightened.
    pub straightening_angle: CoordF,

    /// Cell size of the boundary locator and tree-node lookup (mm).
    pub locator_cell_size: CoordF,

    /// Length trimmed off the junction end of every output polyline (mm).
    pub line_overlap: CoordF,

    /// Reduction of the wall threshold when re-grounding inherited trees (mm).
    pub reconnect_wall_offset: CoordF,

    /// Whether the topmost layer's whole infill area needs support.
    pub support_top_layer: bool,

    /// Seed of the random source used to pick branch continuations.
    pub seed: u64,
}

impl Default for LightningConfig {
    fn default() -> Self {
        Self {
            extrusion_width: 0.45,
            fill_density: 0.15,
            layer_height: 0.2,
            overhang_angle: 45.0,
            prune_angle: 45.0,
            straightening_angle: 45.0,
            locator_cell_size: 4.0,
            line_overlap: 0.225,
            reconnect_wall_offset: 0.1,
            support_top_layer: true,
            seed: 0,
        }
    }
}

impl LightningConfig {
    /// Create a new config with the given extrusion width and density.
    pub fn new(extrusion_width: CoordF, fill_density: CoordF) -> Self {
        Self {
            extrusion_width,
            fill_density,
            ..Default::default()
        }
    }

    pub fn with_extrusion_width(mut self, width: CoordF) -> Self {
        self.extrusion_width = width;
        self
    }

    pub fn with_fill_density(mut self, density: CoordF) -> Self {
        self.fill_density = density;
        self
    }

    pub fn with_layer_height(mut self, height: CoordF) -> Self {
        self.layer_height = height;
        self
    }

    /// Set all three angle thresholds at once.
    pub fn with_angles(mut self, overhang: CoordF, prune: CoordF, straightening: CoordF) -> Self {
        self.overhang_angle = overhang;
        self.prune_angle = prune;
        self.straightening_angle = straightening;
        self
    }

    pub fn with_locator_cell_size(mut self, size: CoordF) -> Self {
        self.locator_cell_size = size;
        self
    }

    pub fn with_line_overlap(mut self, overlap: CoordF) -> Self {
        self.line_overlap = overlap;
        self
    }

    pub fn with_reconnect_wall_offset(mut self, offset: CoordF) -> Self {
        self.reconnect_wall_offset = offset;
        self
    }

    pub fn with_support_top_layer(mut self, support: bool) -> Self {
        self.support_top_layer = support;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check every value is in range.
    ///
    /// # Errors
    ///
    /// Returns `LightningError::InvalidConfig` naming the first bad field.
    pub fn validate(&self) -> LightningResult<()> {
        positive("extrusion_width", self.extrusion_width)?;
        positive("layer_height", self.layer_height)?;
        positive("locator_cell_size", self.locator_cell_size)?;

        if !(self.fill_density > 0.0 && self.fill_density <= 1.0) {
            return Err(invalid("fill_density", self.fill_density, "must be in (0, 1]"));
        }

        angle("overhang_angle", self.overhang_angle)?;
        angle("prune_angle", self.prune_angle)?;
        angle("straightening_angle", self.straightening_angle)?;

        non_negative("line_overlap", self.line_overlap)?;
        non_negative("reconnect_wall_offset", self.reconnect_wall_offset)?;

        let radius = scale(self.extrusion_width / self.fill_density);
        if radius < SAMPLES_PER_RADIUS {
            return Err(invalid(
                "extrusion_width",
                self.extrusion_width,
                "supporting radius too small to sample",
            ));
        }

        Ok(())
    }

    /// Validate and derive the scaled parameters used by the generator.
    pub fn params(&self) -> LightningResult<LightningParams> {
        self.validate()?;

        let supporting_radius = scale(self.extrusion_width / self.fill_density);
        let locator_cell_size = scale(self.locator_cell_size).max(1);

        Ok(LightningParams {
            supporting_radius,
            wall_supporting_radius: self.layer_reach(self.overhang_angle),
            prune_length: self.layer_reach(self.prune_angle),
            straightening_max_distance: self.layer_reach(self.straightening_angle),
            locator_cell_size,
            max_colinear_distance: locator_cell_size / 2,
            line_overlap: scale(self.line_overlap),
            reconnect_wall_offset: scale(self.reconnect_wall_offset),
            sample_cell_size: sample_cell_size(supporting_radius),
        })
    }

    /// Horizontal distance covered over one layer at `angle` from vertical.
    fn layer_reach(&self, angle: CoordF) -> Coord {
        scale(self.layer_height * angle.to_radians().tan())
    }
}

fn invalid(field: &'static str, value: CoordF, reason: &'static str) -> LightningError {
    LightningError::InvalidConfig {
        field,
        value,
        reason,
    }
}

fn positive(field: &'static str, value: CoordF) -> LightningResult<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, value, "must be positive"))
    }
}

fn non_negative(field: &'static str, value: CoordF) -> LightningResult<()> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, value, "must not be negative"))
    }
}

fn angle(field: &'static str, value: CoordF) -> LightningResult<()> {
    if (0.0..90.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, value, "must be in [0, 90) degrees"))
    }
}

/// Scaled values derived from a [`LightningConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightningParams {
    /// Distance a printed line supports around itself.
    pub supporting_radius: Coord,
    /// Distance a wall supports into the layer above.
    pub wall_supporting_radius: Coord,
    /// Length pruned off every tree per layer.
    pub prune_length: Coord,
    /// Maximum node displacement per layer when straightening.
    pub straightening_max_distance: Coord,
    pub locator_cell_size: Coord,
    /// Nodes closer than this to both neighbours may be spliced out.
    pub max_colinear_distance: Coord,
    pub line_overlap: Coord,
    pub reconnect_wall_offset: Coord,
    /// Grid spacing of the unsupported-area samples.
    pub sample_cell_size: Coord,
}

impl LightningParams {
    /// Wall threshold used when re-grounding inherited trees.
    pub fn reconnect_wall_threshold(&self) -> Coord {
        (self.wall_supporting_radius - self.reconnect_wall_offset).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = LightningConfig::default().params().unwrap();

        // 0.45 / 0.15 = 3mm
        assert_eq!(params.supporting_radius, 3_000_000);
        // 0.2 * tan(45°) = 0.2mm
        assert!((params.wall_supporting_radius - 200_000).abs() <= 1);
        assert!((params.prune_length - 200_000).abs() <= 1);
        assert!((params.straightening_max_distance - 200_000).abs() <= 1);
        assert_eq!(params.locator_cell_size, 4_000_000);
        assert_eq!(params.max_colinear_distance, 2_000_000);
        assert_eq!(params.sample_cell_size, 500_000);
        assert_eq!(params.line_overlap, 225_000);
        assert!((params.reconnect_wall_threshold() - 100_000).abs() <= 1);
    }

    #[test]
    fn test_builders() {
        let config = LightningConfig::new(0.4, 0.2)
            .with_layer_height(0.1)
            .with_angles(30.0, 40.0, 50.0)
            .with_seed(7)
            .with_support_top_layer(false);

        assert_eq!(config.extrusion_width, 0.4);
        assert_eq!(config.fill_density, 0.2);
        assert_eq!(config.prune_angle, 40.0);
        assert_eq!(config.seed, 7);
        assert!(!config.support_top_layer);
        assert_eq!(config.params().unwrap().supporting_radius, 2_000_000);
    }

    #[test]
    fn test_zero_angle_gives_zero_reach() {
        let params = LightningConfig::default()
            .with_angles(0.0, 0.0, 0.0)
            .params()
            .unwrap();
        assert_eq!(params.wall_supporting_radius, 0);
        assert_eq!(params.prune_length, 0);
        assert_eq!(params.reconnect_wall_threshold(), 0);
    }

    #[test]
    fn test_invalid_density() {
        for density in [0.0, -0.1, 1.5, CoordF::NAN] {
            let result = LightningConfig::default().with_fill_density(density).validate();
            assert!(matches!(
                result,
                Err(LightningError::InvalidConfig {
                    field: "fill_density",
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_invalid_values() {
        let cases = [
            (LightningConfig::default().with_extrusion_width(0.0), "extrusion_width"),
            (LightningConfig::default().with_layer_height(-0.2), "layer_height"),
            (LightningConfig::default().with_angles(90.0, 45.0, 45.0), "overhang_angle"),
            (LightningConfig::default().with_angles(45.0, -1.0, 45.0), "prune_angle"),
            (LightningConfig::default().with_locator_cell_size(0.0), "locator_cell_size"),
            (LightningConfig::default().with_line_overlap(-0.1), "line_overlap"),
        ];

        for (config, expected) in cases {
            match config.params() {
                Err(LightningError::InvalidConfig { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected error on {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_radius_too_small_to_sample() {
        // 1e-6mm / 1.0 = 1 unit, less than one sample cell
        let config = LightningConfig::new(0.000_001, 1.0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("too small to sample"));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: LightningConfig =
            serde_json::from_str(r#"{ "fill_density": 0.3, "seed": 42 }"#).unwrap();
        assert_eq!(config.fill_density, 0.3);
        assert_eq!(config.seed, 42);
        assert_eq!(config.extrusion_width, 0.45);
        assert_eq!(config.locator_cell_size, 4.0);
        assert!(config.support_top_layer);
    }
}
