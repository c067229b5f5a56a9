//! Top-down lightning tree generation over a stack of layers.

use super::{InfillOutline, Layer, LightningConfig, LightningError, LightningParams, LightningResult};
use crate::clipper::{difference, opening, shrink, OffsetJoinType};
use crate::geometry::{ExPolygon, ExPolygons, Polyline};
use crate::unscale;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info};

/// Opening distance (mm) applied to overhangs to drop slivers.
const OVERHANG_OPENING: f64 = 0.001;

/// Lightning infill for a whole object.
///
/// Layers are indexed bottom to top, matching the input slices. All trees
/// are built on construction; the output polylines are produced on demand.
#[derive(Debug)]
pub struct Generator {
    config: LightningConfig,
    params: LightningParams,
    outlines: Vec<InfillOutline>,
    overhangs: Vec<ExPolygons>,
    layers: Vec<Layer>,
}

impl Generator {
    /// Build the trees for `slices` (one entry per layer, bottom first),
    /// deriving each layer's overhang from the layer above it.
    ///
    /// # Errors
    ///
    /// Returns `LightningError::InvalidConfig` if `config` does not validate.
    pub fn new(config: LightningConfig, slices: &[ExPolygons]) -> LightningResult<Self> {
        let params = config.params()?;
        let outlines = infill_outlines(&config, slices);
        let overhangs = derive_overhangs(&config, &params, &outlines);
        Ok(Self::build(config, params, outlines, overhangs))
    }

    /// Build the trees for `slices` with caller-supplied overhangs.
    ///
    /// # Errors
    ///
    /// Returns `LightningError::OverhangCountMismatch` if there is not
    /// exactly one overhang set per slice.
    pub fn with_overhangs(
        config: LightningConfig,
        slices: &[ExPolygons],
        overhangs: Vec<ExPolygons>,
    ) -> LightningResult<Self> {
        let params = config.params()?;
        if overhangs.len() != slices.len() {
            return Err(LightningError::OverhangCountMismatch {
                layers: slices.len(),
                overhangs: overhangs.len(),
            });
        }
        let outlines = infill_outlines(&config, slices);
        Ok(Self::build(config, params, outlines, overhangs))
    }

    fn build(
        config: LightningConfig,
        params: LightningParams,
        outlines: Vec<InfillOutline>,
        overhangs: Vec<ExPolygons>,
    ) -> Self {
        let mut generator = Self {
            config,
            params,
            layers: vec![Layer::new(); outlines.len()],
            outlines,
            overhangs,
        };
        generator.generate_trees();
        generator
    }

    fn generate_trees(&mut self) {
        let Some(top) = self.outlines.len().checked_sub(1) else {
            return;
        };
        let params = self.params;
        info!(
            layers = self.outlines.len(),
            supporting_radius_mm = unscale(params.supporting_radius),
            wall_supporting_radius_mm = unscale(params.wall_supporting_radius),
            "generating lightning trees"
        );

        let mut locator = self.outlines[top].build_locator(params.locator_cell_size);
        for idx in (0..=top).rev() {
            let outline = &self.outlines[idx];
            let layer = &mut self.layers[idx];

            let incoming = layer.roots().to_vec();
            let branches = layer.generate_new_trees(
                &self.overhangs[idx],
                outline,
                &locator,
                params.supporting_radius,
                params.wall_supporting_radius,
            );
            let merged = layer.reconnect_roots(
                &incoming,
                outline,
                &locator,
                params.supporting_radius,
                params.reconnect_wall_threshold(),
            );
            debug!(
                layer = idx,
                inherited = incoming.len(),
                branches,
                merged,
                trees = layer.tree_count(),
                nodes = layer.node_count(),
                "lightning layer done"
            );

            if idx == 0 {
                break;
            }
            let below_outline = &self.outlines[idx - 1];
            let below_locator = below_outline.build_locator(params.locator_cell_size);
            let (lower, upper) = self.layers.split_at_mut(idx);
            upper[0].propagate_into(&mut lower[idx - 1], below_outline, &below_locator, &params);
            locator = below_locator;
        }

        info!(
            trees = self.layers.iter().map(Layer::tree_count).sum::<usize>(),
            "lightning trees done"
        );
    }

    pub fn config(&self) -> &LightningConfig {
        &self.config
    }

    pub fn params(&self) -> &LightningParams {
        &self.params
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, idx: usize) -> Option<&Layer> {
        self.layers.get(idx)
    }

    pub fn infill_outline(&self, idx: usize) -> Option<&InfillOutline> {
        self.outlines.get(idx)
    }

    pub fn overhang(&self, idx: usize) -> Option<&[ExPolygon]> {
        self.overhangs.get(idx).map(Vec::as_slice)
    }

    /// Printable lines of layer `idx`, clipped to its infill outline.
    /// Empty for an index past the top layer.
    pub fn layer_polylines<R>(&self, idx: usize, rng: &mut R) -> Vec<Polyline>
    where
        R: Rng + ?Sized,
    {
        match (self.layers.get(idx), self.outlines.get(idx)) {
            (Some(layer), Some(outline)) => layer.convert_to_lines(outline, self.params.line_overlap, rng),
            _ => Vec::new(),
        }
    }

    /// Printable lines of every layer, bottom first. Each layer draws from
    /// its own random source seeded from the config, so the output does not
    /// depend on scheduling.
    pub fn generate_polylines(&self) -> Vec<Vec<Polyline>> {
        (0..self.layers.len())
            .into_par_iter()
            .map(|idx| {
                let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(idx as u64));
                self.layer_polylines(idx, &mut rng)
            })
            .collect()
    }
}

/// Inset every slice by one extrusion width.
fn infill_outlines(config: &LightningConfig, slices: &[ExPolygons]) -> Vec<InfillOutline> {
    slices
        .par_iter()
        .map(|slice| InfillOutline::new(shrink(slice, config.extrusion_width, OffsetJoinType::Miter)))
        .collect()
}

/// Area of each layer (shrunk by the wall-supporting radius) not covered by
/// the layer above.
fn derive_overhangs(
    config: &LightningConfig,
    params: &LightningParams,
    outlines: &[InfillOutline],
) -> Vec<ExPolygons> {
    let wall_radius = unscale(params.wall_supporting_radius);
    let top = outlines.len().saturating_sub(1);

    (0..outlines.len())
        .into_par_iter()
        .map(|idx| {
            let supported = shrink(outlines[idx].expolygons(), wall_radius, OffsetJoinType::Miter);
            let overhang = if idx == top {
                if !config.support_top_layer {
                    return Vec::new();
                }
                supported
            } else {
                difference(&supported, outlines[idx + 1].expolygons())
            };
            opening(&overhang, OVERHANG_OPENING)
        })
        .collect()
}
