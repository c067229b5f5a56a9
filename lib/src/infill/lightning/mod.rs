//! Lightning Infill
//!
//! Lightning infill grows minimal branching trees on every layer of a part,
//! only where the top skin (and the infill lines above) need support. Each
//! printed line holds up everything within the *supporting radius* around it,
//! so a layer only needs enough tree branches to bring every unsupported
//! point within that radius.
//!
//! # Algorithm
//!
//! 1. Inset every slice by one extrusion width to get the infill outlines.
//! 2. Derive each layer's overhang: the part of its outline (shrunk by the
//!    wall-supporting radius) not covered by the outline of the layer above.
//! 3. Walk the layers from top to bottom. On each layer:
//!    - sample the overhang on a grid ([`UnsupportedAreaField`]) and, while
//!      samples remain, ground each one on the boundary or graft it onto an
//!      existing tree ([`Layer::generate_new_trees`]);
//!    - re-ground or merge the trees inherited from the layer above
//!      ([`Layer::reconnect_roots`]);
//!    - prune, straighten and realign every tree against the outline of the
//!      layer below, which receives them as its initial trees.
//! 4. Serialize every tree into polylines, trimming the junction ends.
//!
//! # Example
//!
//! ```rust,ignore
//! use lightning_infill::infill::lightning::{Generator, LightningConfig};
//!
//! let config = LightningConfig::default().with_fill_density(0.2);
//! let generator = Generator::new(config, &slices)?;
//! for (idx, polylines) in generator.generate_polylines().iter().enumerate() {
//!     println!("layer {idx}: {} lines", polylines.len());
//! }
//! ```

mod config;
mod distance_field;
mod generator;
mod layer;
mod outline;
mod tree;

pub use config::{LightningConfig, LightningParams};
pub use distance_field::{UnsupportedAreaField, UnsupportedCell};
pub use generator::Generator;
pub use layer::{GroundingLocation, Layer};
pub use outline::InfillOutline;
pub use tree::{Node, NodeId, TreeArena};

use crate::edge_grid::EdgeGrid;
use crate::geometry::Point;
use crate::Coord;
use thiserror::Error;

/// Distance below which a point counts as lying on the outline boundary
/// (10 µm).
pub const BOUNDARY_TOLERANCE: Coord = 10_000;

/// Errors reported before any lightning geometry is generated.
#[derive(Debug, Error)]
pub enum LightningError {
    /// A configuration value is out of range.
    #[error("Invalid lightning config: {field} = {value} ({reason})")]
    InvalidConfig {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// Explicit overhangs were supplied for a different number of layers.
    #[error("Got {overhangs} overhang regions for {layers} layers")]
    OverhangCountMismatch { layers: usize, overhangs: usize },
}

/// Result type for lightning operations.
pub type LightningResult<T> = Result<T, LightningError>;

/// True if `p` is inside `outline` or within [`BOUNDARY_TOLERANCE`] of its
/// boundary.
pub(crate) fn is_inside(outline: &InfillOutline, locator: &EdgeGrid, p: &Point) -> bool {
    outline.contains(p) || locator.closest_point(p, BOUNDARY_TOLERANCE).is_some()
}
