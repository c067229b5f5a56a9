//! Infill pattern generation.
//!
//! Only the tree-based "lightning" pattern lives here. It fills the inside of
//! a part with branching lines that exist only where the layers above need
//! to be held up.

pub mod lightning;
