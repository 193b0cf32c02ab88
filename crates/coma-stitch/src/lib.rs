//! Coma stitching
//!
//! Rebuilds a full, linear view of a document from sparse clause ranges.
//!
//! # Core Concepts
//!
//! - [`extract`]: text between two positions, joining blocks with `"\n"`
//! - [`stitch`]: ordered clause-segments plus synthetic gap-segments
//! - [`finalize`]: one block per segment, clauses re-indexed onto the new blocks
//! - [`export`]: the JSON export array (header element followed by segments)
//!
//! # Example
//!
//! ```rust,ignore
//! use coma_stitch::{stitch, Segment};
//!
//! let segments = stitch(&content, &clauses);
//! for segment in &segments {
//!     println!("{}: {}", segment.label(), segment.text());
//! }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod assembler;
mod error;
mod export;
mod extract;
mod finalize;
mod segment;

pub use assembler::stitch;
pub use error::StitchError;
pub use export::{export, validate_kinds, ExportEntry, ExportSegment, HEADER_TYPE, SKIP_TYPE};
pub use extract::extract;
pub use finalize::{finalize, Finalized};
pub use segment::{Segment, GAP_LABEL};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
