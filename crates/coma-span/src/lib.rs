//! Coma span model
//!
//! Clause annotation over an immutable, ordered sequence of text blocks.
//!
//! # Core Concepts
//!
//! - [`Position`]: `(block, offset)` pair with a lexicographic total order
//! - [`ContentBlock`]: immutable unit of document text
//! - [`Clause`]: a tagged span `[start, end)`, possibly still unterminated
//! - [`store`]: start/end/delete/update operations enforcing the non-overlap invariants
//! - [`merge`]: flatten a sub-region into one clause, absorbing enclosed clauses
//! - [`bootstrap`]: derive initial clauses from block kinds through a [`BoundaryClassifier`]
//!
//! # Example
//!
//! ```rust,ignore
//! use coma_span::{store, ClauseKind, ContentBlock, Position};
//!
//! let content = vec![ContentBlock::new("b0", "Section 1", "HEADER")];
//! let open = store::start_clause(&[], &content, Position::new(0, 3), ClauseKind::Clause)?;
//! assert_eq!(open.start, Position::new(0, 0));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod block;
pub mod bootstrap;
pub mod clause;
pub mod error;
pub mod merge;
pub mod position;
pub mod snap;
pub mod store;

pub use block::{document_end, ContentBlock};
pub use bootstrap::{derive_clauses, BoundaryClassifier, HeadingPatternClassifier, KindClassifier};
pub use clause::{Clause, ClauseId, ClauseKind, ClausePatch};
pub use error::SpanError;
pub use merge::merge;
pub use position::{compare, Position};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
