//! Canonical tree and forest representation.
//!
//! Structure-of-arrays storage for trained regression trees, plus the
//! [`Forest`] ensemble that sums tree outputs over a base score. Trees are
//! immutable after training; prediction takes `&self` everywhere so a loaded
//! model can serve concurrent requests without locking.

mod forest;
mod tree;

pub use forest::Forest;
pub use tree::{NodeId, Tree};
