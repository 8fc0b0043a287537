//! Follow and favorite edges: read-side oracle and the mutators that keep
//! the favorite counter in step with the edges.

pub mod mutators;
pub mod oracle;

pub use mutators::{FavoriteCounter, FollowService};
pub use oracle::{FavoriteSet, FollowSet, RelationshipOracle};
