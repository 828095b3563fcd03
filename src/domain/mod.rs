//! Domain layer: subclone trees, somatic events, placement and merging
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod builder;
pub mod entities;
pub mod error;
pub mod event;
pub mod event_set;
pub mod placement;

pub use arena::{Subclone, SubcloneData, SubcloneTree};
pub use builder::{outline, TreeBuilder};
pub use entities::*;
pub use error::DomainError;
pub use event::{
    BoundaryMatcher, EventKind, EventMatcher, SomaticEvent, SomaticEventPtr,
    DEFAULT_BOUNDARY_RESOLUTION,
};
pub use event_set::{compare_by_size, contains, difference, has_fewer_events, EventSet};
pub use placement::{
    check_placement, merge_report, node_events_list, tree_merge, MergeReport, NodeVerdict,
    Placement,
};
