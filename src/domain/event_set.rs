//! Set operations over ordered somatic event sequences.
//!
//! Sequences keep insertion order, which carries no meaning. Every
//! comparison goes through an [`EventMatcher`], never through `PartialEq`.

use std::cmp::Ordering;

use crate::domain::event::{EventMatcher, SomaticEvent, SomaticEventPtr};

/// An ordered sequence of shared events.
pub type EventSet = Vec<SomaticEventPtr>;

fn has_match<M: EventMatcher + ?Sized>(set: &[SomaticEventPtr], event: &SomaticEvent, matcher: &M) -> bool {
    set.iter().any(|candidate| matcher.same_event(candidate, event))
}

/// Events of `master` without a counterpart in `unwanted`, in `master` order.
pub fn difference<M: EventMatcher + ?Sized>(
    master: &[SomaticEventPtr],
    unwanted: &[SomaticEventPtr],
    matcher: &M,
) -> EventSet {
    master
        .iter()
        .filter(|event| !has_match(unwanted, event, matcher))
        .cloned()
        .collect()
}

/// True if every event of `containee` has a counterpart in `container`.
pub fn contains<M: EventMatcher + ?Sized>(
    container: &[SomaticEventPtr],
    containee: &[SomaticEventPtr],
    matcher: &M,
) -> bool {
    containee
        .iter()
        .all(|event| has_match(container, event, matcher))
}

/// Ranks result sets ascending by event count: fewer unexplained events first.
pub fn compare_by_size(v1: &[SomaticEventPtr], v2: &[SomaticEventPtr]) -> Ordering {
    v1.len().cmp(&v2.len())
}

/// Strict-weak-ordering predicate form of [`compare_by_size`].
pub fn has_fewer_events(v1: &[SomaticEventPtr], v2: &[SomaticEventPtr]) -> bool {
    compare_by_size(v1, v2) == Ordering::Less
}
