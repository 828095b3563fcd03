//! Test support: logging setup and small tree fixtures

use std::sync::Once;

use tracing::{debug, info};
use tracing_subscriber::{
    filter::filter_fn,
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::domain::{EventKind, SomaticEvent, SubcloneOutline, SubcloneTree, TreeBuilder, TreeOutline};

static TEST_SETUP: Once = Once::new();

/// Install a global tracing subscriber once per test binary.
///
/// Honors `RUST_LOG`, otherwise logs everything at debug level.
pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        setup_test_logging();
        info!("Test Setup complete");
    });
}

fn setup_test_logging() {
    // Rayon worker spans drown out placement traces
    let noisy_modules = ["rayon", "rayon_core"];
    let module_filter = filter_fn(move |metadata| {
        !noisy_modules
            .iter()
            .any(|name| metadata.target().starts_with(name))
    });

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_test_writer()
            .with_target(true)
            .with_thread_names(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(module_filter)
            .with_filter(env_filter),
    );

    if tracing::dispatcher::has_been_set() {
        debug!("Tracing subscriber already set");
    } else {
        subscriber.try_init().unwrap_or_else(|e| {
            eprintln!("Error: Failed to set up logging: {}", e);
        });
    }
}

/// Point mutation shorthand for fixtures.
pub fn snv(chrom: &str, position: u64) -> SomaticEvent {
    SomaticEvent::point(EventKind::Snv, chrom, position)
}

/// Copy number segment shorthand for fixtures.
pub fn cnv(chrom: &str, start: u64, end: u64) -> SomaticEvent {
    SomaticEvent::range(EventKind::Cnv, chrom, start, end)
}

/// Build a validated tree from a root outline.
///
/// Panics on invalid input; fixtures are expected to be well formed.
pub fn build_tree(name: &str, root: SubcloneOutline) -> SubcloneTree {
    let outline = TreeOutline {
        name: Some(name.to_string()),
        root,
    };
    match TreeBuilder::new().build(&outline) {
        Ok(tree) => tree,
        Err(e) => panic!("invalid fixture tree {name}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_setup() {
        init_test_setup();
        init_test_setup();
    }

    #[test]
    fn given_outline_when_building_fixture_then_named_tree() {
        let tree = build_tree(
            "fixture",
            SubcloneOutline::new("root").with_events([snv("1", 10), cnv("2", 0, 100)]),
        );
        assert_eq!(tree.name.as_deref(), Some("fixture"));
        assert_eq!(tree.event_count(), 2);
    }
}
