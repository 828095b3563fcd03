//! Tree compatibility service
//!
//! Single pair checks with diagnostics, and all-pairs comparison of two tree
//! sets evaluated in parallel.

use std::sync::Arc;

use itertools::iproduct;
use rayon::prelude::*;
use tracing::{debug, info, instrument};

use crate::application::services::loader::LoadedTree;
use crate::application::ApplicationResult;
use crate::config::Settings;
use crate::domain::{merge_report, tree_merge, BoundaryMatcher, MergeReport, SubcloneTree};

/// Outcome for one (p, q) pair of a set comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairVerdict {
    pub p: String,
    pub q: String,
    pub compatible: bool,
}

/// Compares subclone trees with the configured boundary resolution.
pub struct CompareService {
    settings: Arc<Settings>,
}

impl CompareService {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    pub fn matcher(&self) -> BoundaryMatcher {
        self.settings.matcher()
    }

    /// Yes/no compatibility of `q` against reference `p`.
    pub fn is_compatible(&self, p: &SubcloneTree, q: &SubcloneTree) -> ApplicationResult<bool> {
        Ok(tree_merge(p, q, &self.matcher())?)
    }

    /// Compatibility with per-node placement diagnostics.
    #[instrument(level = "debug", skip_all, fields(p = ?p.name, q = ?q.name))]
    pub fn check_pair(&self, p: &SubcloneTree, q: &SubcloneTree) -> ApplicationResult<MergeReport> {
        let report = merge_report(p, q, &self.matcher())?;
        debug!(
            compatible = report.compatible,
            unexplained = report.unexplained().count(),
            ambiguous = report.ambiguous().count(),
            "checked pair"
        );
        Ok(report)
    }

    /// Evaluate every (p, q) pair, p from `p_set`, q from `q_set`.
    ///
    /// Results keep the nested set order (p outer, q inner).
    #[instrument(level = "info", skip_all, fields(p_set = p_set.len(), q_set = q_set.len()))]
    pub fn compare_sets(
        &self,
        p_set: &[LoadedTree],
        q_set: &[LoadedTree],
    ) -> ApplicationResult<Vec<PairVerdict>> {
        let matcher = self.matcher();
        let pairs: Vec<(&LoadedTree, &LoadedTree)> = iproduct!(p_set, q_set).collect();

        let verdicts = pairs
            .par_iter()
            .map(|(p, q)| -> ApplicationResult<PairVerdict> {
                Ok(PairVerdict {
                    p: p.origin.clone(),
                    q: q.origin.clone(),
                    compatible: tree_merge(&p.tree, &q.tree, &matcher)?,
                })
            })
            .collect::<ApplicationResult<Vec<_>>>()?;

        info!(
            pairs = verdicts.len(),
            compatible = verdicts.iter().filter(|v| v.compatible).count(),
            "compared tree sets"
        );
        Ok(verdicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventKind, SomaticEvent, SubcloneOutline, TreeBuilder, TreeOutline};

    fn snv(chrom: &str, pos: u64) -> SomaticEvent {
        SomaticEvent::point(EventKind::Snv, chrom, pos)
    }

    fn loaded(origin: &str, root: SubcloneOutline) -> LoadedTree {
        LoadedTree {
            origin: origin.to_string(),
            tree: TreeBuilder::new()
                .build(&TreeOutline { name: None, root })
                .unwrap(),
        }
    }

    // p: root{1:100} -> a{2:200}
    fn reference() -> LoadedTree {
        loaded(
            "p",
            SubcloneOutline::new("root")
                .with_events([snv("1", 100)])
                .with_child(SubcloneOutline::new("a").with_events([snv("2", 200)])),
        )
    }

    #[test]
    fn given_sets_when_comparing_then_all_pairs_in_order() {
        let service = CompareService::new(Arc::new(Settings::default()));
        let p_set = vec![reference()];
        let q_set = vec![
            loaded("same", SubcloneOutline::new("r").with_events([snv("1", 150)])),
            loaded("foreign", SubcloneOutline::new("r").with_events([snv("9", 1)])),
        ];

        let verdicts = service.compare_sets(&p_set, &q_set).unwrap();
        assert_eq!(
            verdicts,
            vec![
                PairVerdict {
                    p: "p".into(),
                    q: "same".into(),
                    compatible: true
                },
                PairVerdict {
                    p: "p".into(),
                    q: "foreign".into(),
                    compatible: false
                },
            ]
        );
    }

    #[test]
    fn given_narrow_resolution_when_checking_then_shifted_event_unexplained() {
        let settings = Settings {
            boundary_resolution: 10,
            ..Settings::default()
        };
        let service = CompareService::new(Arc::new(settings));
        let p = reference();
        let q = loaded("q", SubcloneOutline::new("r").with_events([snv("1", 150)]));

        let report = service.check_pair(&p.tree, &q.tree).unwrap();
        assert!(!report.compatible);
        assert_eq!(report.unexplained().count(), 1);
        assert!(!service.is_compatible(&p.tree, &q.tree).unwrap());
    }

    #[test]
    fn given_empty_sets_when_comparing_then_no_verdicts() {
        let service = CompareService::new(Arc::new(Settings::default()));
        assert!(service.compare_sets(&[], &[reference()]).unwrap().is_empty());
    }
}
