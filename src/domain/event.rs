//! Somatic events and tolerant event equality.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

/// Default tolerance (in base pairs) for treating two breakpoints as the same call.
pub const DEFAULT_BOUNDARY_RESOLUTION: u64 = 20_000_000;

/// Kind of a somatic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Single nucleotide variant / point mutation
    Snv,
    /// Copy number variation
    Cnv,
    /// Copy-neutral loss of heterozygosity
    Cnloh,
    /// Structural variant
    Sv,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Snv => "snv",
            EventKind::Cnv => "cnv",
            EventKind::Cnloh => "cnloh",
            EventKind::Sv => "sv",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "snv" | "snp" => Some(EventKind::Snv),
            "cnv" => Some(EventKind::Cnv),
            "cnloh" => Some(EventKind::Cnloh),
            "sv" => Some(EventKind::Sv),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A somatic event located on the genome.
///
/// Coordinates come from imprecise breakpoint calls, so the derived
/// `PartialEq` (exact equality) is only useful for bookkeeping. Placement and
/// event-set operations compare events through an [`EventMatcher`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SomaticEvent {
    pub kind: EventKind,
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    /// Absolute copy number for CNV events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_number: Option<f64>,
    /// Reference allele for SNV events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_allele: Option<String>,
    /// Alternative allele for SNV events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_allele: Option<String>,
    /// Fraction of cells carrying the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,
}

/// Events are shared between subclones and temporary sets, never copied.
pub type SomaticEventPtr = Arc<SomaticEvent>;

impl SomaticEvent {
    /// Point event (start == end).
    pub fn point(kind: EventKind, chrom: impl Into<String>, position: u64) -> Self {
        Self::range(kind, chrom, position, position)
    }

    pub fn range(kind: EventKind, chrom: impl Into<String>, start: u64, end: u64) -> Self {
        Self {
            kind,
            chrom: chrom.into(),
            start,
            end,
            copy_number: None,
            ref_allele: None,
            alt_allele: None,
            frequency: None,
        }
    }

    pub fn with_copy_number(mut self, copy_number: f64) -> Self {
        self.copy_number = Some(copy_number);
        self
    }

    pub fn with_alleles(mut self, ref_allele: impl Into<String>, alt_allele: impl Into<String>) -> Self {
        self.ref_allele = Some(ref_allele.into());
        self.alt_allele = Some(alt_allele.into());
        self
    }

    pub fn with_frequency(mut self, frequency: f64) -> Self {
        self.frequency = Some(frequency);
        self
    }

    /// Check coordinate and payload sanity.
    pub fn validate(&self) -> Result<(), DomainError> {
        let invalid = |message: &str| DomainError::InvalidEvent {
            event: self.to_string(),
            message: message.to_string(),
        };
        if self.chrom.trim().is_empty() {
            return Err(invalid("empty chromosome"));
        }
        if self.end < self.start {
            return Err(invalid("end before start"));
        }
        if let Some(f) = self.frequency {
            if !(0.0..=1.0).contains(&f) {
                return Err(invalid("frequency outside [0, 1]"));
            }
        }
        if let Some(cn) = self.copy_number {
            if cn < 0.0 {
                return Err(invalid("negative copy number"));
            }
        }
        Ok(())
    }

    pub fn is_point(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for SomaticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_point() {
            write!(f, "{}:{}:{}", self.kind, self.chrom, self.start)
        } else {
            write!(f, "{}:{}:{}-{}", self.kind, self.chrom, self.start, self.end)
        }
    }
}

/// Decides whether two event records describe the same underlying mutation.
pub trait EventMatcher: Send + Sync {
    fn same_event(&self, a: &SomaticEvent, b: &SomaticEvent) -> bool;
}

/// Tolerant equality: same kind and chromosome, both breakpoints within
/// `resolution` base pairs of each other (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryMatcher {
    resolution: u64,
}

impl Default for BoundaryMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_BOUNDARY_RESOLUTION)
    }
}

impl BoundaryMatcher {
    pub fn new(resolution: u64) -> Self {
        Self { resolution }
    }

    pub fn resolution(&self) -> u64 {
        self.resolution
    }
}

impl EventMatcher for BoundaryMatcher {
    fn same_event(&self, a: &SomaticEvent, b: &SomaticEvent) -> bool {
        a.kind == b.kind
            && a.chrom == b.chrom
            && a.start.abs_diff(b.start) <= self.resolution
            && a.end.abs_diff(b.end) <= self.resolution
    }
}
