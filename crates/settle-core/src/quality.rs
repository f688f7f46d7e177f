//! Quality reconciliation.
//!
//! Two qualities combine to [`Quality::AsRead`] only when both are as-read.
//! Every other pairing yields [`Quality::Estimated`]; `QuantityMissing` is
//! absorbed into `Estimated` and never appears in a combined result.
//!
//! The rule is commutative and associative, so a group of readings can be
//! folded in any order (and in parallel) with the same outcome.

use crate::codes::Quality;

/// Combine two quality flags.
pub fn reconcile(a: Quality, b: Quality) -> Quality {
    match (a, b) {
        (Quality::AsRead, Quality::AsRead) => Quality::AsRead,
        _ => Quality::Estimated,
    }
}

/// Fold a sequence of qualities. Returns `None` for an empty sequence.
///
/// The result is a group quality, so `QuantityMissing` never survives it, not
/// even when it is the only member.
pub fn reconcile_all<I>(qualities: I) -> Option<Quality>
where
    I: IntoIterator<Item = Quality>,
{
    qualities.into_iter().reduce(reconcile).map(absorb_missing)
}

fn absorb_missing(quality: Quality) -> Quality {
    match quality {
        Quality::QuantityMissing => Quality::Estimated,
        other => other,
    }
}

/// Running reconciliation for accumulators that see one quality at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QualityFold(Option<Quality>);

impl QualityFold {
    pub fn push(&mut self, quality: Quality) {
        self.0 = Some(match self.0 {
            Some(current) => reconcile(current, quality),
            None => quality,
        });
    }

    pub fn merge(self, other: QualityFold) -> QualityFold {
        match (self.0, other.0) {
            (Some(a), Some(b)) => QualityFold(Some(reconcile(a, b))),
            (a, b) => QualityFold(a.or(b)),
        }
    }

    /// Group quality of everything pushed so far; `QuantityMissing` reads as `Estimated`.
    pub fn get(&self) -> Option<Quality> {
        self.0.map(absorb_missing)
    }
}
