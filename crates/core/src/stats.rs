//! Aggregate statistics and filters over asset collections.
//!
//! Stats are always recomputed from a snapshot of records; nothing here
//! keeps running counters.

use serde::{Deserialize, Serialize};

use crate::metadata::AssetMetadata;
use crate::rigging::RiggingPhase;

/// Typed predicate over asset records, shared by listing and counting.
///
/// Every `Some` field must match; an empty filter matches everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetFilter {
    pub is_placeholder: Option<bool>,
    pub rigging_phase: Option<RiggingPhase>,
}

impl AssetFilter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Assets the generation pipeline has produced.
    pub fn generated() -> Self {
        Self {
            is_placeholder: Some(false),
            ..Self::default()
        }
    }

    pub fn placeholders() -> Self {
        Self {
            is_placeholder: Some(true),
            ..Self::default()
        }
    }

    pub fn in_phase(phase: RiggingPhase) -> Self {
        Self {
            rigging_phase: Some(phase),
            ..Self::default()
        }
    }

    pub fn matches(&self, asset: &AssetMetadata) -> bool {
        if let Some(placeholder) = self.is_placeholder {
            if asset.is_placeholder != placeholder {
                return false;
            }
        }
        if let Some(phase) = self.rigging_phase {
            if asset.rigging_phase() != phase {
                return false;
            }
        }
        true
    }
}

/// Asset count per rigging phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiggingBreakdown {
    pub unrigged: i64,
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

impl RiggingBreakdown {
    pub fn record(&mut self, phase: RiggingPhase) {
        match phase {
            RiggingPhase::Unrigged => self.unrigged += 1,
            RiggingPhase::Pending => self.pending += 1,
            RiggingPhase::Processing => self.processing += 1,
            RiggingPhase::Completed => self.completed += 1,
            RiggingPhase::Failed => self.failed += 1,
        }
    }

    pub fn get(&self, phase: RiggingPhase) -> i64 {
        match phase {
            RiggingPhase::Unrigged => self.unrigged,
            RiggingPhase::Pending => self.pending,
            RiggingPhase::Processing => self.processing,
            RiggingPhase::Completed => self.completed,
            RiggingPhase::Failed => self.failed,
        }
    }
}

/// Collection-wide counters shown by the navigation header and dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetStats {
    pub total: i64,
    /// Assets with `isPlaceholder = false`.
    pub generated: i64,
    pub placeholder: i64,
    /// Assets whose rigging status is `completed`.
    pub rigged: i64,
    pub rigging: RiggingBreakdown,
    /// Share of generated assets that are rigged, or 0 when nothing has been
    /// generated. Rigged placeholders are left out, so this never exceeds 1.
    pub rigged_ratio: f64,
}

impl AssetStats {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a AssetMetadata>,
    {
        let mut stats = Self::default();
        let mut rigged_generated = 0;
        for asset in records {
            let phase = asset.rigging_phase();
            stats.total += 1;
            if asset.is_placeholder {
                stats.placeholder += 1;
            } else {
                stats.generated += 1;
                if phase == RiggingPhase::Completed {
                    rigged_generated += 1;
                }
            }
            stats.rigging.record(phase);
        }
        stats.rigged = stats.rigging.completed;
        stats.rigged_ratio = ratio(rigged_generated, stats.generated);
        stats
    }
}

fn ratio(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
