//! Upsert of a freshly fetched batch into a stored history, keyed by timestamp.

use crate::history::{PriceHistory, PriceObservation};

#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// No history existed; the batch becomes the history.
    Created { history: PriceHistory, added: usize },
    /// Rows strictly newer than the stored maximum were appended.
    Appended { history: PriceHistory, added: usize },
    /// Nothing to write. The stored file must be left alone.
    NothingNew,
}

impl MergeOutcome {
    pub fn added(&self) -> usize {
        match self {
            MergeOutcome::Created { added, .. } | MergeOutcome::Appended { added, .. } => *added,
            MergeOutcome::NothingNew => 0,
        }
    }
}

/// Merges `incoming` into `existing`.
///
/// Only incoming rows with a timestamp strictly greater than the stored maximum
/// survive the cutoff, so a row equal to the current maximum is dropped rather
/// than overwriting it. Duplicates inside the batch resolve to the later row.
pub fn merge(existing: Option<&PriceHistory>, incoming: Vec<PriceObservation>) -> MergeOutcome {
    let Some(existing) = existing else {
        if incoming.is_empty() {
            return MergeOutcome::NothingNew;
        }
        let history = PriceHistory::from_observations(incoming);
        let added = history.len();
        return MergeOutcome::Created { history, added };
    };

    let fresh: Vec<PriceObservation> = match existing.last_timestamp() {
        Some(cutoff) => incoming
            .into_iter()
            .filter(|o| o.timestamp > cutoff)
            .collect(),
        None => incoming,
    };

    if fresh.is_empty() {
        return MergeOutcome::NothingNew;
    }

    let mut combined = Vec::with_capacity(existing.len() + fresh.len());
    combined.extend_from_slice(existing.observations());
    combined.extend(fresh);

    let history = PriceHistory::from_observations(combined);
    let added = history.len().saturating_sub(existing.len());
    MergeOutcome::Appended { history, added }
}
