//! In-progress payment-information batches and their registry.
//!
//! A batch is one `PmtInf` block under construction, keyed by sequence type
//! and execution date. The registry owns every batch for the lifetime of the
//! document; batch subtrees move into the document tree at finalize, while
//! the bookkeeping stays behind for summaries.

use chrono::NaiveDate;

use crate::xml::XmlNode;
use crate::SequenceType;

/// Composite batch key with value equality. A structured tuple, not the
/// string concatenation the wire ids use, so separator collisions cannot
/// merge two distinct batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchKey {
    pub sequence_type: Option<SequenceType>,
    pub execution_date: NaiveDate,
}

/// One payment batch: stable id, running count and control sum, and the
/// pending `PmtInf` subtree until finalize takes it.
#[derive(Debug)]
pub struct Batch {
    key: BatchKey,
    id: String,
    count: u32,
    control_sum: u64,
    node: Option<XmlNode>,
}

impl Batch {
    pub fn new(key: BatchKey, id: String, node: XmlNode) -> Self {
        Self {
            key,
            id,
            count: 0,
            control_sum: 0,
            node: Some(node),
        }
    }

    pub fn key(&self) -> &BatchKey {
        &self.key
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn transaction_count(&self) -> u32 {
        self.count
    }

    /// Running control sum in minor units.
    pub fn control_sum_minor(&self) -> u64 {
        self.control_sum
    }

    /// Append a transaction entry and update count and control sum as one
    /// logical step. The caller has already checked that the sum fits.
    pub(crate) fn append(&mut self, transaction: XmlNode, amount_minor: u64) {
        if let Some(node) = self.node.as_mut() {
            node.push(transaction);
        }
        self.count += 1;
        self.control_sum += amount_minor;
    }

    /// Take the pending subtree out for finalization. `None` once taken;
    /// a flushed batch is never mutated again.
    pub(crate) fn take_node(&mut self) -> Option<XmlNode> {
        self.node.take()
    }
}

/// Keyed collection of batches in creation order. Batches are never
/// removed; lookups are linear, which is fine at the expected scale of a
/// handful of (type, date) combinations per document.
#[derive(Debug, Default)]
pub struct BatchRegistry {
    batches: Vec<Batch>,
}

impl BatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn find(&self, key: &BatchKey) -> Option<&Batch> {
        self.batches.iter().find(|b| b.key == *key)
    }

    pub fn position(&self, key: &BatchKey) -> Option<usize> {
        self.batches.iter().position(|b| b.key == *key)
    }

    /// Register a new batch, returning its index.
    pub fn register(&mut self, batch: Batch) -> usize {
        self.batches.push(batch);
        self.batches.len() - 1
    }

    pub fn batch_mut(&mut self, index: usize) -> &mut Batch {
        &mut self.batches[index]
    }

    /// Batches in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Batch> {
        self.batches.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Batch> {
        self.batches.iter_mut()
    }
}
