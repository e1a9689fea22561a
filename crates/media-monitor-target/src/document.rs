//! Hierarchical resource container with structural change notifications.

use std::sync::Arc;

use crate::MediaNode;

/// One structural change: nodes inserted and removed together.
#[derive(Clone, Default)]
pub struct MutationRecord {
    pub added_nodes: Vec<MediaNode>,
    pub removed_nodes: Vec<MediaNode>,
}

/// Callback receiving a batch of structural changes.
pub type MutationCallback = Arc<dyn Fn(&[MutationRecord]) + Send + Sync>;

/// Live document the resources live in.
pub trait MediaDocument: Send + Sync {
    /// Every element currently in the document, in document order.
    fn elements(&self) -> Vec<MediaNode>;

    /// Start reporting structural changes of the whole subtree.
    fn observe(&self, callback: MutationCallback);

    /// Stop reporting changes to `callback`.
    fn disconnect(&self, callback: &MutationCallback);
}
