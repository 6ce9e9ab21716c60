use serde::{Deserialize, Serialize};

/// Transaction identifier as used in the explorer's namespace.
pub type TxId = String;

/// One scraped transaction page: the transaction id plus the ids (or labels)
/// found in its inputs and outputs tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionNode {
    id: TxId,
    inputs: Vec<TxId>,
    outputs: Vec<TxId>,
}

impl TransactionNode {
    pub fn new(id: TxId, inputs: Vec<TxId>, outputs: Vec<TxId>) -> Self {
        Self {
            id,
            inputs,
            outputs,
        }
    }

    /// Node with no inputs and no outputs, used for ids that could not be resolved.
    pub fn empty(id: TxId) -> Self {
        Self::new(id, Vec::new(), Vec::new())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn inputs(&self) -> &[TxId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxId] {
        &self.outputs
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }
}

/// Outcome of resolving one transaction id.
///
/// Resolution never fails outward: anything that goes wrong while fetching or
/// parsing a page produces [`Resolution::Degraded`], which stands in for the
/// transaction as an empty node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(TransactionNode),
    Degraded { id: TxId, cause: String },
}

impl Resolution {
    pub fn degraded(id: impl Into<TxId>, cause: impl Into<String>) -> Self {
        Resolution::Degraded {
            id: id.into(),
            cause: cause.into(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Resolution::Resolved(node) => node.id(),
            Resolution::Degraded { id, .. } => id,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Resolution::Degraded { .. })
    }

    pub fn into_node(self) -> TransactionNode {
        match self {
            Resolution::Resolved(node) => node,
            Resolution::Degraded { id, .. } => TransactionNode::empty(id),
        }
    }
}
