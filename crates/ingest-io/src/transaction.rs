use ingest_types::{LedgerEntryChange, TransactionEnvelope, TransactionMeta, TransactionResultPair};
use serde::{Deserialize, Serialize};

use crate::change::{pair_entry_changes, Change};
use crate::error::IoResult;

/// One transaction of a ledger together with the metadata of applying it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    /// 1-based position of the transaction within its ledger.
    pub index: u32,
    pub envelope: TransactionEnvelope,
    pub result: TransactionResultPair,
    /// Entry-change log of charging the fee.
    pub fee_meta: Vec<LedgerEntryChange>,
    /// Entry-change logs of the operations.
    pub meta: TransactionMeta,
}

impl LedgerTransaction {
    /// Changes applied when the fee was charged.
    pub fn fee_changes(&self) -> IoResult<Vec<Change>> {
        pair_entry_changes(&self.fee_meta)
    }

    /// Changes applied by the operations, flattened in operation order.
    pub fn changes(&self) -> IoResult<Vec<Change>> {
        let mut changes = Vec::new();
        for operation in &self.meta.operations {
            changes.extend(pair_entry_changes(&operation.changes)?);
        }
        Ok(changes)
    }

    pub fn successful(&self) -> bool {
        self.result.successful
    }
}
