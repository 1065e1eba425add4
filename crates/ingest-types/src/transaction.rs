use serde::{Deserialize, Serialize};

use crate::account::AccountId;
use crate::entry::LedgerEntryChange;
use crate::hash::Hash;

/// The signed transaction as submitted to the network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEnvelope {
    pub source_account: AccountId,
    pub fee: u32,
    pub seq_num: i64,
    pub operation_count: u32,
    pub memo: Option<String>,
}

/// Result of applying a transaction, keyed by its hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResultPair {
    pub transaction_hash: Hash,
    pub fee_charged: i64,
    pub successful: bool,
}

/// Entry changes produced by one operation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationMeta {
    pub changes: Vec<LedgerEntryChange>,
}

impl OperationMeta {
    pub fn new(changes: Vec<LedgerEntryChange>) -> Self {
        Self { changes }
    }
}

/// Per-operation entry-change logs of a transaction, in operation order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMeta {
    pub operations: Vec<OperationMeta>,
}

impl TransactionMeta {
    pub fn new(operations: Vec<OperationMeta>) -> Self {
        Self { operations }
    }
}
