use serde::{Deserialize, Serialize};

use crate::hash::Hash;

/// Header of a closed ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerHeader {
    pub ledger_seq: u32,
    pub ledger_version: u32,
    pub previous_ledger_hash: Hash,
    pub bucket_list_hash: Hash,
    pub close_time: u64,
    pub total_coins: i64,
    pub fee_pool: i64,
    pub base_fee: u32,
    pub base_reserve: u32,
}

impl LedgerHeader {
    /// A header with the given sequence and bucket list hash, other fields
    /// zeroed.
    pub fn new(ledger_seq: u32, bucket_list_hash: Hash) -> Self {
        Self {
            ledger_seq,
            ledger_version: 0,
            previous_ledger_hash: Hash::zero(),
            bucket_list_hash,
            close_time: 0,
            total_coins: 0,
            fee_pool: 0,
            base_fee: 100,
            base_reserve: 100_000_000,
        }
    }

    /// BLAKE3 digest of the JSON encoding of the header.
    ///
    /// # Panics
    ///
    /// Never in practice: the header holds only integers and hashes, which
    /// always serialize.
    pub fn compute_hash(&self) -> Hash {
        let bytes = serde_json::to_vec(self).expect("ledger header serializes");
        Hash::digest(&bytes)
    }
}

/// A ledger header together with its hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerHeaderHistoryEntry {
    pub hash: Hash,
    pub header: LedgerHeader,
}

impl From<LedgerHeader> for LedgerHeaderHistoryEntry {
    fn from(header: LedgerHeader) -> Self {
        Self {
            hash: header.compute_hash(),
            header,
        }
    }
}
