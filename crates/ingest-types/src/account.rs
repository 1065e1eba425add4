//! Account ledger entries and their signer state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Public account address in its textual (strkey) form.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.0)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

/// Key of an additional account signer (ed25519 key, pre-auth tx, or hash-x),
/// in textual form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignerKey(String);

impl SignerKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SignerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SignerKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// A signer attached to an account.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signer {
    pub key: SignerKey,
    pub weight: u32,
}

impl Signer {
    pub fn new(key: impl Into<String>, weight: u32) -> Self {
        Self {
            key: SignerKey::new(key),
            weight,
        }
    }
}

/// Account thresholds: `[master weight, low, medium, high]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Thresholds(pub [u8; 4]);

impl Thresholds {
    pub const fn new(master: u8, low: u8, medium: u8, high: u8) -> Self {
        Self([master, low, medium, high])
    }

    /// Weight of the account's own (master) key.
    pub fn master_key_weight(&self) -> u8 {
        self.0[0]
    }

    pub fn low(&self) -> u8 {
        self.0[1]
    }

    pub fn medium(&self) -> u8 {
        self.0[2]
    }

    pub fn high(&self) -> u8 {
        self.0[3]
    }
}

/// Buying and selling liabilities locked by open offers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Liabilities {
    pub buying: i64,
    pub selling: i64,
}

/// Versioned extension of an account entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountEntryExt {
    #[default]
    V0,
    V1 { liabilities: Liabilities },
}

impl AccountEntryExt {
    pub fn liabilities(&self) -> Option<&Liabilities> {
        match self {
            Self::V0 => None,
            Self::V1 { liabilities } => Some(liabilities),
        }
    }
}

/// The state of one account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    pub account_id: AccountId,
    pub balance: i64,
    pub seq_num: i64,
    pub num_sub_entries: u32,
    pub inflation_dest: Option<AccountId>,
    pub flags: u32,
    pub home_domain: String,
    pub thresholds: Thresholds,
    pub signers: Vec<Signer>,
    pub ext: AccountEntryExt,
}

impl AccountEntry {
    /// A zero-balance account with default thresholds and no signers.
    pub fn new(account_id: impl Into<AccountId>) -> Self {
        Self {
            account_id: account_id.into(),
            balance: 0,
            seq_num: 0,
            num_sub_entries: 0,
            inflation_dest: None,
            flags: 0,
            home_domain: String::new(),
            thresholds: Thresholds::default(),
            signers: Vec::new(),
            ext: AccountEntryExt::V0,
        }
    }

    /// Weight of the master key, i.e. `thresholds[0]`.
    pub fn master_key_weight(&self) -> u8 {
        self.thresholds.master_key_weight()
    }

    /// Compare every field except `signers`.
    ///
    /// The master key weight lives in `thresholds` and is therefore part of
    /// the comparison.
    pub fn eq_ignoring_signers(&self, other: &AccountEntry) -> bool {
        self.account_id == other.account_id
            && self.balance == other.balance
            && self.seq_num == other.seq_num
            && self.num_sub_entries == other.num_sub_entries
            && self.inflation_dest == other.inflation_dest
            && self.flags == other.flags
            && self.home_domain == other.home_domain
            && self.thresholds == other.thresholds
            && self.ext == other.ext
    }
}
