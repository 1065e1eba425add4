//! Ledger entries, their keys, and the entry-change log records found in
//! transaction metadata.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::account::{AccountEntry, AccountId};

/// Discriminant of a ledger entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LedgerEntryType {
    Account,
    Trustline,
    Offer,
    Data,
}

impl fmt::Display for LedgerEntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Account => "account",
            Self::Trustline => "trustline",
            Self::Offer => "offer",
            Self::Data => "data",
        };
        f.write_str(name)
    }
}

/// An asset held in a trustline or traded in an offer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Asset {
    Native,
    Credit { code: String, issuer: AccountId },
}

impl Asset {
    pub fn credit(code: impl Into<String>, issuer: impl Into<AccountId>) -> Self {
        Self::Credit {
            code: code.into(),
            issuer: issuer.into(),
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => f.write_str("native"),
            Self::Credit { code, issuer } => write!(f, "{code}:{issuer}"),
        }
    }
}

/// Offer price as a fraction `n / d`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Price {
    pub n: i32,
    pub d: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustLineEntry {
    pub account_id: AccountId,
    pub asset: Asset,
    pub balance: i64,
    pub limit: i64,
    pub flags: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferEntry {
    pub seller_id: AccountId,
    pub offer_id: i64,
    pub selling: Asset,
    pub buying: Asset,
    pub amount: i64,
    pub price: Price,
    pub flags: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEntry {
    pub account_id: AccountId,
    pub data_name: String,
    pub data_value: Vec<u8>,
}

/// Typed payload of a ledger entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEntryData {
    Account(AccountEntry),
    Trustline(TrustLineEntry),
    Offer(OfferEntry),
    Data(DataEntry),
}

impl LedgerEntryData {
    pub fn entry_type(&self) -> LedgerEntryType {
        match self {
            Self::Account(_) => LedgerEntryType::Account,
            Self::Trustline(_) => LedgerEntryType::Trustline,
            Self::Offer(_) => LedgerEntryType::Offer,
            Self::Data(_) => LedgerEntryType::Data,
        }
    }

    pub fn account(&self) -> Option<&AccountEntry> {
        match self {
            Self::Account(account) => Some(account),
            _ => None,
        }
    }

    pub fn trustline(&self) -> Option<&TrustLineEntry> {
        match self {
            Self::Trustline(trustline) => Some(trustline),
            _ => None,
        }
    }

    pub fn offer(&self) -> Option<&OfferEntry> {
        match self {
            Self::Offer(offer) => Some(offer),
            _ => None,
        }
    }

    pub fn data(&self) -> Option<&DataEntry> {
        match self {
            Self::Data(data) => Some(data),
            _ => None,
        }
    }
}

/// A ledger entry snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub last_modified_ledger_seq: u32,
    pub data: LedgerEntryData,
}

impl LedgerEntry {
    pub fn new(last_modified_ledger_seq: u32, data: LedgerEntryData) -> Self {
        Self {
            last_modified_ledger_seq,
            data,
        }
    }

    pub fn entry_type(&self) -> LedgerEntryType {
        self.data.entry_type()
    }

    /// The key identifying this entry in the ledger.
    pub fn key(&self) -> LedgerKey {
        match &self.data {
            LedgerEntryData::Account(a) => LedgerKey::Account {
                account_id: a.account_id.clone(),
            },
            LedgerEntryData::Trustline(t) => LedgerKey::Trustline {
                account_id: t.account_id.clone(),
                asset: t.asset.clone(),
            },
            LedgerEntryData::Offer(o) => LedgerKey::Offer {
                seller_id: o.seller_id.clone(),
                offer_id: o.offer_id,
            },
            LedgerEntryData::Data(d) => LedgerKey::Data {
                account_id: d.account_id.clone(),
                data_name: d.data_name.clone(),
            },
        }
    }
}

/// Identity of a ledger entry, independent of its contents.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LedgerKey {
    Account { account_id: AccountId },
    Trustline { account_id: AccountId, asset: Asset },
    Offer { seller_id: AccountId, offer_id: i64 },
    Data { account_id: AccountId, data_name: String },
}

impl LedgerKey {
    pub fn entry_type(&self) -> LedgerEntryType {
        match self {
            Self::Account { .. } => LedgerEntryType::Account,
            Self::Trustline { .. } => LedgerEntryType::Trustline,
            Self::Offer { .. } => LedgerEntryType::Offer,
            Self::Data { .. } => LedgerEntryType::Data,
        }
    }
}

/// Stable textual form, used as the de-duplication key while streaming state.
impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account { account_id } => write!(f, "account:{account_id}"),
            Self::Trustline { account_id, asset } => {
                write!(f, "trustline:{account_id}:{asset}")
            }
            Self::Offer { seller_id, offer_id } => write!(f, "offer:{seller_id}:{offer_id}"),
            Self::Data {
                account_id,
                data_name,
            } => write!(f, "data:{account_id}:{data_name}"),
        }
    }
}

/// One record of an entry-change log.
///
/// `State` carries the value of an entry before it was touched and is
/// followed by the `Updated` or `Removed` record describing what happened to
/// it. `Created` stands alone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEntryChange {
    Created(LedgerEntry),
    Updated(LedgerEntry),
    Removed(LedgerKey),
    State(LedgerEntry),
}

impl LedgerEntryChange {
    /// Entry type of the entry or key carried by this record.
    pub fn entry_type(&self) -> LedgerEntryType {
        match self {
            Self::Created(entry) | Self::Updated(entry) | Self::State(entry) => {
                entry.entry_type()
            }
            Self::Removed(key) => key.entry_type(),
        }
    }

    pub fn state(&self) -> Option<&LedgerEntry> {
        match self {
            Self::State(entry) => Some(entry),
            _ => None,
        }
    }
}
