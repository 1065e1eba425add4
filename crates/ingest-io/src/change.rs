//! Before/after diffs of ledger entries derived from entry-change logs.

use std::collections::HashMap;

use ingest_types::{AccountEntry, LedgerEntry, LedgerEntryChange, LedgerEntryType, SignerKey};

use crate::error::{IoError, IoResult};

/// A change of one ledger entry caused by a fee charge, an operation, or a
/// protocol upgrade.
///
/// `pre` is absent when the entry was created, `post` is absent when it was
/// removed. When both are present their entry types equal `entry_type`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Change {
    pub entry_type: LedgerEntryType,
    pub pre: Option<LedgerEntry>,
    pub post: Option<LedgerEntry>,
}

impl Change {
    pub fn created(entry: LedgerEntry) -> Self {
        Self {
            entry_type: entry.entry_type(),
            pre: None,
            post: Some(entry),
        }
    }

    pub fn updated(pre: LedgerEntry, post: LedgerEntry) -> Self {
        Self {
            entry_type: pre.entry_type(),
            pre: Some(pre),
            post: Some(post),
        }
    }

    pub fn removed(pre: LedgerEntry) -> Self {
        Self {
            entry_type: pre.entry_type(),
            pre: Some(pre),
            post: None,
        }
    }

    /// Returns `true` if the account changed in any way other than its
    /// signer list.
    ///
    /// Creation and removal always count as a change. Thresholds, and with
    /// them the master key weight, are compared. Neither snapshot is modified.
    ///
    /// # Panics
    ///
    /// Panics if `entry_type` is not [`LedgerEntryType::Account`].
    pub fn account_changed_except_signers(&self) -> IoResult<bool> {
        self.assert_account_type("account_changed_except_signers");

        let (pre, post) = match (&self.pre, &self.post) {
            (Some(pre), Some(post)) => (pre, post),
            _ => return Ok(true),
        };

        let pre_account = account_of(pre)?;
        let post_account = account_of(post)?;

        Ok(pre.last_modified_ledger_seq != post.last_modified_ledger_seq
            || !pre_account.eq_ignoring_signers(post_account))
    }

    /// Returns `true` if the master key weight or the signer set changed.
    ///
    /// Signers are compared as an unordered set of `(key, weight)` pairs, so
    /// reordering alone is not a change. Creation and removal always count as
    /// a change.
    ///
    /// # Panics
    ///
    /// Panics if `entry_type` is not [`LedgerEntryType::Account`], or if a
    /// snapshot does not hold an account entry.
    pub fn account_signers_changed(&self) -> bool {
        self.assert_account_type("account_signers_changed");

        let (pre, post) = match (&self.pre, &self.post) {
            (Some(pre), Some(post)) => (pre, post),
            _ => return true,
        };

        let pre_account = pre
            .data
            .account()
            .expect("pre snapshot of an account change is not an account entry");
        let post_account = post
            .data
            .account()
            .expect("post snapshot of an account change is not an account entry");

        if pre_account.master_key_weight() != post_account.master_key_weight() {
            return true;
        }

        signer_weights(pre_account) != signer_weights(post_account)
    }

    fn assert_account_type(&self, method: &str) {
        assert_eq!(
            self.entry_type,
            LedgerEntryType::Account,
            "{method} called on a change of type {}",
            self.entry_type
        );
    }
}

fn account_of(entry: &LedgerEntry) -> IoResult<&AccountEntry> {
    entry.data.account().ok_or(IoError::EntryTypeMismatch {
        expected: LedgerEntryType::Account,
        found: entry.entry_type(),
    })
}

fn signer_weights(account: &AccountEntry) -> HashMap<&SignerKey, u32> {
    account
        .signers
        .iter()
        .map(|signer| (&signer.key, signer.weight))
        .collect()
}

/// Pair the records of an entry-change log into [`Change`] values.
///
/// A `State` record holds the entry before it was touched; the record right
/// after it (`Updated` or `Removed`) closes the pair. `Created` records stand
/// alone. An `Updated` or `Removed` record that does not directly follow a
/// `State` record is reported as [`IoError::UnpairedChange`].
pub fn pair_entry_changes(records: &[LedgerEntryChange]) -> IoResult<Vec<Change>> {
    let mut changes = Vec::new();

    for (index, record) in records.iter().enumerate() {
        match record {
            LedgerEntryChange::State(_) => continue,
            LedgerEntryChange::Created(entry) => changes.push(Change::created(entry.clone())),
            LedgerEntryChange::Updated(entry) => {
                let state = preceding_state(records, index)?;
                changes.push(Change::updated(state.clone(), entry.clone()));
            }
            LedgerEntryChange::Removed(_) => {
                let state = preceding_state(records, index)?;
                changes.push(Change::removed(state.clone()));
            }
        }
    }

    Ok(changes)
}

fn preceding_state(records: &[LedgerEntryChange], index: usize) -> IoResult<&LedgerEntry> {
    index
        .checked_sub(1)
        .and_then(|prev| records[prev].state())
        .ok_or(IoError::UnpairedChange { index })
}
