//! Tamper-evident chaining of ledger entries.
//!
//! Each entry commits to the digest of the account's previous entry:
//!
//! ```text
//! digest[n] = SHA-256("bourse:ledger:v1:" || digest[n-1] || fields[n])
//! ```
//!
//! The first entry of every account chains from [`GENESIS_DIGEST`].
//! Alongside the digests, [`verify_chain`] checks the causal balance
//! chain: every `balance_before` equals the prior `balance_after`.

pub use bourse_types::GENESIS_DIGEST;
use bourse_types::{BourseError, LedgerEntry, Result};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

/// Digest of `entry` over its `prev_digest` and content fields.
///
/// The entry's own `digest` field is not part of the input.
#[must_use]
pub fn compute_digest(entry: &LedgerEntry) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"bourse:ledger:v1:");
    hasher.update(entry.prev_digest);
    hasher.update(entry.id.0.as_bytes());
    hasher.update(entry.account_id.0.as_bytes());
    hasher.update(entry.kind.to_string().as_bytes());
    match entry.instrument_id {
        Some(id) => hasher.update(id.0.as_bytes()),
        None => hasher.update([0u8; 16]),
    }
    hasher.update(entry.quantity.unwrap_or(0).to_le_bytes());
    hasher.update(entry.price.unwrap_or(Decimal::ZERO).to_string().as_bytes());
    hasher.update(entry.amount.to_string().as_bytes());
    hasher.update(entry.fee.to_string().as_bytes());
    hasher.update(entry.balance_before.to_string().as_bytes());
    hasher.update(entry.balance_after.to_string().as_bytes());
    match entry.reference {
        Some(trade) => hasher.update(trade.0.as_bytes()),
        None => hasher.update([0u8; 16]),
    }
    hasher.update(entry.created_at.timestamp_micros().to_le_bytes());
    hasher.update(entry.description.as_bytes());

    let result = hasher.finalize();
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&result);
    digest
}

/// Lowercase hex of a digest, for logs and APIs.
#[must_use]
pub fn digest_hex(digest: &[u8; 32]) -> String {
    hex::encode(digest)
}

/// Verify one account's entries, oldest first.
///
/// Checks digest linkage, each digest against its content, and the
/// `balance_before`/`balance_after` chain starting from zero. Returns the
/// final balance so callers can compare it with the account record.
///
/// # Errors
/// `InvariantViolation` naming the first broken entry.
pub fn verify_chain(entries: &[LedgerEntry]) -> Result<Decimal> {
    let mut prev = GENESIS_DIGEST;
    let mut balance = Decimal::ZERO;
    for (n, entry) in entries.iter().enumerate() {
        if entry.prev_digest != prev {
            return Err(BourseError::InvariantViolation {
                reason: format!("ledger entry #{n} ({}) breaks the digest chain", entry.id),
            });
        }
        if compute_digest(entry) != entry.digest {
            return Err(BourseError::InvariantViolation {
                reason: format!("ledger entry #{n} ({}) digest mismatch", entry.id),
            });
        }
        if entry.balance_before != balance {
            return Err(BourseError::InvariantViolation {
                reason: format!(
                    "ledger entry #{n} ({}) starts at {} but previous balance was {balance}",
                    entry.id, entry.balance_before
                ),
            });
        }
        if entry.balance_before + entry.amount != entry.balance_after {
            return Err(BourseError::InvariantViolation {
                reason: format!(
                    "ledger entry #{n} ({}): {} + {} != {}",
                    entry.id, entry.balance_before, entry.amount, entry.balance_after
                ),
            });
        }
        prev = entry.digest;
        balance = entry.balance_after;
    }
    Ok(balance)
}

#[cfg(test)]
mod tests {
    use bourse_types::{Account, LedgerEntryKind};
    use chrono::Utc;

    use super::*;
    use crate::{PostingDetails, credit, debit};

    fn history() -> (Account, Vec<LedgerEntry>) {
        let mut account = Account::open("alice", Utc::now());
        let mut entries = Vec::new();
        let mut head = GENESIS_DIGEST;
        for (amount, is_credit) in [(1000, true), (250, false), (40, true)] {
            let entry = if is_credit {
                credit(
                    &mut account,
                    Decimal::new(amount, 0),
                    LedgerEntryKind::Deposit,
                    PostingDetails::new("deposit"),
                    head,
                    Utc::now(),
                )
            } else {
                debit(
                    &mut account,
                    Decimal::new(amount, 0),
                    LedgerEntryKind::SubmissionFee,
                    PostingDetails::new("fee"),
                    head,
                    Utc::now(),
                )
            }
            .unwrap();
            head = entry.digest;
            entries.push(entry);
        }
        (account, entries)
    }

    #[test]
    fn intact_chain_verifies() {
        let (account, entries) = history();
        assert_eq!(verify_chain(&entries).unwrap(), account.balance());
        assert_eq!(account.balance(), Decimal::new(790, 0));
    }

    #[test]
    fn tampered_amount_detected() {
        let (_, mut entries) = history();
        entries[1].amount = Decimal::new(-1, 0);
        assert!(verify_chain(&entries).is_err());
    }

    #[test]
    fn removed_entry_detected() {
        let (_, mut entries) = history();
        entries.remove(1);
        assert!(verify_chain(&entries).is_err());
    }

    #[test]
    fn digest_hex_is_64_chars() {
        let (_, entries) = history();
        let hex = digest_hex(&entries[0].digest);
        assert_eq!(hex.len(), 64);
        assert_ne!(entries[0].digest, entries[1].digest);
    }
}
