//! Accounting domain module (append-only stock ledger).
//!
//! Ledger entries are validated and constructed here; stores only ever insert
//! them. Corrections are new offsetting entries, never edits.

pub mod ledger;

pub use ledger::{LedgerEntry, LedgerEntryDraft, LedgerEntryId, LedgerEntryType, LedgerSummary};
