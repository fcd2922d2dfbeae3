//! ICV/PIH hash chain.
//!
//! Every invoice gets the next counter value (ICV) and the hash of the
//! invoice recorded before it (PIH). Allocation and recording go through one
//! mutex so the chain stays linear when invoices are signed concurrently.
mod store;

pub use store::{LedgerStore, MemoryLedgerStore, NdjsonLedgerStore};

use crate::config::Config;
use crate::invoice::ChainLink;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::{Bound, RangeBounds};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Base64 SHA-256 of `"0"`, the PIH of the first invoice.
pub const GENESIS_PREVIOUS_HASH: &str = "X+zrZv/IbzjZUnhsbWlsecLbwjndTpG0ZynXOif7V+k=";

pub fn initial_previous_hash() -> String {
    GENESIS_PREVIOUS_HASH.to_string()
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("sequence {icv} is not above the last recorded sequence {max}")]
    SequenceReused { icv: u64, max: u64 },
    #[error("sequence {icv} was never allocated")]
    SequenceNotAllocated { icv: u64 },
    #[error("sequence {icv} was signed with previous hash {actual} but the chain ends at {expected}")]
    PreviousHashMismatch {
        icv: u64,
        expected: String,
        actual: String,
    },
    #[error("sequence {icv} is already recorded")]
    DuplicateSequence { icv: u64 },
    #[error("ledger line {line} repeats sequence {icv}")]
    DuplicateLine { line: usize, icv: u64 },
    #[error("ledger io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt ledger entry on line {line}: {source}")]
    Corrupt {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("ledger store error: {0}")]
    Store(String),
}

/// One recorded invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashChainEntry {
    pub icv: u64,
    pub hash: String,
    pub previous_hash: String,
}

impl HashChainEntry {
    /// Entry for an invoice signed under `link`.
    pub fn new<C: Chained + ?Sized>(link: &ChainLink, invoice: &C) -> Self {
        Self {
            icv: link.icv,
            hash: invoice.invoice_hash().to_string(),
            previous_hash: link.pih.clone(),
        }
    }
}

/// Anything that can be recorded in the chain.
pub trait Chained {
    fn invoice_hash(&self) -> &str;
}

impl Chained for str {
    fn invoice_hash(&self) -> &str {
        self
    }
}

impl Chained for String {
    fn invoice_hash(&self) -> &str {
        self
    }
}

/// A break found while replaying the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainMismatch {
    PreviousHashMismatch {
        icv: u64,
        expected: String,
        actual: String,
    },
    Missing {
        icv: u64,
    },
}

impl ChainMismatch {
    pub fn icv(&self) -> u64 {
        match self {
            ChainMismatch::PreviousHashMismatch { icv, .. } | ChainMismatch::Missing { icv } => *icv,
        }
    }
}

impl fmt::Display for ChainMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainMismatch::PreviousHashMismatch {
                icv,
                expected,
                actual,
            } => write!(f, "icv {icv}: previous hash {actual} does not match {expected}"),
            ChainMismatch::Missing { icv } => write!(f, "icv {icv}: no entry recorded"),
        }
    }
}

/// Raised by [`Ledger::ensure_intact`].
#[derive(Debug, Error)]
#[error("hash chain is broken at {} point(s)", .mismatches.len())]
pub struct ChainIntegrityError {
    mismatches: Vec<ChainMismatch>,
}

impl ChainIntegrityError {
    pub fn new(mismatches: Vec<ChainMismatch>) -> Self {
        Self { mismatches }
    }

    pub fn mismatches(&self) -> &[ChainMismatch] {
        &self.mismatches
    }
}

struct LedgerState<S> {
    store: S,
    reserved: BTreeSet<u64>,
    high_water: u64,
}

impl<S: LedgerStore> LedgerState<S> {
    fn allocate(&mut self) -> Result<u64, LedgerError> {
        let recorded = self.store.max_sequence()?.unwrap_or(0);
        let icv = self.high_water.max(recorded) + 1;
        self.high_water = icv;
        self.reserved.insert(icv);
        Ok(icv)
    }

    fn release(&mut self, icv: u64) {
        self.reserved.remove(&icv);
        if self.high_water == icv {
            self.high_water = icv - 1;
        }
    }

    fn previous_hash(&self, genesis: &str) -> Result<String, LedgerError> {
        match self.store.max_sequence()? {
            Some(max) => Ok(self
                .store
                .entry(max)?
                .map(|entry| entry.hash)
                .unwrap_or_else(|| genesis.to_string())),
            None => Ok(genesis.to_string()),
        }
    }

    fn append(&mut self, entry: HashChainEntry, genesis: &str) -> Result<HashChainEntry, LedgerError> {
        let icv = entry.icv;
        if let Some(max) = self.store.max_sequence()? {
            if icv <= max {
                return Err(LedgerError::SequenceReused { icv, max });
            }
        }
        if !self.reserved.contains(&icv) {
            return Err(LedgerError::SequenceNotAllocated { icv });
        }
        let expected = self.previous_hash(genesis)?;
        if entry.previous_hash != expected {
            tracing::warn!(icv, expected = %expected, actual = %entry.previous_hash, "rejected forked invoice");
            return Err(LedgerError::PreviousHashMismatch {
                icv,
                expected,
                actual: entry.previous_hash,
            });
        }
        self.store.append(entry.clone())?;
        self.reserved.remove(&icv);
        tracing::info!(icv, hash = %entry.hash, "recorded invoice in hash chain");
        Ok(entry)
    }
}

/// Sequence allocator and hash-chain recorder over a [`LedgerStore`].
pub struct Ledger<S> {
    state: Mutex<LedgerState<S>>,
    genesis_hash: String,
}

impl<S> fmt::Debug for Ledger<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("genesis_hash", &self.genesis_hash)
            .finish_non_exhaustive()
    }
}

impl<S: LedgerStore> Ledger<S> {
    pub fn new(store: S) -> Self {
        Self {
            state: Mutex::new(LedgerState {
                store,
                reserved: BTreeSet::new(),
                high_water: 0,
            }),
            genesis_hash: initial_previous_hash(),
        }
    }

    pub fn with_config(store: S, config: &Config) -> Self {
        let mut ledger = Self::new(store);
        ledger.genesis_hash = config.ledger.genesis_hash.clone();
        ledger
    }

    fn state(&self) -> MutexGuard<'_, LedgerState<S>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn genesis_hash(&self) -> &str {
        &self.genesis_hash
    }

    /// Reserve the next ICV. A reserved value is never handed out again,
    /// even if it is never recorded.
    pub fn next_sequence(&self) -> Result<u64, LedgerError> {
        let icv = self.state().allocate()?;
        tracing::info!(icv, "allocated invoice sequence");
        Ok(icv)
    }

    /// Hash of the last recorded invoice, or the genesis hash.
    pub fn previous_hash(&self) -> Result<String, LedgerError> {
        self.state().previous_hash(&self.genesis_hash)
    }

    /// Record an invoice with the ICV and PIH it was signed with.
    ///
    /// The entry is stored as given. Its `previous_hash` must be the hash the
    /// chain currently ends at, so two invoices signed against the same
    /// predecessor cannot both be recorded.
    ///
    /// # Errors
    /// - [`LedgerError::SequenceReused`] when the ICV is not above the last
    ///   recorded value.
    /// - [`LedgerError::SequenceNotAllocated`] when it was never reserved by
    ///   [`Ledger::next_sequence`].
    /// - [`LedgerError::PreviousHashMismatch`] when the embedded PIH is stale.
    ///   The ICV stays reserved and can be recorded after re-signing.
    ///
    /// # Examples
    /// ```rust
    /// use zatca_core::invoice::ChainLink;
    /// use zatca_core::ledger::{HashChainEntry, Ledger, MemoryLedgerStore};
    ///
    /// let ledger = Ledger::new(MemoryLedgerStore::default());
    /// let link = ChainLink::new(ledger.next_sequence()?, ledger.previous_hash()?);
    /// let entry = ledger.record(HashChainEntry::new(&link, "aGFzaA=="))?;
    /// assert_eq!(entry.previous_hash, link.pih);
    /// # Ok::<(), zatca_core::ledger::LedgerError>(())
    /// ```
    pub fn record(&self, entry: HashChainEntry) -> Result<HashChainEntry, LedgerError> {
        self.state().append(entry, &self.genesis_hash)
    }

    /// Allocate, sign and record under one lock.
    ///
    /// `sign` receives the ICV and PIH for the invoice. When it fails the ICV
    /// is released and nothing is recorded.
    ///
    /// # Examples
    /// ```rust
    /// use zatca_core::ledger::{GENESIS_PREVIOUS_HASH, Ledger, MemoryLedgerStore};
    ///
    /// let ledger = Ledger::new(MemoryLedgerStore::default());
    /// let hash: String = ledger.issue(|link| {
    ///     assert_eq!(link.icv, 1);
    ///     assert_eq!(link.pih, GENESIS_PREVIOUS_HASH);
    ///     Ok::<_, zatca_core::Error>("aGFzaA==".to_string())
    /// })?;
    /// assert_eq!(ledger.previous_hash()?, hash);
    /// # Ok::<(), zatca_core::Error>(())
    /// ```
    pub fn issue<T, E, F>(&self, sign: F) -> Result<T, E>
    where
        T: Chained,
        E: From<LedgerError>,
        F: FnOnce(ChainLink) -> Result<T, E>,
    {
        let mut state = self.state();
        let icv = state.allocate()?;
        let pih = match state.previous_hash(&self.genesis_hash) {
            Ok(pih) => pih,
            Err(err) => {
                state.release(icv);
                return Err(err.into());
            }
        };
        let link = ChainLink::new(icv, pih);
        match sign(link.clone()) {
            Ok(invoice) => {
                state.append(HashChainEntry::new(&link, &invoice), &self.genesis_hash)?;
                Ok(invoice)
            }
            Err(err) => {
                state.release(icv);
                tracing::debug!(icv, "released sequence after failed issue");
                Err(err)
            }
        }
    }

    /// Replay the chain over `range` and report every break.
    ///
    /// A missing ICV is reported as [`ChainMismatch::Missing`]; the entry
    /// after it is compared with the last entry that exists.
    pub fn verify_chain<R: RangeBounds<u64>>(&self, range: R) -> Result<Vec<ChainMismatch>, LedgerError> {
        let state = self.state();
        let store = &state.store;
        let Some(max) = store.max_sequence()? else {
            return Ok(Vec::new());
        };

        let start = match range.start_bound() {
            Bound::Included(&n) => n,
            Bound::Excluded(&n) => n.saturating_add(1),
            Bound::Unbounded => 1,
        }
        .max(1);
        let end = match range.end_bound() {
            Bound::Included(&n) => n,
            Bound::Excluded(&n) => n.saturating_sub(1),
            Bound::Unbounded => max,
        }
        .min(max);

        let mut expected = if start == 1 {
            Some(self.genesis_hash.clone())
        } else {
            store.entry(start - 1)?.map(|entry| entry.hash)
        };
        let mut mismatches = Vec::new();
        for icv in start..=end {
            match store.entry(icv)? {
                None => {
                    tracing::warn!(icv, "hash chain entry missing");
                    mismatches.push(ChainMismatch::Missing { icv });
                }
                Some(entry) => {
                    if let Some(expected) = expected.as_deref() {
                        if entry.previous_hash != expected {
                            tracing::warn!(
                                icv,
                                expected,
                                actual = %entry.previous_hash,
                                "previous hash mismatch"
                            );
                            mismatches.push(ChainMismatch::PreviousHashMismatch {
                                icv,
                                expected: expected.to_string(),
                                actual: entry.previous_hash.clone(),
                            });
                        }
                    }
                    expected = Some(entry.hash);
                }
            }
        }
        Ok(mismatches)
    }

    /// [`Ledger::verify_chain`] as an error.
    pub fn ensure_intact<R: RangeBounds<u64>>(&self, range: R) -> Result<(), crate::Error> {
        let mismatches = self.verify_chain(range)?;
        if mismatches.is_empty() {
            Ok(())
        } else {
            Err(ChainIntegrityError::new(mismatches).into())
        }
    }

    pub fn entries(&self) -> Result<Vec<HashChainEntry>, LedgerError> {
        self.state().store.entries()
    }

    pub fn into_store(self) -> S {
        self.state
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .store
    }
}
