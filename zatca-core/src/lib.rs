//! Core of a ZATCA phase 2 e-invoicing toolkit.
//!
//! The crate renders invoices into the UBL 2.1 skeleton the platform expects,
//! hashes the canonical form, signs it with a XAdES-BES envelope, packs the
//! QR TLV payload and keeps the ICV/PIH hash chain that links every invoice
//! to its predecessor.
//!
//! # Examples
//! ```rust
//! use zatca_core::config::Config;
//! use zatca_core::ledger::{Ledger, MemoryLedgerStore};
//!
//! let config = Config::default();
//! let ledger = Ledger::with_config(MemoryLedgerStore::default(), &config);
//! assert_eq!(ledger.next_sequence()?, 1);
//! # Ok::<(), zatca_core::ledger::LedgerError>(())
//! ```
pub mod certificate;
pub mod config;
pub mod invoice;
pub mod ledger;
pub mod submission;

use thiserror::Error;

pub use certificate::CertificateError;
pub use config::ConfigError;
pub use invoice::qr::CodecError;
pub use invoice::sign::SigningError;
pub use invoice::xml::InvoiceXmlError;
pub use invoice::{InvoiceError, ValidationError};
pub use ledger::{ChainIntegrityError, LedgerError};
pub use submission::SubmissionError;

/// Top-level error wrapper for core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Invoice(#[from] InvoiceError),
    #[error(transparent)]
    Certificate(#[from] CertificateError),
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error(transparent)]
    Xml(#[from] InvoiceXmlError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    ChainIntegrity(#[from] ChainIntegrityError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Invoice(InvoiceError::Validation(err))
    }
}
