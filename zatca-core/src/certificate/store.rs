use super::{CertificateError, CertificateKind, CertificateRecord};
use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard};

/// Persistence for issued certificate records.
pub trait CertificateStore {
    /// The active record of `kind`, if any.
    fn active(&self, kind: CertificateKind) -> Option<CertificateRecord>;

    fn insert(&self, record: CertificateRecord);

    /// Mark every record of `kind` inactive.
    fn deactivate_all(&self, kind: CertificateKind);

    /// Replace the active record of the new record's kind.
    fn rotate(&self, record: CertificateRecord) {
        let kind = record.kind();
        self.deactivate_all(kind);
        self.insert(record);
        tracing::info!(%kind, "rotated certificate");
    }
}

/// Resolves the certificate to sign with.
pub trait CertificateProvider {
    /// The active record of `kind` that is still valid at `at`.
    ///
    /// # Errors
    /// [`CertificateError::NoActiveCertificate`] when no active record exists
    /// and [`CertificateError::Expired`] when it is past its expiry.
    fn active_certificate(
        &self,
        kind: CertificateKind,
        at: DateTime<Utc>,
    ) -> Result<CertificateRecord, CertificateError>;
}

impl<S: CertificateStore + ?Sized> CertificateProvider for S {
    fn active_certificate(
        &self,
        kind: CertificateKind,
        at: DateTime<Utc>,
    ) -> Result<CertificateRecord, CertificateError> {
        let record = self
            .active(kind)
            .ok_or(CertificateError::NoActiveCertificate(kind))?;
        if record.expires_at() < at {
            tracing::warn!(%kind, expires_at = %record.expires_at(), "active certificate expired");
            return Err(CertificateError::Expired {
                not_after: record.expires_at(),
            });
        }
        Ok(record)
    }
}

/// In-process store, mostly for tests and the CLI.
#[derive(Debug, Default)]
pub struct MemoryCertificateStore {
    records: Mutex<Vec<CertificateRecord>>,
}

impl MemoryCertificateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, Vec<CertificateRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every record, active or not, in insertion order.
    pub fn all(&self) -> Vec<CertificateRecord> {
        self.records().clone()
    }
}

impl CertificateStore for MemoryCertificateStore {
    fn active(&self, kind: CertificateKind) -> Option<CertificateRecord> {
        self.records()
            .iter()
            .rev()
            .find(|record| record.kind() == kind && record.is_active())
            .cloned()
    }

    fn insert(&self, record: CertificateRecord) {
        self.records().push(record);
    }

    fn deactivate_all(&self, kind: CertificateKind) {
        for record in self.records().iter_mut().filter(|r| r.kind() == kind) {
            record.deactivate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const CERT: &str = include_str!("../../tests/fixtures/certs/signing-cert.pem");
    const EXPIRED: &str = include_str!("../../tests/fixtures/certs/expired-cert.pem");
    const KEY: &str = include_str!("../../tests/fixtures/certs/signing-key.pem");

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).single().expect("date")
    }

    #[test]
    fn empty_store_has_no_active_certificate() {
        let store = MemoryCertificateStore::new();
        assert!(matches!(
            store.active_certificate(CertificateKind::Production, now()),
            Err(CertificateError::NoActiveCertificate(CertificateKind::Production))
        ));
    }

    #[test]
    fn rotation_keeps_a_single_active_record() {
        let store = MemoryCertificateStore::new();
        let first = CertificateRecord::new(CertificateKind::Production, CERT, KEY, "one")
            .expect("record")
            .with_request_id("1");
        let second = CertificateRecord::new(CertificateKind::Production, CERT, KEY, "two")
            .expect("record")
            .with_request_id("2");
        store.rotate(first);
        store.rotate(second);

        let active = store
            .active_certificate(CertificateKind::Production, now())
            .expect("active");
        assert_eq!(active.request_id(), Some("2"));
        let all = store.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all.iter().filter(|r| r.is_active()).count(), 1);
        assert!(store.active(CertificateKind::Compliance).is_none());
    }

    #[test]
    fn expired_record_is_rejected() {
        let store = MemoryCertificateStore::new();
        store.insert(
            CertificateRecord::new(CertificateKind::Compliance, EXPIRED, KEY, "secret")
                .expect("record"),
        );
        let err = store
            .active_certificate(CertificateKind::Compliance, now())
            .expect_err("expired");
        assert!(matches!(err, CertificateError::Expired { .. }));
    }
}
