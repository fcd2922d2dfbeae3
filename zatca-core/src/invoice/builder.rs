use super::validation::validate_draft;
use super::{
    Buyer, DocumentDiscount, InvoiceData, InvoiceError, InvoiceNote, InvoiceTotals, InvoiceType,
    LineItem, OriginalInvoiceRef, Seller, SubTypeCode,
};
use crate::config::Config;
use crate::invoice::sign::{InvoiceSigner, SignedProperties, SigningError};
use crate::ledger::Chained;
use chrono::{DateTime, NaiveDate, Utc};
use iso_currency::Currency;
use uuid::Uuid;

/// Position of an invoice in the hash chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLink {
    /// Invoice counter value.
    pub icv: u64,
    /// Hash of the preceding invoice.
    pub pih: String,
}

impl ChainLink {
    pub fn new(icv: u64, pih: impl Into<String>) -> Self {
        Self {
            icv,
            pih: pih.into(),
        }
    }
}

/// Validated invoice with computed totals, ready to render and sign.
#[derive(Debug, Clone)]
pub struct FinalizedInvoice {
    data: InvoiceData,
    totals: InvoiceTotals,
    chain: Option<ChainLink>,
}

/// Invoice after the signature block and QR have been embedded.
#[derive(Debug, Clone)]
pub struct SignedInvoice {
    finalized: FinalizedInvoice,
    signed_properties: SignedProperties,
    qr_code: String,
    signed_xml: String,
}

/// Collects invoice fields before validation.
#[derive(Debug, Clone)]
pub(crate) struct InvoiceDraft {
    pub(crate) invoice_type: InvoiceType,
    pub(crate) sub_type: SubTypeCode,
    pub(crate) id: Option<String>,
    pub(crate) uuid: Uuid,
    pub(crate) issue_datetime: Option<DateTime<Utc>>,
    pub(crate) supply_date: Option<NaiveDate>,
    pub(crate) currency: Currency,
    pub(crate) seller: Option<Seller>,
    pub(crate) buyer: Option<Buyer>,
    pub(crate) line_items: Vec<LineItem>,
    pub(crate) payment_means_code: String,
    pub(crate) payment_terms: Option<String>,
    pub(crate) original_invoice: Option<OriginalInvoiceRef>,
    pub(crate) adjustment_reason: Option<String>,
    pub(crate) notes: Vec<InvoiceNote>,
    pub(crate) document_discount: Option<DocumentDiscount>,
}

/// Builder for [`FinalizedInvoice`].
///
/// Every problem is reported at once by [`InvoiceBuilder::build`].
///
/// # Examples
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use isocountry::CountryCode;
/// use rust_decimal_macros::dec;
/// use zatca_core::invoice::{
///     Address, InvoiceBuilder, InvoiceSubType, InvoiceType, LineItem, LineItemFields, Seller,
///     VatCategory, VatNumber,
/// };
///
/// let seller = Seller::new(
///     "Acme Inc",
///     Address {
///         country_code: CountryCode::SAU,
///         city: "Riyadh".into(),
///         street: "King Fahd".into(),
///         additional_street: None,
///         building_number: "1234".into(),
///         additional_number: None,
///         postal_code: "12222".into(),
///         subdivision: None,
///         district: Some("Al Olaya".into()),
///     },
///     VatNumber::parse("399999999900003")?,
/// );
/// let invoice = InvoiceBuilder::new(InvoiceType::Tax, InvoiceSubType::Simplified)
///     .id("INV-1")
///     .issue_datetime(Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap())
///     .seller(seller)
///     .line_item(LineItem::new(LineItemFields {
///         name: "Widget".into(),
///         quantity: dec!(2),
///         unit_code: "PCE".into(),
///         unit_price: dec!(100),
///         vat_category: VatCategory::Standard,
///     }))
///     .build()?;
/// assert_eq!(invoice.totals().payable_amount, dec!(230.00));
/// # Ok::<(), zatca_core::InvoiceError>(())
/// ```
#[derive(Debug, Clone)]
pub struct InvoiceBuilder {
    draft: InvoiceDraft,
}

impl InvoiceBuilder {
    pub fn new(invoice_type: InvoiceType, sub_type: impl Into<SubTypeCode>) -> Self {
        Self {
            draft: InvoiceDraft {
                invoice_type,
                sub_type: sub_type.into(),
                id: None,
                uuid: Uuid::new_v4(),
                issue_datetime: None,
                supply_date: None,
                currency: Currency::SAR,
                seller: None,
                buyer: None,
                line_items: Vec::new(),
                payment_means_code: "10".to_string(),
                payment_terms: None,
                original_invoice: None,
                adjustment_reason: None,
                notes: Vec::new(),
                document_discount: None,
            },
        }
    }

    /// Seed currency, payment means and seller from configuration.
    pub fn from_config(
        config: &Config,
        invoice_type: InvoiceType,
        sub_type: impl Into<SubTypeCode>,
    ) -> Self {
        let mut builder = Self::new(invoice_type, sub_type);
        builder.draft.currency = config.defaults.currency;
        builder.draft.payment_means_code = config.defaults.payment_means_code.clone();
        builder.draft.seller = config.defaults.seller.clone();
        builder
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.draft.id = Some(id.into());
        self
    }

    pub fn uuid(mut self, uuid: Uuid) -> Self {
        self.draft.uuid = uuid;
        self
    }

    pub fn issue_datetime(mut self, issue_datetime: DateTime<Utc>) -> Self {
        self.draft.issue_datetime = Some(issue_datetime);
        self
    }

    pub fn supply_date(mut self, supply_date: NaiveDate) -> Self {
        self.draft.supply_date = Some(supply_date);
        self
    }

    pub fn currency(mut self, currency: Currency) -> Self {
        self.draft.currency = currency;
        self
    }

    pub fn seller(mut self, seller: Seller) -> Self {
        self.draft.seller = Some(seller);
        self
    }

    pub fn buyer(mut self, buyer: Buyer) -> Self {
        self.draft.buyer = Some(buyer);
        self
    }

    pub fn line_item(mut self, item: LineItem) -> Self {
        self.draft.line_items.push(item);
        self
    }

    pub fn line_items(mut self, items: impl IntoIterator<Item = LineItem>) -> Self {
        self.draft.line_items.extend(items);
        self
    }

    pub fn payment_means_code(mut self, code: impl Into<String>) -> Self {
        self.draft.payment_means_code = code.into();
        self
    }

    pub fn payment_terms(mut self, terms: impl Into<String>) -> Self {
        self.draft.payment_terms = Some(terms.into());
        self
    }

    /// Invoice adjusted by a credit or debit note.
    pub fn original_invoice(mut self, original: OriginalInvoiceRef) -> Self {
        self.draft.original_invoice = Some(original);
        self
    }

    pub fn adjustment_reason(mut self, reason: impl Into<String>) -> Self {
        self.draft.adjustment_reason = Some(reason.into());
        self
    }

    pub fn note(mut self, note: InvoiceNote) -> Self {
        self.draft.notes.push(note);
        self
    }

    pub fn document_discount(mut self, discount: DocumentDiscount) -> Self {
        self.draft.document_discount = Some(discount);
        self
    }

    /// Validate the draft and compute totals.
    ///
    /// # Errors
    /// Returns [`InvoiceError::Validation`] carrying every issue found.
    pub fn build(self) -> Result<FinalizedInvoice, InvoiceError> {
        validate_draft(&self.draft)?;
        let draft = self.draft;

        let (Some(id), Some(issue_datetime), Some(seller)) =
            (draft.id, draft.issue_datetime, draft.seller)
        else {
            return Err(InvoiceError::Validation(super::ValidationError::new(
                Vec::new(),
            )));
        };

        let data = InvoiceData {
            invoice_type: draft.invoice_type,
            sub_type: draft.sub_type,
            id,
            uuid: draft.uuid,
            issue_datetime,
            supply_date: draft.supply_date,
            currency: draft.currency,
            seller,
            buyer: draft.buyer,
            line_items: draft.line_items,
            payment_means_code: draft.payment_means_code,
            payment_terms: draft.payment_terms,
            original_invoice: draft.original_invoice,
            adjustment_reason: draft.adjustment_reason,
            notes: draft.notes,
            document_discount: draft.document_discount,
        };
        Ok(FinalizedInvoice {
            totals: data.totals(),
            data,
            chain: None,
        })
    }
}

impl FinalizedInvoice {
    pub fn data(&self) -> &InvoiceData {
        &self.data
    }

    pub fn totals(&self) -> &InvoiceTotals {
        &self.totals
    }

    pub fn chain(&self) -> Option<&ChainLink> {
        self.chain.as_ref()
    }

    /// Attach the ICV and PIH allocated by the ledger.
    pub fn with_chain(mut self, chain: ChainLink) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn sign(self, signer: &InvoiceSigner) -> Result<SignedInvoice, SigningError> {
        signer.sign(self)
    }

    pub(crate) fn into_signed(
        self,
        signed_properties: SignedProperties,
        qr_code: String,
        signed_xml: String,
    ) -> SignedInvoice {
        SignedInvoice {
            finalized: self,
            signed_properties,
            qr_code,
            signed_xml,
        }
    }
}

impl SignedInvoice {
    pub fn data(&self) -> &InvoiceData {
        self.finalized.data()
    }

    pub fn totals(&self) -> &InvoiceTotals {
        self.finalized.totals()
    }

    pub fn chain(&self) -> Option<&ChainLink> {
        self.finalized.chain()
    }

    pub fn signed_properties(&self) -> &SignedProperties {
        &self.signed_properties
    }

    pub fn qr_code(&self) -> &str {
        &self.qr_code
    }

    pub fn xml(&self) -> &str {
        &self.signed_xml
    }

    pub fn uuid(&self) -> String {
        self.finalized.data().uuid().to_string()
    }

    pub fn invoice_hash(&self) -> &str {
        self.signed_properties.invoice_hash()
    }

    pub fn signature(&self) -> &str {
        self.signed_properties.signature()
    }

    pub fn to_xml_base64(&self) -> String {
        use base64ct::{Base64, Encoding};
        Base64::encode_string(self.signed_xml.as_bytes())
    }
}

impl Chained for SignedInvoice {
    fn invoice_hash(&self) -> &str {
        self.signed_properties.invoice_hash()
    }
}

/// Read access shared by finalized and signed invoices.
pub trait InvoiceView {
    fn data(&self) -> &InvoiceData;
    fn totals(&self) -> &InvoiceTotals;
    fn chain(&self) -> Option<&ChainLink>;
    fn qr_code(&self) -> Option<&str>;
}

impl InvoiceView for FinalizedInvoice {
    fn data(&self) -> &InvoiceData {
        self.data()
    }

    fn totals(&self) -> &InvoiceTotals {
        self.totals()
    }

    fn chain(&self) -> Option<&ChainLink> {
        self.chain()
    }

    fn qr_code(&self) -> Option<&str> {
        None
    }
}

impl InvoiceView for SignedInvoice {
    fn data(&self) -> &InvoiceData {
        self.data()
    }

    fn totals(&self) -> &InvoiceTotals {
        self.totals()
    }

    fn chain(&self) -> Option<&ChainLink> {
        self.chain()
    }

    fn qr_code(&self) -> Option<&str> {
        Some(self.qr_code())
    }
}
