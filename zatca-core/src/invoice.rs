//! Invoice domain types and VAT arithmetic.
mod builder;
pub mod hash;
pub mod qr;
pub mod sign;
mod totals;
pub mod validation;
pub mod verify;
pub mod xml;

pub use builder::{ChainLink, FinalizedInvoice, InvoiceBuilder, InvoiceView, SignedInvoice};
pub use qr::{QrIssue, QrPayload};
pub use totals::{InvoiceTotals, LineTotals, VatBreakdown, VatGroup, round_amount};
pub use validation::{InvoiceField, ValidationError, ValidationIssue, ValidationKind};

use bitflags::bitflags;
use chrono::{DateTime, NaiveDate, Utc};
use iso_currency::Currency;
use isocountry::{CountryCode, CountryCodeParseErr};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

type Result<T> = std::result::Result<T, InvoiceError>;

/// Invoice-related errors.
#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("invalid country code: {0}")]
    InvalidCountryCode(#[from] CountryCodeParseErr),
    #[error("invalid VAT number format")]
    InvalidVatFormat,
    #[error("invalid invoice sub-type code '{0}'")]
    InvalidSubTypeCode(String),
    #[error("unknown invoice type code '{0}'")]
    UnknownTypeCode(String),
}

/// Postal address for parties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub country_code: CountryCode,
    pub city: String,
    pub street: String,
    pub additional_street: Option<String>,
    pub building_number: String,
    pub additional_number: Option<String>,
    pub postal_code: String,
    pub subdivision: Option<String>,
    pub district: Option<String>,
}

impl Address {
    pub fn country_code(&self) -> &CountryCode {
        &self.country_code
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn street(&self) -> &str {
        &self.street
    }

    pub fn additional_street(&self) -> Option<&str> {
        self.additional_street.as_deref()
    }

    pub fn building_number(&self) -> &str {
        &self.building_number
    }

    pub fn additional_number(&self) -> Option<&str> {
        self.additional_number.as_deref()
    }

    pub fn postal_code(&self) -> &str {
        &self.postal_code
    }

    pub fn subdivision(&self) -> Option<&str> {
        self.subdivision.as_deref()
    }

    pub fn district(&self) -> Option<&str> {
        self.district.as_deref()
    }
}

/// VAT registration number.
///
/// Parsing only rejects empty input; the 15-digit pattern is checked by
/// invoice validation so every problem is reported together.
///
/// # Examples
/// ```rust
/// use zatca_core::invoice::VatNumber;
///
/// let vat = VatNumber::parse("399999999900003")?;
/// assert_eq!(vat.as_str(), "399999999900003");
/// assert!(vat.is_well_formed());
/// # Ok::<(), zatca_core::InvoiceError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VatNumber(String);

impl VatNumber {
    pub fn parse<S: Into<String>>(s: S) -> Result<Self> {
        let s = s.into().trim().to_string();
        if s.is_empty() {
            return Err(InvoiceError::InvalidVatFormat);
        }
        Ok(VatNumber(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fifteen digits, starting and ending with `3`.
    pub fn is_well_formed(&self) -> bool {
        is_well_formed_vat(&self.0)
    }
}

pub(crate) fn is_well_formed_vat(value: &str) -> bool {
    value.len() == 15
        && value.bytes().all(|b| b.is_ascii_digit())
        && value.starts_with('3')
        && value.ends_with('3')
}

impl AsRef<str> for VatNumber {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl FromStr for VatNumber {
    type Err = InvoiceError;
    fn from_str(s: &str) -> Result<Self> {
        VatNumber::parse(s)
    }
}

impl TryFrom<&str> for VatNumber {
    type Error = InvoiceError;
    fn try_from(value: &str) -> Result<Self> {
        VatNumber::parse(value)
    }
}

/// Additional party identifier (CRN, national id, ...).
///
/// # Examples
/// ```rust
/// use zatca_core::invoice::OtherId;
///
/// let id = OtherId::with_scheme("7003339333", "CRN");
/// assert_eq!(id.as_str(), "7003339333");
/// assert_eq!(id.scheme_id(), Some("CRN"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtherId {
    value: String,
    scheme_id: Option<String>,
}

impl OtherId {
    pub fn new<S: Into<String>>(value: S) -> Self {
        OtherId {
            value: value.into(),
            scheme_id: None,
        }
    }

    pub fn with_scheme<V: Into<String>, S: Into<String>>(value: V, scheme_id: S) -> Self {
        OtherId {
            value: value.into(),
            scheme_id: Some(scheme_id.into()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn scheme_id(&self) -> Option<&str> {
        self.scheme_id.as_deref()
    }
}

/// Free-text invoice note with language metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceNote {
    language: String,
    text: String,
}

impl InvoiceNote {
    pub fn new(language: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            text: text.into(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Marker trait for party role types.
pub trait PartyRole {}

/// Seller role marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerRole;
impl PartyRole for SellerRole {}

/// Buyer role marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyerRole;
impl PartyRole for BuyerRole {}

/// Party snapshot taken at issue time.
///
/// # Examples
/// ```rust
/// use zatca_core::invoice::{Address, Seller, VatNumber};
/// use isocountry::CountryCode;
///
/// let seller = Seller::new(
///     "Acme Inc",
///     Address {
///         country_code: CountryCode::SAU,
///         city: "Riyadh".into(),
///         street: "King Fahd".into(),
///         additional_street: None,
///         building_number: "1234".into(),
///         additional_number: Some("5678".into()),
///         postal_code: "12222".into(),
///         subdivision: None,
///         district: Some("Al Olaya".into()),
///     },
///     VatNumber::parse("399999999900003")?,
/// )
/// .with_registration("7003339333");
/// assert_eq!(seller.display_name(), Some("Acme Inc"));
/// # Ok::<(), zatca_core::InvoiceError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party<R: PartyRole> {
    #[serde(skip)]
    _marker: PhantomData<R>,
    name: String,
    local_name: Option<String>,
    address: Address,
    vat_number: Option<VatNumber>,
    other_id: Option<OtherId>,
}

pub type Seller = Party<SellerRole>;
pub type Buyer = Party<BuyerRole>;

impl Party<SellerRole> {
    pub fn new(name: impl Into<String>, address: Address, vat_number: VatNumber) -> Self {
        Party {
            _marker: PhantomData,
            name: name.into(),
            local_name: None,
            address,
            vat_number: Some(vat_number),
            other_id: None,
        }
    }

    /// Commercial registration number (`CRN` scheme).
    pub fn with_registration(mut self, crn: impl Into<String>) -> Self {
        self.other_id = Some(OtherId::with_scheme(crn, "CRN"));
        self
    }

}

impl Party<BuyerRole> {
    pub fn new(name: impl Into<String>, address: Address) -> Self {
        Party {
            _marker: PhantomData,
            name: name.into(),
            local_name: None,
            address,
            vat_number: None,
            other_id: None,
        }
    }

    pub fn with_vat_number(mut self, vat_number: VatNumber) -> Self {
        self.vat_number = Some(vat_number);
        self
    }

    pub fn with_other_id(mut self, other_id: OtherId) -> Self {
        self.other_id = Some(other_id);
        self
    }
}

impl<R: PartyRole> Party<R> {
    pub fn with_local_name(mut self, local_name: impl Into<String>) -> Self {
        self.local_name = Some(local_name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_name(&self) -> Option<&str> {
        self.local_name.as_deref()
    }

    /// First non-empty of the two name fields.
    pub fn display_name(&self) -> Option<&str> {
        [Some(self.name.as_str()), self.local_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|name| !name.is_empty())
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn vat_number(&self) -> Option<&VatNumber> {
        self.vat_number.as_ref()
    }

    pub fn other_id(&self) -> Option<&OtherId> {
        self.other_id.as_ref()
    }
}

/// Document type, rendered as the `InvoiceTypeCode` text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvoiceType {
    Tax,
    Prepayment,
    CreditNote,
    DebitNote,
}

impl InvoiceType {
    pub fn code(self) -> &'static str {
        match self {
            InvoiceType::Tax => "388",
            InvoiceType::Prepayment => "386",
            InvoiceType::CreditNote => "381",
            InvoiceType::DebitNote => "383",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            InvoiceType::Tax => "Tax Invoice",
            InvoiceType::Prepayment => "Prepayment Invoice",
            InvoiceType::CreditNote => "Credit Note",
            InvoiceType::DebitNote => "Debit Note",
        }
    }

    /// Credit and debit notes must reference the invoice they adjust.
    pub fn is_note(self) -> bool {
        matches!(self, InvoiceType::CreditNote | InvoiceType::DebitNote)
    }

    pub fn from_code(code: &str) -> Result<Self> {
        match code.trim() {
            "388" => Ok(InvoiceType::Tax),
            "386" => Ok(InvoiceType::Prepayment),
            "381" => Ok(InvoiceType::CreditNote),
            "383" => Ok(InvoiceType::DebitNote),
            other => Err(InvoiceError::UnknownTypeCode(other.to_string())),
        }
    }
}

/// Transaction axis: standard (B2B) or simplified (B2C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvoiceSubType {
    Standard,
    Simplified,
}

impl InvoiceSubType {
    fn prefix(self) -> &'static str {
        match self {
            InvoiceSubType::Standard => "01",
            InvoiceSubType::Simplified => "02",
        }
    }
}

bitflags! {
    /// Transaction flags packed into positions 3..=7 of the sub-type code.
    ///
    /// # Examples
    /// ```rust
    /// use zatca_core::invoice::InvoiceFlags;
    ///
    /// let flags = InvoiceFlags::EXPORT | InvoiceFlags::SELF_BILLED;
    /// assert!(flags.contains(InvoiceFlags::EXPORT));
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct InvoiceFlags: u8 {
        const THIRD_PARTY = 0b00001;
        const NOMINAL = 0b00010;
        const EXPORT = 0b00100;
        const SUMMARY = 0b01000;
        const SELF_BILLED = 0b10000;
    }
}

const FLAG_POSITIONS: [InvoiceFlags; 5] = [
    InvoiceFlags::THIRD_PARTY,
    InvoiceFlags::NOMINAL,
    InvoiceFlags::EXPORT,
    InvoiceFlags::SUMMARY,
    InvoiceFlags::SELF_BILLED,
];

/// The 7-character sub-type code carried in `InvoiceTypeCode/@name`.
///
/// # Examples
/// ```rust
/// use zatca_core::invoice::{InvoiceFlags, InvoiceSubType, SubTypeCode};
///
/// let code = SubTypeCode::parse("0200001")?;
/// assert_eq!(code.sub_type(), InvoiceSubType::Simplified);
/// assert!(code.is_self_billed());
/// assert_eq!(code.to_string(), "0200001");
/// assert_eq!(SubTypeCode::new(InvoiceSubType::Standard).to_string(), "0100000");
/// # Ok::<(), zatca_core::InvoiceError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubTypeCode {
    sub_type: InvoiceSubType,
    flags: InvoiceFlags,
}

impl SubTypeCode {
    pub fn new(sub_type: InvoiceSubType) -> Self {
        Self {
            sub_type,
            flags: InvoiceFlags::empty(),
        }
    }

    pub fn with_flags(mut self, flags: InvoiceFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn parse(code: &str) -> Result<Self> {
        let invalid = || InvoiceError::InvalidSubTypeCode(code.to_string());
        let bytes = code.trim().as_bytes();
        if bytes.len() != 7 {
            return Err(invalid());
        }
        let sub_type = match &bytes[..2] {
            b"01" => InvoiceSubType::Standard,
            b"02" => InvoiceSubType::Simplified,
            _ => return Err(invalid()),
        };
        let mut flags = InvoiceFlags::empty();
        for (bit, flag) in bytes[2..].iter().zip(FLAG_POSITIONS) {
            match bit {
                b'0' => {}
                b'1' => flags |= flag,
                _ => return Err(invalid()),
            }
        }
        Ok(Self { sub_type, flags })
    }

    pub fn sub_type(&self) -> InvoiceSubType {
        self.sub_type
    }

    /// Seven-character rendering, e.g. `0100000`.
    pub fn render(&self) -> String {
        self.to_string()
    }

    pub fn flags(&self) -> InvoiceFlags {
        self.flags
    }

    pub fn is_simplified(&self) -> bool {
        self.sub_type == InvoiceSubType::Simplified
    }

    /// Seventh character of the code.
    pub fn is_self_billed(&self) -> bool {
        self.flags.contains(InvoiceFlags::SELF_BILLED)
    }
}

impl From<InvoiceSubType> for SubTypeCode {
    fn from(sub_type: InvoiceSubType) -> Self {
        SubTypeCode::new(sub_type)
    }
}

impl fmt::Display for SubTypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sub_type.prefix())?;
        for flag in FLAG_POSITIONS {
            f.write_str(if self.flags.contains(flag) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// Reference to the invoice a credit or debit note adjusts.
///
/// # Examples
/// ```rust
/// use zatca_core::invoice::OriginalInvoiceRef;
///
/// let original = OriginalInvoiceRef::new("INV-ORIG").with_uuid("uuid-orig");
/// assert_eq!(original.id(), "INV-ORIG");
/// assert_eq!(original.uuid(), Some("uuid-orig"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalInvoiceRef {
    id: String,
    uuid: Option<String>,
    issue_date: Option<NaiveDate>,
}

impl OriginalInvoiceRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uuid: None,
            issue_date: None,
        }
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    pub fn with_issue_date(mut self, issue_date: NaiveDate) -> Self {
        self.issue_date = Some(issue_date);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    pub fn issue_date(&self) -> Option<NaiveDate> {
        self.issue_date
    }
}

/// VAT category with its UN/ECE 5305 code and default rate.
///
/// # Examples
/// ```rust
/// use rust_decimal_macros::dec;
/// use zatca_core::invoice::VatCategory;
///
/// assert_eq!(VatCategory::Standard.code(), "S");
/// assert_eq!(VatCategory::Standard.default_rate(), dec!(15));
/// assert_eq!(VatCategory::Exempt.default_rate(), dec!(0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VatCategory {
    Standard,
    Zero,
    Exempt,
    OutOfScope,
}

impl VatCategory {
    pub fn code(self) -> &'static str {
        match self {
            VatCategory::Standard => "S",
            VatCategory::Zero => "Z",
            VatCategory::Exempt => "E",
            VatCategory::OutOfScope => "O",
        }
    }

    pub fn default_rate(self) -> Decimal {
        match self {
            VatCategory::Standard => dec!(15),
            VatCategory::Zero | VatCategory::Exempt | VatCategory::OutOfScope => Decimal::ZERO,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            VatCategory::Standard => "Standard rated",
            VatCategory::Zero => "Zero rated",
            VatCategory::Exempt => "Exempt from VAT",
            VatCategory::OutOfScope => "Not subject to VAT",
        }
    }

    /// Exemption reasons are rendered for every category except standard.
    pub fn takes_exemption_reason(self) -> bool {
        !matches!(self, VatCategory::Standard)
    }
}

/// Exemption reason code (e.g. `VATEX-SA-29`) plus its text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VatExemption {
    code: String,
    reason: String,
}

impl VatExemption {
    pub fn new(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Discount applied to a single line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDiscount {
    amount: Decimal,
    reason: String,
}

impl LineDiscount {
    pub fn new(amount: Decimal, reason: impl Into<String>) -> Self {
        Self {
            amount,
            reason: reason.into(),
        }
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Document-level allowance applied to one VAT group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDiscount {
    amount: Decimal,
    reason: String,
    category: VatCategory,
    rate: Decimal,
}

impl DocumentDiscount {
    /// Discount on the group taxed at the category's default rate.
    pub fn new(amount: Decimal, reason: impl Into<String>, category: VatCategory) -> Self {
        Self {
            amount,
            reason: reason.into(),
            category,
            rate: category.default_rate(),
        }
    }

    pub fn with_rate(mut self, rate: Decimal) -> Self {
        self.rate = rate;
        self
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn category(&self) -> VatCategory {
        self.category
    }

    pub fn rate(&self) -> Decimal {
        self.rate
    }
}

/// Fields required to create a line item.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemFields {
    pub name: String,
    pub quantity: Decimal,
    pub unit_code: String,
    pub unit_price: Decimal,
    pub vat_category: VatCategory,
}

/// Single invoice line.
///
/// Amounts are derived on demand and rounded half-up to two decimals at
/// the line level.
///
/// # Examples
/// ```rust
/// use rust_decimal_macros::dec;
/// use zatca_core::invoice::{LineItem, LineItemFields, VatCategory};
///
/// let item = LineItem::new(LineItemFields {
///     name: "Widget".into(),
///     quantity: dec!(3),
///     unit_code: "PCE".into(),
///     unit_price: dec!(100.00),
///     vat_category: VatCategory::Standard,
/// })
/// .with_discount(dec!(50.00), "loyalty");
///
/// let totals = item.totals();
/// assert_eq!(totals.subtotal, dec!(250.00));
/// assert_eq!(totals.vat_amount, dec!(37.50));
/// assert_eq!(totals.total, dec!(287.50));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    name: String,
    quantity: Decimal,
    unit_code: String,
    unit_price: Decimal,
    vat_category: VatCategory,
    vat_rate: Option<Decimal>,
    exemption: Option<VatExemption>,
    discount: Option<LineDiscount>,
}

impl LineItem {
    pub fn new(fields: LineItemFields) -> Self {
        Self {
            name: fields.name,
            quantity: fields.quantity,
            unit_code: fields.unit_code,
            unit_price: fields.unit_price,
            vat_category: fields.vat_category,
            vat_rate: None,
            exemption: None,
            discount: None,
        }
    }

    /// Override the category's default rate.
    pub fn with_vat_rate(mut self, rate: Decimal) -> Self {
        self.vat_rate = Some(rate);
        self
    }

    pub fn with_exemption(mut self, code: impl Into<String>, reason: impl Into<String>) -> Self {
        self.exemption = Some(VatExemption::new(code, reason));
        self
    }

    pub fn with_discount(mut self, amount: Decimal, reason: impl Into<String>) -> Self {
        self.discount = Some(LineDiscount::new(amount, reason));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn unit_code(&self) -> &str {
        &self.unit_code
    }

    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    pub fn vat_category(&self) -> VatCategory {
        self.vat_category
    }

    pub fn vat_rate_override(&self) -> Option<Decimal> {
        self.vat_rate
    }

    pub fn effective_rate(&self) -> Decimal {
        self.vat_rate
            .unwrap_or_else(|| self.vat_category.default_rate())
    }

    /// Exemption reason, only for non-standard categories.
    pub fn exemption(&self) -> Option<&VatExemption> {
        self.exemption
            .as_ref()
            .filter(|_| self.vat_category.takes_exemption_reason())
    }

    pub fn discount(&self) -> Option<&LineDiscount> {
        self.discount.as_ref()
    }

    pub fn discount_amount(&self) -> Decimal {
        self.discount
            .as_ref()
            .map(LineDiscount::amount)
            .unwrap_or_default()
    }

    /// Quantity times unit price, before discount and rounding.
    pub fn gross_amount(&self) -> Decimal {
        self.quantity * self.unit_price
    }

    pub fn totals(&self) -> LineTotals {
        LineTotals::for_line(self)
    }
}

/// Core invoice data model.
///
/// Instances are produced by [`InvoiceBuilder::build`], which guarantees
/// every invariant checked by validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceData {
    invoice_type: InvoiceType,
    sub_type: SubTypeCode,
    id: String,
    uuid: Uuid,
    issue_datetime: DateTime<Utc>,
    supply_date: Option<NaiveDate>,
    currency: Currency,
    seller: Seller,
    buyer: Option<Buyer>,
    line_items: Vec<LineItem>,
    payment_means_code: String,
    payment_terms: Option<String>,
    original_invoice: Option<OriginalInvoiceRef>,
    adjustment_reason: Option<String>,
    notes: Vec<InvoiceNote>,
    document_discount: Option<DocumentDiscount>,
}

impl InvoiceData {
    pub fn invoice_type(&self) -> InvoiceType {
        self.invoice_type
    }

    pub fn sub_type(&self) -> SubTypeCode {
        self.sub_type
    }

    pub fn is_simplified(&self) -> bool {
        self.sub_type.is_simplified()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn uuid(&self) -> &Uuid {
        &self.uuid
    }

    pub fn issue_datetime(&self) -> &DateTime<Utc> {
        &self.issue_datetime
    }

    pub fn supply_date(&self) -> Option<NaiveDate> {
        self.supply_date
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn seller(&self) -> &Seller {
        &self.seller
    }

    pub fn buyer(&self) -> Option<&Buyer> {
        self.buyer.as_ref()
    }

    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    pub fn payment_means_code(&self) -> &str {
        &self.payment_means_code
    }

    pub fn payment_terms(&self) -> Option<&str> {
        self.payment_terms.as_deref()
    }

    pub fn original_invoice(&self) -> Option<&OriginalInvoiceRef> {
        self.original_invoice.as_ref()
    }

    pub fn adjustment_reason(&self) -> Option<&str> {
        self.adjustment_reason.as_deref()
    }

    pub fn notes(&self) -> &[InvoiceNote] {
        &self.notes
    }

    pub fn document_discount(&self) -> Option<&DocumentDiscount> {
        self.document_discount.as_ref()
    }

    pub(crate) fn issue_date_string(&self) -> String {
        self.issue_datetime.date_naive().to_string()
    }

    pub(crate) fn issue_time_string(&self) -> String {
        self.issue_datetime.time().format("%H:%M:%S").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_type_code_round_trips_flags() {
        let code = SubTypeCode::new(InvoiceSubType::Standard)
            .with_flags(InvoiceFlags::THIRD_PARTY | InvoiceFlags::SUMMARY);
        assert_eq!(code.to_string(), "0110010");
        assert_eq!(SubTypeCode::parse("0110010").expect("parse"), code);
        assert!(!code.is_self_billed());
    }

    #[test]
    fn sub_type_code_rejects_malformed_input() {
        for bad in ["", "010000", "0300000", "01000002", "01000x0"] {
            assert!(
                matches!(SubTypeCode::parse(bad), Err(InvoiceError::InvalidSubTypeCode(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn type_and_sub_type_are_independent() {
        let note = InvoiceType::CreditNote;
        let simplified = SubTypeCode::new(InvoiceSubType::Simplified);
        assert!(note.is_note());
        assert!(simplified.is_simplified());
        assert!(!InvoiceType::Tax.is_note());
        assert_eq!(InvoiceType::from_code("383").expect("code"), InvoiceType::DebitNote);
        assert!(InvoiceType::from_code("999").is_err());
    }

    #[test]
    fn vat_number_pattern() {
        assert!(is_well_formed_vat("300000000000003"));
        assert!(!is_well_formed_vat("30000000000000"));
        assert!(!is_well_formed_vat("100000000000003"));
        assert!(!is_well_formed_vat("3000000000000a3"));
        assert!(VatNumber::parse("  ").is_err());
    }

    #[test]
    fn exemption_ignored_for_standard_category() {
        let fields = |category| LineItemFields {
            name: "Item".into(),
            quantity: dec!(1),
            unit_code: "PCE".into(),
            unit_price: dec!(10),
            vat_category: category,
        };
        let standard = LineItem::new(fields(VatCategory::Standard))
            .with_exemption("VATEX-SA-29", "Financial services");
        assert!(standard.exemption().is_none());

        let exempt = LineItem::new(fields(VatCategory::Exempt))
            .with_exemption("VATEX-SA-29", "Financial services");
        assert_eq!(exempt.exemption().map(VatExemption::code), Some("VATEX-SA-29"));
        assert_eq!(exempt.effective_rate(), Decimal::ZERO);
    }

    #[test]
    fn display_name_falls_back_to_local_name() {
        let address = Address {
            country_code: CountryCode::SAU,
            city: "Jeddah".into(),
            street: "Tahlia".into(),
            additional_street: None,
            building_number: "1111".into(),
            additional_number: None,
            postal_code: "21411".into(),
            subdivision: None,
            district: Some("Al Andalus".into()),
        };
        let vat = VatNumber::parse("399999999900003").expect("vat");
        let seller = Seller::new("  ", address, vat).with_local_name("مؤسسة");
        assert_eq!(seller.display_name(), Some("مؤسسة"));
    }
}
