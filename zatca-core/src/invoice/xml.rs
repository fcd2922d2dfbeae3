//! XML rendering for invoices.
//!
//! The renderer emits the UBL 2.1 skeleton in schema order: extension
//! placeholder, metadata, ICV/PIH/QR references, signature placeholder,
//! parties, payment, discounts, tax totals, monetary totals and lines.
use super::{
    Address, Buyer, ChainLink, FinalizedInvoice, InvoiceData, InvoiceNote, InvoiceTotals,
    InvoiceView, LineItem, OriginalInvoiceRef, OtherId, Party, PartyRole, Seller, SignedInvoice,
    VatCategory, VatExemption, VatGroup, round_amount,
};

use helpers::{amount_text, currency_amount, id_with_scheme, percent_text, quantity_with_unit};
use quick_xml::se::{SeError, Serializer as QuickXmlSerializer};
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use thiserror::Error;

pub(crate) mod constants;
pub(crate) mod dom;

pub use dom::{extract_qr, inject_qr};

/// XML rendering and document manipulation errors.
#[derive(Debug, Error)]
pub enum InvoiceXmlError {
    #[error("failed to serialize invoice to XML: {source}")]
    Serialize {
        #[from]
        source: SeError,
    },
    #[error("invoice has no ICV/PIH chain link attached")]
    MissingChainLink,
    #[error("failed to parse XML: {0}")]
    Parse(String),
    #[error("xpath evaluation failed: {0}")]
    XPath(String),
    #[error("missing element: {0}")]
    MissingNode(String),
    #[error("failed to modify document: {0}")]
    Mutation(String),
}

/// XML formatting options.
#[derive(Debug, Clone, Copy, Default)]
pub enum XmlFormat {
    #[default]
    Compact,
    Pretty {
        indent_char: char,
        indent_size: usize,
    },
}

mod helpers {
    use super::round_amount;
    use rust_decimal::{Decimal, RoundingStrategy};
    use serde::ser::{Serialize, SerializeStruct, Serializer};

    /// Fixed two-decimal money text.
    pub(super) fn amount_text(value: Decimal) -> String {
        format!("{:.2}", round_amount(value))
    }

    pub(super) fn percent_text(value: Decimal) -> String {
        format!("{:.2}", round_amount(value))
    }

    /// Unit prices keep extra precision when the caller supplied it.
    pub(super) fn price_text(value: Decimal) -> String {
        if value.scale() <= 2 {
            format!("{value:.2}")
        } else {
            value.normalize().to_string()
        }
    }

    /// Up to five decimals, trailing zeros stripped.
    pub(super) fn quantity_text(value: Decimal) -> String {
        value
            .round_dp_with_strategy(5, RoundingStrategy::MidpointAwayFromZero)
            .normalize()
            .to_string()
    }

    struct CurrencyAmountSer<'a> {
        tag: &'static str,
        currency: &'a str,
        text: String,
    }

    pub(super) fn currency_amount<'a>(
        tag: &'static str,
        currency: &'a str,
        value: Decimal,
    ) -> impl Serialize + 'a {
        CurrencyAmountSer {
            tag,
            currency,
            text: amount_text(value),
        }
    }

    pub(super) fn currency_price<'a>(
        tag: &'static str,
        currency: &'a str,
        value: Decimal,
    ) -> impl Serialize + 'a {
        CurrencyAmountSer {
            tag,
            currency,
            text: price_text(value),
        }
    }

    impl Serialize for CurrencyAmountSer<'_> {
        fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            let mut st = s.serialize_struct(self.tag, 2)?;
            st.serialize_field("@currencyID", self.currency)?;
            st.serialize_field("$text", &self.text)?;
            st.end()
        }
    }

    struct IdWithSchemeSer<'a> {
        tag: &'static str,
        scheme_id: &'a str,
        scheme_agency_id: Option<&'a str>,
        value: &'a str,
    }

    pub(super) fn id_with_scheme<'a>(
        tag: &'static str,
        scheme_id: &'a str,
        scheme_agency_id: Option<&'a str>,
        value: &'a str,
    ) -> impl Serialize + 'a {
        IdWithSchemeSer {
            tag,
            scheme_id,
            scheme_agency_id,
            value,
        }
    }

    impl Serialize for IdWithSchemeSer<'_> {
        fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            let mut st = s.serialize_struct(self.tag, 3)?;
            st.serialize_field("@schemeID", self.scheme_id)?;
            if let Some(agency) = self.scheme_agency_id {
                st.serialize_field("@schemeAgencyID", agency)?;
            }
            st.serialize_field("$text", self.value)?;
            st.end()
        }
    }

    struct QuantityWithUnitSer<'a> {
        tag: &'static str,
        value: Decimal,
        unit_code: &'a str,
    }

    pub(super) fn quantity_with_unit<'a>(
        tag: &'static str,
        value: Decimal,
        unit_code: &'a str,
    ) -> impl Serialize + 'a {
        QuantityWithUnitSer {
            tag,
            value,
            unit_code,
        }
    }

    impl Serialize for QuantityWithUnitSer<'_> {
        fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            let mut st = s.serialize_struct(self.tag, 2)?;
            st.serialize_field("@unitCode", self.unit_code)?;
            st.serialize_field("$text", &quantity_text(self.value))?;
            st.end()
        }
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(value)
}

struct UblExtensionsXml;

impl Serialize for UblExtensionsXml {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        struct ExtensionXml;
        struct ExtensionContentXml;

        impl Serialize for ExtensionContentXml {
            fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                s.serialize_struct("ext:ExtensionContent", 0)?.end()
            }
        }

        impl Serialize for ExtensionXml {
            fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                let mut st = s.serialize_struct("ext:UBLExtension", 0)?;
                st.serialize_field("ext:ExtensionURI", constants::EXTENSION_URI)?;
                st.serialize_field("ext:ExtensionContent", &ExtensionContentXml)?;
                st.end()
            }
        }

        let mut st = s.serialize_struct("ext:UBLExtensions", 0)?;
        st.serialize_field("ext:UBLExtension", &ExtensionXml)?;
        st.end()
    }
}

struct InvoiceTypeCodeXml<'a>(&'a InvoiceData);

impl Serialize for InvoiceTypeCodeXml<'_> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let data = self.0;
        let mut st = s.serialize_struct("cbc:InvoiceTypeCode", 2)?;
        st.serialize_field("@name", &data.sub_type().render())?;
        st.serialize_field("$text", data.invoice_type().code())?;
        st.end()
    }
}

struct TaxSchemeXml;

impl Serialize for TaxSchemeXml {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cac:TaxScheme", 0)?;
        st.serialize_field(
            "cbc:ID",
            &id_with_scheme("cbc:ID", "UN/ECE 5153", Some("6"), "VAT"),
        )?;
        st.end()
    }
}

struct PartyTaxSchemeXml<'a>(&'a str);

impl Serialize for PartyTaxSchemeXml<'_> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cac:PartyTaxScheme", 0)?;
        st.serialize_field("cbc:CompanyID", self.0)?;
        st.serialize_field("cac:TaxScheme", &TaxSchemeXml)?;
        st.end()
    }
}

struct PartyIdentificationXml<'a>(&'a OtherId);

impl Serialize for PartyIdentificationXml<'_> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let other_id = self.0;
        let mut st = s.serialize_struct("cac:PartyIdentification", 0)?;
        match other_id.scheme_id() {
            Some(scheme_id) => st.serialize_field(
                "cbc:ID",
                &id_with_scheme("cbc:ID", scheme_id, None, other_id.as_str()),
            )?,
            None => st.serialize_field("cbc:ID", other_id.as_str())?,
        }
        st.end()
    }
}

struct PartyLegalEntityXml<'a>(&'a str);

impl Serialize for PartyLegalEntityXml<'_> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cac:PartyLegalEntity", 0)?;
        st.serialize_field("cbc:RegistrationName", self.0)?;
        st.end()
    }
}

struct PartyXml<'a, R: PartyRole>(&'a Party<R>);

impl<R: PartyRole> Serialize for PartyXml<'_, R> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let party = self.0;
        let mut st = s.serialize_struct("cac:Party", 0)?;
        if let Some(other_id) = party.other_id() {
            st.serialize_field("cac:PartyIdentification", &PartyIdentificationXml(other_id))?;
        }
        st.serialize_field("cac:PostalAddress", &AddressXml(party.address()))?;
        if let Some(vat) = party.vat_number() {
            st.serialize_field("cac:PartyTaxScheme", &PartyTaxSchemeXml(vat.as_str()))?;
        }
        let name = party.display_name().unwrap_or(party.name());
        st.serialize_field("cac:PartyLegalEntity", &PartyLegalEntityXml(name))?;
        st.end()
    }
}

struct EmptyParty;

impl Serialize for EmptyParty {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_struct("cac:Party", 0)?.end()
    }
}

struct AccountingSupplierPartyXml<'a>(&'a Seller);

impl Serialize for AccountingSupplierPartyXml<'_> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cac:AccountingSupplierParty", 0)?;
        st.serialize_field("cac:Party", &PartyXml(self.0))?;
        st.end()
    }
}

struct AccountingCustomerPartyXml<'a>(Option<&'a Buyer>);

impl Serialize for AccountingCustomerPartyXml<'_> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cac:AccountingCustomerParty", 0)?;
        match self.0 {
            Some(party) => st.serialize_field("cac:Party", &PartyXml(party))?,
            None => st.serialize_field("cac:Party", &EmptyParty)?,
        }
        st.end()
    }
}

struct AddressXml<'a>(&'a Address);

impl Serialize for AddressXml<'_> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        struct CountryXml<'a>(&'a str);

        impl Serialize for CountryXml<'_> {
            fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                let mut st = s.serialize_struct("cac:Country", 0)?;
                st.serialize_field("cbc:IdentificationCode", self.0)?;
                st.end()
            }
        }

        let a = self.0;
        let mut st = s.serialize_struct("cac:PostalAddress", 0)?;
        if let Some(street) = non_empty(a.street()) {
            st.serialize_field("cbc:StreetName", street)?;
        }
        if let Some(additional) = a.additional_street().and_then(non_empty) {
            st.serialize_field("cbc:AdditionalStreetName", additional)?;
        }
        if let Some(building) = non_empty(a.building_number()) {
            st.serialize_field("cbc:BuildingNumber", building)?;
        }
        if let Some(plot) = a.additional_number().and_then(non_empty) {
            st.serialize_field("cbc:PlotIdentification", plot)?;
        }
        if let Some(district) = a.district().and_then(non_empty) {
            st.serialize_field("cbc:CitySubdivisionName", district)?;
        }
        if let Some(city) = non_empty(a.city()) {
            st.serialize_field("cbc:CityName", city)?;
        }
        if let Some(postal) = non_empty(a.postal_code()) {
            st.serialize_field("cbc:PostalZone", postal)?;
        }
        if let Some(subdivision) = a.subdivision().and_then(non_empty) {
            st.serialize_field("cbc:CountrySubentity", subdivision)?;
        }
        st.serialize_field("cac:Country", &CountryXml(a.country_code().alpha2()))?;
        st.end()
    }
}

struct NoteXml<'a>(&'a InvoiceNote);

impl Serialize for NoteXml<'_> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let note = self.0;
        let mut st = s.serialize_struct("cbc:Note", 2)?;
        st.serialize_field("@languageID", note.language())?;
        st.serialize_field("$text", note.text())?;
        st.end()
    }
}

struct BillingReferenceXml<'a>(&'a OriginalInvoiceRef);

impl Serialize for BillingReferenceXml<'_> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        struct InvoiceDocumentReferenceXml<'a>(&'a OriginalInvoiceRef);

        impl Serialize for InvoiceDocumentReferenceXml<'_> {
            fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                let mut st = s.serialize_struct("cac:InvoiceDocumentReference", 0)?;
                st.serialize_field("cbc:ID", self.0.id())?;
                if let Some(uuid) = self.0.uuid() {
                    st.serialize_field("cbc:UUID", uuid)?;
                }
                if let Some(issue_date) = self.0.issue_date() {
                    st.serialize_field("cbc:IssueDate", &issue_date.to_string())?;
                }
                st.end()
            }
        }

        let mut st = s.serialize_struct("cac:BillingReference", 0)?;
        st.serialize_field(
            "cac:InvoiceDocumentReference",
            &InvoiceDocumentReferenceXml(self.0),
        )?;
        st.end()
    }
}

enum AdditionalDocumentReferenceXml<'a> {
    InvoiceCounter(String),
    PreviousInvoiceHash(&'a str),
    QrCode(&'a str),
}

struct AttachmentXml<'a>(&'a str);

impl Serialize for AttachmentXml<'_> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        struct EmbeddedDocumentXml<'a>(&'a str);

        impl Serialize for EmbeddedDocumentXml<'_> {
            fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                let mut st = s.serialize_struct("cbc:EmbeddedDocumentBinaryObject", 2)?;
                st.serialize_field("@mimeCode", "text/plain")?;
                st.serialize_field("$text", self.0)?;
                st.end()
            }
        }

        let mut st = s.serialize_struct("cac:Attachment", 0)?;
        st.serialize_field(
            "cbc:EmbeddedDocumentBinaryObject",
            &EmbeddedDocumentXml(self.0),
        )?;
        st.end()
    }
}

impl Serialize for AdditionalDocumentReferenceXml<'_> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cac:AdditionalDocumentReference", 0)?;
        match self {
            AdditionalDocumentReferenceXml::InvoiceCounter(value) => {
                st.serialize_field("cbc:ID", constants::ICV_REFERENCE_ID)?;
                st.serialize_field("cbc:UUID", value)?;
            }
            AdditionalDocumentReferenceXml::PreviousInvoiceHash(value) => {
                st.serialize_field("cbc:ID", constants::PIH_REFERENCE_ID)?;
                st.serialize_field("cac:Attachment", &AttachmentXml(value))?;
            }
            AdditionalDocumentReferenceXml::QrCode(value) => {
                st.serialize_field("cbc:ID", constants::QR_REFERENCE_ID)?;
                st.serialize_field("cac:Attachment", &AttachmentXml(value))?;
            }
        }
        st.end()
    }
}

struct SignaturePlaceholderXml;

impl Serialize for SignaturePlaceholderXml {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cac:Signature", 0)?;
        st.serialize_field("cbc:ID", constants::SIGNATURE_ID)?;
        st.serialize_field("cbc:SignatureMethod", constants::SIGNATURE_METHOD)?;
        st.end()
    }
}

struct TaxCategoryXml<'a> {
    tag: &'static str,
    category: VatCategory,
    percent: Decimal,
    exemption: Option<&'a VatExemption>,
}

impl Serialize for TaxCategoryXml<'_> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct(self.tag, 0)?;
        st.serialize_field(
            "cbc:ID",
            &id_with_scheme("cbc:ID", "UN/ECE 5305", Some("6"), self.category.code()),
        )?;
        st.serialize_field("cbc:Percent", &percent_text(self.percent))?;
        if self.category.takes_exemption_reason() {
            if let Some(exemption) = self.exemption {
                st.serialize_field("cbc:TaxExemptionReasonCode", exemption.code())?;
                st.serialize_field("cbc:TaxExemptionReason", exemption.reason())?;
            }
        }
        st.serialize_field("cac:TaxScheme", &TaxSchemeXml)?;
        st.end()
    }
}

struct DeliveryXml(String);

impl Serialize for DeliveryXml {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cac:Delivery", 0)?;
        st.serialize_field("cbc:ActualDeliveryDate", &self.0)?;
        st.end()
    }
}

struct PaymentMeansXml<'a> {
    code: &'a str,
    instruction_note: Option<&'a str>,
}

impl Serialize for PaymentMeansXml<'_> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cac:PaymentMeans", 0)?;
        st.serialize_field("cbc:PaymentMeansCode", self.code)?;
        if let Some(note) = self.instruction_note {
            st.serialize_field("cbc:InstructionNote", note)?;
        }
        st.end()
    }
}

struct PaymentTermsXml<'a>(&'a str);

impl Serialize for PaymentTermsXml<'_> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cac:PaymentTerms", 0)?;
        st.serialize_field("cbc:Note", self.0)?;
        st.end()
    }
}

struct AllowanceChargeXml<'a> {
    currency: &'a str,
    reason: &'a str,
    amount: Decimal,
    tax_category: Option<TaxCategoryXml<'a>>,
}

impl Serialize for AllowanceChargeXml<'_> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cac:AllowanceCharge", 0)?;
        st.serialize_field("cbc:ChargeIndicator", &false)?;
        st.serialize_field("cbc:AllowanceChargeReason", self.reason)?;
        st.serialize_field(
            "cbc:Amount",
            &currency_amount("cbc:Amount", self.currency, self.amount),
        )?;
        if let Some(category) = &self.tax_category {
            st.serialize_field("cac:TaxCategory", category)?;
        }
        st.end()
    }
}

struct TaxTotalXml<'a> {
    currency: &'a str,
    amount: Decimal,
    groups: Option<&'a [VatGroup]>,
}

impl Serialize for TaxTotalXml<'_> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cac:TaxTotal", 0)?;
        st.serialize_field(
            "cbc:TaxAmount",
            &currency_amount("cbc:TaxAmount", self.currency, self.amount),
        )?;
        for group in self.groups.unwrap_or_default() {
            st.serialize_field(
                "cac:TaxSubtotal",
                &TaxSubtotalXml {
                    currency: self.currency,
                    group,
                },
            )?;
        }
        st.end()
    }
}

struct TaxSubtotalXml<'a> {
    currency: &'a str,
    group: &'a VatGroup,
}

impl Serialize for TaxSubtotalXml<'_> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let group = self.group;
        let mut st = s.serialize_struct("cac:TaxSubtotal", 0)?;
        st.serialize_field(
            "cbc:TaxableAmount",
            &currency_amount("cbc:TaxableAmount", self.currency, group.taxable_amount),
        )?;
        st.serialize_field(
            "cbc:TaxAmount",
            &currency_amount("cbc:TaxAmount", self.currency, group.vat_amount),
        )?;
        st.serialize_field(
            "cac:TaxCategory",
            &TaxCategoryXml {
                tag: "cac:TaxCategory",
                category: group.category,
                percent: group.rate,
                exemption: group.exemption.as_ref(),
            },
        )?;
        st.end()
    }
}

struct LegalMonetaryTotalXml<'a> {
    currency: &'a str,
    totals: &'a InvoiceTotals,
}

impl Serialize for LegalMonetaryTotalXml<'_> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let (currency, totals) = (self.currency, self.totals);
        let fields = [
            ("cbc:LineExtensionAmount", totals.line_extension_amount),
            ("cbc:TaxExclusiveAmount", totals.tax_exclusive_amount),
            ("cbc:TaxInclusiveAmount", totals.tax_inclusive_amount),
            ("cbc:AllowanceTotalAmount", totals.allowance_total_amount),
            ("cbc:PrepaidAmount", Decimal::ZERO),
            ("cbc:PayableAmount", totals.payable_amount),
        ];
        let mut st = s.serialize_struct("cac:LegalMonetaryTotal", 0)?;
        for (tag, value) in fields {
            st.serialize_field(tag, &currency_amount(tag, currency, value))?;
        }
        st.end()
    }
}

struct InvoiceLineXml<'a> {
    index: usize,
    line: &'a LineItem,
    currency: &'a str,
}

impl Serialize for InvoiceLineXml<'_> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        struct LineTaxTotalXml<'a> {
            currency: &'a str,
            vat_amount: Decimal,
            rounding_amount: Decimal,
        }

        impl Serialize for LineTaxTotalXml<'_> {
            fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                let mut st = s.serialize_struct("cac:TaxTotal", 0)?;
                st.serialize_field(
                    "cbc:TaxAmount",
                    &currency_amount("cbc:TaxAmount", self.currency, self.vat_amount),
                )?;
                st.serialize_field(
                    "cbc:RoundingAmount",
                    &currency_amount("cbc:RoundingAmount", self.currency, self.rounding_amount),
                )?;
                st.end()
            }
        }

        struct ItemXml<'a>(&'a LineItem);

        impl Serialize for ItemXml<'_> {
            fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                let line = self.0;
                let mut st = s.serialize_struct("cac:Item", 0)?;
                st.serialize_field("cbc:Name", line.name())?;
                st.serialize_field(
                    "cac:ClassifiedTaxCategory",
                    &TaxCategoryXml {
                        tag: "cac:ClassifiedTaxCategory",
                        category: line.vat_category(),
                        percent: line.effective_rate(),
                        exemption: None,
                    },
                )?;
                st.end()
            }
        }

        struct PriceXml<'a> {
            currency: &'a str,
            unit_price: Decimal,
        }

        impl Serialize for PriceXml<'_> {
            fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                let mut st = s.serialize_struct("cac:Price", 0)?;
                st.serialize_field(
                    "cbc:PriceAmount",
                    &helpers::currency_price("cbc:PriceAmount", self.currency, self.unit_price),
                )?;
                st.end()
            }
        }

        let (line, currency) = (self.line, self.currency);
        let totals = line.totals();

        let mut st = s.serialize_struct("cac:InvoiceLine", 0)?;
        st.serialize_field("cbc:ID", &self.index.to_string())?;
        st.serialize_field(
            "cbc:InvoicedQuantity",
            &quantity_with_unit("cbc:InvoicedQuantity", line.quantity(), line.unit_code()),
        )?;
        st.serialize_field(
            "cbc:LineExtensionAmount",
            &currency_amount("cbc:LineExtensionAmount", currency, totals.subtotal),
        )?;
        if let Some(discount) = line.discount() {
            st.serialize_field(
                "cac:AllowanceCharge",
                &AllowanceChargeXml {
                    currency,
                    reason: discount.reason(),
                    amount: discount.amount(),
                    tax_category: None,
                },
            )?;
        }
        st.serialize_field(
            "cac:TaxTotal",
            &LineTaxTotalXml {
                currency,
                vat_amount: totals.vat_amount,
                rounding_amount: totals.total,
            },
        )?;
        st.serialize_field("cac:Item", &ItemXml(line))?;
        st.serialize_field(
            "cac:Price",
            &PriceXml {
                currency,
                unit_price: line.unit_price(),
            },
        )?;
        st.end()
    }
}

/// Serialize invoices to XML.
///
/// Rendering needs the ICV/PIH pair, so attach a [`ChainLink`] first.
///
/// # Examples
/// ```rust,no_run
/// use zatca_core::invoice::xml::ToXml;
/// use zatca_core::invoice::{ChainLink, FinalizedInvoice};
///
/// let invoice: FinalizedInvoice = unimplemented!();
/// let xml = invoice.with_chain(ChainLink::new(1, "pih")).to_xml()?;
/// # let _ = xml;
/// # Ok::<(), zatca_core::invoice::xml::InvoiceXmlError>(())
/// ```
pub trait ToXml {
    fn to_xml_with_format(&self, format: XmlFormat) -> Result<String, InvoiceXmlError>;

    fn to_xml(&self) -> Result<String, InvoiceXmlError> {
        self.to_xml_with_format(XmlFormat::Pretty {
            indent_char: ' ',
            indent_size: 4,
        })
    }
}

impl ToXml for FinalizedInvoice {
    fn to_xml_with_format(&self, format: XmlFormat) -> Result<String, InvoiceXmlError> {
        to_xml_with_format(self, format)
    }
}

impl ToXml for SignedInvoice {
    /// The signed document is returned as produced; re-rendering would
    /// invalidate the signature.
    fn to_xml_with_format(&self, _format: XmlFormat) -> Result<String, InvoiceXmlError> {
        Ok(self.xml().to_string())
    }
}

fn to_xml_with_format<T: InvoiceView + ?Sized>(
    invoice: &T,
    format: XmlFormat,
) -> Result<String, InvoiceXmlError> {
    let chain = invoice.chain().ok_or(InvoiceXmlError::MissingChainLink)?;

    let mut buffer = String::with_capacity(8192);
    buffer.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    buffer.push('\n');

    {
        let mut serializer = QuickXmlSerializer::new(&mut buffer);
        if let XmlFormat::Pretty {
            indent_char,
            indent_size,
        } = format
        {
            serializer.indent(indent_char, indent_size);
        }
        InvoiceDocumentXml {
            view: invoice,
            chain,
        }
        .serialize(serializer)?;
    }

    Ok(buffer)
}

struct InvoiceDocumentXml<'a, T: InvoiceView + ?Sized> {
    view: &'a T,
    chain: &'a ChainLink,
}

impl<T: InvoiceView + ?Sized> Serialize for InvoiceDocumentXml<'_, T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let view = self.view;
        let data = view.data();
        let totals = view.totals();
        let currency = data.currency().code();

        let mut root = serializer.serialize_struct("Invoice", 0)?;

        root.serialize_field("@xmlns", constants::INVOICE_NS)?;
        root.serialize_field("@xmlns:cac", constants::CAC_NS)?;
        root.serialize_field("@xmlns:cbc", constants::CBC_NS)?;
        root.serialize_field("@xmlns:ext", constants::EXT_NS)?;

        root.serialize_field("ext:UBLExtensions", &UblExtensionsXml)?;

        root.serialize_field("cbc:ProfileID", constants::PROFILE_ID)?;
        root.serialize_field("cbc:ID", data.id())?;
        root.serialize_field("cbc:UUID", &data.uuid().to_string())?;
        root.serialize_field("cbc:IssueDate", &data.issue_date_string())?;
        root.serialize_field("cbc:IssueTime", &data.issue_time_string())?;
        root.serialize_field("cbc:InvoiceTypeCode", &InvoiceTypeCodeXml(data))?;
        for note in data.notes() {
            root.serialize_field("cbc:Note", &NoteXml(note))?;
        }
        root.serialize_field("cbc:DocumentCurrencyCode", currency)?;
        root.serialize_field("cbc:TaxCurrencyCode", currency)?;

        if data.invoice_type().is_note() {
            if let Some(original) = data.original_invoice() {
                root.serialize_field("cac:BillingReference", &BillingReferenceXml(original))?;
            }
        }

        root.serialize_field(
            "cac:AdditionalDocumentReference",
            &AdditionalDocumentReferenceXml::InvoiceCounter(self.chain.icv.to_string()),
        )?;
        root.serialize_field(
            "cac:AdditionalDocumentReference",
            &AdditionalDocumentReferenceXml::PreviousInvoiceHash(&self.chain.pih),
        )?;
        root.serialize_field(
            "cac:AdditionalDocumentReference",
            &AdditionalDocumentReferenceXml::QrCode(view.qr_code().unwrap_or_default()),
        )?;
        root.serialize_field("cac:Signature", &SignaturePlaceholderXml)?;

        root.serialize_field(
            "cac:AccountingSupplierParty",
            &AccountingSupplierPartyXml(data.seller()),
        )?;
        root.serialize_field(
            "cac:AccountingCustomerParty",
            &AccountingCustomerPartyXml(data.buyer()),
        )?;

        if let Some(supply_date) = data.supply_date() {
            root.serialize_field("cac:Delivery", &DeliveryXml(supply_date.to_string()))?;
        }

        let instruction_note = if data.invoice_type().is_note() {
            data.adjustment_reason().and_then(non_empty)
        } else {
            None
        };
        root.serialize_field(
            "cac:PaymentMeans",
            &PaymentMeansXml {
                code: data.payment_means_code(),
                instruction_note,
            },
        )?;
        if let Some(terms) = data.payment_terms().and_then(non_empty) {
            root.serialize_field("cac:PaymentTerms", &PaymentTermsXml(terms))?;
        }

        if let Some(discount) = data.document_discount() {
            let exemption = totals
                .breakdown
                .groups()
                .iter()
                .find(|group| group.category == discount.category() && group.rate == discount.rate())
                .and_then(|group| group.exemption.as_ref());
            root.serialize_field(
                "cac:AllowanceCharge",
                &AllowanceChargeXml {
                    currency,
                    reason: discount.reason(),
                    amount: discount.amount(),
                    tax_category: Some(TaxCategoryXml {
                        tag: "cac:TaxCategory",
                        category: discount.category(),
                        percent: discount.rate(),
                        exemption,
                    }),
                },
            )?;
        }

        // The schema wants the bare total once and again with the breakdown.
        root.serialize_field(
            "cac:TaxTotal",
            &TaxTotalXml {
                currency,
                amount: totals.vat_amount,
                groups: None,
            },
        )?;
        root.serialize_field(
            "cac:TaxTotal",
            &TaxTotalXml {
                currency,
                amount: totals.vat_amount,
                groups: Some(totals.breakdown.groups()),
            },
        )?;

        root.serialize_field(
            "cac:LegalMonetaryTotal",
            &LegalMonetaryTotalXml { currency, totals },
        )?;

        for (i, line) in data.line_items().iter().enumerate() {
            root.serialize_field(
                "cac:InvoiceLine",
                &InvoiceLineXml {
                    index: i + 1,
                    line,
                    currency,
                },
            )?;
        }

        root.end()
    }
}
