//! Collected field-level validation for invoice drafts.
use super::builder::InvoiceDraft;
use super::{Address, InvoiceSubType, LineItem, VatBreakdown};
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

/// Structured validation error with every field-level issue found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Whether any issue points at `field`.
    pub fn has(&self, field: InvoiceField, kind: ValidationKind) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.field == field && issue.kind == kind)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invoice validation failed")?;
        for (i, issue) in self.issues.iter().enumerate() {
            f.write_str(if i == 0 { ": " } else { "; " })?;
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

/// Single validation issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: InvoiceField,
    pub kind: ValidationKind,
    pub line_item_index: Option<usize>,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line_item_index {
            Some(index) => write!(f, "line {index} {:?} {:?}", self.field, self.kind),
            None => write!(f, "{:?} {:?}", self.field, self.kind),
        }
    }
}

/// Field associated with a validation issue.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvoiceField {
    Id,
    IssueDateTime,
    Seller,
    SellerName,
    SellerVatNumber,
    Buyer,
    BuyerVatNumber,
    BuyerStreet,
    BuyerBuildingNumber,
    BuyerPostalCode,
    BuyerCity,
    BuyerDistrict,
    PaymentMeansCode,
    OriginalInvoice,
    AdjustmentReason,
    DocumentDiscount,
    LineItems,
    LineItemName,
    LineItemQuantity,
    LineItemUnitPrice,
    LineItemDiscount,
    LineItemVatRate,
}

/// Classification of validation issues.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationKind {
    Missing,
    Empty,
    InvalidFormat,
    OutOfRange,
    Mismatch,
}

#[derive(Default)]
struct Issues(Vec<ValidationIssue>);

impl Issues {
    fn push(&mut self, field: InvoiceField, kind: ValidationKind) {
        self.0.push(ValidationIssue {
            field,
            kind,
            line_item_index: None,
        });
    }

    fn push_line(&mut self, index: usize, field: InvoiceField, kind: ValidationKind) {
        self.0.push(ValidationIssue {
            field,
            kind,
            line_item_index: Some(index),
        });
    }

    fn require_text(&mut self, field: InvoiceField, value: Option<&str>) {
        match value {
            None => self.push(field, ValidationKind::Missing),
            Some(text) if text.trim().is_empty() => self.push(field, ValidationKind::Empty),
            Some(_) => {}
        }
    }
}

pub(crate) fn validate_draft(draft: &InvoiceDraft) -> Result<(), ValidationError> {
    let mut issues = Issues::default();

    issues.require_text(InvoiceField::Id, draft.id.as_deref());
    if draft.issue_datetime.is_none() {
        issues.push(InvoiceField::IssueDateTime, ValidationKind::Missing);
    }
    if draft.payment_means_code.trim().is_empty() {
        issues.push(InvoiceField::PaymentMeansCode, ValidationKind::Empty);
    }

    validate_seller(draft, &mut issues);
    validate_buyer(draft, &mut issues);
    validate_adjustment(draft, &mut issues);

    if draft.line_items.is_empty() {
        issues.push(InvoiceField::LineItems, ValidationKind::Missing);
    }
    for (index, line) in draft.line_items.iter().enumerate() {
        validate_line(index, line, &mut issues);
    }
    validate_document_discount(draft, &mut issues);

    if issues.0.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(issues.0))
    }
}

fn validate_seller(draft: &InvoiceDraft, issues: &mut Issues) {
    let Some(seller) = draft.seller.as_ref() else {
        issues.push(InvoiceField::Seller, ValidationKind::Missing);
        return;
    };
    if seller.display_name().is_none() {
        issues.push(InvoiceField::SellerName, ValidationKind::Missing);
    }
    match seller.vat_number() {
        None => issues.push(InvoiceField::SellerVatNumber, ValidationKind::Missing),
        Some(vat) if !vat.is_well_formed() => {
            issues.push(InvoiceField::SellerVatNumber, ValidationKind::InvalidFormat)
        }
        Some(_) => {}
    }
}

fn validate_buyer(draft: &InvoiceDraft, issues: &mut Issues) {
    let Some(buyer) = draft.buyer.as_ref() else {
        if draft.sub_type.sub_type() == InvoiceSubType::Standard {
            issues.push(InvoiceField::Buyer, ValidationKind::Missing);
        }
        return;
    };
    if buyer.vat_number().is_some_and(|vat| !vat.is_well_formed()) {
        issues.push(InvoiceField::BuyerVatNumber, ValidationKind::InvalidFormat);
    }

    let domestic = draft
        .seller
        .as_ref()
        .is_some_and(|seller| seller.address().country_code == buyer.address().country_code);
    if draft.sub_type.sub_type() == InvoiceSubType::Standard && domestic {
        validate_domestic_address(buyer.address(), issues);
    }
}

fn validate_domestic_address(address: &Address, issues: &mut Issues) {
    let required = [
        (InvoiceField::BuyerStreet, Some(address.street())),
        (InvoiceField::BuyerBuildingNumber, Some(address.building_number())),
        (InvoiceField::BuyerPostalCode, Some(address.postal_code())),
        (InvoiceField::BuyerCity, Some(address.city())),
        (InvoiceField::BuyerDistrict, address.district()),
    ];
    for (field, value) in required {
        issues.require_text(field, value);
    }
}

fn validate_adjustment(draft: &InvoiceDraft, issues: &mut Issues) {
    if !draft.invoice_type.is_note() {
        return;
    }
    match draft.original_invoice.as_ref() {
        None => issues.push(InvoiceField::OriginalInvoice, ValidationKind::Missing),
        Some(original) if original.id().trim().is_empty() => {
            issues.push(InvoiceField::OriginalInvoice, ValidationKind::Empty)
        }
        Some(_) => {}
    }
    issues.require_text(InvoiceField::AdjustmentReason, draft.adjustment_reason.as_deref());
}

fn validate_line(index: usize, line: &LineItem, issues: &mut Issues) {
    if line.name().trim().is_empty() {
        issues.push_line(index, InvoiceField::LineItemName, ValidationKind::Missing);
    }
    if line.quantity() <= Decimal::ZERO {
        issues.push_line(index, InvoiceField::LineItemQuantity, ValidationKind::OutOfRange);
    }
    if line.unit_price() < Decimal::ZERO {
        issues.push_line(index, InvoiceField::LineItemUnitPrice, ValidationKind::OutOfRange);
    }
    let discount = line.discount_amount();
    if discount < Decimal::ZERO || discount > line.gross_amount() {
        issues.push_line(index, InvoiceField::LineItemDiscount, ValidationKind::OutOfRange);
    }
    if line
        .vat_rate_override()
        .is_some_and(|rate| rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED)
    {
        issues.push_line(index, InvoiceField::LineItemVatRate, ValidationKind::OutOfRange);
    }
}

fn validate_document_discount(draft: &InvoiceDraft, issues: &mut Issues) {
    let Some(discount) = draft.document_discount.as_ref() else {
        return;
    };
    if discount.amount() < Decimal::ZERO {
        issues.push(InvoiceField::DocumentDiscount, ValidationKind::OutOfRange);
        return;
    }
    let breakdown = VatBreakdown::compute(&draft.line_items, None);
    let group = breakdown
        .groups()
        .iter()
        .find(|group| group.category == discount.category() && group.rate == discount.rate());
    match group {
        None => issues.push(InvoiceField::DocumentDiscount, ValidationKind::Mismatch),
        Some(group) if discount.amount() > group.taxable_amount => {
            issues.push(InvoiceField::DocumentDiscount, ValidationKind::OutOfRange)
        }
        Some(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_every_issue() {
        let err = ValidationError::new(vec![
            ValidationIssue {
                field: InvoiceField::Id,
                kind: ValidationKind::Missing,
                line_item_index: None,
            },
            ValidationIssue {
                field: InvoiceField::LineItemQuantity,
                kind: ValidationKind::OutOfRange,
                line_item_index: Some(2),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "invoice validation failed: Id Missing; line 2 LineItemQuantity OutOfRange"
        );
        assert!(err.has(InvoiceField::Id, ValidationKind::Missing));
        assert!(!err.has(InvoiceField::Id, ValidationKind::Empty));
    }
}
