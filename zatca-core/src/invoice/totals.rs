use super::{DocumentDiscount, InvoiceData, LineItem, VatCategory, VatExemption};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Half-up rounding to two decimals.
///
/// # Examples
/// ```rust
/// use rust_decimal_macros::dec;
/// use zatca_core::invoice::round_amount;
///
/// assert_eq!(round_amount(dec!(1.005)), dec!(1.01));
/// assert_eq!(round_amount(dec!(-1.005)), dec!(-1.01));
/// ```
pub fn round_amount(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn percent_of(amount: Decimal, rate: Decimal) -> Decimal {
    round_amount(amount * rate / Decimal::ONE_HUNDRED)
}

/// Derived amounts for a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineTotals {
    pub subtotal: Decimal,
    pub vat_amount: Decimal,
    pub total: Decimal,
}

impl LineTotals {
    pub(crate) fn for_line(item: &LineItem) -> Self {
        let subtotal = round_amount(item.gross_amount() - item.discount_amount());
        let vat_amount = percent_of(subtotal, item.effective_rate());
        Self {
            subtotal,
            vat_amount,
            total: subtotal + vat_amount,
        }
    }
}

/// One `(category, rate)` bucket of the VAT breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatGroup {
    pub category: VatCategory,
    pub rate: Decimal,
    pub taxable_amount: Decimal,
    pub vat_amount: Decimal,
    pub exemption: Option<VatExemption>,
}

impl VatGroup {
    fn matches(&self, category: VatCategory, rate: Decimal) -> bool {
        self.category == category && self.rate == rate
    }
}

/// Per-category breakdown in first-appearance order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatBreakdown {
    groups: Vec<VatGroup>,
}

impl VatBreakdown {
    /// Group lines by category and effective rate, then apply the
    /// document-level discount to its group.
    pub fn compute(lines: &[LineItem], discount: Option<&DocumentDiscount>) -> Self {
        let mut groups: Vec<VatGroup> = Vec::new();
        for line in lines {
            let totals = line.totals();
            let rate = line.effective_rate();
            match groups
                .iter_mut()
                .find(|group| group.matches(line.vat_category(), rate))
            {
                Some(group) => {
                    group.taxable_amount += totals.subtotal;
                    group.vat_amount += totals.vat_amount;
                    if group.exemption.is_none() {
                        group.exemption = line.exemption().cloned();
                    }
                }
                None => groups.push(VatGroup {
                    category: line.vat_category(),
                    rate,
                    taxable_amount: totals.subtotal,
                    vat_amount: totals.vat_amount,
                    exemption: line.exemption().cloned(),
                }),
            }
        }

        if let Some(discount) = discount {
            let target = groups
                .iter_mut()
                .find(|group| group.matches(discount.category(), discount.rate()));
            if let Some(group) = target {
                group.taxable_amount -= round_amount(discount.amount());
                group.vat_amount -= percent_of(discount.amount(), discount.rate());
            }
        }

        Self { groups }
    }

    pub fn groups(&self) -> &[VatGroup] {
        &self.groups
    }

    pub fn total_vat(&self) -> Decimal {
        self.groups.iter().map(|group| group.vat_amount).sum()
    }

    pub fn total_taxable(&self) -> Decimal {
        self.groups.iter().map(|group| group.taxable_amount).sum()
    }
}

/// Invoice-level monetary totals, summed from rounded line values.
///
/// # Examples
/// ```rust
/// use rust_decimal_macros::dec;
/// use zatca_core::invoice::{InvoiceTotals, LineItem, LineItemFields, VatCategory};
///
/// let line = |qty, price| {
///     LineItem::new(LineItemFields {
///         name: "Item".into(),
///         quantity: qty,
///         unit_code: "PCE".into(),
///         unit_price: price,
///         vat_category: VatCategory::Standard,
///     })
/// };
/// let totals = InvoiceTotals::compute(&[line(dec!(2), dec!(100)), line(dec!(3), dec!(50))], None);
/// assert_eq!(totals.tax_exclusive_amount, dec!(350.00));
/// assert_eq!(totals.vat_amount, dec!(52.50));
/// assert_eq!(totals.payable_amount, dec!(402.50));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub line_extension_amount: Decimal,
    pub allowance_total_amount: Decimal,
    pub tax_exclusive_amount: Decimal,
    pub vat_amount: Decimal,
    pub tax_inclusive_amount: Decimal,
    pub payable_amount: Decimal,
    pub breakdown: VatBreakdown,
}

impl InvoiceTotals {
    pub fn compute(lines: &[LineItem], discount: Option<&DocumentDiscount>) -> Self {
        let line_extension_amount: Decimal = lines.iter().map(|line| line.totals().subtotal).sum();
        let allowance_total_amount = discount
            .map(|discount| round_amount(discount.amount()))
            .unwrap_or_default();
        let breakdown = VatBreakdown::compute(lines, discount);
        let tax_exclusive_amount = line_extension_amount - allowance_total_amount;
        let vat_amount = breakdown.total_vat();
        let tax_inclusive_amount = tax_exclusive_amount + vat_amount;

        Self {
            line_extension_amount,
            allowance_total_amount,
            tax_exclusive_amount,
            vat_amount,
            tax_inclusive_amount,
            payable_amount: tax_inclusive_amount,
            breakdown,
        }
    }
}

impl InvoiceData {
    pub fn totals(&self) -> InvoiceTotals {
        InvoiceTotals::compute(self.line_items(), self.document_discount())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::LineItemFields;
    use rust_decimal_macros::dec;

    fn line(quantity: Decimal, price: Decimal, category: VatCategory) -> LineItem {
        LineItem::new(LineItemFields {
            name: "Item".into(),
            quantity,
            unit_code: "PCE".into(),
            unit_price: price,
            vat_category: category,
        })
    }

    #[test]
    fn line_without_discount() {
        let totals = line(dec!(2), dec!(100.00), VatCategory::Standard).totals();
        assert_eq!(totals.subtotal, dec!(200.00));
        assert_eq!(totals.vat_amount, dec!(30.00));
        assert_eq!(totals.total, dec!(230.00));
    }

    #[test]
    fn line_discount_comes_off_before_vat() {
        let totals = line(dec!(3), dec!(100.00), VatCategory::Standard)
            .with_discount(dec!(50.00), "bulk")
            .totals();
        assert_eq!(totals.subtotal, dec!(250.00));
        assert_eq!(totals.vat_amount, dec!(37.50));
        assert_eq!(totals.total, dec!(287.50));
    }

    #[test]
    fn rounding_happens_per_line() {
        // 0.015 rounds to 0.02 on each line; round(0.30 * 15%) would be 0.05.
        let lines: Vec<_> = (0..3)
            .map(|_| line(dec!(1), dec!(0.10), VatCategory::Standard))
            .collect();
        let totals = InvoiceTotals::compute(&lines, None);
        assert_eq!(totals.line_extension_amount, dec!(0.30));
        assert_eq!(totals.vat_amount, dec!(0.06));
    }

    #[test]
    fn breakdown_groups_by_category_and_rate() {
        let lines = vec![
            line(dec!(1), dec!(100), VatCategory::Standard),
            line(dec!(1), dec!(40), VatCategory::Exempt)
                .with_exemption("VATEX-SA-29", "Financial services"),
            line(dec!(2), dec!(10), VatCategory::Standard),
            line(dec!(1), dec!(10), VatCategory::Standard).with_vat_rate(dec!(5)),
        ];
        let breakdown = VatBreakdown::compute(&lines, None);
        let groups = breakdown.groups();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].category, VatCategory::Standard);
        assert_eq!(groups[0].taxable_amount, dec!(120.00));
        assert_eq!(groups[0].vat_amount, dec!(18.00));
        assert_eq!(groups[1].category, VatCategory::Exempt);
        assert_eq!(groups[1].vat_amount, dec!(0));
        assert_eq!(
            groups[1].exemption.as_ref().map(VatExemption::code),
            Some("VATEX-SA-29")
        );
        assert_eq!(groups[2].rate, dec!(5));
        assert_eq!(groups[2].vat_amount, dec!(0.50));
    }

    #[test]
    fn document_discount_reduces_its_group() {
        let lines = vec![line(dec!(2), dec!(100), VatCategory::Standard)];
        let discount = DocumentDiscount::new(dec!(20), "promo", VatCategory::Standard);
        let totals = InvoiceTotals::compute(&lines, Some(&discount));
        assert_eq!(totals.line_extension_amount, dec!(200.00));
        assert_eq!(totals.allowance_total_amount, dec!(20.00));
        assert_eq!(totals.tax_exclusive_amount, dec!(180.00));
        assert_eq!(totals.vat_amount, dec!(27.00));
        assert_eq!(totals.payable_amount, dec!(207.00));
        assert_eq!(totals.breakdown.groups()[0].taxable_amount, dec!(180.00));
    }
}
