use chrono::{TimeZone, Utc};
use isocountry::CountryCode;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::PathBuf;
use zatca_core::invoice::sign::InvoiceSigner;
use zatca_core::invoice::{
    Address, Buyer, FinalizedInvoice, InvoiceBuilder, InvoiceSubType, InvoiceType, LineItem,
    LineItemFields, Seller, VatCategory, VatNumber,
};

#[allow(dead_code)]
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("certs")
        .join(name)
}

#[allow(dead_code)]
pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name)).expect("read fixture")
}

#[allow(dead_code)]
pub fn signer() -> InvoiceSigner {
    InvoiceSigner::from_pem(&fixture("signing-cert.pem"), &fixture("signing-key.pem"))
        .expect("signer")
}

#[allow(dead_code)]
pub fn riyadh_address() -> Address {
    Address {
        country_code: CountryCode::SAU,
        city: "Riyadh".into(),
        street: "Prince Sultan".into(),
        additional_street: None,
        building_number: "2322".into(),
        additional_number: Some("1234".into()),
        postal_code: "23333".into(),
        subdivision: None,
        district: Some("Al-Murabba".into()),
    }
}

#[allow(dead_code)]
pub fn seller() -> Seller {
    Seller::new(
        "Acme Widgets LTD",
        riyadh_address(),
        VatNumber::parse("399999999900003").expect("vat"),
    )
    .with_registration("1010010000")
}

#[allow(dead_code)]
pub fn line(name: &str, quantity: Decimal, unit_price: Decimal) -> LineItem {
    LineItem::new(LineItemFields {
        name: name.into(),
        quantity,
        unit_code: "PCE".into(),
        unit_price,
        vat_category: VatCategory::Standard,
    })
}

#[allow(dead_code)]
pub fn simplified_invoice(id: &str) -> FinalizedInvoice {
    InvoiceBuilder::new(InvoiceType::Tax, InvoiceSubType::Simplified)
        .id(id)
        .issue_datetime(
            Utc.with_ymd_and_hms(2024, 1, 14, 10, 26, 49)
                .single()
                .expect("datetime"),
        )
        .seller(seller())
        .line_item(line("Book", dec!(2), dec!(100)))
        .line_item(line("Pen", dec!(3), dec!(5.50)))
        .build()
        .expect("build simplified invoice")
}

#[allow(dead_code)]
pub fn standard_invoice(id: &str) -> FinalizedInvoice {
    let buyer = Buyer::new("Client Trading Co", riyadh_address())
        .with_vat_number(VatNumber::parse("300000000000003").expect("vat"));
    InvoiceBuilder::new(InvoiceType::Tax, InvoiceSubType::Standard)
        .id(id)
        .issue_datetime(
            Utc.with_ymd_and_hms(2024, 1, 14, 10, 26, 49)
                .single()
                .expect("datetime"),
        )
        .seller(seller())
        .buyer(buyer)
        .line_item(line("Consulting", dec!(1), dec!(1000)))
        .build()
        .expect("build standard invoice")
}
