//! Test Data Builders
//!
//! Provides builder patterns for constructing test data with sensible defaults.
//! These builders allow tests to specify only the relevant fields while using
//! defaults for everything else.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::SellerId;
use domain_einvoicing::{Invoice, InvoiceLine, InvoiceStatus, InvoiceType, Seller, SellerAddress};

use crate::fixtures::{SellerFixtures, StringFixtures, TemporalFixtures};

/// Builder for invoice lines
#[derive(Debug, Clone)]
pub struct LineBuilder {
    item_name: String,
    quantity: Decimal,
    unit_price: Decimal,
    tax_percent: Decimal,
}

impl Default for LineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBuilder {
    /// One unit at 100.00 with 15% VAT
    pub fn new() -> Self {
        Self {
            item_name: "Consulting hours".to_string(),
            quantity: dec!(1),
            unit_price: dec!(100),
            tax_percent: dec!(15),
        }
    }

    pub fn with_item_name(mut self, name: impl Into<String>) -> Self {
        self.item_name = name.into();
        self
    }

    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_unit_price(mut self, unit_price: Decimal) -> Self {
        self.unit_price = unit_price;
        self
    }

    pub fn with_tax_percent(mut self, tax_percent: Decimal) -> Self {
        self.tax_percent = tax_percent;
        self
    }

    /// Builds the line with derived amounts computed
    pub fn build(self) -> InvoiceLine {
        InvoiceLine::new(self.item_name, self.quantity, self.unit_price, self.tax_percent)
    }
}

/// Builder for sellers
#[derive(Debug, Clone)]
pub struct SellerBuilder {
    seller: Seller,
}

impl Default for SellerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SellerBuilder {
    /// Starts from the standard fixture seller
    pub fn new() -> Self {
        Self {
            seller: SellerFixtures::standard(),
        }
    }

    pub fn with_id(mut self, id: SellerId) -> Self {
        self.seller.id = id;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.seller.name = name.into();
        self
    }

    pub fn with_vat_number(mut self, vat_number: impl Into<String>) -> Self {
        self.seller.vat_number = vat_number.into();
        self
    }

    pub fn with_address(mut self, address: SellerAddress) -> Self {
        self.seller.address = address;
        self
    }

    pub fn without_address(mut self) -> Self {
        self.seller.address = SellerAddress::default();
        self
    }

    pub fn without_commercial_registration(mut self) -> Self {
        self.seller.commercial_registration = None;
        self
    }

    pub fn build(self) -> Seller {
        self.seller
    }
}

/// Builder for invoices
///
/// Defaults to a standard invoice for the fixture seller with a fully
/// identified buyer and no lines.
#[derive(Debug, Clone)]
pub struct InvoiceBuilder {
    invoice_number: String,
    invoice_type: InvoiceType,
    seller_id: SellerId,
    issue_date: DateTime<Utc>,
    currency: String,
    buyer_name: Option<String>,
    buyer_vat_number: Option<String>,
    status: InvoiceStatus,
    lines: Vec<InvoiceLine>,
}

impl Default for InvoiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InvoiceBuilder {
    pub fn new() -> Self {
        Self {
            invoice_number: StringFixtures::invoice_number().to_string(),
            invoice_type: InvoiceType::Standard,
            seller_id: SellerFixtures::seller_id(),
            issue_date: TemporalFixtures::recent_issue_date(),
            currency: "SAR".to_string(),
            buyer_name: Some(StringFixtures::buyer_name().to_string()),
            buyer_vat_number: Some(StringFixtures::buyer_vat().to_string()),
            status: InvoiceStatus::Draft,
            lines: Vec::new(),
        }
    }

    /// A simplified invoice without buyer details
    pub fn simplified() -> Self {
        Self::new()
            .with_type(InvoiceType::Simplified)
            .without_buyer()
    }

    pub fn for_seller(mut self, seller: &Seller) -> Self {
        self.seller_id = seller.id;
        self
    }

    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.invoice_number = number.into();
        self
    }

    pub fn with_type(mut self, invoice_type: InvoiceType) -> Self {
        self.invoice_type = invoice_type;
        self
    }

    pub fn with_issue_date(mut self, issue_date: DateTime<Utc>) -> Self {
        self.issue_date = issue_date;
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_buyer(mut self, name: impl Into<String>, vat_number: Option<&str>) -> Self {
        self.buyer_name = Some(name.into());
        self.buyer_vat_number = vat_number.map(str::to_string);
        self
    }

    pub fn without_buyer(mut self) -> Self {
        self.buyer_name = None;
        self.buyer_vat_number = None;
        self
    }

    pub fn with_status(mut self, status: InvoiceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_line(mut self, line: LineBuilder) -> Self {
        self.lines.push(line.build());
        self
    }

    /// Two lines: 2 x 100.00 and 1 x 500.00, both at 15%
    ///
    /// Totals: subtotal 700.00, VAT 105.00, grand total 805.00.
    pub fn with_sample_lines(self) -> Self {
        self.with_line(LineBuilder::new().with_item_name("Widget").with_quantity(dec!(2)).with_unit_price(dec!(100)))
            .with_line(LineBuilder::new().with_item_name("Installation").with_unit_price(dec!(500)))
    }

    /// Builds the invoice with totals computed from its lines
    pub fn build(self) -> Invoice {
        let mut invoice = Invoice::new(self.invoice_number, self.invoice_type, self.seller_id, self.issue_date);
        invoice.currency = self.currency;
        invoice.buyer_name = self.buyer_name;
        invoice.buyer_vat_number = self.buyer_vat_number;
        invoice.status = self.status;
        for line in self.lines {
            invoice.add_line(line);
        }
        invoice
    }
}
