//! Invoice model
//!
//! Invoices and their lines are created in Draft by the surrounding
//! application. The compliance pipeline only mutates an existing invoice:
//! derived line amounts, totals, QR payload, XML, hash and status.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{round_amount, InvoiceId, InvoiceLineId, Percentage, SellerId, SAUDI_RIYAL};

use crate::error::ComplianceError;

/// The six document kinds accepted by the tax authority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceType {
    /// Business-to-business tax invoice
    Standard,
    /// Business-to-consumer tax invoice
    Simplified,
    StandardCreditNote,
    SimplifiedCreditNote,
    StandardDebitNote,
    SimplifiedDebitNote,
}

impl InvoiceType {
    /// Every known invoice type
    pub const ALL: [InvoiceType; 6] = [
        InvoiceType::Standard,
        InvoiceType::Simplified,
        InvoiceType::StandardCreditNote,
        InvoiceType::SimplifiedCreditNote,
        InvoiceType::StandardDebitNote,
        InvoiceType::SimplifiedDebitNote,
    ];

    /// Numeric UBL invoice type code
    pub fn type_code(&self) -> u16 {
        match self {
            InvoiceType::Standard => 388,
            InvoiceType::Simplified => 383,
            InvoiceType::StandardCreditNote => 381,
            InvoiceType::SimplifiedCreditNote => 396,
            InvoiceType::StandardDebitNote => 80,
            InvoiceType::SimplifiedDebitNote => 84,
        }
    }

    /// Human-readable name carried in the `name` attribute
    pub fn display_name(&self) -> &'static str {
        match self {
            InvoiceType::Standard => "Standard Tax Invoice",
            InvoiceType::Simplified => "Simplified Tax Invoice",
            InvoiceType::StandardCreditNote => "Standard Credit Note",
            InvoiceType::SimplifiedCreditNote => "Simplified Credit Note",
            InvoiceType::StandardDebitNote => "Standard Debit Note",
            InvoiceType::SimplifiedDebitNote => "Simplified Debit Note",
        }
    }

    /// True for the business-to-business variants, which require full
    /// buyer identification and a complete seller address
    pub fn is_standard(&self) -> bool {
        matches!(
            self,
            InvoiceType::Standard | InvoiceType::StandardCreditNote | InvoiceType::StandardDebitNote
        )
    }

    /// Looks a type up by its numeric code
    pub fn from_type_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.type_code() == code)
    }
}

/// Invoice lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Created, not yet prepared
    Draft,
    /// Passed validation and carries signed XML, QR and hash
    Validated,
    /// Simplified invoice accepted by the reporting API
    Reported,
    /// Standard invoice cleared by the clearance API
    Cleared,
    /// Refused by the tax authority
    Rejected,
    /// Retained for record keeping only
    Archived,
}

impl InvoiceStatus {
    /// Only invoices that have not reached the tax authority may be (re)prepared
    pub fn can_prepare(&self) -> bool {
        matches!(self, InvoiceStatus::Draft | InvoiceStatus::Validated)
    }
}

/// Subtotal, VAT and grand total of a set of lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub vat_amount: Decimal,
    pub grand_total: Decimal,
}

impl InvoiceTotals {
    /// Sums line amounts, rounding each sum to two decimals
    pub fn from_lines(lines: &[InvoiceLine]) -> Self {
        let subtotal = round_amount(lines.iter().map(|l| l.net_amount).sum());
        let vat_amount = round_amount(lines.iter().map(|l| l.vat_amount).sum());

        Self {
            subtotal,
            vat_amount,
            grand_total: subtotal + vat_amount,
        }
    }
}

/// A line item on an invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
    /// Line ID
    pub id: InvoiceLineId,
    /// Item name
    pub item_name: String,
    /// Quantity (must be positive)
    pub quantity: Decimal,
    /// Unit price before tax
    pub unit_price: Decimal,
    /// Tax percent applied to the net amount (0-100)
    pub tax_percent: Decimal,
    /// round(quantity × unit price, 2)
    pub net_amount: Decimal,
    /// round(net × tax percent / 100, 2)
    pub vat_amount: Decimal,
    /// net + vat
    pub total_amount: Decimal,
}

impl InvoiceLine {
    /// Creates a line with its derived amounts computed
    pub fn new(
        item_name: impl Into<String>,
        quantity: Decimal,
        unit_price: Decimal,
        tax_percent: Decimal,
    ) -> Self {
        let mut line = Self {
            id: InvoiceLineId::new_v7(),
            item_name: item_name.into(),
            quantity,
            unit_price,
            tax_percent,
            net_amount: Decimal::ZERO,
            vat_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
        };
        line.recalculate();
        line
    }

    /// Net amount implied by quantity and unit price
    pub fn expected_net_amount(&self) -> Decimal {
        round_amount(self.quantity * self.unit_price)
    }

    /// Recomputes net, VAT and total from quantity, unit price and tax percent
    pub fn recalculate(&mut self) {
        self.net_amount = self.expected_net_amount();
        self.vat_amount = Percentage::from_percentage(self.tax_percent).apply(self.net_amount);
        self.total_amount = self.net_amount + self.vat_amount;
    }
}

/// An e-invoice and its ordered lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique identifier
    pub id: InvoiceId,
    /// Invoice number (human-readable)
    pub invoice_number: String,
    /// Document kind
    pub invoice_type: InvoiceType,
    /// Lifecycle status
    pub status: InvoiceStatus,
    /// Issue timestamp
    pub issue_date: DateTime<Utc>,
    /// Issue date rendered in the Hijri calendar, for display only
    #[serde(default)]
    pub hijri_issue_date: Option<String>,
    /// ISO 4217 currency code
    pub currency: String,
    /// Buyer legal name (required for standard types)
    #[serde(default)]
    pub buyer_name: Option<String>,
    /// Buyer VAT registration number (required for standard types)
    #[serde(default)]
    pub buyer_vat_number: Option<String>,
    /// Sum of line net amounts
    pub subtotal: Decimal,
    /// Sum of line VAT amounts
    pub vat_amount: Decimal,
    /// Subtotal + VAT
    pub grand_total: Decimal,
    /// Base64 TLV QR payload
    #[serde(default)]
    pub qr_code: Option<String>,
    /// Signed XML document
    #[serde(default)]
    pub xml_content: Option<String>,
    /// Base64 SHA-256 hash of this invoice
    #[serde(default)]
    pub invoice_hash: Option<String>,
    /// Hash of the chain-previous invoice
    #[serde(default)]
    pub previous_invoice_hash: Option<String>,
    /// Owning seller
    pub seller_id: SellerId,
    /// Lines in creation order
    pub lines: Vec<InvoiceLine>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Creates a new draft invoice in SAR without lines
    pub fn new(
        invoice_number: impl Into<String>,
        invoice_type: InvoiceType,
        seller_id: SellerId,
        issue_date: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: InvoiceId::new_v7(),
            invoice_number: invoice_number.into(),
            invoice_type,
            status: InvoiceStatus::Draft,
            issue_date,
            hijri_issue_date: None,
            currency: SAUDI_RIYAL.to_string(),
            buyer_name: None,
            buyer_vat_number: None,
            subtotal: Decimal::ZERO,
            vat_amount: Decimal::ZERO,
            grand_total: Decimal::ZERO,
            qr_code: None,
            xml_content: None,
            invoice_hash: None,
            previous_invoice_hash: None,
            seller_id,
            lines: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the buyer identification
    pub fn with_buyer(mut self, name: impl Into<String>, vat_number: Option<String>) -> Self {
        self.buyer_name = Some(name.into());
        self.buyer_vat_number = vat_number;
        self
    }

    /// Adds a line to the invoice
    pub fn add_line(&mut self, line: InvoiceLine) {
        self.lines.push(line);
        self.recalculate_totals();
    }

    /// Buyer name, if present and not blank
    pub fn buyer_name(&self) -> Option<&str> {
        non_blank(self.buyer_name.as_deref())
    }

    /// Buyer VAT number, if present and not blank
    pub fn buyer_vat_number(&self) -> Option<&str> {
        non_blank(self.buyer_vat_number.as_deref())
    }

    /// Totals recomputed from the current line amounts
    pub fn computed_totals(&self) -> InvoiceTotals {
        InvoiceTotals::from_lines(&self.lines)
    }

    /// Stores the given totals on the invoice
    pub fn apply_totals(&mut self, totals: InvoiceTotals) {
        self.subtotal = totals.subtotal;
        self.vat_amount = totals.vat_amount;
        self.grand_total = totals.grand_total;
    }

    /// Recomputes every line and the invoice totals
    pub fn recalculate(&mut self) {
        for line in &mut self.lines {
            line.recalculate();
        }
        self.recalculate_totals();
    }

    /// True once the pipeline stored this invoice's own hash
    pub fn is_hashed(&self) -> bool {
        non_blank(self.invoice_hash.as_deref()).is_some()
    }

    /// Links this invoice to its chain predecessor
    ///
    /// The predecessor must already be hashed. A link, once set, is never
    /// replaced by a different value.
    pub fn link_to_previous(&mut self, previous: &Invoice) -> Result<(), ComplianceError> {
        if previous.id == self.id {
            return Err(ComplianceError::consistency(format!(
                "Invoice {} cannot be linked to itself",
                self.invoice_number
            )));
        }

        let previous_hash = non_blank(previous.invoice_hash.as_deref()).ok_or_else(|| {
            ComplianceError::consistency(format!(
                "Previous invoice {} has no hash yet",
                previous.invoice_number
            ))
        })?;

        if let Some(existing) = non_blank(self.previous_invoice_hash.as_deref()) {
            if existing != previous_hash {
                return Err(ComplianceError::consistency(format!(
                    "Invoice {} is already linked to a different previous invoice",
                    self.invoice_number
                )));
            }
            return Ok(());
        }

        self.previous_invoice_hash = Some(previous_hash.to_string());
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Recomputes subtotal, VAT and grand total from the current lines
    pub fn recalculate_totals(&mut self) {
        let totals = self.computed_totals();
        self.apply_totals(totals);
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
