//! UBL invoice document construction
//!
//! The hash of an invoice is computed over a document that must already
//! contain the hash reference element. The builder therefore runs in two
//! stages: [`InvoiceXmlBuilder::build_unhashed`] renders the document with an
//! empty ICV value, the pipeline hashes it, then
//! [`InvoiceXmlBuilder::build_hashed`] renders it again with the real value.
//! Both stages produce byte-identical output apart from that value.
//!
//! The extensions block is kept as a typed list next to the rendered body so
//! the signer fills the signature slot without searching the document.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use rust_decimal::Decimal;

use core_kernel::{format_amount, format_issue_date, format_issue_time, SAUDI_RIYAL};

use crate::c14n::{escape_attribute, escape_text};
use crate::config::ComplianceConfig;
use crate::error::ComplianceError;
use crate::invoice::{Invoice, InvoiceLine};
use crate::seller::Seller;

/// Primary UBL invoice namespace
pub const INVOICE_NS: &str = "urn:oasis:names:specification:ubl:schema:xsd:Invoice-2";
/// Common aggregate components (`cac`)
pub const CAC_NS: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2";
/// Common basic components (`cbc`)
pub const CBC_NS: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";
/// Common extension components (`ext`)
pub const EXT_NS: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonExtensionComponents-2";

/// Extension URI of the signature slot
pub const SIGNATURE_EXTENSION_URI: &str = "urn:oasis:names:specification:ubl:dsig:enveloped:xades";
/// Extension URI of the QR block
pub const QR_EXTENSION_URI: &str = "urn:oasis:names:specification:ubl:qr:tlv";

/// Declaration preceding every rendered document
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Document reference ID of the previous invoice hash
pub const PREVIOUS_HASH_ID: &str = "PIH";
/// Document reference ID of the current invoice hash
pub const CURRENT_HASH_ID: &str = "ICV";

const TAX_CATEGORY_STANDARD: &str = "S";
const TAX_SCHEME: &str = "VAT";

/// Content of one UBL extension entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionContent {
    /// Empty slot waiting for the signer
    Placeholder,
    /// Already-rendered XML fragment, inserted verbatim
    Rendered(String),
}

/// One entry of the `ext:UBLExtensions` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UblExtension {
    pub uri: String,
    pub content: ExtensionContent,
}

impl UblExtension {
    /// The empty signature slot
    pub fn signature_placeholder() -> Self {
        Self {
            uri: SIGNATURE_EXTENSION_URI.to_string(),
            content: ExtensionContent::Placeholder,
        }
    }

    /// The QR block carrying a base64 payload
    pub fn qr(qr_code: &str) -> Self {
        Self {
            uri: QR_EXTENSION_URI.to_string(),
            content: ExtensionContent::Rendered(format!(
                r#"<cbc:EmbeddedDocumentBinaryObject mimeCode="text/plain">{}</cbc:EmbeddedDocumentBinaryObject>"#,
                escape_text(qr_code)
            )),
        }
    }

    fn is_signature(&self) -> bool {
        self.uri == SIGNATURE_EXTENSION_URI
    }

    fn render_into(&self, out: &mut String) {
        out.push_str("<ext:UBLExtension><ext:ExtensionURI>");
        out.push_str(&escape_text(&self.uri));
        out.push_str("</ext:ExtensionURI><ext:ExtensionContent>");
        if let ExtensionContent::Rendered(fragment) = &self.content {
            out.push_str(fragment);
        }
        out.push_str("</ext:ExtensionContent></ext:UBLExtension>");
    }
}

/// A built invoice document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceDocument {
    /// Extension entries, rendered first inside the root element
    pub extensions: Vec<UblExtension>,
    /// Every element after the extensions block
    pub body: String,
}

impl InvoiceDocument {
    /// Full serialization, declaration included
    pub fn render(&self) -> String {
        let root = self.render_root();
        let mut out = String::with_capacity(XML_DECLARATION.len() + root.len());
        out.push_str(XML_DECLARATION);
        out.push_str(&root);
        out
    }

    /// Serialization of the root element alone
    pub fn render_root(&self) -> String {
        let mut out = String::with_capacity(self.body.len() + 1024);
        out.push_str(&format!(
            r#"<Invoice xmlns="{}" xmlns:cac="{}" xmlns:cbc="{}" xmlns:ext="{}">"#,
            INVOICE_NS, CAC_NS, CBC_NS, EXT_NS
        ));
        out.push_str("<ext:UBLExtensions>");
        for extension in &self.extensions {
            extension.render_into(&mut out);
        }
        out.push_str("</ext:UBLExtensions>");
        out.push_str(&self.body);
        out.push_str("</Invoice>");
        out
    }

    /// True when the signature slot is still empty
    pub fn has_signature_placeholder(&self) -> bool {
        self.extensions
            .iter()
            .any(|e| e.is_signature() && e.content == ExtensionContent::Placeholder)
    }

    /// Copy of this document with `signature` in the signature slot
    pub fn with_signature(&self, signature: String) -> Result<InvoiceDocument, ComplianceError> {
        let mut signed = self.clone();
        let slot = signed
            .extensions
            .iter_mut()
            .find(|e| e.is_signature() && e.content == ExtensionContent::Placeholder)
            .ok_or_else(|| ComplianceError::structural("Document has no empty signature slot"))?;
        slot.content = ExtensionContent::Rendered(signature);
        Ok(signed)
    }
}

/// Renders invoices as UBL XML documents
#[derive(Debug, Clone, Default)]
pub struct InvoiceXmlBuilder {
    config: ComplianceConfig,
}

impl InvoiceXmlBuilder {
    pub fn new(config: ComplianceConfig) -> Self {
        Self { config }
    }

    /// Stage one: the document with an empty current-hash value
    pub fn build_unhashed(
        &self,
        invoice: &Invoice,
        seller: &Seller,
        qr_code: &str,
    ) -> Result<InvoiceDocument, ComplianceError> {
        self.build_hashed(invoice, seller, "", qr_code)
    }

    /// Stage two: the document carrying `invoice_hash`
    pub fn build_hashed(
        &self,
        invoice: &Invoice,
        seller: &Seller,
        invoice_hash: &str,
        qr_code: &str,
    ) -> Result<InvoiceDocument, ComplianceError> {
        let mut writer = UblWriter::new();

        self.write_identification(&mut writer, invoice)?;
        write_hash_references(&mut writer, invoice, invoice_hash)?;
        write_supplier(&mut writer, seller)?;
        write_customer(&mut writer, invoice)?;
        self.write_tax_total(&mut writer, invoice)?;
        write_monetary_totals(&mut writer, invoice)?;
        for (index, line) in invoice.lines.iter().enumerate() {
            self.write_line(&mut writer, &invoice.currency, index + 1, line)?;
        }

        Ok(InvoiceDocument {
            extensions: vec![UblExtension::signature_placeholder(), UblExtension::qr(qr_code)],
            body: writer.finish()?,
        })
    }

    /// Renders the full document string
    pub fn build(
        &self,
        invoice: &Invoice,
        seller: &Seller,
        invoice_hash: &str,
        qr_code: &str,
    ) -> Result<String, ComplianceError> {
        Ok(self.build_hashed(invoice, seller, invoice_hash, qr_code)?.render())
    }

    fn write_identification(&self, w: &mut UblWriter, invoice: &Invoice) -> Result<(), ComplianceError> {
        let type_code = invoice.invoice_type.type_code().to_string();

        w.text("cbc:ID", &invoice.invoice_number)?;
        w.text("cbc:UUID", &invoice.id.as_uuid().to_string())?;
        w.text("cbc:IssueDate", &format_issue_date(invoice.issue_date))?;
        w.text("cbc:IssueTime", &format_issue_time(invoice.issue_date))?;
        w.text_with(
            "cbc:InvoiceTypeCode",
            &[("name", invoice.invoice_type.display_name())],
            &type_code,
        )?;
        w.text("cbc:DocumentCurrencyCode", &invoice.currency)?;
        w.text("cbc:TaxCurrencyCode", SAUDI_RIYAL)
    }

    fn write_tax_total(&self, w: &mut UblWriter, invoice: &Invoice) -> Result<(), ComplianceError> {
        let currency = invoice.currency.as_str();

        w.start("cac:TaxTotal")?;
        w.amount("cbc:TaxAmount", currency, invoice.vat_amount)?;
        w.start("cac:TaxSubtotal")?;
        w.amount("cbc:TaxableAmount", currency, invoice.subtotal)?;
        w.amount("cbc:TaxAmount", currency, invoice.vat_amount)?;
        write_tax_category(w, "cac:TaxCategory", self.config.standard_vat_percent)?;
        w.end("cac:TaxSubtotal")?;
        w.end("cac:TaxTotal")
    }

    fn write_line(
        &self,
        w: &mut UblWriter,
        currency: &str,
        position: usize,
        line: &InvoiceLine,
    ) -> Result<(), ComplianceError> {
        w.start("cac:InvoiceLine")?;
        w.text("cbc:ID", &position.to_string())?;
        w.text_with(
            "cbc:InvoicedQuantity",
            &[("unitCode", self.config.unit_code.as_str())],
            &line.quantity.normalize().to_string(),
        )?;
        w.amount("cbc:LineExtensionAmount", currency, line.net_amount)?;

        w.start("cac:TaxTotal")?;
        w.amount("cbc:TaxAmount", currency, line.vat_amount)?;
        w.amount("cbc:RoundingAmount", currency, line.total_amount)?;
        w.end("cac:TaxTotal")?;

        w.start("cac:Item")?;
        w.text("cbc:Name", &line.item_name)?;
        write_tax_category(w, "cac:ClassifiedTaxCategory", line.tax_percent)?;
        w.end("cac:Item")?;

        w.start("cac:Price")?;
        w.amount("cbc:PriceAmount", currency, line.unit_price)?;
        w.end("cac:Price")?;

        w.end("cac:InvoiceLine")
    }
}

fn write_hash_references(
    w: &mut UblWriter,
    invoice: &Invoice,
    invoice_hash: &str,
) -> Result<(), ComplianceError> {
    if let Some(previous) = invoice.previous_invoice_hash.as_deref().filter(|h| !h.is_empty()) {
        write_document_reference(w, PREVIOUS_HASH_ID, previous)?;
    }
    write_document_reference(w, CURRENT_HASH_ID, invoice_hash)
}

fn write_document_reference(w: &mut UblWriter, id: &str, value: &str) -> Result<(), ComplianceError> {
    w.start("cac:AdditionalDocumentReference")?;
    w.text("cbc:ID", id)?;
    w.start("cac:Attachment")?;
    w.text_with("cbc:EmbeddedDocumentBinaryObject", &[("mimeCode", "text/plain")], value)?;
    w.end("cac:Attachment")?;
    w.end("cac:AdditionalDocumentReference")
}

fn write_supplier(w: &mut UblWriter, seller: &Seller) -> Result<(), ComplianceError> {
    let address = &seller.address;

    w.start("cac:AccountingSupplierParty")?;
    w.start("cac:Party")?;

    if let Some(crn) = seller.commercial_registration.as_deref() {
        w.start("cac:PartyIdentification")?;
        w.text_with("cbc:ID", &[("schemeID", "CRN")], crn)?;
        w.end("cac:PartyIdentification")?;
    }

    w.start("cac:PostalAddress")?;
    w.optional_text("cbc:StreetName", address.street.as_deref())?;
    w.optional_text("cbc:BuildingNumber", address.building_number.as_deref())?;
    w.optional_text("cbc:CitySubdivisionName", address.district.as_deref())?;
    w.optional_text("cbc:CityName", address.city.as_deref())?;
    w.optional_text("cbc:PostalZone", address.postal_code.as_deref())?;
    if let Some(country) = address.country_code.as_deref() {
        w.start("cac:Country")?;
        w.text("cbc:IdentificationCode", country)?;
        w.end("cac:Country")?;
    }
    w.end("cac:PostalAddress")?;

    write_party_tax_scheme(w, &seller.vat_number)?;

    w.start("cac:PartyLegalEntity")?;
    w.text("cbc:RegistrationName", &seller.name)?;
    w.end("cac:PartyLegalEntity")?;

    w.end("cac:Party")?;
    w.end("cac:AccountingSupplierParty")
}

fn write_customer(w: &mut UblWriter, invoice: &Invoice) -> Result<(), ComplianceError> {
    let Some(buyer_name) = invoice.buyer_name() else {
        return Ok(());
    };

    w.start("cac:AccountingCustomerParty")?;
    w.start("cac:Party")?;
    if let Some(vat) = invoice.buyer_vat_number() {
        write_party_tax_scheme(w, vat)?;
    }
    w.start("cac:PartyLegalEntity")?;
    w.text("cbc:RegistrationName", buyer_name)?;
    w.end("cac:PartyLegalEntity")?;
    w.end("cac:Party")?;
    w.end("cac:AccountingCustomerParty")
}

fn write_party_tax_scheme(w: &mut UblWriter, vat_number: &str) -> Result<(), ComplianceError> {
    w.start("cac:PartyTaxScheme")?;
    w.text("cbc:CompanyID", vat_number)?;
    w.start("cac:TaxScheme")?;
    w.text("cbc:ID", TAX_SCHEME)?;
    w.end("cac:TaxScheme")?;
    w.end("cac:PartyTaxScheme")
}

fn write_tax_category(w: &mut UblWriter, element: &str, percent: Decimal) -> Result<(), ComplianceError> {
    w.start(element)?;
    w.text("cbc:ID", TAX_CATEGORY_STANDARD)?;
    w.text("cbc:Percent", &format!("{:.2}", percent))?;
    w.start("cac:TaxScheme")?;
    w.text("cbc:ID", TAX_SCHEME)?;
    w.end("cac:TaxScheme")?;
    w.end(element)
}

fn write_monetary_totals(w: &mut UblWriter, invoice: &Invoice) -> Result<(), ComplianceError> {
    let currency = invoice.currency.as_str();

    w.start("cac:LegalMonetaryTotal")?;
    w.amount("cbc:LineExtensionAmount", currency, invoice.subtotal)?;
    w.amount("cbc:TaxExclusiveAmount", currency, invoice.subtotal)?;
    w.amount("cbc:TaxInclusiveAmount", currency, invoice.grand_total)?;
    w.amount("cbc:PayableAmount", currency, invoice.grand_total)?;
    w.end("cac:LegalMonetaryTotal")
}

/// Compact element writer over `quick_xml::Writer`
///
/// Output is already in canonical form: values use the canonical escaping
/// rules, attributes are double-quoted and elements are always written as
/// start/end pairs so an empty value renders as `<a></a>`. Callers pass
/// attributes in sorted order.
struct UblWriter {
    inner: Writer<Vec<u8>>,
}

impl UblWriter {
    fn new() -> Self {
        Self {
            inner: Writer::new(Vec::new()),
        }
    }

    fn start(&mut self, name: &str) -> Result<(), ComplianceError> {
        self.write(Event::Start(BytesStart::new(name)))
    }

    fn end(&mut self, name: &str) -> Result<(), ComplianceError> {
        self.write(Event::End(BytesEnd::new(name)))
    }

    fn text(&mut self, name: &str, value: &str) -> Result<(), ComplianceError> {
        self.text_with(name, &[], value)
    }

    fn text_with(&mut self, name: &str, attributes: &[(&str, &str)], value: &str) -> Result<(), ComplianceError> {
        let mut start = BytesStart::new(name);
        for (key, raw) in attributes {
            let escaped = escape_attribute(raw);
            start.push_attribute((key.as_bytes(), escaped.as_bytes()));
        }
        self.write(Event::Start(start))?;
        self.write(Event::Text(BytesText::from_escaped(escape_text(value))))?;
        self.end(name)
    }

    fn optional_text(&mut self, name: &str, value: Option<&str>) -> Result<(), ComplianceError> {
        match value.filter(|v| !v.trim().is_empty()) {
            Some(value) => self.text(name, value),
            None => Ok(()),
        }
    }

    fn amount(&mut self, name: &str, currency: &str, value: Decimal) -> Result<(), ComplianceError> {
        self.text_with(name, &[("currencyID", currency)], &format_amount(value))
    }

    fn write(&mut self, event: Event<'_>) -> Result<(), ComplianceError> {
        self.inner
            .write_event(event)
            .map_err(|e| ComplianceError::structural(format!("Failed to write invoice XML: {}", e)))
    }

    fn finish(self) -> Result<String, ComplianceError> {
        String::from_utf8(self.inner.into_inner())
            .map_err(|e| ComplianceError::structural(format!("Invoice XML is not UTF-8: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::c14n::canonicalize;
    use crate::invoice::InvoiceType;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn seller() -> Seller {
        Seller::new("Acme & Sons", "300000000000003")
    }

    fn invoice(seller: &Seller) -> Invoice {
        let issued = Utc.with_ymd_and_hms(2024, 5, 2, 14, 3, 9).unwrap();
        let mut invoice = Invoice::new("INV-7", InvoiceType::Simplified, seller.id, issued);
        invoice.add_line(InvoiceLine::new("Tea <loose>", dec!(2), dec!(100), dec!(15)));
        invoice
    }

    #[test]
    fn test_text_is_escaped() {
        let seller = seller();
        let xml = InvoiceXmlBuilder::default().build(&invoice(&seller), &seller, "", "QR").unwrap();

        assert!(xml.contains("Acme &amp; Sons"));
        assert!(xml.contains("Tea &lt;loose&gt;"));
    }

    #[test]
    fn test_quotes_are_written_literally() {
        let seller = Seller::new(r#"O'Brien "Trading""#, "300000000000003");
        let mut invoice = invoice(&seller);
        invoice.currency = "S\"R".to_string();

        let xml = InvoiceXmlBuilder::default().build(&invoice, &seller, "", "QR").unwrap();

        assert!(xml.contains(r#"<cbc:RegistrationName>O'Brien "Trading"</cbc:RegistrationName>"#));
        assert!(xml.contains(r#"currencyID="S&quot;R""#));
        assert!(!xml.contains("&apos;"));
    }

    #[test]
    fn test_output_is_already_canonical() {
        let seller = Seller::new(r#"O'Brien "Trading" & Sons"#, "300000000000003");
        let mut invoice = invoice(&seller);
        invoice.add_line(InvoiceLine::new("Tab\tand\r\nbreak", dec!(1), dec!(5), dec!(15)));
        let document = InvoiceXmlBuilder::default()
            .build_hashed(&invoice, &seller, "SGFzaA==", "QR")
            .unwrap();

        assert_eq!(canonicalize(&document.render()).unwrap(), document.render_root());
    }

    #[test]
    fn test_identification_elements() {
        let seller = seller();
        let xml = InvoiceXmlBuilder::default().build(&invoice(&seller), &seller, "", "QR").unwrap();

        assert!(xml.starts_with(XML_DECLARATION));
        assert!(xml.contains("<cbc:IssueDate>2024-05-02</cbc:IssueDate>"));
        assert!(xml.contains("<cbc:IssueTime>14:03:09</cbc:IssueTime>"));
        assert!(xml.contains(r#"<cbc:InvoiceTypeCode name="Simplified Tax Invoice">383</cbc:InvoiceTypeCode>"#));
        assert!(xml.contains("<cbc:TaxCurrencyCode>SAR</cbc:TaxCurrencyCode>"));
    }

    #[test]
    fn test_stages_differ_only_in_hash() {
        let seller = seller();
        let invoice = invoice(&seller);
        let builder = InvoiceXmlBuilder::default();

        let unhashed = builder.build_unhashed(&invoice, &seller, "QR").unwrap().render();
        let hashed = builder.build_hashed(&invoice, &seller, "SGFzaA==", "QR").unwrap().render();

        assert_eq!(unhashed.replace("SGFzaA==", ""), hashed.replace("SGFzaA==", ""));
        assert_ne!(unhashed, hashed);
    }

    #[test]
    fn test_signature_slot() {
        let seller = seller();
        let document = InvoiceXmlBuilder::default()
            .build_unhashed(&invoice(&seller), &seller, "QR")
            .unwrap();

        assert!(document.has_signature_placeholder());
        assert!(document
            .render()
            .contains("<ext:ExtensionContent></ext:ExtensionContent>"));

        let signed = document.with_signature("<ds:Signature/>".to_string()).unwrap();
        assert!(!signed.has_signature_placeholder());
        assert!(signed.with_signature("again".to_string()).is_err());
    }
}
