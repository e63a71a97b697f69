//! QR payload encoding
//!
//! The payload is five Tag-Length-Value records, tags 1 to 5 in order,
//! concatenated and base64-encoded:
//!
//! | Tag | Value |
//! |-----|-------|
//! | 1 | Seller name |
//! | 2 | Seller VAT number |
//! | 3 | Issue timestamp, `yyyy-MM-ddTHH:mm:ssZ` |
//! | 4 | Invoice total, two decimals |
//! | 5 | VAT total, two decimals |
//!
//! Each record is `[tag: 1 byte][length: 1 byte][value bytes]`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use core_kernel::{format_amount, format_qr_timestamp, parse_amount, parse_qr_timestamp, CoreError};

/// Largest value a one-byte length field can describe
pub const MAX_VALUE_LENGTH: usize = u8::MAX as usize;

/// Errors raised while encoding or decoding a QR payload
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QrError {
    #[error("Value for tag {tag} is {length} bytes, the maximum is 255")]
    ValueTooLong { tag: u8, length: usize },

    #[error("Payload is not valid base64: {0}")]
    InvalidBase64(String),

    #[error("Record at offset {offset} is truncated")]
    Truncated { offset: usize },

    #[error("Expected tag {expected}, found {found}")]
    UnexpectedTag { expected: u8, found: u8 },

    #[error("Expected 5 records, found {0}")]
    RecordCount(usize),

    #[error("Value for tag {tag} is not valid UTF-8")]
    InvalidUtf8 { tag: u8 },

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// One Tag-Length-Value record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlvRecord {
    pub tag: u8,
    pub value: Vec<u8>,
}

impl TlvRecord {
    /// Creates a record, refusing values the length byte cannot describe
    pub fn new(tag: u8, value: impl Into<Vec<u8>>) -> Result<Self, QrError> {
        let value = value.into();
        if value.len() > MAX_VALUE_LENGTH {
            return Err(QrError::ValueTooLong {
                tag,
                length: value.len(),
            });
        }
        Ok(Self { tag, value })
    }

    /// Value as UTF-8 text
    pub fn text(&self) -> Result<&str, QrError> {
        std::str::from_utf8(&self.value).map_err(|_| QrError::InvalidUtf8 { tag: self.tag })
    }

    fn write_to(&self, buffer: &mut Vec<u8>) {
        buffer.push(self.tag);
        // Bounded by MAX_VALUE_LENGTH in `new`
        buffer.push(self.value.len() as u8);
        buffer.extend_from_slice(&self.value);
    }
}

/// The five facts carried by an invoice QR code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrPayload {
    pub seller_name: String,
    pub vat_number: String,
    pub timestamp: DateTime<Utc>,
    pub invoice_total: Decimal,
    pub vat_total: Decimal,
}

impl QrPayload {
    /// Encodes the payload as base64 TLV
    pub fn encode(&self) -> Result<String, QrError> {
        let records = [
            TlvRecord::new(1, self.seller_name.as_bytes())?,
            TlvRecord::new(2, self.vat_number.as_bytes())?,
            TlvRecord::new(3, format_qr_timestamp(self.timestamp))?,
            TlvRecord::new(4, format_amount(self.invoice_total))?,
            TlvRecord::new(5, format_amount(self.vat_total))?,
        ];

        let mut buffer = Vec::with_capacity(records.iter().map(|r| r.value.len() + 2).sum());
        for record in &records {
            record.write_to(&mut buffer);
        }

        Ok(STANDARD.encode(buffer))
    }

    /// Parses a base64 QR string back into its five facts
    pub fn decode(encoded: &str) -> Result<Self, QrError> {
        let records = decode_records(encoded)?;
        if records.len() != 5 {
            return Err(QrError::RecordCount(records.len()));
        }
        for (index, record) in records.iter().enumerate() {
            let expected = index as u8 + 1;
            if record.tag != expected {
                return Err(QrError::UnexpectedTag {
                    expected,
                    found: record.tag,
                });
            }
        }

        Ok(Self {
            seller_name: records[0].text()?.to_string(),
            vat_number: records[1].text()?.to_string(),
            timestamp: parse_qr_timestamp(records[2].text()?)?,
            invoice_total: parse_amount(records[3].text()?)?,
            vat_total: parse_amount(records[4].text()?)?,
        })
    }
}

/// Splits a base64 TLV payload into its records, in order
pub fn decode_records(encoded: &str) -> Result<Vec<TlvRecord>, QrError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| QrError::InvalidBase64(e.to_string()))?;

    let mut records = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        if offset + 2 > bytes.len() {
            return Err(QrError::Truncated { offset });
        }
        let tag = bytes[offset];
        let length = bytes[offset + 1] as usize;
        let start = offset + 2;
        let end = start + length;
        if end > bytes.len() {
            return Err(QrError::Truncated { offset });
        }
        records.push(TlvRecord {
            tag,
            value: bytes[start..end].to_vec(),
        });
        offset = end;
    }

    Ok(records)
}

/// Builds QR payloads from invoice facts
pub struct QrEncoder;

impl QrEncoder {
    /// Encodes the five QR facts as a base64 TLV string
    ///
    /// Deterministic: identical inputs always yield the identical string.
    pub fn encode(
        seller_name: &str,
        vat_number: &str,
        timestamp: DateTime<Utc>,
        invoice_total: Decimal,
        vat_total: Decimal,
    ) -> Result<String, QrError> {
        QrPayload {
            seller_name: seller_name.to_string(),
            vat_number: vat_number.to_string(),
            timestamp,
            invoice_total,
            vat_total,
        }
        .encode()
    }
}
