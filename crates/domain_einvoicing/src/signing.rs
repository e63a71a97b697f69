//! Enveloped XML digital signatures
//!
//! The reference covers the whole document (`URI=""`) after the
//! enveloped-signature transform and inclusive C14N 1.1: the digest input is
//! the canonical form of the document with its signature slot empty.
//! `SignedInfo` declares exclusive C14N, whose output for it does not depend
//! on the enclosing document, so it is rendered directly in that form and
//! signed with RSASSA-PKCS1-v1_5 over SHA-256.
//!
//! Private keys are decrypted per call and dropped (and zeroized by `rsa`)
//! as soon as the signature is computed.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::{NsReader, Reader};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::signature::{SignatureEncoding, Signer as _, Verifier as _};
use rsa::{RsaPrivateKey, RsaPublicKey};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;
use x509_cert::der::{Decode, DecodePem, Encode};

use crate::c14n::canonicalize;
use crate::certificate::Certificate;
use crate::error::ComplianceError;
use crate::hashing::InvoiceHasher;
use crate::xml::{InvoiceDocument, EXT_NS, SIGNATURE_EXTENSION_URI};

/// XML-DSig namespace
pub const DSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

const EXCLUSIVE_C14N_ALGORITHM: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
const C14N_ALGORITHM: &str = "http://www.w3.org/2006/12/xml-c14n11";
const RSA_SHA256_ALGORITHM: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
const SHA256_ALGORITHM: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
const ENVELOPED_TRANSFORM: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

/// Low-level causes of cryptographic failures
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("certificate could not be parsed: {0}")]
    CertificateParse(String),

    #[error("certificate public key is not a usable RSA key: {0}")]
    PublicKey(String),

    #[error("private key could not be decrypted: {0}")]
    PrivateKeyDecrypt(String),

    #[error("no usable private key")]
    NoUsablePrivateKey,

    #[error("certificate is inactive or outside its validity window")]
    CertificateNotUsable,

    #[error("signature computation failed: {0}")]
    Signature(String),

    #[error("signature value is malformed: {0}")]
    MalformedSignature(String),
}

/// A decrypted key pair checked against its certificate
pub struct SigningCredentials {
    certificate_der: Vec<u8>,
    signing_key: SigningKey<Sha256>,
}

impl SigningCredentials {
    /// Parses the certificate and decrypts its private key with `password`
    pub fn load(
        certificate: &Certificate,
        password: &SecretString,
        now: DateTime<Utc>,
    ) -> Result<Self, ComplianceError> {
        if !certificate.is_usable_at(now) {
            return Err(ComplianceError::cryptographic(
                format!("Certificate {} cannot be used for signing", certificate.id),
                SigningError::CertificateNotUsable,
            ));
        }

        let parsed = x509_cert::Certificate::from_pem(certificate.certificate_pem.as_bytes())
            .map_err(|e| load_failure(certificate, SigningError::CertificateParse(e.to_string())))?;
        let certificate_der = parsed
            .to_der()
            .map_err(|e| load_failure(certificate, SigningError::CertificateParse(e.to_string())))?;
        let public_key = certificate_public_key(&parsed)
            .map_err(|e| load_failure(certificate, e))?;

        let private_key = decrypt_private_key(&certificate.private_key_pem, password)
            .map_err(|e| load_failure(certificate, e))?;

        if RsaPublicKey::from(&private_key) != public_key {
            return Err(load_failure(certificate, SigningError::NoUsablePrivateKey));
        }

        debug!(certificate_id = %certificate.id, "Signing credentials loaded");

        Ok(Self {
            certificate_der,
            signing_key: SigningKey::<Sha256>::new(private_key),
        })
    }

    /// Base64 DER of the certificate, as embedded in `KeyInfo`
    pub fn certificate_base64(&self) -> String {
        STANDARD.encode(&self.certificate_der)
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, ComplianceError> {
        let signature = self.signing_key.try_sign(message).map_err(|e| {
            ComplianceError::cryptographic(
                "Failed to compute the document signature",
                SigningError::Signature(e.to_string()),
            )
        })?;
        Ok(signature.to_bytes().into_vec())
    }
}

fn load_failure(certificate: &Certificate, cause: SigningError) -> ComplianceError {
    let message = match cause {
        SigningError::NoUsablePrivateKey => {
            format!("Certificate {} has no usable private key", certificate.id)
        }
        _ => format!("Certificate {} could not be loaded", certificate.id),
    };
    ComplianceError::cryptographic(message, cause)
}

fn certificate_public_key(certificate: &x509_cert::Certificate) -> Result<RsaPublicKey, SigningError> {
    let spki = certificate
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| SigningError::PublicKey(e.to_string()))?;
    RsaPublicKey::from_public_key_der(&spki).map_err(|e| SigningError::PublicKey(e.to_string()))
}

fn decrypt_private_key(pem: &str, password: &SecretString) -> Result<RsaPrivateKey, SigningError> {
    let pem = pem.trim();
    if pem.is_empty() {
        return Err(SigningError::NoUsablePrivateKey);
    }

    if pem.contains("ENCRYPTED PRIVATE KEY") {
        RsaPrivateKey::from_pkcs8_encrypted_pem(pem, password.expose_secret().as_bytes())
            .map_err(|e| SigningError::PrivateKeyDecrypt(e.to_string()))
    } else {
        RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| SigningError::PrivateKeyDecrypt(e.to_string()))
    }
}

/// Result of checking a signed document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureVerification {
    /// The document still hashes to the signed digest
    pub digest_valid: bool,
    /// The RSA signature over `SignedInfo` checks out against the embedded certificate
    pub signature_valid: bool,
}

impl SignatureVerification {
    pub fn is_valid(&self) -> bool {
        self.digest_valid && self.signature_valid
    }
}

/// Signs invoice documents
pub struct InvoiceSigner;

impl InvoiceSigner {
    /// Signs a typed document, filling its signature slot
    pub fn sign_document(
        document: &InvoiceDocument,
        certificate: &Certificate,
        password: &SecretString,
    ) -> Result<InvoiceDocument, ComplianceError> {
        if !document.has_signature_placeholder() {
            return Err(ComplianceError::structural("Document has no empty signature slot"));
        }

        let credentials = SigningCredentials::load(certificate, password, Utc::now())?;
        let canonical = canonicalize(&document.render_root())?;
        let signature = Self::signature_element(&canonical, &credentials)?;
        document.with_signature(signature)
    }

    /// Signs an arbitrary invoice XML string
    ///
    /// Fails with `Structural` when the document has no signature extension
    /// or when that extension already holds a signature.
    pub fn sign(
        xml: &str,
        certificate: &Certificate,
        password: &SecretString,
    ) -> Result<String, ComplianceError> {
        let slot = locate_signature_slot(xml)?;
        if slot.signed {
            return Err(ComplianceError::structural("Document is already signed"));
        }

        let credentials = SigningCredentials::load(certificate, password, Utc::now())?;
        let (unsigned, insert_at) = slot.emptied(xml);
        let canonical = canonicalize(&unsigned)?;
        let signature = Self::signature_element(&canonical, &credentials)?;

        let mut signed = String::with_capacity(unsigned.len() + signature.len());
        signed.push_str(&unsigned[..insert_at]);
        signed.push_str(&signature);
        signed.push_str(&unsigned[insert_at..]);
        Ok(signed)
    }

    /// Checks the digest and signature embedded in a signed document
    ///
    /// The signature only counts as valid when the embedded `SignedInfo`
    /// names the algorithms and reference this signer produces.
    pub fn verify(signed_xml: &str) -> Result<SignatureVerification, ComplianceError> {
        let slot = locate_signature_slot(signed_xml)?;
        if !slot.signed {
            return Err(ComplianceError::structural("Document carries no signature"));
        }

        let parts = SignatureParts::parse(slot.content(signed_xml))?;
        let (unsigned, _) = slot.emptied(signed_xml);
        let digest_valid = InvoiceHasher::hash(&canonicalize(&unsigned)?) == parts.digest_value;

        let verifying_key = verifying_key_from_base64(&parts.certificate)?;
        let signature_bytes = decode_base64(&parts.signature_value)?;
        let signature = Signature::try_from(signature_bytes.as_slice()).map_err(|e| {
            ComplianceError::cryptographic(
                "Signature value is malformed",
                SigningError::MalformedSignature(e.to_string()),
            )
        })?;
        let profile_matches = parts.profile == SignedInfoProfile::expected();
        let signed_info = render_signed_info(&parts.digest_value);
        let signature_valid =
            profile_matches && verifying_key.verify(signed_info.as_bytes(), &signature).is_ok();

        debug!(digest_valid, signature_valid, profile_matches, "Signature verified");

        Ok(SignatureVerification {
            digest_valid,
            signature_valid,
        })
    }

    fn signature_element(
        canonical_unsigned: &str,
        credentials: &SigningCredentials,
    ) -> Result<String, ComplianceError> {
        let digest = InvoiceHasher::hash(canonical_unsigned);
        let signed_info = render_signed_info(&digest);
        let signature_value = STANDARD.encode(credentials.sign(signed_info.as_bytes())?);

        Ok(format!(
            r#"<ds:Signature xmlns:ds="{ns}" Id="signature">{signed_info}<ds:SignatureValue>{value}</ds:SignatureValue><ds:KeyInfo><ds:X509Data><ds:X509Certificate>{certificate}</ds:X509Certificate></ds:X509Data></ds:KeyInfo></ds:Signature>"#,
            ns = DSIG_NS,
            signed_info = signed_info,
            value = signature_value,
            certificate = credentials.certificate_base64(),
        ))
    }
}

const REFERENCE_ID: &str = "invoiceSignedData";

/// Exclusive canonical form of `SignedInfo` for a given document digest
///
/// Only the `ds` binding is visibly used, so it is the one declaration.
fn render_signed_info(digest: &str) -> String {
    format!(
        concat!(
            r#"<ds:SignedInfo xmlns:ds="{ns}">"#,
            r#"<ds:CanonicalizationMethod Algorithm="{exc_c14n}"></ds:CanonicalizationMethod>"#,
            r#"<ds:SignatureMethod Algorithm="{rsa}"></ds:SignatureMethod>"#,
            r#"<ds:Reference Id="{reference_id}" URI="">"#,
            r#"<ds:Transforms>"#,
            r#"<ds:Transform Algorithm="{enveloped}"></ds:Transform>"#,
            r#"<ds:Transform Algorithm="{c14n}"></ds:Transform>"#,
            r#"</ds:Transforms>"#,
            r#"<ds:DigestMethod Algorithm="{sha256}"></ds:DigestMethod>"#,
            r#"<ds:DigestValue>{digest}</ds:DigestValue>"#,
            r#"</ds:Reference></ds:SignedInfo>"#
        ),
        ns = DSIG_NS,
        exc_c14n = EXCLUSIVE_C14N_ALGORITHM,
        rsa = RSA_SHA256_ALGORITHM,
        reference_id = REFERENCE_ID,
        enveloped = ENVELOPED_TRANSFORM,
        c14n = C14N_ALGORITHM,
        sha256 = SHA256_ALGORITHM,
        digest = digest,
    )
}

/// Algorithms and reference named by a `SignedInfo`
#[derive(Debug, Default, PartialEq, Eq)]
struct SignedInfoProfile {
    canonicalization: Option<String>,
    signature_method: Option<String>,
    references: usize,
    reference_id: Option<String>,
    reference_uri: Option<String>,
    transforms: Vec<String>,
    digest_method: Option<String>,
}

impl SignedInfoProfile {
    /// What `render_signed_info` declares
    fn expected() -> Self {
        Self {
            canonicalization: Some(EXCLUSIVE_C14N_ALGORITHM.to_string()),
            signature_method: Some(RSA_SHA256_ALGORITHM.to_string()),
            references: 1,
            reference_id: Some(REFERENCE_ID.to_string()),
            reference_uri: Some(String::new()),
            transforms: vec![ENVELOPED_TRANSFORM.to_string(), C14N_ALGORITHM.to_string()],
            digest_method: Some(SHA256_ALGORITHM.to_string()),
        }
    }

    fn record(&mut self, element: &BytesStart<'_>) -> Result<(), ComplianceError> {
        match element.local_name().as_ref() {
            b"CanonicalizationMethod" => self.canonicalization = attribute(element, "Algorithm")?,
            b"SignatureMethod" => self.signature_method = attribute(element, "Algorithm")?,
            b"Reference" => {
                self.references += 1;
                self.reference_id = attribute(element, "Id")?;
                self.reference_uri = attribute(element, "URI")?;
            }
            b"Transform" => self
                .transforms
                .push(attribute(element, "Algorithm")?.unwrap_or_default()),
            b"DigestMethod" => self.digest_method = attribute(element, "Algorithm")?,
            _ => {}
        }
        Ok(())
    }
}

fn attribute(element: &BytesStart<'_>, name: &str) -> Result<Option<String>, ComplianceError> {
    match element.try_get_attribute(name).map_err(xml_failure)? {
        Some(value) => Ok(Some(value.unescape_value().map_err(xml_failure)?.into_owned())),
        None => Ok(None),
    }
}

fn decode_base64(value: &str) -> Result<Vec<u8>, ComplianceError> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact).map_err(|e| {
        ComplianceError::cryptographic(
            "Signature element holds invalid base64",
            SigningError::MalformedSignature(e.to_string()),
        )
    })
}

fn verifying_key_from_base64(certificate: &str) -> Result<VerifyingKey<Sha256>, ComplianceError> {
    let der = decode_base64(certificate)?;
    let parsed = x509_cert::Certificate::from_der(&der).map_err(|e| {
        ComplianceError::cryptographic(
            "Embedded certificate could not be parsed",
            SigningError::CertificateParse(e.to_string()),
        )
    })?;
    let public_key = certificate_public_key(&parsed)
        .map_err(|e| ComplianceError::cryptographic("Embedded certificate has no RSA key", e))?;
    Ok(VerifyingKey::<Sha256>::new(public_key))
}

/// Values pulled out of an embedded `ds:Signature`
struct SignatureParts {
    profile: SignedInfoProfile,
    digest_value: String,
    signature_value: String,
    certificate: String,
}

impl SignatureParts {
    fn parse(fragment: &str) -> Result<Self, ComplianceError> {
        let mut reader = Reader::from_str(fragment);
        reader.expand_empty_elements(true);

        let mut profile = SignedInfoProfile::default();
        let mut current: Option<&'static str> = None;
        let mut digest_value = String::new();
        let mut signature_value = String::new();
        let mut certificate = String::new();

        loop {
            match reader.read_event().map_err(xml_failure)? {
                Event::Start(e) => {
                    profile.record(&e)?;
                    current = match e.local_name().as_ref() {
                        b"DigestValue" => Some("digest"),
                        b"SignatureValue" => Some("signature"),
                        b"X509Certificate" => Some("certificate"),
                        _ => None,
                    };
                }
                Event::Text(t) => {
                    let text = t.unescape().map_err(xml_failure)?;
                    match current {
                        Some("digest") => digest_value.push_str(text.trim()),
                        Some("signature") => signature_value.push_str(text.trim()),
                        Some("certificate") => certificate.push_str(text.trim()),
                        _ => {}
                    }
                }
                Event::End(_) => current = None,
                Event::Eof => break,
                _ => {}
            }
        }

        if digest_value.is_empty() || signature_value.is_empty() || certificate.is_empty() {
            return Err(ComplianceError::structural(
                "Signature is missing its digest, value or certificate",
            ));
        }

        Ok(Self {
            profile,
            digest_value,
            signature_value,
            certificate,
        })
    }
}

/// Where the signature extension's content lives in a serialized document
enum SlotShape {
    /// `<ext:ExtensionContent>...</ext:ExtensionContent>`
    Open { content_start: usize, content_end: usize },
    /// `<ext:ExtensionContent/>`
    SelfClosing { start: usize, end: usize, name: String },
}

struct SignatureSlot {
    shape: SlotShape,
    /// A `Signature` element sits in the slot
    signed: bool,
}

impl SignatureSlot {
    fn content<'a>(&self, xml: &'a str) -> &'a str {
        match &self.shape {
            SlotShape::Open {
                content_start,
                content_end,
            } => &xml[*content_start..*content_end],
            SlotShape::SelfClosing { .. } => "",
        }
    }

    /// The document with an empty slot, plus the offset where a signature goes
    fn emptied(&self, xml: &str) -> (String, usize) {
        match &self.shape {
            SlotShape::Open {
                content_start,
                content_end,
            } => {
                let mut out = String::with_capacity(xml.len());
                out.push_str(&xml[..*content_start]);
                out.push_str(&xml[*content_end..]);
                (out, *content_start)
            }
            SlotShape::SelfClosing { start, end, name } => {
                let open = format!("<{}>", name);
                let mut out = String::with_capacity(xml.len() + name.len() + 3);
                out.push_str(&xml[..*start]);
                out.push_str(&open);
                out.push_str(&format!("</{}>", name));
                out.push_str(&xml[*end..]);
                (out, start + open.len())
            }
        }
    }
}

/// Finds the content of the extension whose URI is the signature URI
fn locate_signature_slot(xml: &str) -> Result<SignatureSlot, ComplianceError> {
    let mut reader = NsReader::from_str(xml);

    let mut in_extension = false;
    let mut reading_uri = false;
    let mut uri = String::new();
    let mut candidate: Option<SlotShape> = None;
    let mut content: Option<(usize, usize)> = None; // (start offset, nesting depth)
    let mut signed = false;

    loop {
        let before = reader.buffer_position();
        let (resolved, event) = reader.read_resolved_event().map_err(xml_failure)?;
        let in_ext_ns = matches!(resolved, ResolveResult::Bound(ns) if ns.as_ref() == EXT_NS.as_bytes());
        let after = reader.buffer_position();

        if let Some((start, depth)) = content {
            match &event {
                Event::Start(e) => {
                    if e.local_name().as_ref() == b"Signature" {
                        signed = true;
                    }
                    content = Some((start, depth + 1));
                }
                Event::Empty(e) => {
                    if e.local_name().as_ref() == b"Signature" {
                        signed = true;
                    }
                }
                Event::End(_) if depth == 1 => {
                    candidate = Some(SlotShape::Open {
                        content_start: start,
                        content_end: before,
                    });
                    content = None;
                }
                Event::End(_) => content = Some((start, depth - 1)),
                Event::Eof => break,
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(e) if in_ext_ns => match e.local_name().as_ref() {
                b"UBLExtension" => {
                    in_extension = true;
                    uri.clear();
                    candidate = None;
                    signed = false;
                }
                b"ExtensionURI" if in_extension => reading_uri = true,
                b"ExtensionContent" if in_extension => content = Some((after, 1)),
                _ => {}
            },
            Event::Empty(e) if in_ext_ns && in_extension => {
                if e.local_name().as_ref() == b"ExtensionContent" {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    candidate = Some(SlotShape::SelfClosing {
                        start: before,
                        end: after,
                        name,
                    });
                }
            }
            Event::Text(t) if reading_uri => uri.push_str(&t.unescape().map_err(xml_failure)?),
            Event::End(e) if in_ext_ns => match e.local_name().as_ref() {
                b"ExtensionURI" => reading_uri = false,
                b"UBLExtension" => {
                    in_extension = false;
                    if uri.trim() == SIGNATURE_EXTENSION_URI {
                        if let Some(shape) = candidate.take() {
                            return Ok(SignatureSlot { shape, signed });
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Err(ComplianceError::structural(format!(
        "Signature placeholder extension ({}) not found",
        SIGNATURE_EXTENSION_URI
    )))
}

fn xml_failure(error: impl std::fmt::Display) -> ComplianceError {
    ComplianceError::structural(format!("Malformed XML: {}", error))
}
