//! Pre-built Test Fixtures
//!
//! Provides ready-to-use test data for sellers, buyers, timestamps and
//! signing material. The certificate files under `fixtures/` hold a
//! self-signed RSA-2048 certificate, its PBES2-encrypted PKCS#8 key and a
//! second key that does not belong to the certificate.

use chrono::{DateTime, Duration, TimeZone, Utc};
use secrecy::SecretString;
use uuid::Uuid;

use core_kernel::SellerId;
use domain_einvoicing::{Certificate, CertificateEnvironment, Seller, SellerAddress};

const SIGNING_CERT_PEM: &str = include_str!("../fixtures/signing_cert.pem");
const SIGNING_KEY_PEM: &str = include_str!("../fixtures/signing_key.pem");
const MISMATCHED_KEY_PEM: &str = include_str!("../fixtures/mismatched_key.pem");

/// Fixture for signing certificates
pub struct CertificateFixtures;

impl CertificateFixtures {
    /// Password protecting both fixture keys
    pub const PASSWORD: &'static str = "test-password";

    /// PEM of the self-signed signing certificate
    pub fn certificate_pem() -> &'static str {
        SIGNING_CERT_PEM
    }

    /// Encrypted PKCS#8 PEM of the certificate's private key
    pub fn private_key_pem() -> &'static str {
        SIGNING_KEY_PEM
    }

    /// Encrypted PKCS#8 PEM of an unrelated key
    pub fn mismatched_key_pem() -> &'static str {
        MISMATCHED_KEY_PEM
    }

    /// The fixture password as a secret
    pub fn password() -> SecretString {
        SecretString::new(Self::PASSWORD.to_string())
    }

    /// An active sandbox certificate valid for a year around now
    pub fn active_for(seller_id: SellerId) -> Certificate {
        let now = Utc::now();
        Certificate::new(
            seller_id,
            CertificateEnvironment::Sandbox,
            SIGNING_CERT_PEM,
            SIGNING_KEY_PEM,
            now - Duration::days(1),
            now + Duration::days(365),
        )
    }

    /// A certificate whose key does not match its public key
    pub fn mismatched_for(seller_id: SellerId) -> Certificate {
        let mut certificate = Self::active_for(seller_id);
        certificate.private_key_pem = MISMATCHED_KEY_PEM.to_string();
        certificate
    }

    /// A certificate that has been deactivated
    pub fn inactive_for(seller_id: SellerId) -> Certificate {
        let mut certificate = Self::active_for(seller_id);
        certificate.is_active = false;
        certificate
    }

    /// A certificate whose validity window has closed
    pub fn expired_for(seller_id: SellerId) -> Certificate {
        let mut certificate = Self::active_for(seller_id);
        certificate.valid_from = Utc::now() - Duration::days(400);
        certificate.valid_until = Utc::now() - Duration::days(35);
        certificate
    }
}

/// Fixture for seller test data
pub struct SellerFixtures;

impl SellerFixtures {
    /// Deterministic seller ID
    pub fn seller_id() -> SellerId {
        SellerId::from_uuid(Uuid::parse_str("0190c8a4-7b3e-7c2a-9f10-3a5d6e7f8a90").unwrap())
    }

    /// A seller complete enough for standard invoices
    pub fn standard() -> Seller {
        let mut seller = Seller::new(StringFixtures::seller_name(), StringFixtures::seller_vat())
            .with_commercial_registration("1010010000")
            .with_address(
                SellerAddress::new("King Fahd Road", "Riyadh", "12211")
                    .with_building_number("1234")
                    .with_district("Al Olaya"),
            );
        seller.id = Self::seller_id();
        seller.name_secondary = Some("Al Noor Trading Co.".to_string());
        seller
    }

    /// A seller without any address details
    pub fn without_address() -> Seller {
        let mut seller = Self::standard();
        seller.address = SellerAddress::default();
        seller
    }
}

/// Fixture for string test data
pub struct StringFixtures;

impl StringFixtures {
    pub fn seller_name() -> &'static str {
        "شركة النور للتجارة"
    }

    pub fn seller_vat() -> &'static str {
        "300000000000003"
    }

    pub fn buyer_name() -> &'static str {
        "Gulf Supplies LLC"
    }

    pub fn buyer_vat() -> &'static str {
        "311111111111113"
    }

    pub fn invoice_number() -> &'static str {
        "INV-2024-0001"
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// A recent issue timestamp in whole seconds, inside every validation window
    pub fn recent_issue_date() -> DateTime<Utc> {
        let recent = Utc::now() - Duration::hours(2);
        DateTime::from_timestamp(recent.timestamp(), 0).unwrap()
    }

    /// Fixed timestamp for format checks (2024-03-01 09:05:07 UTC)
    pub fn fixed_timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 7).unwrap()
    }

    /// Well past the default maximum invoice age
    pub fn too_old() -> DateTime<Utc> {
        Utc::now() - Duration::days(400)
    }

    /// Beyond the default future tolerance
    pub fn too_far_ahead() -> DateTime<Utc> {
        Utc::now() + Duration::days(3)
    }
}
