//! Seller (supplier) model

use serde::{Deserialize, Serialize};

use core_kernel::SellerId;

/// Structured postal address of a seller
///
/// Every field is optional at the type level; the validator decides which
/// ones are required for a given invoice type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SellerAddress {
    pub street: Option<String>,
    pub building_number: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub postal_code: Option<String>,
    /// ISO 3166-1 alpha-2 country code
    pub country_code: Option<String>,
}

impl SellerAddress {
    /// Creates a Saudi address with street, city and postal code
    pub fn new(
        street: impl Into<String>,
        city: impl Into<String>,
        postal_code: impl Into<String>,
    ) -> Self {
        Self {
            street: Some(street.into()),
            city: Some(city.into()),
            postal_code: Some(postal_code.into()),
            country_code: Some("SA".to_string()),
            ..Default::default()
        }
    }

    /// Sets the building number
    pub fn with_building_number(mut self, building_number: impl Into<String>) -> Self {
        self.building_number = Some(building_number.into());
        self
    }

    /// Sets the district
    pub fn with_district(mut self, district: impl Into<String>) -> Self {
        self.district = Some(district.into());
        self
    }
}

/// A VAT-registered seller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seller {
    pub id: SellerId,
    /// Legal name in the primary (Arabic) language
    pub name: String,
    /// Legal name in the secondary language
    #[serde(default)]
    pub name_secondary: Option<String>,
    /// 15-digit VAT registration number starting with 3
    pub vat_number: String,
    /// Commercial registration number
    #[serde(default)]
    pub commercial_registration: Option<String>,
    #[serde(default)]
    pub address: SellerAddress,
}

impl Seller {
    /// Creates a seller without address details
    pub fn new(name: impl Into<String>, vat_number: impl Into<String>) -> Self {
        Self {
            id: SellerId::new_v7(),
            name: name.into(),
            name_secondary: None,
            vat_number: vat_number.into(),
            commercial_registration: None,
            address: SellerAddress::default(),
        }
    }

    /// Sets the postal address
    pub fn with_address(mut self, address: SellerAddress) -> Self {
        self.address = address;
        self
    }

    /// Sets the commercial registration number
    pub fn with_commercial_registration(mut self, number: impl Into<String>) -> Self {
        self.commercial_registration = Some(number.into());
        self
    }
}
