use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{check_amount, parse_variant, require_text, trim_optional, UnknownVariant};
use crate::lifecycle::SoftLifecycle;
use crate::mutation::{FieldErrors, Validate};
use crate::route::Route;
use crate::time::DateLike;

static POSTCODE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z]{1,2}[0-9][A-Z0-9]? ?[0-9][A-Z]{2}$")
        .expect("postcode validation pattern to compile")
});

const MAX_ROOMS: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum PropertyStatus {
    Vacant,
    Occupied,
    #[serde(rename = "Under Maintenance")]
    UnderMaintenance,
    Deleted,
}

impl PropertyStatus {
    pub const ALL: [PropertyStatus; 4] = [
        PropertyStatus::Vacant,
        PropertyStatus::Occupied,
        PropertyStatus::UnderMaintenance,
        PropertyStatus::Deleted,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            PropertyStatus::Vacant => "Vacant",
            PropertyStatus::Occupied => "Occupied",
            PropertyStatus::UnderMaintenance => "Under Maintenance",
            PropertyStatus::Deleted => "Deleted",
        }
    }
}

impl fmt::Display for PropertyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(&Self::ALL, s, Self::as_str, "property status")
    }
}

impl SoftLifecycle for PropertyStatus {
    const ARCHIVED: Self = PropertyStatus::Deleted;
    const RESTORED_DEFAULT: Self = PropertyStatus::Vacant;
    const NOUN: &'static str = "property";
    const ARCHIVE_VERB: &'static str = "delete";

    fn as_str(self) -> &'static str {
        PropertyStatus::as_str(self)
    }

    fn listing_route() -> Route {
        Route::Properties
    }

    fn archive_route() -> Route {
        Route::DeletedProperties
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum PropertyType {
    House,
    Flat,
    #[serde(rename = "HMO")]
    Hmo,
    Bungalow,
    Maisonette,
    Commercial,
    Other,
}

impl PropertyType {
    pub const ALL: [PropertyType; 7] = [
        PropertyType::House,
        PropertyType::Flat,
        PropertyType::Hmo,
        PropertyType::Bungalow,
        PropertyType::Maisonette,
        PropertyType::Commercial,
        PropertyType::Other,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            PropertyType::House => "House",
            PropertyType::Flat => "Flat",
            PropertyType::Hmo => "HMO",
            PropertyType::Bungalow => "Bungalow",
            PropertyType::Maisonette => "Maisonette",
            PropertyType::Commercial => "Commercial",
            PropertyType::Other => "Other",
        }
    }
}

impl FromStr for PropertyType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(&Self::ALL, s, Self::as_str, "property type")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Address {
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub county: Option<String>,
    pub postcode: String,
}

impl Address {
    pub fn one_line(&self) -> String {
        let mut parts = vec![self.line1.as_str()];
        if let Some(line2) = self.line2.as_deref() {
            parts.push(line2);
        }
        parts.push(self.city.as_str());
        format!("{}, {}", parts.join(", "), self.postcode)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Financials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub purchase_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub monthly_rent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub mortgage_payment: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub address: Address,
    pub property_type: PropertyType,
    pub status: PropertyStatus,
    #[serde(default)]
    pub bedrooms: u32,
    #[serde(default)]
    pub bathrooms: u32,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub financials: Financials,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_before_archive: Option<PropertyStatus>,
    #[serde(default, skip_serializing)]
    pub created_at: Option<DateLike>,
    #[serde(default, skip_serializing)]
    pub updated_at: Option<DateLike>,
}

impl Property {
    pub fn new(address: Address, property_type: PropertyType, bedrooms: u32, bathrooms: u32) -> Self {
        Self {
            address,
            property_type,
            status: PropertyStatus::Vacant,
            bedrooms,
            bathrooms,
            image_urls: Vec::new(),
            financials: Financials::default(),
            status_before_archive: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.status == PropertyStatus::Deleted
    }
}

pub fn normalize_postcode(raw: &str) -> String {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();
    // The inward code is always the last three characters.
    match compact.char_indices().rev().nth(2) {
        Some((split, _)) if split > 0 => {
            let (outward, inward) = compact.split_at(split);
            format!("{outward} {inward}")
        }
        _ => compact,
    }
}

impl Validate for Property {
    fn validate(mut self) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();
        require_text(&mut errors, "address.line1", "Address line 1", &mut self.address.line1);
        require_text(&mut errors, "address.city", "City", &mut self.address.city);
        trim_optional(&mut self.address.line2);
        trim_optional(&mut self.address.county);

        self.address.postcode = normalize_postcode(&self.address.postcode);
        if self.address.postcode.is_empty() {
            errors.add("address.postcode", "Postcode is required");
        } else if !POSTCODE_PATTERN.is_match(&self.address.postcode) {
            errors.add("address.postcode", "Enter a valid UK postcode");
        }

        if self.bedrooms > MAX_ROOMS {
            errors.add("bedrooms", format!("At most {MAX_ROOMS} bedrooms"));
        }
        if self.bathrooms > MAX_ROOMS {
            errors.add("bathrooms", format!("At most {MAX_ROOMS} bathrooms"));
        }
        check_amount(&mut errors, "financials.purchasePrice", self.financials.purchase_price);
        check_amount(&mut errors, "financials.monthlyRent", self.financials.monthly_rent);
        check_amount(&mut errors, "financials.mortgagePayment", self.financials.mortgage_payment);
        self.image_urls.retain(|url| !url.trim().is_empty());

        errors.into_result(self)
    }
}
