use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{check_amount, check_email, parse_variant, require_text, trim_optional, UnknownVariant};
use crate::mutation::{FieldErrors, Validate};
use crate::time::{DateLike, NormalizedDate};
use crate::util::normalize_phone;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum TenantStatus {
    Active,
    #[serde(rename = "Notice Given")]
    NoticeGiven,
    Former,
}

impl TenantStatus {
    pub const ALL: [TenantStatus; 3] = [
        TenantStatus::Active,
        TenantStatus::NoticeGiven,
        TenantStatus::Former,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            TenantStatus::Active => "Active",
            TenantStatus::NoticeGiven => "Notice Given",
            TenantStatus::Former => "Former",
        }
    }
}

impl FromStr for TenantStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(&Self::ALL, s, Self::as_str, "tenant status")
    }
}

/// Government-approved tenancy deposit protection schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum DepositScheme {
    #[serde(rename = "DPS")]
    Dps,
    #[serde(rename = "MyDeposits")]
    MyDeposits,
    #[serde(rename = "TDS")]
    Tds,
}

impl DepositScheme {
    pub const ALL: [DepositScheme; 3] = [DepositScheme::Dps, DepositScheme::MyDeposits, DepositScheme::Tds];

    pub const fn as_str(self) -> &'static str {
        match self {
            DepositScheme::Dps => "DPS",
            DepositScheme::MyDeposits => "MyDeposits",
            DepositScheme::Tds => "TDS",
        }
    }
}

impl FromStr for DepositScheme {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(&Self::ALL, s, Self::as_str, "deposit scheme")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub tenancy_start: DateLike,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenancy_end: Option<DateLike>,
    pub rent_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit_scheme: Option<DepositScheme>,
    pub status: TenantStatus,
    #[serde(default, skip_serializing)]
    pub created_at: Option<DateLike>,
}

impl Tenant {
    pub fn new(name: impl Into<String>, tenancy_start: DateLike, rent_amount: f64) -> Self {
        Self {
            name: name.into(),
            email: None,
            phone: None,
            tenancy_start,
            tenancy_end: None,
            rent_amount,
            deposit_amount: None,
            deposit_scheme: None,
            status: TenantStatus::Active,
            created_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }
}

impl Validate for Tenant {
    fn validate(mut self) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();
        require_text(&mut errors, "name", "Name", &mut self.name);
        check_email(&mut errors, "email", &mut self.email);
        trim_optional(&mut self.phone);
        if let Some(phone) = self.phone.as_deref() {
            let digits = normalize_phone(phone);
            if !(10..=11).contains(&digits.len()) {
                errors.add("phone", "Enter a valid UK phone number");
            } else {
                self.phone = Some(digits);
            }
        }

        let start = self.tenancy_start.normalize();
        if !start.is_available() {
            errors.add("tenancyStart", "Enter the date the tenancy starts");
        }
        if let Some(end) = self.tenancy_end.as_ref().map(DateLike::normalize) {
            match (start, end) {
                (_, NormalizedDate::Unavailable) => errors.add("tenancyEnd", "Enter a valid date"),
                (NormalizedDate::At(s), NormalizedDate::At(e)) if e < s => {
                    errors.add("tenancyEnd", "The tenancy can't end before it starts")
                }
                _ => {}
            }
        }

        if !self.rent_amount.is_finite() || self.rent_amount <= 0.0 {
            errors.add("rentAmount", "Rent must be more than zero");
        }
        check_amount(&mut errors, "depositAmount", self.deposit_amount);
        if self.deposit_amount.is_some_and(|d| d > 0.0) && self.deposit_scheme.is_none() {
            errors.add(
                "depositScheme",
                "Choose the scheme protecting the deposit",
            );
        }

        errors.into_result(self)
    }
}
