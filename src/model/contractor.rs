use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{check_email, parse_variant, require_text, trim_optional, UnknownVariant};
use crate::lifecycle::SoftLifecycle;
use crate::mutation::{FieldErrors, Validate};
use crate::route::Route;
use crate::time::DateLike;
use crate::util::normalize_phone;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ContractorStatus {
    Active,
    Archived,
}

impl ContractorStatus {
    pub const ALL: [ContractorStatus; 2] = [ContractorStatus::Active, ContractorStatus::Archived];

    pub const fn as_str(self) -> &'static str {
        match self {
            ContractorStatus::Active => "Active",
            ContractorStatus::Archived => "Archived",
        }
    }
}

impl FromStr for ContractorStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(&Self::ALL, s, Self::as_str, "contractor status")
    }
}

impl SoftLifecycle for ContractorStatus {
    const ARCHIVED: Self = ContractorStatus::Archived;
    const RESTORED_DEFAULT: Self = ContractorStatus::Active;
    const NOUN: &'static str = "contractor";
    const ARCHIVE_VERB: &'static str = "archive";

    fn as_str(self) -> &'static str {
        ContractorStatus::as_str(self)
    }

    fn listing_route() -> Route {
        Route::Contractors
    }

    fn archive_route() -> Route {
        Route::ArchivedContractors
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contractor {
    pub name: String,
    pub trade: String,
    /// Stored normalized (digits only, national format) so equality queries
    /// find duplicates however the number was typed.
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: ContractorStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_before_archive: Option<ContractorStatus>,
    #[serde(default, skip_serializing)]
    pub created_at: Option<DateLike>,
}

impl Contractor {
    pub fn new(name: impl Into<String>, trade: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            trade: trade.into(),
            phone: phone.into(),
            email: None,
            notes: None,
            status: ContractorStatus::Active,
            status_before_archive: None,
            created_at: None,
        }
    }
}

impl Validate for Contractor {
    fn validate(mut self) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();
        require_text(&mut errors, "name", "Name", &mut self.name);
        require_text(&mut errors, "trade", "Trade", &mut self.trade);
        check_email(&mut errors, "email", &mut self.email);
        trim_optional(&mut self.notes);

        let digits = normalize_phone(&self.phone);
        if digits.is_empty() {
            errors.add("phone", "Phone is required");
        } else if !(10..=11).contains(&digits.len()) || !digits.starts_with('0') {
            errors.add("phone", "Enter a valid UK phone number");
        }
        self.phone = digits;

        errors.into_result(self)
    }
}
