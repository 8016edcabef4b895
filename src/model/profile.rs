use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{parse_variant, trim_optional, UnknownVariant};
use crate::mutation::{FieldErrors, Validate};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum BillingPlan {
    #[default]
    Free,
    Starter,
    Portfolio,
}

impl BillingPlan {
    pub const ALL: [BillingPlan; 3] = [BillingPlan::Free, BillingPlan::Starter, BillingPlan::Portfolio];

    pub const fn as_str(self) -> &'static str {
        match self {
            BillingPlan::Free => "Free",
            BillingPlan::Starter => "Starter",
            BillingPlan::Portfolio => "Portfolio",
        }
    }

    /// How many non-deleted properties the plan allows. `None` is unlimited.
    pub const fn property_limit(self) -> Option<usize> {
        match self {
            BillingPlan::Free => Some(2),
            BillingPlan::Starter => Some(10),
            BillingPlan::Portfolio => None,
        }
    }

    pub fn allows(self, current_count: usize) -> bool {
        self.property_limit().map_or(true, |limit| current_count < limit)
    }
}

impl FromStr for BillingPlan {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(&Self::ALL, s, Self::as_str, "billing plan")
    }
}

/// The single `owners/{o}/profile/account` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OwnerProfile {
    #[serde(default)]
    pub plan: BillingPlan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub display_name: Option<String>,
}

impl Validate for OwnerProfile {
    fn validate(mut self) -> Result<Self, FieldErrors> {
        trim_optional(&mut self.display_name);
        let mut errors = FieldErrors::new();
        if self
            .display_name
            .as_ref()
            .is_some_and(|name| name.chars().count() > 80)
        {
            errors.add("displayName", "At most 80 characters");
        }
        errors.into_result(self)
    }
}
