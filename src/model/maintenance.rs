use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{check_amount, parse_variant, require_text, trim_optional, UnknownVariant};
use crate::mutation::{FieldErrors, Validate};
use crate::time::DateLike;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum MaintenanceStatus {
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Cancelled,
}

impl MaintenanceStatus {
    pub const ALL: [MaintenanceStatus; 4] = [
        MaintenanceStatus::Open,
        MaintenanceStatus::InProgress,
        MaintenanceStatus::Completed,
        MaintenanceStatus::Cancelled,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            MaintenanceStatus::Open => "Open",
            MaintenanceStatus::InProgress => "In Progress",
            MaintenanceStatus::Completed => "Completed",
            MaintenanceStatus::Cancelled => "Cancelled",
        }
    }

    /// Still needs attention.
    pub const fn is_open(self) -> bool {
        matches!(self, MaintenanceStatus::Open | MaintenanceStatus::InProgress)
    }
}

impl FromStr for MaintenanceStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(&Self::ALL, s, Self::as_str, "maintenance status")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceLog {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: MaintenanceStatus,
    pub reported_date: DateLike,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contractor_id: Option<String>,
    #[serde(default, skip_serializing)]
    pub created_at: Option<DateLike>,
}

impl MaintenanceLog {
    pub fn open(title: impl Into<String>, reported_date: DateLike) -> Self {
        Self {
            title: title.into(),
            description: None,
            status: MaintenanceStatus::Open,
            reported_date,
            cost: None,
            contractor_id: None,
            created_at: None,
        }
    }
}

impl Validate for MaintenanceLog {
    fn validate(mut self) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();
        require_text(&mut errors, "title", "Title", &mut self.title);
        trim_optional(&mut self.description);
        trim_optional(&mut self.contractor_id);
        check_amount(&mut errors, "cost", self.cost);
        if !self.reported_date.normalize().is_available() {
            errors.add("reportedDate", "Enter the date the issue was reported");
        }
        errors.into_result(self)
    }
}
