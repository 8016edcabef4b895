use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::checklist::{sections_from_template, Sections};
use super::{parse_variant, trim_optional, UnknownVariant};
use crate::mutation::{FieldErrors, Validate};
use crate::time::DateLike;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum InspectionKind {
    #[serde(rename = "Single-Let")]
    SingleLet,
    #[serde(rename = "HMO")]
    Hmo,
}

impl InspectionKind {
    pub const ALL: [InspectionKind; 2] = [InspectionKind::SingleLet, InspectionKind::Hmo];

    pub const fn as_str(self) -> &'static str {
        match self {
            InspectionKind::SingleLet => "Single-Let",
            InspectionKind::Hmo => "HMO",
        }
    }

    pub fn template(self) -> &'static [(&'static str, &'static [&'static str])] {
        match self {
            InspectionKind::SingleLet => SINGLE_LET_TEMPLATE,
            InspectionKind::Hmo => HMO_TEMPLATE,
        }
    }
}

impl FromStr for InspectionKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(&Self::ALL, s, Self::as_str, "inspection type")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum InspectionStatus {
    Scheduled,
    Completed,
    Cancelled,
    Deleted,
}

impl InspectionStatus {
    pub const ALL: [InspectionStatus; 4] = [
        InspectionStatus::Scheduled,
        InspectionStatus::Completed,
        InspectionStatus::Cancelled,
        InspectionStatus::Deleted,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            InspectionStatus::Scheduled => "Scheduled",
            InspectionStatus::Completed => "Completed",
            InspectionStatus::Cancelled => "Cancelled",
            InspectionStatus::Deleted => "Deleted",
        }
    }
}

impl FromStr for InspectionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(&Self::ALL, s, Self::as_str, "inspection status")
    }
}

const SINGLE_LET_TEMPLATE: &[(&str, &[&str])] = &[
    ("exterior", &["roofAndGutters", "windowsAndDoors", "garden"]),
    ("kitchen", &["appliancesWorking", "noLeaks", "ventilation"]),
    ("bathroom", &["noLeaks", "sealantIntact", "extractorFan"]),
    ("bedrooms", &["noDampOrMould", "windowsOpen"]),
    ("safety", &["smokeAlarmsTested", "carbonMonoxideAlarmTested"]),
];

const HMO_TEMPLATE: &[(&str, &[&str])] = &[
    ("exterior", &["roofAndGutters", "windowsAndDoors", "bins"]),
    ("kitchen", &["appliancesWorking", "noLeaks", "fireBlanket"]),
    ("bathroom", &["noLeaks", "sealantIntact", "extractorFan"]),
    ("bedrooms", &["noDampOrMould", "locksWorking", "minimumRoomSize"]),
    ("communalAreas", &["clean", "lightingWorking", "escapeRouteClear"]),
    ("fireSafety", &["fireDoorsClose", "alarmSystemTested", "emergencyLighting"]),
    ("licensing", &["licenceDisplayed", "managerDetailsDisplayed"]),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inspection {
    pub kind: InspectionKind,
    pub scheduled_date: DateLike,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspector: Option<String>,
    pub status: InspectionStatus,
    #[serde(default)]
    pub sections: Sections,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_notes: Option<String>,
    #[serde(default, skip_serializing)]
    pub created_at: Option<DateLike>,
}

impl Inspection {
    /// A scheduled inspection with the kind's sections, nothing ticked.
    pub fn scheduled(kind: InspectionKind, scheduled_date: DateLike) -> Self {
        Self {
            kind,
            scheduled_date,
            inspector: None,
            status: InspectionStatus::Scheduled,
            sections: sections_from_template(kind.template()),
            overall_notes: None,
            created_at: None,
        }
    }
}

impl Validate for Inspection {
    fn validate(mut self) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();
        trim_optional(&mut self.inspector);
        trim_optional(&mut self.overall_notes);
        if !self.scheduled_date.normalize().is_available() {
            errors.add("scheduledDate", "Enter the inspection date");
        }
        errors.into_result(self)
    }
}
