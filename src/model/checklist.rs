use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::require_text;
use crate::mutation::{FieldErrors, Validate};
use crate::time::DateLike;

pub const NOTES_FIELD: &str = "notes";

/// One titled block of a checklist or inspection. Boolean fields are the
/// tick-box items; `notes` is free text. Other fields are kept as written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Section {
    pub fields: Map<String, Value>,
}

impl Section {
    pub fn with_items(items: &[&str]) -> Self {
        Self {
            fields: items
                .iter()
                .map(|item| (item.to_string(), Value::Bool(false)))
                .collect(),
        }
    }

    /// Tick-box items in name order.
    pub fn items(&self) -> impl Iterator<Item = (&str, bool)> {
        self.fields
            .iter()
            .filter_map(|(name, value)| value.as_bool().map(|checked| (name.as_str(), checked)))
    }

    pub fn set_item(&mut self, item: &str, checked: bool) {
        self.fields.insert(item.to_string(), Value::Bool(checked));
    }

    pub fn notes(&self) -> Option<&str> {
        self.fields
            .get(NOTES_FIELD)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|notes| !notes.is_empty())
    }

    pub fn set_notes(&mut self, notes: &str) {
        self.fields
            .insert(NOTES_FIELD.into(), Value::String(notes.to_string()));
    }

    pub fn is_complete(&self) -> bool {
        self.items().all(|(_, checked)| checked)
    }
}

pub type Sections = BTreeMap<String, Section>;

/// Items a move-in checklist starts with, by section.
pub const MOVE_IN_TEMPLATE: &[(&str, &[&str])] = &[
    (
        "safety",
        &[
            "smokeAlarmsTested",
            "carbonMonoxideAlarmTested",
            "gasSafetyCertificateGiven",
            "electricalReportGiven",
        ],
    ),
    (
        "documents",
        &[
            "howToRentGuideGiven",
            "epcGiven",
            "depositInformationGiven",
        ],
    ),
    ("utilities", &["meterReadingsTaken", "suppliersNotified"]),
    ("keys", &["keysHandedOver"]),
];

/// Sections that must be fully ticked before saving without a prompt.
pub const REQUIRED_SECTIONS: &[&str] = &["safety", "documents"];

pub fn sections_from_template(template: &[(&str, &[&str])]) -> Sections {
    template
        .iter()
        .map(|(name, items)| (name.to_string(), Section::with_items(items)))
        .collect()
}

/// `section.item` for every unticked item in a required section, plus the
/// name of any required section that is absent. Empty means complete.
pub fn missing_required(sections: &Sections, required: &[&str]) -> Vec<String> {
    let mut missing = Vec::new();
    for name in required {
        match sections.get(*name) {
            Some(section) => missing.extend(
                section
                    .items()
                    .filter(|(_, checked)| !checked)
                    .map(|(item, _)| format!("{name}.{item}")),
            ),
            None => missing.push(name.to_string()),
        }
    }
    missing
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checklist {
    pub tenant_id: String,
    #[serde(default)]
    pub sections: Sections,
    #[serde(default, skip_serializing)]
    pub created_at: Option<DateLike>,
}

impl Checklist {
    pub fn move_in(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            sections: sections_from_template(MOVE_IN_TEMPLATE),
            created_at: None,
        }
    }

    pub fn missing_required(&self) -> Vec<String> {
        missing_required(&self.sections, REQUIRED_SECTIONS)
    }

    pub fn is_complete(&self) -> bool {
        self.missing_required().is_empty()
    }
}

impl Validate for Checklist {
    fn validate(mut self) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();
        require_text(&mut errors, "tenantId", "Tenant", &mut self.tenant_id);
        errors.into_result(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_booleans_count_as_items() {
        let section: Section = serde_json::from_value(json!({
            "keysHandedOver": true,
            "notes": "two sets",
            "count": 2
        }))
        .unwrap();
        let items: Vec<_> = section.items().collect();
        assert_eq!(items, vec![("keysHandedOver", true)]);
        assert_eq!(section.notes(), Some("two sets"));
        assert!(section.is_complete());
    }

    #[test]
    fn fresh_move_in_lists_every_required_item() {
        let checklist = Checklist::move_in("t1");
        let missing = checklist.missing_required();
        assert_eq!(missing.len(), 7);
        assert!(missing.contains(&"safety.smokeAlarmsTested".to_string()));
        assert!(!missing.iter().any(|m| m.starts_with("keys.")));
    }

    #[test]
    fn ticking_required_items_completes() {
        let mut checklist = Checklist::move_in("t1");
        for name in REQUIRED_SECTIONS {
            let section = checklist.sections.get_mut(*name).unwrap();
            let items: Vec<String> = section.items().map(|(i, _)| i.to_string()).collect();
            for item in items {
                section.set_item(&item, true);
            }
        }
        assert!(checklist.is_complete());
    }

    #[test]
    fn absent_required_section_is_missing() {
        let sections = Sections::new();
        assert_eq!(missing_required(&sections, &["safety"]), vec!["safety"]);
    }
}
