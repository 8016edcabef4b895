use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::contractor::Contractor;
use crate::model::inspection::Inspection;
use crate::model::maintenance::MaintenanceLog;
use crate::model::tenant::Tenant;
use crate::store::Record;
use crate::time::DateLike;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActivityKind {
    TenancyStarted,
    Inspection,
    Maintenance,
    ContractorAdded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    pub at: DateTime<Utc>,
    pub kind: ActivityKind,
    pub title: String,
    pub property_id: Option<String>,
    pub entity_id: String,
}

/// Records a dashboard already holds, nested ones paired with their property id.
#[derive(Debug, Clone, Default)]
pub struct PortfolioSnapshot {
    pub tenants: Vec<(String, Record<Tenant>)>,
    pub inspections: Vec<(String, Record<Inspection>)>,
    pub maintenance: Vec<(String, Record<MaintenanceLog>)>,
    pub contractors: Vec<Record<Contractor>>,
}

fn dated(
    date: Option<&DateLike>,
    kind: ActivityKind,
    title: String,
    property_id: Option<&str>,
    entity_id: &str,
) -> Option<ActivityItem> {
    let at = date?.normalize().as_datetime()?;
    Some(ActivityItem {
        at,
        kind,
        title,
        property_id: property_id.map(str::to_string),
        entity_id: entity_id.to_string(),
    })
}

/// Newest first. Items without a usable date are dropped. `limit` caps the
/// result after sorting.
pub fn portfolio_timeline(snapshot: &PortfolioSnapshot, limit: Option<usize>) -> Vec<ActivityItem> {
    let tenants = snapshot.tenants.iter().filter_map(|(property_id, r)| {
        dated(
            Some(&r.value.tenancy_start),
            ActivityKind::TenancyStarted,
            format!("{} moved in", r.value.name),
            Some(property_id),
            &r.id,
        )
    });
    let inspections = snapshot.inspections.iter().filter_map(|(property_id, r)| {
        dated(
            Some(&r.value.scheduled_date),
            ActivityKind::Inspection,
            format!("{} inspection ({})", r.value.kind.as_str(), r.value.status.as_str()),
            Some(property_id),
            &r.id,
        )
    });
    let maintenance = snapshot.maintenance.iter().filter_map(|(property_id, r)| {
        dated(
            Some(&r.value.reported_date),
            ActivityKind::Maintenance,
            format!("{} ({})", r.value.title, r.value.status.as_str()),
            Some(property_id),
            &r.id,
        )
    });
    let contractors = snapshot.contractors.iter().filter_map(|r| {
        dated(
            r.value.created_at.as_ref(),
            ActivityKind::ContractorAdded,
            format!("{} added ({})", r.value.name, r.value.trade),
            None,
            &r.id,
        )
    });

    let mut items: Vec<ActivityItem> = tenants
        .chain(inspections)
        .chain(maintenance)
        .chain(contractors)
        .collect();
    items.sort_by(|a, b| b.at.cmp(&a.at).then_with(|| a.entity_id.cmp(&b.entity_id)));
    if let Some(limit) = limit {
        items.truncate(limit);
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::inspection::InspectionKind;

    fn record<T>(id: &str, value: T) -> Record<T> {
        Record {
            id: id.into(),
            value,
        }
    }

    #[test]
    fn merges_sorts_and_drops_undated() {
        let mut contractor = Contractor::new("Ann", "Plumber", "07123456789");
        contractor.created_at = Some(DateLike::Timestamp {
            seconds: 1_717_200_000,
            nanoseconds: 0,
        });
        let snapshot = PortfolioSnapshot {
            tenants: vec![(
                "p1".into(),
                record("t1", Tenant::new("Jo", DateLike::Text("2024-01-01".into()), 900.0)),
            )],
            inspections: vec![
                (
                    "p1".into(),
                    record(
                        "i1",
                        Inspection::scheduled(InspectionKind::SingleLet, DateLike::Text("2024-03-01".into())),
                    ),
                ),
                (
                    "p2".into(),
                    record(
                        "i2",
                        Inspection::scheduled(InspectionKind::Hmo, DateLike::Text("tbc".into())),
                    ),
                ),
            ],
            maintenance: vec![(
                "p2".into(),
                record("m1", MaintenanceLog::open("Leak", DateLike::Millis(1_706_745_600_000))),
            )],
            contractors: vec![
                record("c1", contractor),
                record("c2", Contractor::new("Bob", "Roofer", "07999000111")),
            ],
        };

        let items = portfolio_timeline(&snapshot, None);
        let ids: Vec<&str> = items.iter().map(|i| i.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "i1", "m1", "t1"]);
        assert_eq!(items[3].kind, ActivityKind::TenancyStarted);
        assert_eq!(items[3].property_id.as_deref(), Some("p1"));

        assert_eq!(portfolio_timeline(&snapshot, Some(2)).len(), 2);
    }

    #[test]
    fn empty_snapshot_is_empty() {
        assert!(portfolio_timeline(&PortfolioSnapshot::default(), None).is_empty());
    }
}
