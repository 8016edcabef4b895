use serde::Serialize;

use super::{humanize, slug, ExportArtifact};
use crate::model::checklist::Section;
use crate::model::inspection::Inspection;
use crate::model::property::Property;

/// Body lines per page, header and footer excluded.
pub const LINES_PER_PAGE: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportBlock {
    pub heading: String,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPage {
    pub number: usize,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionReport {
    pub title: String,
    pub address: Option<String>,
    pub scheduled: String,
    pub status: String,
    pub inspector: Option<String>,
    pub blocks: Vec<ReportBlock>,
    pub pages: Vec<ReportPage>,
    file_stem: String,
}

fn section_block(name: &str, section: &Section) -> Option<ReportBlock> {
    let mut lines: Vec<String> = section
        .items()
        .map(|(item, checked)| {
            format!("[{}] {}", if checked { "x" } else { " " }, humanize(item))
        })
        .collect();
    if let Some(notes) = section.notes().map(str::trim).filter(|n| !n.is_empty()) {
        lines.push(format!("Notes: {notes}"));
    }
    if lines.is_empty() {
        return None;
    }
    Some(ReportBlock {
        heading: humanize(name),
        lines,
    })
}

/// Template sections first, in template order, then any others by name.
/// Sections the inspection does not have, or that have nothing to show, are
/// left out.
fn blocks_for(inspection: &Inspection) -> Vec<ReportBlock> {
    let template: Vec<&str> = inspection
        .kind
        .template()
        .iter()
        .map(|(name, _)| *name)
        .collect();
    let extra = inspection
        .sections
        .keys()
        .map(String::as_str)
        .filter(|name| !template.contains(name));

    let mut blocks: Vec<ReportBlock> = template
        .iter()
        .copied()
        .chain(extra)
        .filter_map(|name| {
            let section = inspection.sections.get(name)?;
            section_block(name, section)
        })
        .collect();

    if let Some(notes) = inspection
        .overall_notes
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
    {
        blocks.push(ReportBlock {
            heading: "Overall notes".into(),
            lines: vec![notes.to_string()],
        });
    }
    blocks
}

/// Lay blocks out on pages. A heading never ends a page on its own.
fn paginate(blocks: &[ReportBlock], per_page: usize) -> Vec<ReportPage> {
    let per_page = per_page.max(2);
    let mut pages: Vec<Vec<String>> = vec![Vec::new()];
    for block in blocks {
        let current = pages.len() - 1;
        let used = pages[current].len();
        // Blank separator plus heading plus at least one line.
        let needed = if used == 0 { 2 } else { 3 };
        if used + needed > per_page {
            pages.push(Vec::new());
        }
        let page = pages.len() - 1;
        if !pages[page].is_empty() {
            pages[page].push(String::new());
        }
        pages[page].push(block.heading.clone());
        for line in &block.lines {
            if pages.last().map_or(0, Vec::len) >= per_page {
                pages.push(Vec::new());
            }
            if let Some(page) = pages.last_mut() {
                page.push(line.clone());
            }
        }
    }
    pages
        .into_iter()
        .enumerate()
        .map(|(i, lines)| ReportPage {
            number: i + 1,
            lines,
        })
        .collect()
}

/// Fold an inspection and (if loaded) its property into a report.
pub fn build_report(property: Option<&Property>, inspection: &Inspection) -> InspectionReport {
    build_report_with(property, inspection, LINES_PER_PAGE)
}

pub fn build_report_with(
    property: Option<&Property>,
    inspection: &Inspection,
    lines_per_page: usize,
) -> InspectionReport {
    let scheduled = inspection.scheduled_date.normalize();
    let address = property.map(|p| p.address.one_line());
    let blocks = blocks_for(inspection);
    let pages = paginate(&blocks, lines_per_page);

    let place = property
        .map(|p| slug(&p.address.postcode))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "property".into());
    let day = scheduled
        .as_datetime()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "undated".into());

    InspectionReport {
        title: format!("{} inspection", inspection.kind.as_str()),
        address,
        scheduled: scheduled.display_day(),
        status: inspection.status.as_str().to_string(),
        inspector: inspection.inspector.clone(),
        blocks,
        pages,
        file_stem: format!("inspection-{place}-{day}"),
    }
}

impl InspectionReport {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn render(&self) -> ExportArtifact {
        let total = self.pages.len();
        let mut out = String::new();
        for page in &self.pages {
            out.push_str(&self.title);
            out.push('\n');
            if let Some(address) = &self.address {
                out.push_str(address);
                out.push('\n');
            }
            out.push_str(&format!("Date: {}  Status: {}", self.scheduled, self.status));
            if let Some(inspector) = &self.inspector {
                out.push_str(&format!("  Inspector: {inspector}"));
            }
            out.push_str("\n\n");
            for line in &page.lines {
                out.push_str(line);
                out.push('\n');
            }
            out.push_str(&format!("\nPage {} of {total}\n", page.number));
            if page.number < total {
                out.push('\u{c}');
            }
        }
        ExportArtifact::text(format!("{}.txt", self.file_stem), out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::inspection::InspectionKind;
    use crate::model::property::{Address, PropertyType};
    use crate::time::DateLike;

    fn property() -> Property {
        Property::new(
            Address {
                line1: "12 Bank St".into(),
                city: "Hull".into(),
                postcode: "HU1 1AA".into(),
                ..Address::default()
            },
            PropertyType::Hmo,
            6,
            2,
        )
    }

    #[test]
    fn missing_sections_are_omitted() {
        let mut inspection =
            Inspection::scheduled(InspectionKind::Hmo, DateLike::Text("2024-06-03".into()));
        inspection.sections.remove("licensing");
        inspection.sections.insert("garden".into(), Section::default());
        let report = build_report(Some(&property()), &inspection);

        let headings: Vec<&str> = report.blocks.iter().map(|b| b.heading.as_str()).collect();
        assert!(!headings.contains(&"Licensing"));
        assert!(!headings.contains(&"Garden"));
        assert!(headings.contains(&"Fire safety"));
        assert_eq!(report.scheduled, "03/06/2024");
        assert_eq!(report.render().file_name, "inspection-hu1-1aa-2024-06-03.txt");
    }

    #[test]
    fn unloaded_property_and_bad_date_still_render() {
        let inspection =
            Inspection::scheduled(InspectionKind::SingleLet, DateLike::Text("whenever".into()));
        let report = build_report(None, &inspection);
        assert!(report.address.is_none());
        assert_eq!(report.scheduled, "n/a");
        let artifact = report.render();
        assert_eq!(artifact.file_name, "inspection-property-undated.txt");
        assert!(artifact.body.contains("Date: n/a"));
    }

    #[test]
    fn pages_respect_the_line_budget() {
        let mut inspection =
            Inspection::scheduled(InspectionKind::Hmo, DateLike::Millis(1_700_000_000_000));
        inspection.overall_notes = Some("Generally good".into());
        let report = build_report_with(Some(&property()), &inspection, 6);

        assert!(report.page_count() > 1);
        for page in &report.pages {
            assert!(page.lines.len() <= 6);
            assert_ne!(page.lines.first().map(String::as_str), Some(""));
        }
        let body = report.render().body;
        assert!(body.contains(&format!("Page {0} of {0}", report.page_count())));
        assert!(body.contains("Overall notes"));
    }
}
