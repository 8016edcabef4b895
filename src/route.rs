use std::collections::HashMap;

use crate::error::codes;
use crate::{AppError, AppResult};

/// Canonical views the pipeline navigates to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    SignIn,
    Dashboard,
    Properties,
    DeletedProperties,
    Property { property_id: String },
    Tenant { property_id: String, tenant_id: String },
    Checklist { property_id: String, checklist_id: String },
    Inspection { property_id: String, inspection_id: String },
    Contractors,
    ArchivedContractors,
    Contractor { contractor_id: String },
    Billing,
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::SignIn => "/login".into(),
            Route::Dashboard => "/dashboard".into(),
            Route::Properties => "/properties".into(),
            Route::DeletedProperties => "/properties/deleted".into(),
            Route::Property { property_id } => format!("/properties/{property_id}"),
            Route::Tenant {
                property_id,
                tenant_id,
            } => format!("/properties/{property_id}/tenants/{tenant_id}"),
            Route::Checklist {
                property_id,
                checklist_id,
            } => format!("/properties/{property_id}/checklists/{checklist_id}"),
            Route::Inspection {
                property_id,
                inspection_id,
            } => format!("/properties/{property_id}/inspections/{inspection_id}"),
            Route::Contractors => "/contractors".into(),
            Route::ArchivedContractors => "/contractors/archived".into(),
            Route::Contractor { contractor_id } => format!("/contractors/{contractor_id}"),
            Route::Billing => "/billing".into(),
        }
    }
}

/// Route/query parameters a view was opened with.
#[derive(Debug, Clone, Default)]
pub struct RouteParams {
    values: HashMap<String, String>,
}

/// A view either has every parameter it needs or renders the not-found state
/// with a way back.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewContext<T> {
    Ready(T),
    InvalidContext { error: AppError, back: Route },
}

impl RouteParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }

    /// Blank values count as absent.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn require(&self, name: &str) -> AppResult<&str> {
        self.get(name).ok_or_else(|| {
            AppError::new(
                codes::MISSING_PARAM,
                "This page was opened without the record it needs.",
            )
            .with_context("param", name.to_string())
        })
    }

    /// Resolve the named parameters or fall into the invalid-context state.
    pub fn context<'a, const N: usize>(
        &'a self,
        names: [&str; N],
        back: Route,
    ) -> ViewContext<[&'a str; N]> {
        let mut out = [""; N];
        for (slot, name) in out.iter_mut().zip(names) {
            match self.require(name) {
                Ok(value) => *slot = value,
                Err(error) => return ViewContext::InvalidContext { error, back },
            }
        }
        ViewContext::Ready(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_param_is_invalid_context() {
        let params = RouteParams::new().with("propertyId", "p1");
        match params.context(["propertyId", "tenantId"], Route::Properties) {
            ViewContext::InvalidContext { error, back } => {
                assert_eq!(error.code(), codes::MISSING_PARAM);
                assert_eq!(error.context().get("param").map(String::as_str), Some("tenantId"));
                assert_eq!(back, Route::Properties);
            }
            ViewContext::Ready(_) => panic!("expected invalid context"),
        }
    }

    #[test]
    fn blank_param_counts_as_missing() {
        let params = RouteParams::new().with("id", "  ");
        assert!(params.require("id").is_err());
    }

    #[test]
    fn ready_when_present() {
        let params = RouteParams::new().with("propertyId", "p1").with("id", "c1");
        assert_eq!(
            params.context(["propertyId", "id"], Route::Dashboard),
            ViewContext::Ready(["p1", "c1"])
        );
    }

    #[test]
    fn paths() {
        assert_eq!(
            Route::Tenant {
                property_id: "p".into(),
                tenant_id: "t".into()
            }
            .path(),
            "/properties/p/tenants/t"
        );
    }
}
