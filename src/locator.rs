//! Owner-scoped locators: every collection, document and query the crate
//! touches is rooted at `owners/{ownerId}`.
//!
//! Builders take `Option`s for every input that arrives asynchronously (the
//! owner id, route parameters) and return `None` until all of them are known.
//! `None` means "not ready", which bindings treat differently from "ready but
//! empty". Locators are plain values: building twice from the same inputs gives
//! equal locators, so a binding can tell that nothing changed.

use std::cmp::Ordering;
use std::fmt;

use serde_json::{Map, Value};
use tracing::debug;

use crate::session::OwnerId;

pub const OWNERS_ROOT: &str = "owners";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Properties,
    Tenants,
    Checklists,
    Inspections,
    MaintenanceLogs,
    Contractors,
    Profile,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::Properties,
        Collection::Tenants,
        Collection::Checklists,
        Collection::Inspections,
        Collection::MaintenanceLogs,
        Collection::Contractors,
        Collection::Profile,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Properties => "properties",
            Collection::Tenants => "tenants",
            Collection::Checklists => "checklists",
            Collection::Inspections => "inspections",
            Collection::MaintenanceLogs => "maintenanceLogs",
            Collection::Contractors => "contractors",
            Collection::Profile => "profile",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Collection::ALL.into_iter().find(|c| c.as_str() == raw)
    }

    /// The collection a nested collection hangs under.
    pub fn parent(self) -> Option<Collection> {
        match self {
            Collection::Tenants
            | Collection::Checklists
            | Collection::Inspections
            | Collection::MaintenanceLogs => Some(Collection::Properties),
            Collection::Properties | Collection::Contractors | Collection::Profile => None,
        }
    }
}

fn segment(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim();
    if value.is_empty() {
        return None;
    }
    if value.contains('/') {
        debug!(target: "landlord", event = "locator_segment_rejected", segment = value);
        return None;
    }
    Some(value.to_string())
}

/// `owners/{o}/{collection}` or `owners/{o}/properties/{p}/{collection}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionRef {
    owner: OwnerId,
    collection: Collection,
    parent_id: Option<String>,
}

impl CollectionRef {
    pub fn new(
        owner: Option<&OwnerId>,
        collection: Collection,
        parent_id: Option<&str>,
    ) -> Option<Self> {
        let owner = owner?.clone();
        let parent_id = match collection.parent() {
            Some(_) => Some(segment(parent_id)?),
            None => None,
        };
        Some(Self {
            owner,
            collection,
            parent_id,
        })
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    /// Locator of the parent document, for nested collections.
    pub fn parent(&self) -> Option<DocRef> {
        let parent_collection = self.collection.parent()?;
        let parent_id = self.parent_id.as_deref()?;
        DocRef::new(
            Some(&self.owner),
            parent_collection,
            None,
            Some(parent_id),
        )
    }

    pub fn doc(&self, id: &str) -> Option<DocRef> {
        Some(DocRef {
            collection: self.clone(),
            id: segment(Some(id))?,
        })
    }

    pub fn path(&self) -> String {
        match &self.parent_id {
            Some(parent) => format!(
                "{OWNERS_ROOT}/{}/{}/{parent}/{}",
                self.owner,
                Collection::Properties.as_str(),
                self.collection.as_str()
            ),
            None => format!(
                "{OWNERS_ROOT}/{}/{}",
                self.owner,
                self.collection.as_str()
            ),
        }
    }

    pub fn query(&self) -> Query {
        Query::new(self.clone())
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocRef {
    collection: CollectionRef,
    id: String,
}

impl DocRef {
    pub fn new(
        owner: Option<&OwnerId>,
        collection: Collection,
        parent_id: Option<&str>,
        id: Option<&str>,
    ) -> Option<Self> {
        CollectionRef::new(owner, collection, parent_id)?.doc(id?)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn owner(&self) -> &OwnerId {
        self.collection.owner()
    }

    pub fn collection(&self) -> &CollectionRef {
        &self.collection
    }

    pub fn path(&self) -> String {
        format!("{}/{}", self.collection.path(), self.id)
    }

    /// Inverse of [`DocRef::path`].
    pub fn parse(path: &str) -> Option<Self> {
        let parts: Vec<&str> = path.split('/').collect();
        match parts.as_slice() {
            [root, owner, collection, id] if *root == OWNERS_ROOT => {
                let owner = OwnerId::parse(owner)?;
                let collection = Collection::parse(collection)?;
                DocRef::new(Some(&owner), collection, None, Some(id))
            }
            [root, owner, parent, parent_id, collection, id]
                if *root == OWNERS_ROOT && *parent == Collection::Properties.as_str() =>
            {
                let owner = OwnerId::parse(owner)?;
                let collection = Collection::parse(collection)?;
                DocRef::new(Some(&owner), collection, Some(parent_id), Some(id))
            }
            _ => None,
        }
    }
}

impl fmt::Display for DocRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

// Typed builders for the shapes views actually ask for.

pub fn properties(owner: Option<&OwnerId>) -> Option<CollectionRef> {
    CollectionRef::new(owner, Collection::Properties, None)
}

pub fn property(owner: Option<&OwnerId>, property_id: Option<&str>) -> Option<DocRef> {
    DocRef::new(owner, Collection::Properties, None, property_id)
}

pub fn property_children(
    owner: Option<&OwnerId>,
    property_id: Option<&str>,
    collection: Collection,
) -> Option<CollectionRef> {
    collection.parent()?;
    CollectionRef::new(owner, collection, property_id)
}

pub fn tenants(owner: Option<&OwnerId>, property_id: Option<&str>) -> Option<CollectionRef> {
    property_children(owner, property_id, Collection::Tenants)
}

pub fn tenant(
    owner: Option<&OwnerId>,
    property_id: Option<&str>,
    tenant_id: Option<&str>,
) -> Option<DocRef> {
    DocRef::new(owner, Collection::Tenants, property_id, tenant_id)
}

pub fn checklist(
    owner: Option<&OwnerId>,
    property_id: Option<&str>,
    checklist_id: Option<&str>,
) -> Option<DocRef> {
    DocRef::new(owner, Collection::Checklists, property_id, checklist_id)
}

pub fn inspection(
    owner: Option<&OwnerId>,
    property_id: Option<&str>,
    inspection_id: Option<&str>,
) -> Option<DocRef> {
    DocRef::new(owner, Collection::Inspections, property_id, inspection_id)
}

pub fn contractors(owner: Option<&OwnerId>) -> Option<CollectionRef> {
    CollectionRef::new(owner, Collection::Contractors, None)
}

pub fn contractor(owner: Option<&OwnerId>, contractor_id: Option<&str>) -> Option<DocRef> {
    DocRef::new(owner, Collection::Contractors, None, contractor_id)
}

/// Active contractors whose stored (normalized) phone equals `phone`.
pub fn active_contractors_with_phone(owner: Option<&OwnerId>, phone: &str) -> Option<Query> {
    if phone.trim().is_empty() {
        return None;
    }
    Some(
        contractors(owner)?
            .query()
            .where_eq("status", crate::model::contractor::ContractorStatus::Active.as_str())
            .where_eq("phone", phone),
    )
}

pub const PROFILE_DOC_ID: &str = "account";

pub fn profile(owner: Option<&OwnerId>) -> Option<DocRef> {
    DocRef::new(owner, Collection::Profile, None, Some(PROFILE_DOC_ID))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq(String, Value),
    Ne(String, Value),
    In(String, Vec<Value>),
}

impl Filter {
    fn field(&self) -> &str {
        match self {
            Filter::Eq(f, _) | Filter::Ne(f, _) | Filter::In(f, _) => f,
        }
    }

    pub fn matches(&self, data: &Map<String, Value>) -> bool {
        let actual = field_value(data, self.field());
        match self {
            Filter::Eq(_, expected) => actual == Some(expected),
            // A missing field never matches `!=`, same as the hosted store.
            Filter::Ne(_, expected) => actual.is_some_and(|v| v != expected),
            Filter::In(_, options) => actual.is_some_and(|v| options.contains(v)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// A filtered, optionally ordered and limited read over one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    collection: CollectionRef,
    filters: Vec<Filter>,
    order_by: Option<(String, Direction)>,
    limit: Option<usize>,
}

impl Query {
    pub fn new(collection: CollectionRef) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.to_string(), value.into()));
        self
    }

    pub fn where_ne(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Ne(field.to_string(), value.into()));
        self
    }

    pub fn where_in(mut self, field: &str, values: Vec<Value>) -> Self {
        self.filters.push(Filter::In(field.to_string(), values));
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn collection(&self) -> &CollectionRef {
        &self.collection
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn matches(&self, data: &Map<String, Value>) -> bool {
        self.filters.iter().all(|f| f.matches(data))
    }

    /// Orders and truncates rows that already passed [`Query::matches`]. Ties
    /// fall back to the id so snapshots are deterministic.
    pub fn finish<T>(&self, mut rows: Vec<T>, view: impl Fn(&T) -> (&str, &Map<String, Value>)) -> Vec<T> {
        match &self.order_by {
            Some((field, direction)) => rows.sort_by(|a, b| {
                let (a_id, a_data) = view(a);
                let (b_id, b_data) = view(b);
                let ord = compare_values(field_value(a_data, field), field_value(b_data, field));
                let ord = match direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                };
                ord.then_with(|| a_id.cmp(b_id))
            }),
            None => rows.sort_by(|a, b| view(a).0.cmp(view(b).0)),
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        rows
    }
}

/// Read a dotted field path (`address.postcode`) out of a document body.
pub fn field_value<'a>(data: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current = data.get(first)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// What a live read is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Doc(DocRef),
    Query(Query),
}

impl Target {
    pub fn owner(&self) -> &OwnerId {
        match self {
            Target::Doc(doc) => doc.owner(),
            Target::Query(query) => query.collection().owner(),
        }
    }

    pub fn path(&self) -> String {
        match self {
            Target::Doc(doc) => doc.path(),
            Target::Query(query) => query.collection().path(),
        }
    }
}

impl From<DocRef> for Target {
    fn from(value: DocRef) -> Self {
        Target::Doc(value)
    }
}

impl From<Query> for Target {
    fn from(value: Query) -> Self {
        Target::Query(value)
    }
}
