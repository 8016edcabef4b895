//! Validate → strip → write → toast + redirect, or toast + access report.
//!
//! Every form and every status flip goes through [`MutationPipeline`]. UI
//! collaborators are injected as trait objects so the pipeline carries no
//! global state and tests can record what the user would have seen.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::error::ErrorClass;
use crate::locator::{CollectionRef, DocRef};
use crate::logging::OpScope;
use crate::route::Route;
use crate::store::{to_fields, Document, DocumentStore, CREATED_AT};
use crate::util::{dispatch_async_app_result, dispatch_with_fence};
use crate::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastTone {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub title: String,
    pub description: String,
    pub tone: ToastTone,
}

impl Toast {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            tone: ToastTone::Success,
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            tone: ToastTone::Error,
        }
    }

    /// The toast a failed write shows, by error class.
    pub fn for_failure(err: &AppError) -> Self {
        match err.class() {
            ErrorClass::Validation => Toast::error("Please check the details", err.message()),
            ErrorClass::Permission => Toast::error(
                "Permission denied",
                "You don't have access to change this record. Try signing in again.",
            ),
            ErrorClass::NotFound => Toast::error(
                "Record not found",
                "It may have been deleted. Go back to the list and try again.",
            ),
            ErrorClass::Transient => Toast::error(
                "Something went wrong",
                format!("{} Please try again.", err.message()),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Set,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Set => "write",
            OperationKind::Delete => "delete",
        })
    }
}

/// What the access-error channel receives when the store refuses a write.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessErrorContext {
    pub path: String,
    pub operation: OperationKind,
    pub attempted_data: Option<Value>,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

pub trait AccessErrorReporter: Send + Sync {
    fn report(&self, context: AccessErrorContext);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmPrompt {
    pub title: String,
    pub description: String,
    pub confirm_label: String,
}

impl ConfirmPrompt {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        confirm_label: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            confirm_label: confirm_label.into(),
        }
    }
}

pub trait Confirmer: Send + Sync {
    fn confirm(&self, prompt: &ConfirmPrompt) -> bool;
}

/// Field name → message. Rendered inline next to the inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `Ok(value)` when nothing was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        f.write_str(&parts.join("; "))
    }
}

/// Schema check for a form. Returns the cleaned value on success.
pub trait Validate: Sized {
    fn validate(self) -> Result<Self, FieldErrors>;
}

#[derive(Debug, Clone, Error)]
pub enum SubmitError {
    #[error("form is invalid: {0}")]
    Invalid(FieldErrors),
    #[error(transparent)]
    Rejected(#[from] AppError),
    #[error("cancelled by user")]
    Declined,
}

impl SubmitError {
    pub fn app_error(&self) -> Option<&AppError> {
        match self {
            SubmitError::Rejected(err) => Some(err),
            _ => None,
        }
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            SubmitError::Invalid(errors) => Some(errors),
            _ => None,
        }
    }
}

/// Remove `null`s recursively; absent optional fields must not reach the store.
pub fn strip_undefined(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(strip_map(map)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|v| !v.is_null())
                .map(strip_undefined)
                .collect(),
        ),
        other => other,
    }
}

pub fn strip_map(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k, strip_undefined(v)))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteAction {
    Create(CollectionRef, Map<String, Value>),
    Update(DocRef, Map<String, Value>),
    Set(DocRef, Map<String, Value>),
    Delete(DocRef),
}

impl WriteAction {
    pub fn kind(&self) -> OperationKind {
        match self {
            WriteAction::Create(..) => OperationKind::Create,
            WriteAction::Update(..) => OperationKind::Update,
            WriteAction::Set(..) => OperationKind::Set,
            WriteAction::Delete(_) => OperationKind::Delete,
        }
    }

    pub fn path(&self) -> String {
        match self {
            WriteAction::Create(collection, _) => collection.path(),
            WriteAction::Update(doc, _) | WriteAction::Set(doc, _) | WriteAction::Delete(doc) => {
                doc.path()
            }
        }
    }

    fn owner(&self) -> &str {
        match self {
            WriteAction::Create(collection, _) => collection.owner().as_str(),
            WriteAction::Update(doc, _) | WriteAction::Set(doc, _) | WriteAction::Delete(doc) => {
                doc.owner().as_str()
            }
        }
    }

    fn entity(&self) -> &'static str {
        match self {
            WriteAction::Create(collection, _) => collection.collection().as_str(),
            WriteAction::Update(doc, _) | WriteAction::Set(doc, _) | WriteAction::Delete(doc) => {
                doc.collection().collection().as_str()
            }
        }
    }

    fn attempted_data(&self) -> Option<Value> {
        match self {
            WriteAction::Create(_, data) | WriteAction::Update(_, data) | WriteAction::Set(_, data) => {
                Some(Value::Object(data.clone()))
            }
            WriteAction::Delete(_) => None,
        }
    }

    /// Attach a body produced from a validated form. Deletes ignore it.
    fn with_body(self, body: Map<String, Value>) -> Self {
        match self {
            WriteAction::Create(c, _) => WriteAction::Create(c, body),
            WriteAction::Update(d, _) => WriteAction::Update(d, body),
            WriteAction::Set(d, _) => WriteAction::Set(d, body),
            delete @ WriteAction::Delete(_) => delete,
        }
    }
}

/// Where to go once the write succeeded.
pub enum Redirect {
    Stay,
    To(Route),
    /// Built from the id of the written document.
    ToWritten(Box<dyn Fn(&str) -> Route + Send + Sync>),
}

impl Redirect {
    pub fn to_written(f: impl Fn(&str) -> Route + Send + Sync + 'static) -> Self {
        Redirect::ToWritten(Box::new(f))
    }

    fn resolve(&self, written_id: Option<&str>) -> Option<Route> {
        match self {
            Redirect::Stay => None,
            Redirect::To(route) => Some(route.clone()),
            Redirect::ToWritten(build) => written_id.map(|id| build(id)),
        }
    }
}

impl fmt::Debug for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Redirect::Stay => f.write_str("Stay"),
            Redirect::To(route) => f.debug_tuple("To").field(route).finish(),
            Redirect::ToWritten(_) => f.write_str("ToWritten(..)"),
        }
    }
}

/// Success toast and follow-up route for one operation.
#[derive(Debug)]
pub struct Feedback {
    pub toast: Toast,
    pub redirect: Redirect,
}

impl Feedback {
    pub fn new(title: impl Into<String>, description: impl Into<String>, redirect: Redirect) -> Self {
        Self {
            toast: Toast::success(title, description),
            redirect,
        }
    }
}

/// The UI surface the pipeline talks to.
#[derive(Clone)]
pub struct UiPorts {
    pub notifier: Arc<dyn Notifier>,
    pub navigator: Arc<dyn Navigator>,
    pub reporter: Arc<dyn AccessErrorReporter>,
    pub confirmer: Arc<dyn Confirmer>,
}

impl UiPorts {
    /// All four ports backed by one recorder.
    pub fn recording(recorder: Arc<RecordingUi>) -> Self {
        Self {
            notifier: recorder.clone(),
            navigator: recorder.clone(),
            reporter: recorder.clone(),
            confirmer: recorder,
        }
    }
}

#[derive(Clone)]
pub struct MutationPipeline<S> {
    store: S,
    ui: UiPorts,
}

impl<S: DocumentStore> MutationPipeline<S> {
    pub fn new(store: S, ui: UiPorts) -> Self {
        Self { store, ui }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ui(&self) -> &UiPorts {
        &self.ui
    }

    pub fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        self.ui.confirmer.confirm(prompt)
    }

    /// Validate `form`, write it as `action`'s body and report the outcome.
    /// A form that fails validation never reaches the store.
    pub async fn submit<F>(
        &self,
        op: &'static str,
        form: F,
        action: WriteAction,
        feedback: Feedback,
    ) -> Result<Document, SubmitError>
    where
        F: Validate + Serialize,
    {
        let valid = self.validate(op, &action, form)?;
        let body = self.body_of(op, &action, &valid)?;
        let written = self.execute(op, action.with_body(body), feedback).await?;
        written.ok_or_else(no_document)
    }

    /// Replace an existing document with `form`. Fields named in `kept` (and
    /// `createdAt`) come from the stored document instead of the form, so state
    /// owned by other flows, such as a lifecycle status, survives the edit.
    /// Optional fields the form leaves empty are removed from the document.
    pub async fn submit_edit<F>(
        &self,
        op: &'static str,
        form: F,
        doc: DocRef,
        kept: &[&str],
        feedback: Feedback,
    ) -> Result<Document, SubmitError>
    where
        F: Validate + Serialize,
    {
        let action = WriteAction::Set(doc.clone(), Map::new());
        let valid = self.validate(op, &action, form)?;
        let mut body = self.body_of(op, &action, &valid)?;
        let existing = match self.store.get(&doc).await {
            Ok(Some(existing)) => existing,
            Ok(None) => return Err(self.fail(op, &action, AppError::not_found(doc.path()))),
            Err(err) => return Err(self.fail(op, &action.with_body(body), err)),
        };
        for field in kept.iter().copied().chain([CREATED_AT]) {
            match existing.data.get(field) {
                Some(value) => body.insert(field.to_string(), value.clone()),
                None => body.remove(field),
            };
        }
        let written = self.execute(op, WriteAction::Set(doc, body), feedback).await?;
        written.ok_or_else(no_document)
    }

    /// Run the form's validator behind the panic fence. Field errors are
    /// returned without touching the store or the notifier.
    pub fn validate<F: Validate>(
        &self,
        op: &'static str,
        action: &WriteAction,
        form: F,
    ) -> Result<F, SubmitError> {
        match dispatch_with_fence(|| form.validate()) {
            Ok(Ok(valid)) => Ok(valid),
            Ok(Err(errors)) => {
                let scope = OpScope::new(op, Some(action.owner()), Some(action.entity()));
                let fields: Vec<&str> = errors.fields().collect();
                scope.warn(json!({ "stage": "validate", "fields": fields }));
                Err(SubmitError::Invalid(errors))
            }
            Err(panic) => Err(self.fail(op, action, panic)),
        }
    }

    fn body_of<F: Serialize>(
        &self,
        op: &'static str,
        action: &WriteAction,
        valid: &F,
    ) -> Result<Map<String, Value>, SubmitError> {
        to_fields(valid)
            .map(strip_map)
            .map_err(|err| self.fail(op, action, err))
    }

    /// Run a write that needs no validation (status flips, deletes). Returns the
    /// written document, or `None` for deletes.
    pub async fn execute(
        &self,
        op: &'static str,
        action: WriteAction,
        feedback: Feedback,
    ) -> Result<Option<Document>, SubmitError> {
        let scope = OpScope::new(op, Some(action.owner()), Some(action.entity()));
        let action = match action {
            WriteAction::Create(c, data) => WriteAction::Create(c, strip_map(data)),
            WriteAction::Update(d, data) => WriteAction::Update(d, strip_map(data)),
            WriteAction::Set(d, data) => WriteAction::Set(d, strip_map(data)),
            delete @ WriteAction::Delete(_) => delete,
        };

        let store = &self.store;
        let outcome = dispatch_async_app_result(|| async {
            match &action {
                WriteAction::Create(collection, data) => {
                    store.create(collection, data.clone()).await.map(Some)
                }
                WriteAction::Update(doc, data) => store.update(doc, data.clone()).await.map(Some),
                WriteAction::Set(doc, data) => store.set(doc, data.clone()).await.map(Some),
                WriteAction::Delete(doc) => store.delete(doc).await.map(|_| None),
            }
        })
        .await;

        match outcome {
            Ok(written) => {
                let written_id = written.as_ref().map(|doc| doc.id().to_string());
                scope.success(json!({
                    "kind": action.kind(),
                    "path": action.path(),
                    "id": written_id,
                }));
                self.ui.notifier.notify(feedback.toast);
                if let Some(route) = feedback.redirect.resolve(written_id.as_deref()) {
                    self.ui.navigator.navigate(route);
                }
                Ok(written)
            }
            Err(err) => {
                scope.fail(&err);
                Err(self.surface(&action, err))
            }
        }
    }

    /// Report a failure that happened before the store was reached.
    pub fn fail(&self, op: &'static str, action: &WriteAction, err: AppError) -> SubmitError {
        OpScope::new(op, Some(action.owner()), Some(action.entity())).fail(&err);
        self.surface(action, err)
    }

    fn surface(&self, action: &WriteAction, err: AppError) -> SubmitError {
        if err.class() == ErrorClass::Permission {
            self.ui.reporter.report(AccessErrorContext {
                path: err
                    .context()
                    .get("path")
                    .cloned()
                    .unwrap_or_else(|| action.path()),
                operation: action.kind(),
                attempted_data: action.attempted_data(),
            });
        }
        self.ui.notifier.notify(Toast::for_failure(&err));
        SubmitError::Rejected(err)
    }
}

fn no_document() -> SubmitError {
    SubmitError::Rejected(AppError::new("STORE/NO_DOCUMENT", "Write returned no document"))
}

/// Records every toast, navigation, access report and confirmation. Answers
/// confirmations from a script, defaulting to "no".
#[derive(Debug, Default)]
pub struct RecordingUi {
    toasts: Mutex<Vec<Toast>>,
    routes: Mutex<Vec<Route>>,
    reports: Mutex<Vec<AccessErrorContext>>,
    prompts: Mutex<Vec<ConfirmPrompt>>,
    answers: Mutex<Vec<bool>>,
}

impl RecordingUi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue answers for upcoming confirmations, first in first out.
    pub fn answer(&self, answers: &[bool]) {
        if let Ok(mut queue) = self.answers.lock() {
            queue.extend_from_slice(answers);
        }
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn routes(&self) -> Vec<Route> {
        self.routes.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn reports(&self) -> Vec<AccessErrorContext> {
        self.reports.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn prompts(&self) -> Vec<ConfirmPrompt> {
        self.prompts.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl Notifier for RecordingUi {
    fn notify(&self, toast: Toast) {
        if let Ok(mut toasts) = self.toasts.lock() {
            toasts.push(toast);
        }
    }
}

impl Navigator for RecordingUi {
    fn navigate(&self, route: Route) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.push(route);
        }
    }
}

impl AccessErrorReporter for RecordingUi {
    fn report(&self, context: AccessErrorContext) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(context);
        }
    }
}

impl Confirmer for RecordingUi {
    fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.clone());
        }
        match self.answers.lock() {
            Ok(mut queue) if !queue.is_empty() => queue.remove(0),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::codes;
    use crate::locator;
    use crate::session::OwnerId;
    use crate::store::MemoryStore;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct NoteForm {
        title: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        body: Option<String>,
        tags: Vec<Option<String>>,
    }

    impl Validate for NoteForm {
        fn validate(mut self) -> Result<Self, FieldErrors> {
            let mut errors = FieldErrors::new();
            self.title = self.title.trim().to_string();
            if self.title.is_empty() {
                errors.add("title", "Title is required");
            }
            errors.into_result(self)
        }
    }

    fn pipeline() -> (MemoryStore, Arc<RecordingUi>, MutationPipeline<MemoryStore>) {
        let store = MemoryStore::new();
        let ui = RecordingUi::new();
        let pipeline = MutationPipeline::new(store.clone(), UiPorts::recording(ui.clone()));
        (store, ui, pipeline)
    }

    fn owner() -> OwnerId {
        OwnerId::parse("o1").unwrap()
    }

    #[test]
    fn strip_removes_nested_nulls() {
        let cleaned = strip_undefined(json!({
            "a": null,
            "b": {"c": null, "d": 1},
            "e": [null, {"f": null}]
        }));
        assert_eq!(cleaned, json!({"b": {"d": 1}, "e": [{}]}));
    }

    #[tokio::test]
    async fn invalid_form_never_writes() {
        let (store, ui, pipeline) = pipeline();
        let o = owner();
        let form = NoteForm {
            title: "   ".into(),
            body: None,
            tags: vec![],
        };
        let err = pipeline
            .submit(
                "note_create",
                form,
                WriteAction::Create(locator::contractors(Some(&o)).unwrap(), Map::new()),
                Feedback::new("Saved", "", Redirect::To(Route::Contractors)),
            )
            .await
            .unwrap_err();
        assert_eq!(err.field_errors().and_then(|e| e.get("title")), Some("Title is required"));
        assert_eq!(store.write_count(), 0);
        assert!(ui.toasts().is_empty());
        assert!(ui.routes().is_empty());
    }

    #[derive(Debug, Serialize)]
    struct ExplodingForm;

    impl Validate for ExplodingForm {
        fn validate(self) -> Result<Self, FieldErrors> {
            panic!("validator blew up")
        }
    }

    #[tokio::test]
    async fn panicking_validator_is_reported_not_propagated() {
        let (store, ui, pipeline) = pipeline();
        let o = owner();
        let err = pipeline
            .submit(
                "note_create",
                ExplodingForm,
                WriteAction::Create(locator::contractors(Some(&o)).unwrap(), Map::new()),
                Feedback::new("Saved", "", Redirect::Stay),
            )
            .await
            .unwrap_err();
        assert_eq!(err.app_error().map(AppError::code), Some(codes::PANIC));
        assert_eq!(store.write_count(), 0);
        assert_eq!(ui.toasts().last().map(|t| t.tone), Some(ToastTone::Error));
    }

    #[tokio::test]
    async fn edit_keeps_named_fields_and_clears_emptied_ones() {
        let (store, ui, pipeline) = pipeline();
        let o = owner();
        let doc = locator::contractor(Some(&o), Some("c1")).unwrap();
        store
            .set(
                &doc,
                json!({"title": "Old", "body": "stale", "status": "Archived", "createdAt": 5, "tags": []})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .await
            .unwrap();
        let form = NoteForm {
            title: "New".into(),
            body: None,
            tags: vec![],
        };
        let written = pipeline
            .submit_edit(
                "note_update",
                form,
                doc.clone(),
                &["status"],
                Feedback::new("Saved", "", Redirect::Stay),
            )
            .await
            .unwrap();
        assert_eq!(written.data["title"], json!("New"));
        assert_eq!(written.data["status"], json!("Archived"));
        assert_eq!(written.data["createdAt"], json!(5));
        assert!(!written.data.contains_key("body"));
        assert!(ui.routes().is_empty());

        let missing = locator::contractor(Some(&o), Some("nope")).unwrap();
        let err = pipeline
            .submit_edit(
                "note_update",
                NoteForm { title: "X".into(), body: None, tags: vec![] },
                missing,
                &[],
                Feedback::new("Saved", "", Redirect::Stay),
            )
            .await
            .unwrap_err();
        assert_eq!(err.app_error().map(AppError::code), Some(codes::NOT_FOUND));
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn success_toasts_and_redirects_to_written_id() {
        let (store, ui, pipeline) = pipeline();
        let o = owner();
        let form = NoteForm {
            title: " Boiler ".into(),
            body: None,
            tags: vec![Some("gas".into()), None],
        };
        let doc = pipeline
            .submit(
                "note_create",
                form,
                WriteAction::Create(locator::contractors(Some(&o)).unwrap(), Map::new()),
                Feedback::new(
                    "Saved",
                    "Your note was saved.",
                    Redirect::to_written(|id| Route::Contractor {
                        contractor_id: id.to_string(),
                    }),
                ),
            )
            .await
            .unwrap();
        assert_eq!(doc.data["title"], json!("Boiler"));
        assert_eq!(doc.data["tags"], json!(["gas"]));
        assert_eq!(store.write_count(), 1);
        assert_eq!(ui.toasts()[0].tone, ToastTone::Success);
        assert_eq!(
            ui.routes(),
            vec![Route::Contractor {
                contractor_id: doc.id().to_string()
            }]
        );
    }

    #[tokio::test]
    async fn permission_failure_goes_to_reporter() {
        let (store, ui, pipeline) = pipeline();
        let o = owner();
        store.deny_writes_under("owners/o1/contractors");
        let doc = locator::contractor(Some(&o), Some("c1")).unwrap();
        let mut patch = Map::new();
        patch.insert("status".into(), json!("Archived"));

        let err = pipeline
            .execute(
                "contractor_archive",
                WriteAction::Set(doc, patch),
                Feedback::new("Archived", "", Redirect::Stay),
            )
            .await
            .unwrap_err();
        assert_eq!(err.app_error().map(AppError::code), Some(codes::PERMISSION_DENIED));

        let reports = ui.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].path, "owners/o1/contractors/c1");
        assert_eq!(reports[0].operation, OperationKind::Set);
        assert_eq!(reports[0].attempted_data, Some(json!({"status": "Archived"})));
        assert_eq!(ui.toasts()[0].title, "Permission denied");
        assert!(ui.routes().is_empty());
    }

    #[tokio::test]
    async fn transient_failure_toasts_without_report() {
        let (store, ui, pipeline) = pipeline();
        let o = owner();
        store.fail_next_write(AppError::new("NET/OFFLINE", "Network unavailable."));
        let err = pipeline
            .execute(
                "contractor_create",
                WriteAction::Create(locator::contractors(Some(&o)).unwrap(), Map::new()),
                Feedback::new("Saved", "", Redirect::Stay),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Rejected(_)));
        assert!(ui.reports().is_empty());
        assert_eq!(ui.toasts()[0].title, "Something went wrong");
        assert!(ui.toasts()[0].description.contains("try again"));
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn recorder_answers_in_order_then_declines() {
        let ui = RecordingUi::new();
        ui.answer(&[true, false]);
        let prompt = ConfirmPrompt::new("t", "d", "ok");
        assert!(ui.confirm(&prompt));
        assert!(!ui.confirm(&prompt));
        assert!(!ui.confirm(&prompt));
        assert_eq!(ui.prompts().len(), 3);
    }
}
