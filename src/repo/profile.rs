use serde_json::Map;

use super::{fetch, located};
use crate::locator::{self, DocRef};
use crate::model::profile::{BillingPlan, OwnerProfile};
use crate::mutation::{Feedback, MutationPipeline, Redirect, SubmitError, WriteAction};
use crate::route::Route;
use crate::session::OwnerId;
use crate::store::{Document, DocumentStore};
use crate::AppResult;

fn doc_ref(owner: &OwnerId) -> AppResult<DocRef> {
    located(locator::profile(Some(owner)), "owner", owner.as_str())
}

/// The owner's profile, or the free-plan default when none was saved yet.
pub async fn load<S: DocumentStore>(store: &S, owner: &OwnerId) -> AppResult<OwnerProfile> {
    Ok(fetch::<_, OwnerProfile>(store, &doc_ref(owner)?)
        .await?
        .map(|record| record.value)
        .unwrap_or_default())
}

pub async fn select_plan<S: DocumentStore>(
    pipeline: &MutationPipeline<S>,
    owner: &OwnerId,
    plan: BillingPlan,
) -> Result<Document, SubmitError> {
    let mut profile = load(pipeline.store(), owner).await?;
    profile.plan = plan;
    pipeline
        .submit(
            "billing_plan_select",
            profile,
            WriteAction::Set(doc_ref(owner)?, Map::new()),
            Feedback::new(
                "Plan updated",
                format!("You are now on the {} plan.", plan.as_str()),
                Redirect::To(Route::Dashboard),
            ),
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::{RecordingUi, UiPorts};
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn missing_profile_loads_as_free() {
        let store = MemoryStore::new();
        let owner = OwnerId::parse("o1").unwrap();
        assert_eq!(load(&store, &owner).await.unwrap().plan, BillingPlan::Free);
    }

    #[tokio::test]
    async fn selecting_a_plan_persists_and_returns_to_dashboard() {
        let store = MemoryStore::new();
        let ui = RecordingUi::new();
        let pipeline = MutationPipeline::new(store.clone(), UiPorts::recording(ui.clone()));
        let owner = OwnerId::parse("o1").unwrap();

        select_plan(&pipeline, &owner, BillingPlan::Starter).await.unwrap();
        assert_eq!(load(&store, &owner).await.unwrap().plan, BillingPlan::Starter);
        assert_eq!(ui.routes(), vec![Route::Dashboard]);
    }
}
