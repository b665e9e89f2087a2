//! Backend trait definition.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{EntityPayload, FullPlan, Level};

/// Trait for plan persistence backends.
#[async_trait]
pub trait PlanBackend: Send + Sync {
    /// Fetches the full nested plan.
    async fn fetch_plan(&self, plan_id: &str) -> Result<FullPlan>;

    /// Creates one entity and returns its backend-assigned id.
    ///
    /// The payload's parent id must already be a persisted id.
    async fn create_entity(&self, payload: &EntityPayload) -> Result<String>;

    /// Deletes one entity. The backend cascades to its descendants.
    async fn delete_entity(&self, level: Level, id: &str) -> Result<()>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}

#[async_trait]
impl PlanBackend for Box<dyn PlanBackend> {
    async fn fetch_plan(&self, plan_id: &str) -> Result<FullPlan> {
        (**self).fetch_plan(plan_id).await
    }

    async fn create_entity(&self, payload: &EntityPayload) -> Result<String> {
        (**self).create_entity(payload).await
    }

    async fn delete_entity(&self, level: Level, id: &str) -> Result<()> {
        (**self).delete_entity(level, id).await
    }

    fn backend_type(&self) -> &'static str {
        (**self).backend_type()
    }
}
