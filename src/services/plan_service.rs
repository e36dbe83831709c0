use std::sync::Arc;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::database::models::{
    AutomationExecution, AutomationInstance, AutomationStatus, Plan, Subscription, SubscriptionStatus,
};
use crate::database::{Repository, Store};
use crate::error::ApiError;
use crate::filter::FilterData;

#[derive(Debug, Clone, Serialize)]
pub struct UsageMeter {
    pub used: i64,
    pub limit: i64,
    pub percent_used: i64,
}

impl UsageMeter {
    pub fn new(used: i64, limit: i64) -> Self {
        Self {
            used,
            limit,
            percent_used: percent(used, limit),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Usage {
    pub executions: UsageMeter,
    pub workflows: UsageMeter,
}

/// A tenant's subscription with its plan and current consumption.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionUsage {
    #[serde(flatten)]
    pub subscription: Subscription,
    pub plan: Plan,
    pub usage: Usage,
}

pub struct PlanService {
    store: Arc<dyn Store>,
}

impl PlanService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    fn plans(&self) -> Repository<Plan> {
        Repository::catalog(self.store.clone())
    }

    /// Active public plans, cheapest first.
    pub async fn list_public(&self) -> Result<Vec<Plan>, ApiError> {
        let filter = FilterData::matching(json!({ "is_active": true, "is_public": true })).order_by("price_monthly asc");
        Ok(self.plans().find_many(filter).await?)
    }

    pub async fn find_by_slug(&self, slug: &str) -> Result<Plan, ApiError> {
        self.plans()
            .find_first(FilterData::matching(json!({ "slug": slug })))
            .await?
            .ok_or_else(|| ApiError::not_found("Plan not found"))
    }

    /// The tenant's subscription and the plan it is on, if any.
    pub async fn subscription_for(&self, tenant_id: Uuid) -> Result<Option<(Subscription, Plan)>, ApiError> {
        let subscriptions = Repository::<Subscription>::for_tenant(self.store.clone(), tenant_id);
        let Some(subscription) = subscriptions.find_first(FilterData::default()).await? else {
            return Ok(None);
        };
        let plan = self
            .plans()
            .find_unique(subscription.plan_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Plan not found"))?;
        Ok(Some((subscription, plan)))
    }

    pub async fn subscription_usage(&self, tenant_id: Uuid) -> Result<SubscriptionUsage, ApiError> {
        let (subscription, plan) = self
            .subscription_for(tenant_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Subscription not found"))?;

        let executions = self.executions_this_month(tenant_id).await?;
        let active = self.active_workflows(tenant_id, None).await?;

        Ok(SubscriptionUsage {
            usage: Usage {
                executions: UsageMeter::new(executions, plan.max_executions_per_month),
                workflows: UsageMeter::new(active, plan.max_workflows),
            },
            subscription,
            plan,
        })
    }

    pub async fn executions_this_month(&self, tenant_id: Uuid) -> Result<i64, ApiError> {
        let executions = Repository::<AutomationExecution>::for_tenant(self.store.clone(), tenant_id);
        let since = month_start(Utc::now());
        Ok(executions.count(Some(json!({ "started_at": { "$gte": since } }))).await?)
    }

    /// ACTIVE automations, optionally leaving one out of the count.
    pub async fn active_workflows(&self, tenant_id: Uuid, excluding: Option<Uuid>) -> Result<i64, ApiError> {
        let automations = Repository::<AutomationInstance>::for_tenant(self.store.clone(), tenant_id);
        let where_clause = match excluding {
            Some(id) => json!({ "$and": [
                { "status": AutomationStatus::Active.as_str() },
                { "id": { "$ne": id } }
            ]}),
            None => json!({ "status": AutomationStatus::Active.as_str() }),
        };
        Ok(automations.count(Some(where_clause)).await?)
    }

    /// Fails with a plan-limit error unless the tenant may run another
    /// execution this month.
    pub async fn check_execution_quota(&self, tenant_id: Uuid) -> Result<(), ApiError> {
        let (subscription, plan) = self
            .subscription_for(tenant_id)
            .await?
            .ok_or_else(|| ApiError::plan_limit_exceeded("No subscription found"))?;

        if !matches!(subscription.status, SubscriptionStatus::Active | SubscriptionStatus::Trialing) {
            return Err(ApiError::plan_limit_exceeded("Subscription is not active"));
        }

        let used = self.executions_this_month(tenant_id).await?;
        if used >= plan.max_executions_per_month {
            return Err(ApiError::plan_limit_exceeded(format!(
                "Limit of {} executions per month reached",
                plan.max_executions_per_month
            )));
        }
        Ok(())
    }

    /// Fails with a plan-limit error when activating one more workflow would
    /// exceed the plan. `automation_id` is the one being activated.
    pub async fn check_workflow_limit(&self, tenant_id: Uuid, automation_id: Uuid) -> Result<(), ApiError> {
        let (_, plan) = self
            .subscription_for(tenant_id)
            .await?
            .ok_or_else(|| ApiError::plan_limit_exceeded("No subscription found"))?;

        let active = self.active_workflows(tenant_id, Some(automation_id)).await?;
        if active >= plan.max_workflows {
            return Err(ApiError::plan_limit_exceeded(format!(
                "Limit of {} active workflows reached. Upgrade your plan.",
                plan.max_workflows
            )));
        }
        Ok(())
    }

    pub async fn check_user_limit(&self, tenant_id: Uuid, current_users: i64) -> Result<(), ApiError> {
        let Some((_, plan)) = self.subscription_for(tenant_id).await? else {
            return Ok(());
        };
        if current_users >= plan.max_users {
            return Err(ApiError::plan_limit_exceeded(format!(
                "Limit of {} users reached. Upgrade your plan.",
                plan.max_users
            )));
        }
        Ok(())
    }
}

/// Midnight UTC on the first day of `now`'s month.
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

fn percent(used: i64, limit: i64) -> i64 {
    if limit <= 0 {
        return 0;
    }
    ((used as f64 / limit as f64) * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{seed_catalog, MemoryStore};

    async fn seeded() -> Arc<dyn Store> {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        seed_catalog(store.clone()).await.unwrap();
        store
    }

    #[tokio::test]
    async fn public_plans_are_sorted_by_price() {
        let service = PlanService::new(seeded().await);
        let slugs: Vec<String> = service.list_public().await.unwrap().into_iter().map(|p| p.slug).collect();
        assert_eq!(slugs, vec!["start", "professional", "business", "enterprise"]);
    }

    #[tokio::test]
    async fn unknown_slug_is_not_found() {
        let service = PlanService::new(seeded().await);
        assert_eq!(service.find_by_slug("gold").await.unwrap_err().status_code(), 404);
        assert_eq!(service.find_by_slug("business").await.unwrap().max_workflows, 100);
    }

    #[tokio::test]
    async fn missing_subscription_blocks_execution() {
        let service = PlanService::new(seeded().await);
        let err = service.check_execution_quota(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.error_code(), "PLAN_LIMIT_EXCEEDED");
    }

    #[test]
    fn month_start_is_first_midnight() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 15, 30, 0).unwrap();
        assert_eq!(month_start(now), Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn percent_rounds_and_handles_zero_limit() {
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(5, 0), 0);
    }
}
