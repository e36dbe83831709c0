use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;
use validator::Validate;

use super::plan_service::{PlanService, UsageMeter};
use crate::database::models::{AutomationInstance, Plan, Subscription, SubscriptionStatus, Tenant, User};
use crate::database::{Repository, Store};
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdateTenantRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(url)]
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantCounts {
    pub users: i64,
    pub automations: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionWithPlan {
    #[serde(flatten)]
    pub subscription: Subscription,
    pub plan: Plan,
}

/// A tenant with its subscription and member counts.
#[derive(Debug, Clone, Serialize)]
pub struct TenantDetails {
    #[serde(flatten)]
    pub tenant: Tenant,
    pub subscription: Option<SubscriptionWithPlan>,
    pub counts: TenantCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct AutomationCounts {
    pub total: i64,
    pub active: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionSummary {
    pub status: SubscriptionStatus,
    pub current_period_end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantStats {
    pub users: i64,
    pub automations: AutomationCounts,
    pub executions: UsageMeter,
    pub plan: String,
    pub subscription: Option<SubscriptionSummary>,
}

pub struct TenantService {
    store: Arc<dyn Store>,
}

impl TenantService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    fn tenants(&self) -> Repository<Tenant> {
        Repository::catalog(self.store.clone())
    }

    pub async fn find_by_id(&self, tenant_id: Uuid) -> Result<TenantDetails, ApiError> {
        let tenant = self
            .tenants()
            .find_unique(tenant_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Tenant not found"))?;

        let subscription = PlanService::new(self.store.clone())
            .subscription_for(tenant_id)
            .await?
            .map(|(subscription, plan)| SubscriptionWithPlan { subscription, plan });
        let users = Repository::<User>::for_tenant(self.store.clone(), tenant_id).count(None).await?;
        let automations = Repository::<AutomationInstance>::for_tenant(self.store.clone(), tenant_id)
            .count(None)
            .await?;

        Ok(TenantDetails {
            tenant,
            subscription,
            counts: TenantCounts { users, automations },
        })
    }

    pub async fn update(&self, tenant_id: Uuid, request: UpdateTenantRequest) -> Result<Tenant, ApiError> {
        let mut patch = Map::new();
        if let Some(name) = request.name {
            patch.insert("name".into(), json!(name.trim()));
        }
        if let Some(email) = request.email {
            patch.insert("email".into(), json!(email.trim().to_lowercase()));
        }
        if let Some(logo) = request.logo {
            patch.insert("logo".into(), json!(logo));
        }

        let tenants = self.tenants();
        if patch.is_empty() {
            return tenants
                .find_unique(tenant_id)
                .await?
                .ok_or_else(|| ApiError::not_found("Tenant not found"));
        }
        tenants
            .update(tenant_id, Value::Object(patch))
            .await?
            .ok_or_else(|| ApiError::not_found("Tenant not found"))
    }

    pub async fn stats(&self, tenant_id: Uuid) -> Result<TenantStats, ApiError> {
        let plans = PlanService::new(self.store.clone());
        let automations = Repository::<AutomationInstance>::for_tenant(self.store.clone(), tenant_id);

        let users = Repository::<User>::for_tenant(self.store.clone(), tenant_id);

        let (users, total, active, executions, subscription) = tokio::try_join!(
            async { users.count(None).await.map_err(ApiError::from) },
            async { automations.count(None).await.map_err(ApiError::from) },
            plans.active_workflows(tenant_id, None),
            plans.executions_this_month(tenant_id),
            plans.subscription_for(tenant_id),
        )?;

        let limit = subscription.as_ref().map(|(_, plan)| plan.max_executions_per_month).unwrap_or(0);
        Ok(TenantStats {
            users,
            automations: AutomationCounts { total, active },
            executions: UsageMeter::new(executions, limit),
            plan: subscription
                .as_ref()
                .map(|(_, plan)| plan.name.clone())
                .unwrap_or_else(|| "Free".to_string()),
            subscription: subscription.map(|(subscription, _)| SubscriptionSummary {
                status: subscription.status,
                current_period_end: subscription.current_period_end,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{seed_catalog, MemoryStore};
    use crate::services::auth_service::{AuthService, RegisterRequest};

    async fn registered() -> (Arc<dyn Store>, Uuid) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        seed_catalog(store.clone()).await.unwrap();
        let session = AuthService::new(store.clone())
            .register(RegisterRequest {
                name: "Owner".into(),
                email: "owner@acme.test".into(),
                password: "password123".into(),
                company_name: "Acme".into(),
            })
            .await
            .unwrap();
        (store, session.tenant.id)
    }

    #[tokio::test]
    async fn details_include_subscription_and_counts() {
        let (store, tenant_id) = registered().await;
        let details = TenantService::new(store).find_by_id(tenant_id).await.unwrap();
        assert_eq!(details.counts.users, 1);
        assert_eq!(details.subscription.unwrap().plan.slug, "start");
    }

    #[tokio::test]
    async fn stats_report_plan_and_usage() {
        let (store, tenant_id) = registered().await;
        let stats = TenantService::new(store).stats(tenant_id).await.unwrap();
        assert_eq!(stats.plan, "Start");
        assert_eq!(stats.executions.limit, 500);
        assert_eq!(stats.automations.total, 0);
    }

    #[tokio::test]
    async fn update_changes_only_given_fields() {
        let (store, tenant_id) = registered().await;
        let service = TenantService::new(store);
        let updated = service
            .update(
                tenant_id,
                UpdateTenantRequest {
                    name: Some("Acme AG".into()),
                    ..UpdateTenantRequest::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Acme AG");
        assert_eq!(updated.slug, "acme");
    }
}
