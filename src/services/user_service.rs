use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;
use validator::Validate;

use super::plan_service::PlanService;
use crate::auth::hash_password;
use crate::database::models::{User, UserRole, UserStatus};
use crate::database::{Repository, Store};
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::tenant::TenantContext;

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateUserRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
    pub role: Option<UserRole>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: Option<String>,
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    #[validate(url)]
    pub avatar: Option<String>,
}

/// Tenant user management. Every call is confined to the acting tenant.
pub struct UserService {
    store: Arc<dyn Store>,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    fn users(&self, context: &TenantContext) -> Repository<User> {
        Repository::for_tenant(self.store.clone(), context.tenant_id)
    }

    pub async fn list(&self, context: &TenantContext) -> Result<Vec<User>, ApiError> {
        let filter = FilterData::default().order_by("created_at asc");
        Ok(self.users(context).find_many(filter).await?)
    }

    pub async fn find_by_id(&self, context: &TenantContext, id: Uuid) -> Result<User, ApiError> {
        self.users(context)
            .find_unique(id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    pub async fn me(&self, context: &TenantContext) -> Result<User, ApiError> {
        let user_id = acting_user(context)?;
        self.find_by_id(context, user_id).await
    }

    pub async fn create(&self, context: &TenantContext, request: CreateUserRequest) -> Result<User, ApiError> {
        let role = request.role.unwrap_or(UserRole::Member);
        if role == UserRole::Owner {
            return Err(ApiError::forbidden("Cannot create another OWNER"));
        }
        if role == UserRole::Admin && context.user_role != Some(UserRole::Owner) {
            return Err(ApiError::forbidden("Only the OWNER can create admins"));
        }

        let email = request.email.trim().to_lowercase();
        self.ensure_email_free(&email).await?;

        let users = self.users(context);
        let current = users.count(None).await?;
        PlanService::new(self.store.clone())
            .check_user_limit(context.tenant_id, current)
            .await?;

        let user = users
            .create(json!({
                "email": email,
                "password_hash": hash_password(&request.password)?,
                "name": request.name.trim(),
                "role": role.as_str(),
                "status": UserStatus::Active.as_str(),
            }))
            .await?;
        tracing::info!(tenant_id = %context.tenant_id, user_id = %user.id, "User created");
        Ok(user)
    }

    pub async fn update(&self, context: &TenantContext, id: Uuid, request: UpdateUserRequest) -> Result<User, ApiError> {
        let acting = acting_user(context)?;
        let target = self.find_by_id(context, id).await?;

        if target.role == UserRole::Owner && acting != id {
            return Err(ApiError::forbidden("Cannot modify the OWNER"));
        }
        if request.role.is_some() && context.user_role != Some(UserRole::Owner) {
            return Err(ApiError::forbidden("Only the OWNER can change roles"));
        }
        if request.role == Some(UserRole::Owner) {
            return Err(ApiError::forbidden("Cannot become OWNER"));
        }

        let mut patch = Map::new();
        if let Some(name) = request.name {
            patch.insert("name".into(), json!(name.trim()));
        }
        if let Some(email) = request.email {
            let email = email.trim().to_lowercase();
            if email != target.email {
                self.ensure_email_free(&email).await?;
            }
            patch.insert("email".into(), json!(email));
        }
        if let Some(password) = request.password {
            patch.insert("password_hash".into(), json!(hash_password(&password)?));
        }
        if let Some(role) = request.role {
            patch.insert("role".into(), json!(role));
        }
        if let Some(status) = request.status {
            patch.insert("status".into(), json!(status));
        }
        if let Some(avatar) = request.avatar {
            patch.insert("avatar".into(), json!(avatar));
        }
        if patch.is_empty() {
            return Ok(target);
        }

        self.users(context)
            .update(id, Value::Object(patch))
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    /// Self-service profile update: no role or status changes.
    pub async fn update_me(&self, context: &TenantContext, request: UpdateUserRequest) -> Result<User, ApiError> {
        let user_id = acting_user(context)?;
        let request = UpdateUserRequest {
            role: None,
            status: None,
            ..request
        };
        self.update(context, user_id, request).await
    }

    pub async fn remove(&self, context: &TenantContext, id: Uuid) -> Result<Value, ApiError> {
        let acting = acting_user(context)?;
        let target = self.find_by_id(context, id).await?;

        if acting == id {
            return Err(ApiError::forbidden("Cannot delete your own account"));
        }
        if target.role == UserRole::Owner {
            return Err(ApiError::forbidden("Cannot delete the OWNER"));
        }

        if !self.users(context).delete(id).await? {
            return Err(ApiError::not_found("User not found"));
        }
        Ok(json!({ "message": "User removed successfully" }))
    }

    async fn ensure_email_free(&self, email: &str) -> Result<(), ApiError> {
        let taken = Repository::<User>::system(self.store.clone())
            .count(Some(json!({ "email": email })))
            .await?;
        if taken > 0 {
            return Err(ApiError::conflict("Email already in use"));
        }
        Ok(())
    }
}

fn acting_user(context: &TenantContext) -> Result<Uuid, ApiError> {
    context
        .user_id
        .ok_or_else(|| ApiError::unauthorized("User not authenticated"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{seed_catalog, MemoryStore};
    use crate::services::auth_service::{AuthService, RegisterRequest};

    struct Fixture {
        store: Arc<dyn Store>,
        owner: TenantContext,
    }

    async fn fixture() -> Fixture {
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
        let owner = TenantContext::new(session.tenant.id).with_user(session.user.id, UserRole::Owner);
        Fixture { store, owner }
    }

    fn new_user(email: &str, role: Option<UserRole>) -> CreateUserRequest {
        CreateUserRequest {
            name: "Team Member".into(),
            email: email.into(),
            password: "password123".into(),
            role,
        }
    }

    #[tokio::test]
    async fn role_rules_on_create() {
        let f = fixture().await;
        let service = UserService::new(f.store.clone());

        let err = service.create(&f.owner, new_user("x@acme.test", Some(UserRole::Owner))).await.unwrap_err();
        assert_eq!(err.status_code(), 403);

        let admin = service.create(&f.owner, new_user("admin@acme.test", Some(UserRole::Admin))).await.unwrap();
        let as_admin = TenantContext::new(f.owner.tenant_id).with_user(admin.id, UserRole::Admin);
        let err = service.create(&as_admin, new_user("a2@acme.test", Some(UserRole::Admin))).await.unwrap_err();
        assert_eq!(err.status_code(), 403);

        let err = service.create(&f.owner, new_user("owner@acme.test", None)).await.unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[tokio::test]
    async fn start_plan_caps_users() {
        let f = fixture().await;
        let service = UserService::new(f.store.clone());

        service.create(&f.owner, new_user("two@acme.test", None)).await.unwrap();
        let err = service.create(&f.owner, new_user("three@acme.test", None)).await.unwrap_err();
        assert_eq!(err.error_code(), "PLAN_LIMIT_EXCEEDED");
    }

    #[tokio::test]
    async fn owner_is_protected() {
        let f = fixture().await;
        let service = UserService::new(f.store.clone());
        let admin = service.create(&f.owner, new_user("admin@acme.test", Some(UserRole::Admin))).await.unwrap();
        let as_admin = TenantContext::new(f.owner.tenant_id).with_user(admin.id, UserRole::Admin);
        let owner_id = f.owner.user_id.unwrap();

        let rename = UpdateUserRequest {
            name: Some("Hijacked".into()),
            ..UpdateUserRequest::default()
        };
        assert_eq!(service.update(&as_admin, owner_id, rename).await.unwrap_err().status_code(), 403);
        assert_eq!(service.remove(&as_admin, owner_id).await.unwrap_err().status_code(), 403);
        assert_eq!(service.remove(&f.owner, owner_id).await.unwrap_err().status_code(), 403);

        let promote = UpdateUserRequest {
            role: Some(UserRole::Owner),
            ..UpdateUserRequest::default()
        };
        assert_eq!(service.update(&f.owner, admin.id, promote).await.unwrap_err().status_code(), 403);
    }

    #[tokio::test]
    async fn other_tenants_users_are_not_found() {
        let f = fixture().await;
        let service = UserService::new(f.store.clone());
        let member = service.create(&f.owner, new_user("m@acme.test", None)).await.unwrap();

        let stranger = TenantContext::new(Uuid::new_v4()).with_user(Uuid::new_v4(), UserRole::Owner);
        assert_eq!(service.find_by_id(&stranger, member.id).await.unwrap_err().status_code(), 404);
        assert_eq!(service.remove(&stranger, member.id).await.unwrap_err().status_code(), 404);
        assert!(service.find_by_id(&f.owner, member.id).await.is_ok());
    }
}
