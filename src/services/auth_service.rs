use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;
use validator::Validate;

use super::plan_service::PlanService;
use crate::auth::{decode_jwt, hash_password, issue_token_pair, token_digest, verify_password, TokenKind, TokenPair};
use crate::config;
use crate::database::models::{
    Subscription, SubscriptionStatus, Tenant, User, UserRole, UserStatus,
};
use crate::database::{EntityKind, Repository, Store, WriteBatch};
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::tenant::TenantContext;

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, max = 100, message = "must be between 8 and 100 characters"))]
    pub password: String,
    #[serde(alias = "companyName")]
    #[validate(length(min = 2, max = 100))]
    pub company_name: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RefreshRequest {
    #[serde(alias = "userId")]
    pub user_id: Uuid,
    #[serde(alias = "refreshToken")]
    #[validate(length(min = 1, message = "is required"))]
    pub refresh_token: String,
}

/// Result of register and login.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub user: User,
    pub tenant: Tenant,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

pub struct AuthService {
    store: Arc<dyn Store>,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    fn tenants(&self) -> Repository<Tenant> {
        Repository::catalog(self.store.clone())
    }

    /// Create a tenant with its OWNER and a trial subscription, all or nothing.
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthSession, ApiError> {
        let email = normalize_email(&request.email);
        let all_users = Repository::<User>::system(self.store.clone());
        if all_users.find_first(FilterData::matching(json!({ "email": email }))).await?.is_some() {
            return Err(ApiError::conflict("Email already in use"));
        }

        let billing = &config::config().billing;
        let plan = PlanService::new(self.store.clone())
            .find_by_slug(&billing.trial_plan_slug)
            .await
            .map_err(|_| {
                error!("Trial plan '{}' is missing from the catalog", billing.trial_plan_slug);
                ApiError::internal_server_error("Registration is temporarily unavailable")
            })?;

        let slug = self.unique_slug(&slugify(&request.company_name)).await?;
        let tenant_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let password_hash = hash_password(&request.password)?;
        let tokens = issue_token_pair(user_id, Some(tenant_id), Some(slug.clone()), UserRole::Owner)?;
        let trial_end = Utc::now() + Duration::days(billing.trial_days);

        let users = Repository::<User>::for_tenant(self.store.clone(), tenant_id);
        let subscriptions = Repository::<Subscription>::for_tenant(self.store.clone(), tenant_id);

        let mut batch = WriteBatch::new();
        batch
            .insert(
                EntityKind::Tenant.table_name(),
                self.tenants().prepare_create(json!({
                    "id": tenant_id,
                    "name": request.company_name.trim(),
                    "slug": slug,
                    "email": email,
                    "is_active": true,
                }))?,
            )
            .insert(
                EntityKind::User.table_name(),
                users.prepare_create(json!({
                    "id": user_id,
                    "email": email,
                    "password_hash": password_hash,
                    "name": request.name.trim(),
                    "role": UserRole::Owner.as_str(),
                    "status": UserStatus::Active.as_str(),
                    "refresh_token_hash": token_digest(&tokens.refresh_token),
                }))?,
            )
            .insert(
                EntityKind::Subscription.table_name(),
                subscriptions.prepare_create(json!({
                    "plan_id": plan.id,
                    "status": SubscriptionStatus::Trialing.as_str(),
                    "current_period_end": trial_end,
                    "trial_ends_at": trial_end,
                    "executions_used": 0,
                }))?,
            );
        self.store.commit(batch).await?;

        info!(tenant_id = %tenant_id, slug = %slug, "Tenant registered");

        let user = users
            .find_unique(user_id)
            .await?
            .ok_or_else(|| ApiError::internal_server_error("Registered user could not be read back"))?;
        let tenant = self
            .tenants()
            .find_unique(tenant_id)
            .await?
            .ok_or_else(|| ApiError::internal_server_error("Registered tenant could not be read back"))?;

        Ok(AuthSession { user, tenant, tokens })
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthSession, ApiError> {
        let email = normalize_email(&request.email);
        let user = Repository::<User>::system(self.store.clone())
            .find_first(FilterData::matching(json!({ "email": email })))
            .await?
            .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

        if !verify_password(&request.password, &user.password_hash)? {
            return Err(ApiError::unauthorized("Invalid credentials"));
        }
        if user.status != UserStatus::Active {
            return Err(ApiError::unauthorized("Account is inactive or pending confirmation"));
        }

        let tenant = self.tenant_of(&user).await?;
        let tokens = issue_token_pair(user.id, Some(tenant.id), Some(tenant.slug.clone()), user.role)?;
        let user = Repository::<User>::for_tenant(self.store.clone(), tenant.id)
            .update(
                user.id,
                json!({
                    "last_login_at": Utc::now(),
                    "refresh_token_hash": token_digest(&tokens.refresh_token),
                }),
            )
            .await?
            .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

        Ok(AuthSession { user, tenant, tokens })
    }

    /// Exchange a refresh token for a new pair, invalidating the old one.
    pub async fn refresh(&self, request: RefreshRequest) -> Result<TokenPair, ApiError> {
        let claims = decode_jwt(&request.refresh_token, TokenKind::Refresh)?;
        if claims.sub != request.user_id {
            return Err(ApiError::unauthorized("Access denied"));
        }

        let user = Repository::<User>::system(self.store.clone())
            .find_unique(request.user_id)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Access denied"))?;
        let stored = user
            .refresh_token_hash
            .as_deref()
            .ok_or_else(|| ApiError::unauthorized("Access denied"))?;
        if stored != token_digest(&request.refresh_token) {
            return Err(ApiError::unauthorized("Invalid token"));
        }
        if user.status != UserStatus::Active {
            return Err(ApiError::unauthorized("Account is inactive or pending confirmation"));
        }

        let tenant = self.tenant_of(&user).await?;
        let tokens = issue_token_pair(user.id, Some(tenant.id), Some(tenant.slug), user.role)?;
        Repository::<User>::for_tenant(self.store.clone(), tenant.id)
            .update(user.id, json!({ "refresh_token_hash": token_digest(&tokens.refresh_token) }))
            .await?;

        Ok(tokens)
    }

    pub async fn logout(&self, context: &TenantContext) -> Result<Value, ApiError> {
        if let Some(user_id) = context.user_id {
            Repository::<User>::for_tenant(self.store.clone(), context.tenant_id)
                .update(user_id, json!({ "refresh_token_hash": Value::Null }))
                .await?;
        }
        Ok(json!({ "message": "Logged out successfully" }))
    }

    async fn tenant_of(&self, user: &User) -> Result<Tenant, ApiError> {
        let tenant = self
            .tenants()
            .find_unique(user.tenant_id)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Access denied"))?;
        if !tenant.is_active {
            return Err(ApiError::unauthorized("Organization is inactive"));
        }
        Ok(tenant)
    }

    /// `base`, or `base-1`, `base-2`, ... whichever is free first.
    async fn unique_slug(&self, base: &str) -> Result<String, ApiError> {
        let tenants = self.tenants();
        let mut candidate = base.to_string();
        let mut counter = 1;
        while tenants
            .find_first(FilterData::matching(json!({ "slug": candidate })))
            .await?
            .is_some()
        {
            candidate = format!("{}-{}", base, counter);
            counter += 1;
        }
        Ok(candidate)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// URL-safe slug: lowercase ASCII, accents folded, other runs collapsed to `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars().flat_map(char::to_lowercase) {
        let c = fold_accent(c);
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("organization");
    }
    slug
}

fn fold_accent(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{seed_catalog, MemoryStore};

    fn register_request(email: &str, company: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Ana Souza".into(),
            email: email.into(),
            password: "s3cret-password".into(),
            company_name: company.into(),
        }
    }

    async fn seeded() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        seed_catalog(store.clone()).await.unwrap();
        store
    }

    #[test]
    fn slugify_folds_accents_and_separators() {
        assert_eq!(slugify("Café São João"), "cafe-sao-joao");
        assert_eq!(slugify("  ACME -- Corp!  "), "acme-corp");
        assert_eq!(slugify("!!!"), "organization");
    }

    #[tokio::test]
    async fn register_creates_owner_and_trial() {
        let store = seeded().await;
        let service = AuthService::new(store.clone());

        let session = service.register(register_request("Ana@Example.com", "Acme")).await.unwrap();
        assert_eq!(session.user.role, UserRole::Owner);
        assert_eq!(session.user.email, "ana@example.com");
        assert_eq!(session.tenant.slug, "acme");

        let subscription = Repository::<Subscription>::for_tenant(store.clone(), session.tenant.id)
            .find_first(FilterData::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(subscription.status, SubscriptionStatus::Trialing);
        assert!(subscription.trial_ends_at.is_some());
    }

    #[tokio::test]
    async fn duplicate_email_conflicts_and_slugs_stay_unique() {
        let store = seeded().await;
        let service = AuthService::new(store.clone());

        service.register(register_request("a@example.com", "Acme")).await.unwrap();
        let err = service.register(register_request("a@example.com", "Other")).await.unwrap_err();
        assert_eq!(err.status_code(), 409);

        let second = service.register(register_request("b@example.com", "Acme")).await.unwrap();
        let third = service.register(register_request("c@example.com", "Acme")).await.unwrap();
        assert_eq!(second.tenant.slug, "acme-1");
        assert_eq!(third.tenant.slug, "acme-2");
    }

    #[tokio::test]
    async fn failed_registration_leaves_nothing_behind() {
        let store = seeded().await;
        store.fail_inserts_into("subscriptions");
        let service = AuthService::new(store.clone());

        assert!(service.register(register_request("a@example.com", "Acme")).await.is_err());

        let tenants = Repository::<Tenant>::catalog(store.clone());
        let users = Repository::<User>::system(store.clone());
        assert_eq!(tenants.count(None).await.unwrap(), 0);
        assert_eq!(users.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn login_checks_password_and_status() {
        let store = seeded().await;
        let service = AuthService::new(store.clone());
        let session = service.register(register_request("a@example.com", "Acme")).await.unwrap();

        let bad = LoginRequest {
            email: "a@example.com".into(),
            password: "wrong-password".into(),
        };
        assert_eq!(service.login(bad).await.unwrap_err().status_code(), 401);

        let good = LoginRequest {
            email: "A@example.com ".into(),
            password: "s3cret-password".into(),
        };
        let login = service.login(good).await.unwrap();
        assert!(login.user.last_login_at.is_some());

        Repository::<User>::for_tenant(store.clone(), session.tenant.id)
            .update(session.user.id, json!({ "status": "INACTIVE" }))
            .await
            .unwrap();
        let again = LoginRequest {
            email: "a@example.com".into(),
            password: "s3cret-password".into(),
        };
        assert_eq!(service.login(again).await.unwrap_err().status_code(), 401);
    }

    #[tokio::test]
    async fn refresh_rotates_and_logout_revokes() {
        let store = seeded().await;
        let service = AuthService::new(store.clone());
        let session = service.register(register_request("a@example.com", "Acme")).await.unwrap();

        let rotated = service
            .refresh(RefreshRequest {
                user_id: session.user.id,
                refresh_token: session.tokens.refresh_token.clone(),
            })
            .await
            .unwrap();

        // The first token was replaced and no longer works.
        let reused = service
            .refresh(RefreshRequest {
                user_id: session.user.id,
                refresh_token: session.tokens.refresh_token.clone(),
            })
            .await;
        assert_eq!(reused.unwrap_err().status_code(), 401);

        let context = TenantContext::new(session.tenant.id).with_user(session.user.id, UserRole::Owner);
        service.logout(&context).await.unwrap();
        let after_logout = service
            .refresh(RefreshRequest {
                user_id: session.user.id,
                refresh_token: rotated.refresh_token,
            })
            .await;
        assert_eq!(after_logout.unwrap_err().status_code(), 401);
    }
}
