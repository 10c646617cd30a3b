use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::auth::{hash_password, verify_password, Identity, TokenService};
use crate::authz::Authorizer;
use crate::database::{DocumentStore, Repository};
use crate::error::ApiError;
use crate::filter::Filter;
use crate::models::{CreateUserRequest, LoginRequest, NewUser, School, User, UserView};
use crate::types::{Entity, Operation, Role};
use crate::validation::{self, ValidUser};

/// A user together with a freshly issued long token.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub user: UserView,
    #[serde(rename = "longToken")]
    pub long_token: String,
}

#[derive(Clone)]
pub struct UserService {
    users: Repository<User>,
    schools: Repository<School>,
    tokens: Arc<TokenService>,
    authz: Authorizer,
}

impl UserService {
    pub fn new(store: Arc<dyn DocumentStore>, tokens: Arc<TokenService>, authz: Authorizer) -> Self {
        Self {
            users: Repository::new(store.clone()),
            schools: Repository::new(store),
            tokens,
            authz,
        }
    }

    /// True until the first user exists.
    pub async fn needs_bootstrap(&self) -> Result<bool, ApiError> {
        Ok(self.users.count(&Filter::all()).await? == 0)
    }

    /// Create a user. While the user collection is empty no caller is needed
    /// and the new user becomes the first super admin.
    pub async fn create_user(&self, caller: Option<&Identity>, req: CreateUserRequest) -> Result<Session, ApiError> {
        let bootstrap = self.needs_bootstrap().await?;
        if !bootstrap {
            let caller = caller.ok_or(ApiError::Unauthorized)?;
            self.authz.authorize(caller, Entity::User, Operation::Create)?;
        }

        let valid = validation::new_user(&req, bootstrap)?;
        if let (Role::Admin, Some(school_id)) = (valid.role, valid.school_id.as_deref()) {
            if self.schools.select_id(school_id).await?.is_none() {
                return Err(ApiError::not_found("School not found"));
            }
        }

        if !bootstrap {
            let user = self.insert(valid).await?;
            return self.session(user);
        }

        // A concurrent bootstrap may have claimed the empty collection first.
        let new = self.prepare(valid).await?;
        let Some(user) = self.users.create_first(&new).await? else {
            warn!("Bootstrap lost to a concurrent first user; {} was not created", new.email);
            return Err(ApiError::Unauthorized);
        };
        info!("Bootstrapped first super admin {}", user.email);
        self.session(user)
    }

    /// Exchange credentials for a long token. Unknown email and wrong
    /// password are indistinguishable to the caller.
    pub async fn login(&self, req: LoginRequest) -> Result<Session, ApiError> {
        let (Some(email), Some(password)) = (req.email.as_deref(), req.password.as_deref()) else {
            return Err(ApiError::Unauthorized);
        };

        let email = email.trim().to_lowercase();
        let Some(user) = self.users.select_one(&Filter::all().eq("email", email.as_str())).await? else {
            warn!("Login failed: unknown email");
            return Err(ApiError::Unauthorized);
        };
        if !verify_password(password, &user.password_hash)? {
            warn!("Login failed for user {}", user.id);
            return Err(ApiError::Unauthorized);
        }

        self.session(user)
    }

    /// Seed a super admin outside the HTTP surface. `None` when the email is
    /// already registered.
    pub async fn seed_super_admin(&self, email: &str, password: &str) -> Result<Option<UserView>, ApiError> {
        let req = CreateUserRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            role: Some(Role::SuperAdmin.as_str().to_string()),
            school_id: None,
        };
        let valid = validation::new_user(&req, false)?;
        if self.email_taken(&valid.email).await? {
            return Ok(None);
        }
        Ok(Some(self.insert(valid).await?.into()))
    }

    async fn email_taken(&self, email: &str) -> Result<bool, ApiError> {
        Ok(self.users.exists(&Filter::all().eq("email", email)).await?)
    }

    async fn insert(&self, valid: ValidUser) -> Result<User, ApiError> {
        if self.email_taken(&valid.email).await? {
            return Err(ApiError::conflict("email already registered"));
        }

        let user = self.users.create(&self.prepare(valid).await?).await?;
        info!("User {} created with role {}", user.id, user.role);
        Ok(user)
    }

    /// Hash the password off the async runtime.
    async fn prepare(&self, valid: ValidUser) -> Result<NewUser, ApiError> {
        let password = valid.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| ApiError::internal_server_error(format!("password hashing task failed: {}", e)))??;

        Ok(NewUser {
            email: valid.email,
            password_hash,
            role: valid.role,
            school_id: valid.school_id,
        })
    }

    fn session(&self, user: User) -> Result<Session, ApiError> {
        let identity = Identity::from_parts(user.role, user.id.as_str(), user.school_id.clone()).map_err(|e| {
            tracing::error!("Stored user {} has an invalid identity: {}", user.id, e);
            ApiError::internal_server_error("An error occurred while processing your request")
        })?;
        let long_token = self.tokens.issue_long_token(&identity)?;
        Ok(Session { user: user.into(), long_token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::{DeleteStrategy, ScopeTable};
    use crate::config::SecurityConfig;
    use crate::database::MemoryStore;
    use crate::models::NewSchool;

    fn service() -> (UserService, Arc<dyn DocumentStore>) {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let tokens = Arc::new(
            TokenService::new(&SecurityConfig {
                long_token_secret: "long-secret".into(),
                short_token_secret: "short-secret".into(),
                ..SecurityConfig::default()
            })
            .unwrap(),
        );
        let authz = Authorizer::new(
            Arc::new(ScopeTable::builtin().unwrap()),
            store.clone(),
            DeleteStrategy::Conditional,
        );
        (UserService::new(store.clone(), tokens, authz), store)
    }

    fn request(email: &str, role: &str, school_id: Option<&str>) -> CreateUserRequest {
        CreateUserRequest {
            email: Some(email.into()),
            password: Some("Secret123".into()),
            role: Some(role.into()),
            school_id: school_id.map(Into::into),
        }
    }

    #[tokio::test]
    async fn first_user_becomes_super_admin_without_a_token() {
        let (users, _) = service();
        let session = users.create_user(None, request("root@school.edu", "admin", None)).await.unwrap();
        assert_eq!(session.user.role, Role::SuperAdmin);

        let err = users
            .create_user(None, request("second@school.edu", "super_admin", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn login_does_not_reveal_which_credential_was_wrong() {
        let (users, _) = service();
        users.create_user(None, request("root@school.edu", "super_admin", None)).await.unwrap();

        let wrong_password = users
            .login(LoginRequest { email: Some("root@school.edu".into()), password: Some("Wrong1234".into()) })
            .await
            .unwrap_err();
        let unknown_email = users
            .login(LoginRequest { email: Some("nobody@school.edu".into()), password: Some("Secret123".into()) })
            .await
            .unwrap_err();
        assert_eq!(wrong_password.to_json(), unknown_email.to_json());

        let ok = users
            .login(LoginRequest { email: Some("ROOT@school.edu".into()), password: Some("Secret123".into()) })
            .await
            .unwrap();
        assert!(!ok.long_token.is_empty());
    }

    #[tokio::test]
    async fn admin_needs_an_existing_school() {
        let (users, store) = service();
        let root = users.create_user(None, request("root@school.edu", "super_admin", None)).await.unwrap();
        let caller = Identity::SuperAdmin { user_id: root.user.id.clone() };

        let err = users
            .create_user(Some(&caller), request("adm@school.edu", "admin", Some("missing")))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let school = Repository::<School>::new(store)
            .create(&NewSchool { name: "Alpha".into(), address: "1 A St".into() })
            .await
            .unwrap();
        let admin = users
            .create_user(Some(&caller), request("adm@school.edu", "admin", Some(&school.id)))
            .await
            .unwrap();
        assert_eq!(admin.user.school_id.as_deref(), Some(school.id.as_str()));

        let dup = users
            .create_user(Some(&caller), request("adm@school.edu", "admin", Some(&school.id)))
            .await
            .unwrap_err();
        assert!(matches!(dup, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let (users, _) = service();
        assert!(users.seed_super_admin("root@school.edu", "Secret123").await.unwrap().is_some());
        assert!(users.seed_super_admin("root@school.edu", "Secret123").await.unwrap().is_none());
        assert!(!users.needs_bootstrap().await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_bootstraps_yield_one_super_admin() {
        let (users, _) = service();
        let (a, b) = tokio::join!(
            users.create_user(None, request("first@school.edu", "super_admin", None)),
            users.create_user(None, request("second@school.edu", "super_admin", None)),
        );

        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(ApiError::Unauthorized))));
        assert_eq!(users.users.count(&Filter::all()).await.unwrap(), 1);
    }
}
