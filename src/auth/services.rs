use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, warn};

use crate::auth::{
    claims::Role,
    dto::{LoginRequest, PublicUser, SignupRequest},
    error::{AuthError, LOGIN_FAILED, SIGNUP_FAILED},
    jwt::JwtKeys,
    password::{hash_password, verify_password},
    repo::{StoreError, UserStore},
    repo_types::NewUser,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Blank strings count as absent.
fn present(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.trim().is_empty())
}

/// Passwords are taken byte for byte; only the empty string is absent.
fn present_password(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.is_empty())
}

/// Successful login: the signed token and the sanitized user.
#[derive(Debug)]
pub struct LoginOutcome {
    pub token: String,
    pub user: PublicUser,
}

pub async fn signup(store: &dyn UserStore, req: SignupRequest) -> Result<(), AuthError> {
    let (Some(name), Some(email), Some(password)) =
        (present(req.name), present(req.email), present_password(req.password))
    else {
        warn!("signup with missing fields");
        return Err(AuthError::MissingFields);
    };
    let email = normalize_email(&email);
    if !is_valid_email(&email) {
        warn!(%email, "signup with invalid email");
        return Err(AuthError::InvalidEmail);
    }

    match store.find_by_email(&email).await {
        Ok(Some(_)) => {
            warn!(%email, "email already registered");
            return Err(AuthError::DuplicateUser);
        }
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err(AuthError::ServerError(SIGNUP_FAILED));
        }
    }

    let password_hash = hash_password(&password).map_err(|e| {
        error!(error = %e, "hash_password failed");
        AuthError::HashingError
    })?;

    let new_user = NewUser {
        name: name.trim().to_string(),
        email,
        password_hash,
        role: Role::User,
    };
    match store.create(new_user).await {
        Ok(user) => {
            info!(user_id = %user.id, "user registered");
            Ok(())
        }
        Err(StoreError::Duplicate) => {
            warn!("email registered concurrently");
            Err(AuthError::DuplicateUser)
        }
        Err(StoreError::Other(e)) => {
            error!(error = %e, "create user failed");
            Err(AuthError::ServerError(SIGNUP_FAILED))
        }
    }
}

pub async fn login(
    store: &dyn UserStore,
    keys: &JwtKeys,
    req: LoginRequest,
) -> Result<LoginOutcome, AuthError> {
    let (Some(email), Some(password)) = (present(req.email), present_password(req.password)) else {
        warn!("login with missing fields");
        return Err(AuthError::MissingFields);
    };
    let email = normalize_email(&email);

    let user = match store.find_by_email(&email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(%email, "login unknown email");
            return Err(AuthError::InvalidCredentials);
        }
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err(AuthError::ServerError(LOGIN_FAILED));
        }
    };

    let ok = verify_password(&password, &user.password_hash).map_err(|e| {
        error!(error = %e, user_id = %user.id, "verify_password failed");
        AuthError::ServerError(LOGIN_FAILED)
    })?;
    if !ok {
        warn!(user_id = %user.id, "login incorrect password");
        return Err(AuthError::IncorrectPassword);
    }

    let token = keys.sign(user.id, user.role).map_err(|e| {
        error!(error = %e, "jwt sign failed");
        AuthError::ServerError(LOGIN_FAILED)
    })?;

    info!(user_id = %user.id, "user logged in");
    Ok(LoginOutcome {
        user: PublicUser::from_user(user, token.clone()),
        token,
    })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::{
        auth::{repo::MemoryUserStore, repo_types::User},
        config::AppConfig,
    };

    fn keys() -> JwtKeys {
        JwtKeys::from(&AppConfig::for_tests().jwt)
    }

    fn signup_req(name: &str, email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            name: Some(name.into()),
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    /// Store whose lookups never see the existing row, like a concurrent
    /// signup that passed the pre-check.
    struct RacingStore;

    #[async_trait]
    impl UserStore for RacingStore {
        async fn find_by_email(&self, _email: &str) -> Result<Option<User>, StoreError> {
            Ok(None)
        }
        async fn create(&self, _user: NewUser) -> Result<User, StoreError> {
            Err(StoreError::Duplicate)
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl UserStore for BrokenStore {
        async fn find_by_email(&self, _email: &str) -> Result<Option<User>, StoreError> {
            Err(anyhow::anyhow!("connection refused to 10.0.0.3").into())
        }
        async fn create(&self, _user: NewUser) -> Result<User, StoreError> {
            Err(anyhow::anyhow!("connection refused to 10.0.0.3").into())
        }
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.de"));
    }

    #[tokio::test]
    async fn signup_creates_one_user_with_hashed_password() {
        let store = MemoryUserStore::new();
        signup(&store, signup_req("Ada", "Ada@Example.com ", "pw-123456"))
            .await
            .unwrap();
        assert_eq!(store.len(), 1);
        let user = store.find_by_email("ada@example.com").await.unwrap().unwrap();
        assert_eq!(user.role, Role::User);
        assert_ne!(user.password_hash, "pw-123456");
        assert!(verify_password("pw-123456", &user.password_hash).unwrap());
    }

    #[tokio::test]
    async fn signup_duplicate_email_does_not_write() {
        let store = MemoryUserStore::new();
        signup(&store, signup_req("Ada", "ada@example.com", "pw")).await.unwrap();
        let err = signup(&store, signup_req("Other", "ada@example.com", "pw2"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::DuplicateUser);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn signup_race_lost_at_insert_is_duplicate() {
        let err = signup(&RacingStore, signup_req("Ada", "ada@example.com", "pw"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::DuplicateUser);
    }

    #[tokio::test]
    async fn signup_rejects_missing_fields() {
        let store = MemoryUserStore::new();
        let reqs = [
            SignupRequest {
                name: Some("   ".into()),
                email: Some("ada@example.com".into()),
                password: Some("pw".into()),
            },
            SignupRequest {
                name: Some("Ada".into()),
                email: None,
                password: Some("pw".into()),
            },
            SignupRequest {
                name: Some("Ada".into()),
                email: Some("ada@example.com".into()),
                password: Some(String::new()),
            },
        ];
        for req in reqs {
            assert_eq!(signup(&store, req).await.unwrap_err(), AuthError::MissingFields);
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn whitespace_password_is_kept_verbatim() {
        let store = MemoryUserStore::new();
        signup(&store, signup_req("Ada", "ada@example.com", "   ")).await.unwrap();

        let outcome = login(&store, &keys(), login_req("ada@example.com", "   ")).await;
        assert!(outcome.is_ok());
        let err = login(&store, &keys(), login_req("ada@example.com", " "))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::IncorrectPassword);
    }

    #[tokio::test]
    async fn store_failure_is_reported_without_detail() {
        let err = signup(&BrokenStore, signup_req("Ada", "ada@example.com", "pw"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::ServerError(SIGNUP_FAILED));
        assert!(!err.to_string().contains("10.0.0.3"));

        let err = login(&BrokenStore, &keys(), login_req("ada@example.com", "pw"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::ServerError(LOGIN_FAILED));
    }

    #[tokio::test]
    async fn login_missing_fields() {
        let store = MemoryUserStore::new();
        let req = LoginRequest {
            email: Some("ada@example.com".into()),
            password: None,
        };
        assert_eq!(
            login(&store, &keys(), req).await.unwrap_err(),
            AuthError::MissingFields
        );
    }

    #[tokio::test]
    async fn login_unknown_email_is_invalid_credentials() {
        let store = MemoryUserStore::new();
        let err = login(&store, &keys(), login_req("nobody@example.com", "pw"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);
    }

    #[tokio::test]
    async fn login_wrong_password_is_incorrect_password() {
        let store = MemoryUserStore::new();
        signup(&store, signup_req("Ada", "ada@example.com", "right")).await.unwrap();
        let err = login(&store, &keys(), login_req("ada@example.com", "wrong"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::IncorrectPassword);
    }

    #[tokio::test]
    async fn login_returns_token_with_id_and_role() {
        let store = MemoryUserStore::new();
        signup(&store, signup_req("Ada", "ada@example.com", "right")).await.unwrap();
        let keys = keys();
        let outcome = login(&store, &keys, login_req("ADA@example.com", "right"))
            .await
            .unwrap();

        let stored = store.find_by_email("ada@example.com").await.unwrap().unwrap();
        let claims = keys.verify(&outcome.token).unwrap();
        assert_eq!(claims.id, stored.id);
        assert_eq!(claims.role, Role::User);
        assert_eq!(outcome.user.id, stored.id);
        assert_eq!(outcome.user.token, outcome.token);
    }
}
