use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, PublicUser, RegisterRequest},
        error::AuthError,
        extractors::AuthUser,
        jwt::JwtKeys,
        password::{derive_credential, StoredCredential},
        repo_types::User,
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<&'static str, AuthError> {
    info!(email = %payload.email, "registration attempt");

    if state
        .users
        .find_by_email(&payload.email)
        .await
        .map_err(AuthError::internal)?
        .is_some()
    {
        warn!(email = %payload.email, reason = "email already exists", "registration failed");
        return Err(AuthError::DuplicateAccount);
    }

    let credential = derive_credential(&payload.password);
    let user = User {
        user_id: Uuid::new_v4(),
        name: payload.name,
        email: payload.email,
        role: payload.role.unwrap_or_default(),
        password_hash: credential.hash,
        password_salt: credential.salt,
        created_at: OffsetDateTime::now_utc(),
    };
    state.users.insert(&user).await.map_err(AuthError::internal)?;

    info!(user_id = %user.user_id, email = %user.email, role = %user.role, "user registered");
    Ok("User registered successfully")
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    info!(email = %payload.email, "login attempt");

    let user = match state
        .users
        .find_by_email(&payload.email)
        .await
        .map_err(AuthError::internal)?
    {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, reason = "user not found", "login failed");
            return Err(AuthError::UserNotFound);
        }
    };

    // A row without a hash cannot be verified at all; the account must be
    // re-created.
    if user.password_hash.is_empty() {
        warn!(email = %user.email, reason = "missing password hash", "login failed");
        return Err(AuthError::InvalidAccount);
    }

    // From here on, anything unexpected (corrupt columns, store write
    // failure, signing failure) surfaces as the generic login error.
    let credential = StoredCredential::decode(&user.password_hash, &user.password_salt)
        .map_err(AuthError::login)?;

    if !credential.verify(&payload.password) {
        warn!(email = %user.email, reason = "invalid password", "login failed");
        return Err(AuthError::WrongPassword);
    }

    if credential.is_legacy() {
        // Upgrade the row to a salted credential now that the password is
        // known to be correct. Racing logins may both land here; either
        // write is a valid credential, so last write wins.
        let fresh = derive_credential(&payload.password);
        state
            .users
            .update_credential(user.user_id, &fresh)
            .await
            .map_err(AuthError::login)?;
        debug!(user_id = %user.user_id, "legacy credential upgraded to salted hash");
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(&user).map_err(AuthError::login)?;

    info!(user_id = %user.user_id, email = %user.email, role = %user.role, "user logged in");
    Ok(Json(LoginResponse {
        token,
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser { user_id, .. }: AuthUser,
) -> Result<Json<PublicUser>, AuthError> {
    let user = state
        .users
        .find_by_id(user_id)
        .await
        .map_err(AuthError::internal)?
        .ok_or(AuthError::UserNotFound)?;
    Ok(Json(PublicUser::from(&user)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{password::legacy_hash, repo_types::Role};
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Test User".into(),
            email: email.into(),
            password: "TestPassword123!".into(),
            role: Some(Role::User),
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    async fn seed_legacy_user(state: &AppState, email: &str, password: &str) -> Uuid {
        let user = User {
            user_id: Uuid::new_v4(),
            name: "Legacy User".into(),
            email: email.into(),
            role: Role::Student,
            password_hash: BASE64.encode(legacy_hash(password)),
            password_salt: String::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        state.users.insert(&user).await.expect("seed legacy user");
        user.user_id
    }

    #[tokio::test]
    async fn register_succeeds_with_fixed_message() {
        let state = AppState::fake();
        let body = register(State(state.clone()), Json(register_request("test@example.com")))
            .await
            .expect("register");
        assert_eq!(body, "User registered successfully");

        let stored = state
            .users
            .find_by_email("test@example.com")
            .await
            .expect("find")
            .expect("present");
        assert!(!stored.password_hash.is_empty());
        assert!(!stored.password_salt.is_empty());
        assert_eq!(stored.role, Role::User);
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email() {
        let state = AppState::fake();
        register(State(state.clone()), Json(register_request("test@example.com")))
            .await
            .expect("first register");

        let mut second = register_request("test@example.com");
        second.name = "Someone Else".into();
        second.password = "OtherPassword456!".into();
        let err = register(State(state), Json(second)).await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateAccount));
        assert_eq!(err.to_string(), "User already exists");
    }

    #[tokio::test]
    async fn register_defaults_role_to_user() {
        let state = AppState::fake();
        let mut request = register_request("norole@example.com");
        request.role = None;
        register(State(state.clone()), Json(request)).await.expect("register");

        let stored = state
            .users
            .find_by_email("norole@example.com")
            .await
            .expect("find")
            .expect("present");
        assert_eq!(stored.role, Role::User);
    }

    #[tokio::test]
    async fn login_returns_token_and_public_user() {
        let state = AppState::fake();
        register(State(state.clone()), Json(register_request("test@example.com")))
            .await
            .expect("register");

        let Json(response) = login(
            State(state.clone()),
            Json(login_request("test@example.com", "TestPassword123!")),
        )
        .await
        .expect("login");

        assert!(!response.token.is_empty());
        assert_eq!(response.user.email, "test@example.com");
        assert_eq!(response.user.role, Role::User);

        let keys = JwtKeys::from_ref(&state);
        let claims = keys.verify(&response.token).expect("verify issued token");
        assert_eq!(claims.sub, response.user.user_id);
        assert_eq!(claims.role, Role::User);
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() {
        let state = AppState::fake();
        register(State(state.clone()), Json(register_request("test@example.com")))
            .await
            .expect("register");

        let err = login(
            State(state),
            Json(login_request("test@example.com", "WrongPassword123!")),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AuthError::WrongPassword));
        assert_eq!(err.to_string(), "Wrong password");
    }

    #[tokio::test]
    async fn login_rejects_unknown_email() {
        let state = AppState::fake();
        let err = login(
            State(state),
            Json(login_request("nonexistent@example.com", "TestPassword123!")),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
        assert_eq!(err.to_string(), "User not found");
    }

    #[tokio::test]
    async fn login_rejects_account_with_empty_hash() {
        let state = AppState::fake();
        let user = User {
            user_id: Uuid::new_v4(),
            name: "Broken User".into(),
            email: "broken@example.com".into(),
            role: Role::User,
            password_hash: String::new(),
            password_salt: String::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        state.users.insert(&user).await.expect("seed broken user");

        let err = login(
            State(state),
            Json(login_request("broken@example.com", "anything")),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AuthError::InvalidAccount));
        assert_eq!(err.to_string(), "Invalid user account. Please register again.");
    }

    #[tokio::test]
    async fn login_maps_corrupt_stored_hash_to_generic_error() {
        let state = AppState::fake();
        let user = User {
            user_id: Uuid::new_v4(),
            name: "Corrupt User".into(),
            email: "corrupt@example.com".into(),
            role: Role::User,
            password_hash: "not base64!!".into(),
            password_salt: String::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        state.users.insert(&user).await.expect("seed corrupt user");

        let err = login(
            State(state),
            Json(login_request("corrupt@example.com", "anything")),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AuthError::LoginError(_)));
        assert_eq!(
            err.to_string(),
            "An error occurred during login. Please try again."
        );
    }

    #[tokio::test]
    async fn legacy_login_migrates_row_to_salted() {
        let state = AppState::fake();
        let user_id = seed_legacy_user(&state, "legacy@example.com", "TestPassword123!").await;

        login(
            State(state.clone()),
            Json(login_request("legacy@example.com", "TestPassword123!")),
        )
        .await
        .expect("legacy login");

        let migrated = state
            .users
            .find_by_id(user_id)
            .await
            .expect("find")
            .expect("present");
        assert!(!migrated.password_salt.is_empty());

        // second login takes the salted path against the rewritten row
        let Json(response) = login(
            State(state),
            Json(login_request("legacy@example.com", "TestPassword123!")),
        )
        .await
        .expect("salted login after migration");
        assert_eq!(response.user.user_id, user_id);
    }

    #[tokio::test]
    async fn legacy_login_with_wrong_password_does_not_migrate() {
        let state = AppState::fake();
        let user_id = seed_legacy_user(&state, "legacy@example.com", "TestPassword123!").await;

        let err = login(
            State(state.clone()),
            Json(login_request("legacy@example.com", "WrongPassword123!")),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AuthError::WrongPassword));

        let untouched = state
            .users
            .find_by_id(user_id)
            .await
            .expect("find")
            .expect("present");
        assert!(untouched.password_salt.is_empty());
    }

    #[tokio::test]
    async fn get_me_returns_profile_for_token_owner() {
        let state = AppState::fake();
        register(State(state.clone()), Json(register_request("test@example.com")))
            .await
            .expect("register");
        let user = state
            .users
            .find_by_email("test@example.com")
            .await
            .expect("find")
            .expect("present");

        let Json(profile) = get_me(
            State(state),
            AuthUser {
                user_id: user.user_id,
                role: user.role,
            },
        )
        .await
        .expect("me");
        assert_eq!(profile.email, "test@example.com");
        assert_eq!(profile.user_id, user.user_id);
    }
}
