use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

/// Client-facing outcomes of the register and login flows. Every variant maps
/// to a fixed message; internal detail stays in the logs.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("User already exists")]
    DuplicateAccount,
    #[error("User not found")]
    UserNotFound,
    #[error("Invalid user account. Please register again.")]
    InvalidAccount,
    #[error("Wrong password")]
    WrongPassword,
    #[error("An error occurred during login. Please try again.")]
    LoginError(#[source] anyhow::Error),
    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl AuthError {
    pub fn login(err: impl Into<anyhow::Error>) -> Self {
        AuthError::LoginError(err.into())
    }

    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        AuthError::Internal(err.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            AuthError::LoginError(source) => {
                error!(error = %source, "login failed unexpectedly");
            }
            AuthError::Internal(source) => {
                error!(error = %source, "internal error");
            }
            _ => {}
        }
        (self.status(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_are_fixed() {
        assert_eq!(AuthError::DuplicateAccount.to_string(), "User already exists");
        assert_eq!(AuthError::UserNotFound.to_string(), "User not found");
        assert_eq!(
            AuthError::InvalidAccount.to_string(),
            "Invalid user account. Please register again."
        );
        assert_eq!(AuthError::WrongPassword.to_string(), "Wrong password");
        assert_eq!(
            AuthError::login(anyhow::anyhow!("bad stored hash")).to_string(),
            "An error occurred during login. Please try again."
        );
    }

    #[test]
    fn login_error_never_leaks_its_source() {
        let err = AuthError::login(anyhow::anyhow!("secret internal detail"));
        assert!(!err.to_string().contains("secret"));
    }

    #[test]
    fn statuses_match_the_taxonomy() {
        assert_eq!(AuthError::UserNotFound.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::WrongPassword.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AuthError::internal(anyhow::anyhow!("db down")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
