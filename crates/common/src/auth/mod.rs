//! Authentication and authorization utilities
//!
//! Tokens are issued by the external auth provider; this module only
//! verifies them and applies the role policy.
//!
//! Provides:
//! - HS256 JWT validation
//! - `AuthContext` extraction from a bearer header or `?token=` parameter
//! - Role checks used by the handlers

use crate::config::AuthConfig;
use crate::errors::{AppError, Result};
use axum::{
    extract::{FromRef, FromRequestParts, Query},
    http::request::Parts,
};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Staff and student roles stored in the provider's `app_metadata`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Tutor,
    Preceptor,
    Student,
}

impl Role {
    /// Missing or unknown roles get the least privileged one
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("admin") => Role::Admin,
            Some("teacher") | Some("docente") => Role::Teacher,
            Some("tutor") => Role::Tutor,
            Some("preceptor") => Role::Preceptor,
            _ => Role::Student,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Tutor => "tutor",
            Role::Preceptor => "preceptor",
            Role::Student => "student",
        }
    }

    pub fn is_staff(&self) -> bool {
        !matches!(self, Role::Student)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extracted authentication context available to handlers
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: Role,
    pub email: Option<String>,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Grade sheets, reports and attendance reads
    pub fn require_staff(&self) -> Result<()> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(AppError::forbidden("staff role required"))
        }
    }

    /// Admins, or the teacher the assignment belongs to
    pub fn require_grade_writer(&self, assignment_teacher: Option<Uuid>) -> Result<()> {
        match self.role {
            Role::Admin => Ok(()),
            Role::Teacher if assignment_teacher == Some(self.user_id) => Ok(()),
            _ => Err(AppError::forbidden("only the assigned teacher can edit these grades")),
        }
    }

    /// Preceptors take division-level attendance, teachers only per subject
    pub fn require_attendance_writer(&self, subject_id: Option<Uuid>) -> Result<()> {
        match (self.role, subject_id) {
            (Role::Admin, _) | (Role::Preceptor, _) => Ok(()),
            (Role::Teacher, Some(_)) => Ok(()),
            (Role::Teacher, None) => Err(AppError::forbidden(
                "teachers can only record attendance for a subject",
            )),
            _ => Err(AppError::forbidden("role cannot record attendance")),
        }
    }

    /// Mass justification and citations
    pub fn require_attendance_manager(&self) -> Result<()> {
        match self.role {
            Role::Admin | Role::Preceptor => Ok(()),
            _ => Err(AppError::forbidden("admin or preceptor role required")),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AppMetadata {
    #[serde(default)]
    pub role: Option<String>,
}

/// Claims of a provider access token
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub app_metadata: AppMetadata,
}

/// JWT token verifier
pub struct JwtManager {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtManager {
    pub fn new(secret: &str, audience: Option<&str>, leeway_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_secs;
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.jwt_secret, config.audience.as_deref(), config.leeway_secs)
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::Unauthorized {
                    message: format!("invalid token: {}", e),
                },
            })
    }

    /// Build the request context from a verified token
    pub fn authenticate(&self, token: &str) -> Result<AuthContext> {
        let claims = self.validate_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized {
            message: "token subject is not a user id".to_string(),
        })?;

        Ok(AuthContext {
            user_id,
            role: Role::parse(claims.app_metadata.role.as_deref()),
            email: claims.email,
        })
    }
}

/// Extract the token from an Authorization header value
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Axum extractor for AuthContext.
///
/// Download links cannot set headers, so `?token=` is accepted when the
/// Authorization header is absent.
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<JwtManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let jwt = Arc::<JwtManager>::from_ref(state);

        let header_token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(extract_bearer)
            .map(String::from);

        let token = match header_token {
            Some(token) => token,
            None => Query::<TokenQuery>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|q| q.0.token)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| AppError::Unauthorized {
                    message: "Missing bearer token".to_string(),
                })?,
        };

        let context = jwt.authenticate(&token)?;
        tracing::debug!(user_id = %context.user_id, role = %context.role, "Authenticated request");
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use tokio_test::{assert_err, assert_ok};

    const SECRET: &str = "test_secret";

    fn token(sub: &str, role: Option<&str>, exp_offset: i64) -> String {
        let now = Utc::now().timestamp();
        let claims = JwtClaims {
            sub: sub.to_string(),
            exp: now + exp_offset,
            iat: now,
            aud: Some("authenticated".to_string()),
            email: Some("docente@escuela.edu".to_string()),
            app_metadata: AppMetadata {
                role: role.map(String::from),
            },
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    #[derive(Clone)]
    struct TestState {
        jwt: Arc<JwtManager>,
    }

    impl FromRef<TestState> for Arc<JwtManager> {
        fn from_ref(state: &TestState) -> Self {
            state.jwt.clone()
        }
    }

    fn state() -> TestState {
        TestState {
            jwt: Arc::new(JwtManager::new(SECRET, None, 0)),
        }
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(Role::parse(Some("admin")), Role::Admin);
        assert_eq!(Role::parse(Some("Preceptor")), Role::Preceptor);
        assert_eq!(Role::parse(Some("janitor")), Role::Student);
        assert_eq!(Role::parse(None), Role::Student);
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_authenticate() {
        let user = Uuid::new_v4();
        let manager = JwtManager::new(SECRET, None, 0);
        let ctx = manager.authenticate(&token(&user.to_string(), Some("teacher"), 3600)).unwrap();

        assert_eq!(ctx.user_id, user);
        assert_eq!(ctx.role, Role::Teacher);
        assert_eq!(ctx.email.as_deref(), Some("docente@escuela.edu"));
    }

    #[test]
    fn test_expired_and_invalid_tokens() {
        let manager = JwtManager::new(SECRET, None, 0);
        let user = Uuid::new_v4().to_string();

        assert!(matches!(
            manager.authenticate(&token(&user, None, -3600)),
            Err(AppError::ExpiredToken)
        ));

        let other = JwtManager::new("other_secret", None, 0);
        assert!(matches!(
            other.authenticate(&token(&user, None, 3600)),
            Err(AppError::Unauthorized { .. })
        ));

        assert!(matches!(
            manager.authenticate(&token("not-a-uuid", None, 3600)),
            Err(AppError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_audience_check() {
        let user = Uuid::new_v4().to_string();
        let strict = JwtManager::new(SECRET, Some("other"), 0);
        assert!(strict.authenticate(&token(&user, None, 3600)).is_err());

        let matching = JwtManager::new(SECRET, Some("authenticated"), 0);
        assert!(matching.authenticate(&token(&user, None, 3600)).is_ok());
    }

    #[test]
    fn test_policy() {
        let teacher = Uuid::new_v4();
        let ctx = AuthContext {
            user_id: teacher,
            role: Role::Teacher,
            email: None,
        };

        assert!(ctx.require_staff().is_ok());
        assert!(ctx.require_grade_writer(Some(teacher)).is_ok());
        assert!(ctx.require_grade_writer(Some(Uuid::new_v4())).is_err());
        assert!(ctx.require_attendance_writer(Some(Uuid::new_v4())).is_ok());
        assert!(ctx.require_attendance_writer(None).is_err());
        assert!(ctx.require_attendance_manager().is_err());

        let student = AuthContext {
            user_id: Uuid::new_v4(),
            role: Role::Student,
            email: None,
        };
        assert!(student.require_staff().is_err());

        let preceptor = AuthContext {
            user_id: Uuid::new_v4(),
            role: Role::Preceptor,
            email: None,
        };
        assert!(preceptor.require_attendance_manager().is_ok());
        assert!(preceptor.require_attendance_writer(None).is_ok());
        assert!(preceptor.require_grade_writer(None).is_err());
    }

    #[tokio::test]
    async fn test_extractor_reads_header_or_query() {
        let user = Uuid::new_v4();
        let jwt = token(&user.to_string(), Some("admin"), 3600);

        let request = Request::builder()
            .uri("/reports/grades")
            .header("authorization", format!("Bearer {}", jwt))
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        let ctx = assert_ok!(AuthContext::from_request_parts(&mut parts, &state()).await);
        assert_eq!(ctx.role, Role::Admin);

        let request = Request::builder()
            .uri(format!("/reports/grades?division_id=x&token={}", jwt))
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        let ctx = assert_ok!(AuthContext::from_request_parts(&mut parts, &state()).await);
        assert_eq!(ctx.user_id, user);

        let request = Request::builder().uri("/reports/grades").body(()).unwrap();
        let (mut parts, _) = request.into_parts();
        assert_err!(AuthContext::from_request_parts(&mut parts, &state()).await);
    }
}
