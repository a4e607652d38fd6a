//! Accounts, roles and JWT claims

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::text_enum;
use crate::{config::AuthConfig, error::AppError};

/// Kind of principal owning an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Staff,
    Member,
}

text_enum!(UserType {
    Staff => "staff",
    Member => "member",
});

/// Role claim carried in tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Librarian,
    Member,
}

text_enum!(Role {
    Admin => "admin",
    Librarian => "librarian",
    Member => "member",
});

impl Role {
    /// Roles a principal of the given kind may hold
    pub fn is_valid_for(&self, user_type: UserType) -> bool {
        match user_type {
            UserType::Staff => matches!(self, Role::Admin | Role::Librarian),
            UserType::Member => matches!(self, Role::Member),
        }
    }
}

/// Credentials and role record, owned one-to-one by a member or a staff
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Account {
    pub id: i32,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub user_type: UserType,
    pub role: Role,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// JWT claims for authenticated principals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserClaims {
    /// Account id
    pub sub: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub user_type: UserType,
    /// Member id or staff id, depending on `user_type`
    pub profile_id: i32,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse and validate a JWT token (signature, expiry, issuer, audience)
    pub fn from_token(token: &str, config: &AuthConfig) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let mut validation = Validation::default();
        validation.set_issuer(&[config.jwt_issuer.as_str()]);
        validation.set_audience(&[config.jwt_audience.as_str()]);
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            &validation,
        )?;
        Ok(token_data.claims)
    }

    pub fn account_id(&self) -> Result<i32, AppError> {
        self.sub
            .parse()
            .map_err(|_| AppError::Authentication("Malformed subject claim".to_string()))
    }

    pub fn is_staff(&self) -> bool {
        self.user_type == UserType::Staff
    }

    pub fn is_admin(&self) -> bool {
        self.is_staff() && self.role == Role::Admin
    }

    /// Staff id when the principal is staff
    pub fn staff_id(&self) -> Option<i32> {
        self.is_staff().then_some(self.profile_id)
    }

    /// Member id when the principal is a member
    pub fn member_id(&self) -> Option<i32> {
        (!self.is_staff()).then_some(self.profile_id)
    }

    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(AppError::Authorization("Staff access required".to_string()))
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization("Administrator privileges required".to_string()))
        }
    }

    /// Staff may act on any member; a member only on themselves
    pub fn require_member_access(&self, member_id: i32) -> Result<(), AppError> {
        if self.is_staff() || self.member_id() == Some(member_id) {
            Ok(())
        } else {
            Err(AppError::Authorization("Access to another member's data denied".to_string()))
        }
    }
}

/// Login request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Authenticated principal, as returned by login and `/auth/me`
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CurrentUser {
    pub account_id: i32,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub user_type: UserType,
    pub profile_id: i32,
}

impl TryFrom<&UserClaims> for CurrentUser {
    type Error = AppError;

    fn try_from(claims: &UserClaims) -> Result<Self, Self::Error> {
        Ok(Self {
            account_id: claims.account_id()?,
            email: claims.email.clone(),
            name: claims.name.clone(),
            role: claims.role,
            user_type: claims.user_type,
            profile_id: claims.profile_id,
        })
    }
}

/// Login response
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    /// Token lifetime in seconds
    pub expires_in: i64,
    pub user: CurrentUser,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePassword {
    pub current_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".to_string(),
            ..AuthConfig::default()
        }
    }

    fn claims(user_type: UserType, role: Role) -> UserClaims {
        let now = chrono::Utc::now().timestamp();
        let config = config();
        UserClaims {
            sub: "7".to_string(),
            email: "reader@example.org".to_string(),
            name: "Ada Reader".to_string(),
            role,
            user_type,
            profile_id: 3,
            iss: config.jwt_issuer,
            aud: config.jwt_audience,
            exp: now + 3600,
            iat: now,
        }
    }

    #[test]
    fn token_round_trip() {
        let original = claims(UserType::Member, Role::Member);
        let token = original.create_token("test-secret").unwrap();
        let parsed = UserClaims::from_token(&token, &config()).unwrap();
        assert_eq!(parsed, original);
        assert_eq!(parsed.account_id().unwrap(), 7);
    }

    #[test]
    fn token_with_wrong_audience_is_rejected() {
        let mut original = claims(UserType::Staff, Role::Librarian);
        original.aud = "someone-else".to_string();
        let token = original.create_token("test-secret").unwrap();
        assert!(UserClaims::from_token(&token, &config()).is_err());
    }

    #[test]
    fn token_with_wrong_secret_is_rejected() {
        let token = claims(UserType::Staff, Role::Admin).create_token("other").unwrap();
        assert!(UserClaims::from_token(&token, &config()).is_err());
    }

    #[test]
    fn member_can_only_reach_own_data() {
        let member = claims(UserType::Member, Role::Member);
        assert!(member.require_member_access(3).is_ok());
        assert!(member.require_member_access(4).is_err());
        assert!(member.require_staff().is_err());
        assert_eq!(member.staff_id(), None);

        let librarian = claims(UserType::Staff, Role::Librarian);
        assert!(librarian.require_member_access(4).is_ok());
        assert!(librarian.require_admin().is_err());
        assert_eq!(librarian.staff_id(), Some(3));
    }

    #[test]
    fn current_user_requires_numeric_subject() {
        let claims = claims(UserType::Member, Role::Member);
        assert_eq!(CurrentUser::try_from(&claims).unwrap().account_id, 7);

        let malformed = UserClaims {
            sub: "not-a-number".to_string(),
            ..claims
        };
        assert!(matches!(
            CurrentUser::try_from(&malformed),
            Err(AppError::Authentication(_))
        ));
    }

    #[test]
    fn roles_match_principal_kind() {
        assert!(Role::Admin.is_valid_for(UserType::Staff));
        assert!(!Role::Member.is_valid_for(UserType::Staff));
        assert!(Role::Member.is_valid_for(UserType::Member));
        assert!(!Role::Librarian.is_valid_for(UserType::Member));
        assert_eq!("LIBRARIAN".parse::<Role>().unwrap(), Role::Librarian);
    }
}
