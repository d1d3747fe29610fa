use crate::core::{AppError, AppState, ClinicContext};
use crate::entities::{Role, User};
use crate::repositories::Read;
use axum::extract::State;
use axum::{body::Body, extract::Request, http, http::Response, middleware::Next};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

// struct che codifica il contenuto del token jwt
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub exp: usize, // Expiry time of the token
    pub iat: usize, // Issued at time of the token
    pub id: i32,
    pub email: String,
    pub role: Role,
}

#[instrument(skip(user, secret), fields(user_id = %user.user_id))]
pub fn encode_jwt(user: &User, secret: &str, lifetime_hours: i64) -> Result<String, AppError> {
    debug!("Encoding JWT token for user");
    let now = Utc::now();
    let expire = Duration::hours(lifetime_hours);
    let claim = Claims {
        iat: now.timestamp() as usize,
        exp: (now + expire).timestamp() as usize,
        id: user.user_id,
        email: user.email.clone(),
        role: user.role,
    };

    encode(
        &Header::default(),
        &claim,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map(|token| {
        info!("JWT token encoded successfully");
        token
    })
    .map_err(|e| {
        error!("Failed to encode JWT token: {:?}", e);
        AppError::internal_server_error("Error in encoding jwt token")
    })
}

#[instrument(skip(jwt_token, secret))]
pub fn decode_jwt(jwt_token: &str, secret: &str) -> Result<TokenData<Claims>, AppError> {
    debug!("Decoding JWT token");
    decode(
        jwt_token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data: TokenData<Claims>| {
        debug!("JWT token decoded successfully for user: {}", data.claims.id);
        data
    })
    .map_err(AppError::from)
}

/// Estrae il token dall'header `Authorization: Bearer ...` o, in alternativa, dal cookie `token`
fn extract_token(req: &Request) -> Result<Option<String>, AppError> {
    if let Some(header) = req.headers().get(http::header::AUTHORIZATION) {
        let value = header.to_str().map_err(|_| {
            warn!("Invalid authorization header format");
            AppError::forbidden("Empty header is not allowed")
        })?;
        let mut parts = value.split_whitespace();
        return match (parts.next(), parts.next()) {
            (Some(scheme), Some(token)) if scheme.eq_ignore_ascii_case("bearer") => {
                Ok(Some(token.to_string()))
            }
            _ => {
                warn!("Authorization header is not a bearer token");
                Err(AppError::unauthorized("Malformed authorization header"))
            }
        };
    }

    let from_cookie = req
        .headers()
        .get_all(http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().strip_prefix("token="))
        .find(|token| !token.is_empty())
        .map(str::to_string);

    Ok(from_cookie)
}

#[instrument(skip(state, req, next))]
pub async fn authentication_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response<Body>, AppError> {
    debug!("Running authentication middleware");
    let token = extract_token(&req)?.ok_or_else(|| {
        warn!("Missing authorization header");
        AppError::forbidden("Please add the JWT token to the header")
    })?;

    let token_data = decode_jwt(&token, &state.jwt_secret).map_err(|_| {
        warn!("Failed to decode JWT token");
        AppError::unauthorized("Unable to decode token")
    })?;

    // Fetch the user details from the database
    let current_user = match state.user.read(&token_data.claims.id).await? {
        Some(user) if user.is_active => {
            debug!("User authenticated: {}", user.user_id);
            user
        }
        Some(user) => {
            warn!("Inactive user tried to authenticate: {}", user.user_id);
            return Err(AppError::unauthorized("Account is disabled"));
        }
        None => {
            warn!("User not found in database: {}", token_data.claims.id);
            return Err(AppError::unauthorized("You are not an authorized user"));
        }
    };
    req.extensions_mut().insert(current_user);
    Ok(next.run(req).await)
}

/// Helper per verificare che l'utente abbia, nella clinica corrente, uno dei ruoli richiesti
///
/// # Arguments
/// * `ctx` - Il contesto clinica inserito dal clinic_context_middleware
/// * `allowed_roles` - Lista di ruoli permessi (il super admin vale come admin)
pub fn require_role(ctx: &ClinicContext, allowed_roles: &[Role]) -> Result<(), AppError> {
    let role = ctx.role();
    if role == Role::Admin || allowed_roles.contains(&role) {
        debug!("Role check passed for user {} with role {:?}", ctx.user_id, role);
        return Ok(());
    }

    warn!(
        "User {} has insufficient role {:?}, required one of: {:?}",
        ctx.user_id, role, allowed_roles
    );
    Err(AppError::forbidden("Insufficient role").with_details(format!(
        "This action requires one of the following roles: {:?}",
        allowed_roles
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Clinic, UserClinic};
    use axum::http::StatusCode;
    use sqlx::types::Json;

    fn user(role: Role) -> User {
        User {
            user_id: 42,
            name: "Dr. House".to_string(),
            email: "house@example.com".to_string(),
            password: String::new(),
            role,
            phone: None,
            default_clinic_id: Some(1),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn context(role: Role) -> ClinicContext {
        ClinicContext {
            user_id: 42,
            clinic: Clinic {
                clinic_id: 1,
                name: "Smile".to_string(),
                code: "SMILE".to_string(),
                address: None,
                phone: None,
                email: None,
                owner_id: 1,
                currency: "EUR".to_string(),
                timezone: "UTC".to_string(),
                is_active: true,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            membership: UserClinic {
                user_id: 42,
                clinic_id: 1,
                role,
                permissions: Json(role.default_permissions()),
                department_id: None,
                is_active: true,
                joined_at: Utc::now(),
            },
        }
    }

    #[test]
    fn jwt_round_trip_keeps_claims() {
        let token = encode_jwt(&user(Role::Doctor), "secret", 1).unwrap();
        let data = decode_jwt(&token, "secret").unwrap();
        assert_eq!(data.claims.id, 42);
        assert_eq!(data.claims.email, "house@example.com");
        assert_eq!(data.claims.role, Role::Doctor);
        assert!(data.claims.exp > data.claims.iat);
    }

    #[test]
    fn jwt_with_wrong_secret_is_rejected() {
        let token = encode_jwt(&user(Role::Doctor), "secret", 1).unwrap();
        let err = decode_jwt(&token, "another-secret").unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn require_role_accepts_listed_roles() {
        assert!(require_role(&context(Role::Doctor), &[Role::Doctor, Role::Nurse]).is_ok());
    }

    #[test]
    fn require_role_rejects_other_roles() {
        let err = require_role(&context(Role::Receptionist), &[Role::Doctor]).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert!(err.details().unwrap().contains("Doctor"));
    }

    #[test]
    fn admins_pass_every_role_check() {
        assert!(require_role(&context(Role::Admin), &[Role::Accountant]).is_ok());
        assert!(require_role(&context(Role::SuperAdmin), &[Role::Accountant]).is_ok());
    }
}
