//! Auth services - Gestione autenticazione e registrazione utenti

use crate::core::{AppError, AppState, Json, encode_jwt};
use crate::dtos::{
    ApiResponse, CreateUserDTO, LoginDTO, LoginResponseDTO, MeDTO, MembershipDTO, UserDTO,
};
use crate::entities::{Role, User};
use crate::repositories::Create;
use axum::{
    Extension,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use validator::Validate;

fn header_value(value: String) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(&value).map_err(|e| {
        error!("Invalid header value: {:?}", e);
        AppError::internal_server_error("Failed to build response headers")
    })
}

#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn login_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginDTO>, // JSON body
) -> Result<impl IntoResponse, AppError> {
    debug!("Login attempt");
    // 1. Validare il body (email e password presenti) prima di toccare il DB
    // 2. Cercare l'utente per email; se non esiste UNAUTHORIZED
    // 3. Rifiutare gli utenti disattivati con lo stesso messaggio (nessun indizio sull'esistenza)
    // 4. Verificare la password contro l'hash bcrypt
    // 5. Generare il token JWT con la durata da configurazione
    // 6. Cookie HttpOnly + header Authorization, e nel body { token, user }
    body.validate()?;

    let user = match state.user.find_by_email(&body.email).await? {
        Some(user) => user,
        None => {
            warn!("Login failed: unknown email");
            return Err(AppError::unauthorized("Invalid email or password"));
        }
    };

    if !user.is_active || !user.verify_password(&body.password) {
        warn!("Login failed for user {}", user.user_id);
        return Err(AppError::unauthorized("Invalid email or password"));
    }

    let token = encode_jwt(&user, &state.jwt_secret, state.jwt_expiration_hours)?;

    let cookie_value = format!(
        "token={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        token,
        state.jwt_expiration_hours * 60 * 60
    );

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, header_value(cookie_value)?);
    headers.insert(
        header::AUTHORIZATION,
        header_value(format!("Bearer {}", token))?,
    );

    info!("User {} logged in", user.user_id);
    Ok((
        StatusCode::OK,
        headers,
        Json(ApiResponse::new(LoginResponseDTO {
            token,
            user: UserDTO::from(user),
        })),
    ))
}

#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn register_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateUserDTO>, // JSON body
) -> Result<impl IntoResponse, AppError> {
    debug!("Registering new user");
    // 1. Validare il DTO (nome, email, lunghezza password, telefono)
    // 2. Il ruolo super_admin non si può auto-assegnare
    // 3. Email già registrata -> CONFLICT
    // 4. Hash della password e salvataggio
    // 5. Ritornare l'utente creato senza password
    body.validate()?;

    if body.role == Some(Role::SuperAdmin) {
        warn!("Attempt to self-register as super admin");
        return Err(AppError::bad_request("Role super_admin cannot be self-assigned"));
    }

    if state.user.find_by_email(&body.email).await?.is_some() {
        warn!("Email already registered");
        return Err(AppError::conflict("Email already registered"));
    }

    let password_hash = User::hash_password(&body.password)?;
    let new_user = CreateUserDTO {
        password: password_hash,
        ..body
    };
    let created_user = state.user.create(&new_user).await?;

    info!("User registered with id {}", created_user.user_id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(UserDTO::from(created_user))),
    ))
}

#[instrument(skip(state, current_user), fields(user_id = %current_user.user_id))]
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
) -> Result<Json<ApiResponse<MeDTO>>, AppError> {
    debug!("Loading current user profile");
    let user_id = current_user.user_id;
    let clinics = state
        .user_clinic
        .list_for_user(user_id)
        .await?
        .into_iter()
        .map(|m| MembershipDTO::from_membership(m, user_id))
        .collect();

    Ok(Json(ApiResponse::new(MeDTO {
        user: UserDTO::from(current_user),
        clinics,
    })))
}
