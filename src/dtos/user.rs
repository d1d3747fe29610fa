//! User & Auth DTOs - Registrazione, login e profilo utente

use super::validation::PHONE_RE;
use crate::entities::{MembershipWithClinic, Role, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

// struct per gestire io col client: la password non esce mai
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserDTO {
    pub user_id: i32,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub phone: Option<String>,
    pub default_clinic_id: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserDTO {
    fn from(value: User) -> Self {
        Self {
            user_id: value.user_id,
            name: value.name,
            email: value.email,
            role: value.role,
            phone: value.phone,
            default_clinic_id: value.default_clinic_id,
            is_active: value.is_active,
            created_at: value.created_at,
        }
    }
}

/// DTO per registrare un nuovo utente
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateUserDTO {
    #[validate(length(min = 2, max = 100, message = "Name must be between 2 and 100 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(regex(path = *PHONE_RE, message = "Invalid phone number"))]
    pub phone: Option<String>,
    pub role: Option<Role>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct LoginDTO {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Serialize, Debug)]
pub struct LoginResponseDTO {
    pub token: String,
    pub user: UserDTO,
}

/// Clinica a cui l'utente appartiene, con il suo ruolo
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MembershipDTO {
    pub clinic_id: i32,
    pub name: String,
    pub code: String,
    pub role: Role,
    pub is_owner: bool,
    pub joined_at: DateTime<Utc>,
}

impl MembershipDTO {
    pub fn from_membership(value: MembershipWithClinic, user_id: i32) -> Self {
        Self {
            clinic_id: value.clinic_id,
            name: value.clinic_name,
            code: value.clinic_code,
            role: value.role,
            is_owner: value.owner_id == user_id,
            joined_at: value.joined_at,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct MeDTO {
    pub user: UserDTO,
    pub clinics: Vec<MembershipDTO>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_dto_never_exposes_password() {
        let user = User {
            user_id: 1,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "$2b$12$hash".to_string(),
            role: Role::Doctor,
            phone: None,
            default_clinic_id: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(UserDTO::from(user)).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["role"], "doctor");
    }

    #[test]
    fn registration_rules() {
        let mut dto = CreateUserDTO {
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password: "supersecret".to_string(),
            phone: Some("+44 20 7946 0000".to_string()),
            role: None,
        };
        assert!(dto.validate().is_ok());

        dto.password = "short".to_string();
        assert!(dto.validate().is_err());

        dto.password = "supersecret".to_string();
        dto.email = "not-an-email".to_string();
        assert!(dto.validate().is_err());
    }
}
