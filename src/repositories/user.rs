//! UserRepository - Repository per la gestione degli utenti

use super::{Create, Read};
use crate::dtos::CreateUserDTO;
use crate::entities::{Role, User};
use sqlx::{Error, MySqlPool};
use tracing::{debug, info, instrument};

const USER_COLUMNS: &str = "user_id, name, email, password, role, phone, default_clinic_id, \
                            is_active, created_at, updated_at";

// USER REPO
pub struct UserRepository {
    connection_pool: MySqlPool,
}

impl UserRepository {
    pub fn new(connection_pool: MySqlPool) -> UserRepository {
        Self { connection_pool }
    }

    /// L'email è univoca: viene usata come credenziale di login
    #[instrument(skip(self, email))]
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        debug!("Finding user by email");
        let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.connection_pool)
            .await?;

        Ok(user)
    }
}

impl Create<User, CreateUserDTO> for UserRepository {
    /// `data.password` deve essere già l'hash bcrypt
    #[instrument(skip(self, data))]
    async fn create(&self, data: &CreateUserDTO) -> Result<User, Error> {
        debug!("Creating new user");
        let result = sqlx::query(
            "INSERT INTO users (name, email, password, role, phone) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&data.name)
        .bind(&data.email)
        .bind(&data.password)
        .bind(data.role.unwrap_or(Role::Staff))
        .bind(&data.phone)
        .execute(&self.connection_pool)
        .await?;

        let new_id = result.last_insert_id() as i32;
        info!("User created with id {}", new_id);

        self.read(&new_id).await?.ok_or(Error::RowNotFound)
    }
}

impl Read<User, i32> for UserRepository {
    #[instrument(skip(self), fields(user_id = %id))]
    async fn read(&self, id: &i32) -> Result<Option<User>, Error> {
        debug!("Reading user by id");
        let sql = format!("SELECT {} FROM users WHERE user_id = ?", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.connection_pool)
            .await?;

        Ok(user)
    }
}
