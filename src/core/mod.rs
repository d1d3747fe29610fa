//! Core Module - Componenti infrastrutturali dell'applicazione
//!
//! Questo modulo contiene tutti i componenti "core" dell'applicazione:
//! - Autenticazione e JWT
//! - Contesto clinica (multi-tenancy) e filtri di accesso per ruolo
//! - Configurazione
//! - Gestione errori ed extractor con envelope di errore
//! - Stato applicazione

pub mod access;
pub mod auth;
pub mod clinic_context;
pub mod config;
pub mod error;
pub mod extract;
pub mod state;

// Re-exports per facilitare l'import
pub use access::{Resource, RowFilter, row_filter};
pub use auth::{Claims, authentication_middleware, decode_jwt, encode_jwt, require_role};
pub use clinic_context::{ClinicContext, clinic_context_middleware};
pub use config::Config;
pub use error::AppError;
pub use extract::{Json, Path, Query};
pub use state::AppState;
