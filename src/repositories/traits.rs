//! Repository traits - Operazioni CRUD condivise dai repository delle cliniche
//!
//! Le tabelle di una clinica sono chiavi `(clinic_id, id)`: ogni `Read`/`Update`/`Delete`
//! riceve la tupla e filtra sempre su entrambe le colonne, quindi una riga di un'altra
//! clinica si comporta come una riga mancante. Le tabelle globali (utenti, cliniche)
//! usano l'id semplice; le membership usano `(user_id, clinic_id)`.

/// Inserimento. Per le tabelle di una clinica `CreateDTO` è `Scoped<Dto>`: la clinica e
/// l'autore arrivano dal contesto della richiesta, mai dal body.
pub trait Create<Entity, CreateDTO> {
    /// Ritorna la riga appena inserita, riletta con id e timestamp del database
    async fn create(&self, data: &CreateDTO) -> Result<Entity, sqlx::Error>;
}

/// Lettura per chiave, es. `(clinic_id, patient_id)`.
/// `Ok(None)` anche quando la riga esiste ma appartiene ad un'altra clinica.
pub trait Read<Entity, Id> {
    async fn read(&self, id: &Id) -> Result<Option<Entity>, sqlx::Error>;
}

/// Modifica parziale: vengono scritti solo i campi `Some(_)` del DTO.
/// `RowNotFound` se la chiave non esiste nella clinica.
pub trait Update<Entity, UpdateDTO, Id> {
    async fn update(&self, id: &Id, data: &UpdateDTO) -> Result<Entity, sqlx::Error>;
}

/// Cancellazione per chiave; `RowNotFound` se nessuna riga della clinica corrisponde
pub trait Delete<Id> {
    async fn delete(&self, id: &Id) -> Result<(), sqlx::Error>;
}

/// Payload di creazione legato alla clinica corrente e all'utente che esegue l'operazione
#[derive(Debug, Clone)]
pub struct Scoped<T> {
    pub clinic_id: i32,
    pub user_id: i32,
    pub data: T,
}

impl<T> Scoped<T> {
    pub fn new(clinic_id: i32, user_id: i32, data: T) -> Self {
        Self {
            clinic_id,
            user_id,
            data,
        }
    }
}
