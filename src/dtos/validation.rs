//! Regole di validazione condivise dai DTO

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Numero di telefono: prefisso internazionale opzionale, 6-20 cifre con spazi/trattini
    pub static ref PHONE_RE: Regex = Regex::new(r"^\+?[0-9][0-9 \-]{5,19}$").unwrap();
    pub static ref BLOOD_GROUP_RE: Regex = Regex::new(r"^(A|B|AB|O)[+-]$").unwrap();
    /// Codice clinica: maiuscole, cifre e trattini
    pub static ref CLINIC_CODE_RE: Regex = Regex::new(r"^[A-Z0-9][A-Z0-9\-]{1,19}$").unwrap();
    pub static ref CURRENCY_RE: Regex = Regex::new(r"^[A-Z]{3}$").unwrap();
}
