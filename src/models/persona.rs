use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Gender, stored as TEXT in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Genero {
    Masculino,
    Femenino,
    NoBinario,
    PrefieroNoReportar,
}

/// Identity document type, stored as TEXT in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TipoDocumento {
    TarjetaDeIdentidad,
    Cedula,
}

/// One stored personal record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Persona {
    pub id: i64,
    pub primer_nombre: String,
    pub segundo_nombre: Option<String>,
    pub apellidos: String,
    pub fecha_nacimiento: NaiveDate,
    pub genero: Genero,
    pub correo: String,
    pub celular: String,
    pub nro_documento: String,
    pub tipo_documento: TipoDocumento,
}

/// Create/update payload: everything but the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaInput {
    pub primer_nombre: String,
    pub segundo_nombre: Option<String>,
    pub apellidos: String,
    pub fecha_nacimiento: NaiveDate,
    pub genero: Genero,
    pub correo: String,
    pub celular: String,
    pub nro_documento: String,
    pub tipo_documento: TipoDocumento,
}

impl Persona {
    /// Short description used as embedding input for similarity search.
    pub fn embedding_text(&self) -> String {
        format!("{} {} - {}", self.primer_nombre, self.apellidos, self.correo)
    }
}
