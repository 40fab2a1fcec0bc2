//! Error taxonomy shared by every fallible operation in the crate.
//!
//! Generation errors fall into three families (configuration, validation,
//! network). Storage and export failures get their own variants so the CLI
//! can tell a broken library file apart from a broken model response.

use thiserror::Error;

/// Every error the course studio can surface.
#[derive(Error, Debug)]
pub enum StudioError {
    /// Missing or blank credential, or an unusable client configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The model, an imported file or a command argument produced data
    /// without the required shape. The payload is a complete Spanish
    /// sentence shown to the user as-is.
    #[error("validation error: {0}")]
    Validation(String),

    /// Transport failure, non-success HTTP status, or an unreadable API envelope.
    #[error("network error: {0}")]
    Network(String),

    /// Reading or writing the persisted library failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Rendering or parsing a standalone study page failed.
    #[error("export error: {0}")]
    Export(String),
}

impl StudioError {
    /// Human-readable Spanish message for the blocking error dialog.
    ///
    /// The dialog never shows variant names or codes, only this text.
    /// Details carried by the other variants are written in Spanish too.
    pub fn user_message(&self) -> String {
        match self {
            StudioError::Configuration(_) => "Error de Configuración: falta la clave de acceso al \
                 servicio de IA. Configúrala en las variables de entorno e inténtalo de nuevo."
                .to_string(),
            StudioError::Validation(detail) => detail.clone(),
            StudioError::Network(detail) => format!("Error de Conexión: {detail}"),
            StudioError::Storage(detail) => {
                format!("No se pudo guardar o leer la biblioteca de materias: {detail}")
            }
            StudioError::Export(detail) => format!("No se pudo generar el aula virtual: {detail}"),
        }
    }

    /// Whether this error came from the credential check.
    pub fn is_configuration(&self) -> bool {
        matches!(self, StudioError::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, StudioError>;
