use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// No credential was supplied and none is present in the environment.
    #[error("Missing API key: pass --api-key or set {env_var}")]
    MissingCredential { env_var: String },
    /// The gateway answered with a non-success status or could not be reached.
    #[error("{}", gateway_message(.status, .details))]
    Gateway {
        status: Option<u16>,
        details: String,
    },
    /// The model id has no entry in the pricing catalog.
    #[error("Model {model_id} not found in pricing catalog{}", suggestion_suffix(.suggestion))]
    UnknownModelPricing {
        model_id: String,
        suggestion: Option<String>,
    },
    /// The model catalog could not be fetched or parsed.
    #[error("Failed to fetch models data: {0}")]
    CatalogUnavailable(String),
    /// A caller-supplied parameter is out of range.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// The requested operation is invalid in the current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Config(String),
    /// A generic system or unknown error.
    #[error("System error: {0}")]
    System(String),
}

impl Error {
    pub fn gateway_status(status: u16) -> Self {
        Error::Gateway {
            status: Some(status),
            details: String::new(),
        }
    }

    pub fn transport(details: impl Into<String>) -> Self {
        Error::Gateway {
            status: None,
            details: details.into(),
        }
    }
}

fn gateway_message(status: &Option<u16>, details: &str) -> String {
    match status {
        Some(code) => format!("Error: {code}"),
        None => format!("Error: {details}"),
    }
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|id| format!(" (did you mean '{id}'?)"))
        .unwrap_or_default()
}
