use thiserror::Error;

/// Failures of the login flow against the management frontend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("no login form detected")]
    NoLoginForm,

    #[error("{0}")]
    InvalidCredentials(String),

    #[error("login form unusable: {0}")]
    BadForm(String),

    #[error("SSO redirect failed: {0}")]
    SsoRedirect(String),

    #[error("network error during login: {0}")]
    Network(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConsoleError {
    #[error("Authentication failed: {0}")]
    Authentication(#[from] AuthError),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected API response: {0}")]
    ApiFormat(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Not logged in to the management frontend")]
    NotAuthenticated,

    #[error("Console is shutting down")]
    Shutdown,
}

impl ConsoleError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, ConsoleError::Configuration(_))
    }
}

impl From<reqwest::Error> for ConsoleError {
    fn from(error: reqwest::Error) -> Self {
        ConsoleError::Network(error.to_string())
    }
}

impl From<rdkafka::error::KafkaError> for ConsoleError {
    fn from(error: rdkafka::error::KafkaError) -> Self {
        ConsoleError::Broker(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConsoleError>;
