use std::fmt::Display;

#[derive(Debug)]
pub enum SheetsError {
    ArgumentError { arg: String },
    CredentialsError { path: String, reason: String },
    ApiError { status: u16, body: String },
    IOError(std::io::Error),
    ReqwestError(reqwest::Error),
    JsonError(serde_json::Error),
    JwtError(jsonwebtoken::errors::Error),
}

impl Display for SheetsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetsError::ArgumentError { arg } => write!(f, "argument not valid: {}", arg),
            SheetsError::CredentialsError { path, reason } => {
                write!(f, "credentials {} not usable: {}", path, reason)
            }
            SheetsError::ApiError { status, body } => {
                write!(f, "sheets api returned {}: {}", status, body)
            }
            SheetsError::IOError(e) => write!(f, "io: {}", e),
            SheetsError::ReqwestError(e) => write!(f, "reqwest: {}", e),
            SheetsError::JsonError(e) => write!(f, "json: {}", e),
            SheetsError::JwtError(e) => write!(f, "jwt: {}", e),
        }
    }
}

impl std::error::Error for SheetsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SheetsError::IOError(e) => Some(e),
            SheetsError::ReqwestError(e) => Some(e),
            SheetsError::JsonError(e) => Some(e),
            SheetsError::JwtError(e) => Some(e),
            _ => None,
        }
    }
}

impl SheetsError {
    pub fn invalid_argument(arg: &str) -> SheetsError {
        SheetsError::ArgumentError {
            arg: arg.to_string(),
        }
    }
    pub fn invalid_credentials(path: &str, reason: impl Display) -> SheetsError {
        SheetsError::CredentialsError {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<std::io::Error> for SheetsError {
    fn from(e: std::io::Error) -> Self {
        SheetsError::IOError(e)
    }
}

impl From<reqwest::Error> for SheetsError {
    fn from(e: reqwest::Error) -> Self {
        SheetsError::ReqwestError(e)
    }
}

impl From<serde_json::Error> for SheetsError {
    fn from(e: serde_json::Error) -> Self {
        SheetsError::JsonError(e)
    }
}

impl From<jsonwebtoken::errors::Error> for SheetsError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        SheetsError::JwtError(e)
    }
}

pub type Result<T> = std::result::Result<T, SheetsError>;
