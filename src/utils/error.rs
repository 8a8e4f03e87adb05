use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: &'static str },

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Forward error: {0}")]
    Forward(#[from] ForwardError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Server error: {message}")]
    ServerError { message: String },
}

/// 批次內容解析失敗。解析是全有或全無，失敗時不會留下部分結果。
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("failed to read request body: {0}")]
    UnreadableBody(String),

    #[error("invalid XML: {0}")]
    InvalidXml(String),

    #[error("unexpected XML root element '{found}', expected 'users'")]
    UnexpectedRoot { found: String },

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("failed to serialize records: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("downstream request timed out")]
    Timeout,

    #[error("failed to send request: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("remote server returned status {status}: {body}")]
    Status { status: u16, body: String },
}

impl From<reqwest::Error> for ForwardError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ForwardError::Timeout
        } else {
            ForwardError::Transport(err)
        }
    }
}

impl DecodeError {
    /// 回傳給呼叫端的訊息，不含內部解析細節
    pub fn client_message(&self) -> &'static str {
        match self {
            DecodeError::UnreadableBody(_) => "Failed to read request body",
            DecodeError::InvalidXml(_) | DecodeError::UnexpectedRoot { .. } => {
                "Invalid XML format"
            }
            DecodeError::InvalidJson(_) => "Invalid JSON format",
        }
    }
}

impl RelayError {
    pub fn status_code(&self) -> u16 {
        match self {
            RelayError::Unauthorized { .. } => 401,
            RelayError::Decode(_) => 400,
            _ => 500,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            RelayError::Unauthorized { reason } => format!("unauthorized: {}", reason),
            RelayError::Decode(e) => e.client_message().to_string(),
            RelayError::Forward(_) => "Failed to send data to remote server".to_string(),
            RelayError::ConfigError { .. }
            | RelayError::ConfigValidationError { .. }
            | RelayError::InvalidConfigValueError { .. }
            | RelayError::MissingConfigError { .. } => format!("Configuration problem: {}", self),
            RelayError::IoError(_) | RelayError::ServerError { .. } => {
                "Internal server error".to_string()
            }
        }
    }

    /// 是否在有用的工作完成之後才失敗（結果已計算但未送達）
    pub fn is_delivery_failure(&self) -> bool {
        matches!(self, RelayError::Forward(_))
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
