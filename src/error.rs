use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("os rng error: {message}")]
    OsRng { message: String },

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("code verifier not found or expired")]
    VerifierNotFound,

    #[error("credentials not found")]
    CredentialsNotFound,

    #[error("token exchange failed with status {status}: {body}")]
    Exchange { status: u16, body: String },

    #[error("upstream request failed with status {status}: {detail}")]
    Upstream { status: u16, detail: String },

    #[error("invalid response: {message}")]
    InvalidResponse { message: String, body: String },
}
