use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("config parse error at line {line}: {msg}")]
    ParseConfig { line: u32, msg: String },

    #[error("invalid IPv4 address: {0}")]
    ParseIp(String),

    #[error("malformed policy request: {0}")]
    ParseQuery(String),

    #[error("DNS lookup failed: {0}")]
    Dns(String),

    #[error("protocol violation: {0}")]
    Logic(String),
}

impl DomainError {
    pub fn at_line(line: u32, msg: impl Into<String>) -> Self {
        DomainError::ParseConfig {
            line,
            msg: msg.into(),
        }
    }
}
