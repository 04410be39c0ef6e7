use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiServiceErrorKind {
    /// Request or batch deadline exceeded.
    Timeout,
    /// Could not reach the collaborator.
    Connect,
    /// Non-2xx response status.
    Http(u16),
    /// 2xx envelope reporting failure on the collaborator side.
    Service,
    /// Response body did not match the expected shape. Not retryable:
    /// a malformed contract will not fix itself within a cycle.
    Decode,
}

#[derive(Debug, Clone)]
pub struct AiServiceError {
    pub kind: AiServiceErrorKind,
    pub detail: String,
}

impl AiServiceError {
    pub fn new(kind: AiServiceErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        !matches!(self.kind, AiServiceErrorKind::Decode)
    }
}

impl fmt::Display for AiServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            AiServiceErrorKind::Timeout => write!(f, "AI service timeout: {}", self.detail),
            AiServiceErrorKind::Connect => {
                write!(f, "AI service connection failed: {}", self.detail)
            }
            AiServiceErrorKind::Http(status) => {
                write!(f, "AI service HTTP {status}: {}", self.detail)
            }
            AiServiceErrorKind::Service => write!(f, "AI service error: {}", self.detail),
            AiServiceErrorKind::Decode => {
                write!(f, "AI service response decode failed: {}", self.detail)
            }
        }
    }
}

impl std::error::Error for AiServiceError {}

impl From<reqwest::Error> for AiServiceError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            AiServiceErrorKind::Timeout
        } else if err.is_connect() {
            AiServiceErrorKind::Connect
        } else if err.is_decode() {
            AiServiceErrorKind::Decode
        } else {
            // Remaining request errors (dns, tls, body) are treated as
            // connectivity problems and stay retryable.
            AiServiceErrorKind::Connect
        };
        Self::new(kind, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        for kind in [
            AiServiceErrorKind::Timeout,
            AiServiceErrorKind::Connect,
            AiServiceErrorKind::Http(503),
            AiServiceErrorKind::Service,
        ] {
            assert!(AiServiceError::new(kind, "x").is_transient(), "{kind:?}");
        }
        assert!(!AiServiceError::new(AiServiceErrorKind::Decode, "x").is_transient());
    }
}
