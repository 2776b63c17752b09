use crate::error::{NovaError, Result};

/// Error half of the envelope: a human-readable message and a stable code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorDetail {
    pub message: String,
    pub code: i32,
}

impl From<&NovaError> for ErrorDetail {
    fn from(e: &NovaError) -> Self {
        Self {
            message: e.to_string(),
            code: e.code(),
        }
    }
}

impl std::fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Outcome of one operation, consumed exactly once by the caller.
///
/// `OkInline` carries payloads that own no secondary buffers (completion
/// markers); callers treat it exactly like `Ok`.
#[derive(Debug)]
pub enum Envelope<T> {
    Ok(T),
    OkInline(T),
    Err(ErrorDetail),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Tag {
    Ok,
    Err,
    OkInline,
}

impl<T> Envelope<T> {
    pub fn from_result(r: Result<T>) -> Self {
        match r {
            Ok(v) => Envelope::Ok(v),
            Err(e) => Envelope::fail(&e),
        }
    }

    pub fn fail(e: &NovaError) -> Self {
        tracing::error!(code = e.code(), "{e}");
        Envelope::Err(ErrorDetail::from(e))
    }

    pub fn tag(&self) -> Tag {
        match self {
            Envelope::Ok(_) => Tag::Ok,
            Envelope::OkInline(_) => Tag::OkInline,
            Envelope::Err(_) => Tag::Err,
        }
    }

    pub fn is_ok(&self) -> bool {
        !matches!(self, Envelope::Err(_))
    }

    pub fn into_result(self) -> std::result::Result<T, ErrorDetail> {
        match self {
            Envelope::Ok(v) | Envelope::OkInline(v) => Ok(v),
            Envelope::Err(d) => Err(d),
        }
    }

    pub fn error(&self) -> Option<&ErrorDetail> {
        match self {
            Envelope::Err(d) => Some(d),
            _ => None,
        }
    }
}

impl Envelope<()> {
    pub fn completed(r: Result<()>) -> Self {
        match r {
            Ok(()) => Envelope::OkInline(()),
            Err(e) => Envelope::fail(&e),
        }
    }
}

/// Releases a batch of envelopes. Dropping does the work; kept for boundary parity.
pub fn release_all<T>(envelopes: impl IntoIterator<Item = Envelope<T>>) -> usize {
    envelopes.into_iter().count()
}
