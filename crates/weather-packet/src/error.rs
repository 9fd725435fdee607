use thiserror::Error;

/// Why a line was not accepted as a packet.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum Rejected {
    #[error("packet too short: {0} chars")]
    TooShort(usize),
    #[error("packet does not start with 'c'")]
    BadStartMarker,
    #[error("expected exactly one '*' terminator, found {0}")]
    TerminatorCount(usize),
    #[error("packet contains non-ASCII bytes")]
    NotAscii,
    #[error("field {0} is not a decimal number")]
    BadField(&'static str),
}
