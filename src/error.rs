use std::io;
use thiserror::Error;

/// Errors raised while parsing a received frame.
///
/// These never leave the classifier: any of them demotes the frame to
/// [`Classification::NoMatch`](crate::probe::Classification::NoMatch).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("truncated packet: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("malformed extension header chain at offset {offset}")]
    MalformedExtensionChain { offset: usize },
}

/// Fatal errors that abort a trace run
#[derive(Debug, Error)]
pub enum TraceError {
    /// Target is not an IPv6 literal
    #[error("invalid IPv6 target address '{0}'")]
    InvalidTarget(String),

    /// The transport failed for a reason other than a timeout
    #[error("transport {op} failed: {source}")]
    Transport {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    /// Writing the per-hop output failed
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

impl TraceError {
    pub(crate) fn transport(op: &'static str, source: io::Error) -> Self {
        Self::Transport { op, source }
    }
}
