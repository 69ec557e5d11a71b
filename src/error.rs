//! Crate-wide error type and the `err_at!` construction macro.
//!
//! Every fallible operation in this crate returns [Result]. Errors carry the
//! file/line where they were raised so that a misbehaving record or postings
//! file can be traced back to the exact check that rejected it.

use std::{fmt, io, result};

/// Error taxonomy for the archive/index/query pipeline. See spec. 7 for the
/// propagation policy: `MalformedInput`, `NotFound` and `Truncation` are
/// recoverable and are expected to be counted, not fatal; `IOError`,
/// `QueryParseError` and the internal kinds below always abort the operation
/// that raised them.
#[derive(Debug)]
pub enum Error {
    /// XML tokenizer or partitioner hit an unrecoverable construct.
    MalformedInput(String, String),
    /// fetch/stream/delete of an absent archive entry.
    NotFound(String, String),
    /// Turbo length hint disagreed with the actual record size.
    Truncation(String, String),
    /// Boolean/phrase query could not be parsed; position is 0-based byte offset.
    QueryParseError(String, usize, String),
    /// Transient file or pipe failure.
    IOError(String, String),
    /// A decode of an on-disk structure (postings, fragment, envelope) failed.
    DecodeFail(String, String),
    /// A worker or unshuffler thread panicked or its channel broke.
    ThreadFail(String, String),
    /// Inter-stage channel send/receive failed outside of a clean shutdown.
    IPCFail(String, String),
    /// Caller supplied an argument outside its documented domain.
    InvalidInput(String, String),
    /// Invariant violated; should not happen given well-formed callers.
    Fatal(String, String),
}

pub type Result<T> = result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Error::*;

        match self {
            MalformedInput(p, msg) => write!(f, "MalformedInput at {}: {}", p, msg),
            NotFound(p, msg) => write!(f, "NotFound at {}: {}", p, msg),
            Truncation(p, msg) => write!(f, "Truncation at {}: {}", p, msg),
            QueryParseError(p, pos, msg) => {
                write!(f, "QueryParseError at {} (pos {}): {}", p, pos, msg)
            }
            IOError(p, msg) => write!(f, "IOError at {}: {}", p, msg),
            DecodeFail(p, msg) => write!(f, "DecodeFail at {}: {}", p, msg),
            ThreadFail(p, msg) => write!(f, "ThreadFail at {}: {}", p, msg),
            IPCFail(p, msg) => write!(f, "IPCFail at {}: {}", p, msg),
            InvalidInput(p, msg) => write!(f, "InvalidInput at {}: {}", p, msg),
            Fatal(p, msg) => write!(f, "Fatal at {}: {}", p, msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IOError("std::io".to_string(), err.to_string())
    }
}

/// Build an [Error] tagged with the call site, or lift a `Result<T, E: Display>`
/// into `Result<T>` tagged the same way.
///
/// ```ignore
/// err_at!(NotFound, msg: "id {} missing", id)?;
/// err_at!(IOError, fs::read(path))?;
/// ```
#[macro_export]
macro_rules! err_at {
    ($v:ident, msg: $($arg:expr),+) => {{
        let prefix = format!("{}:{}", file!(), line!());
        Err($crate::error::Error::$v(prefix, format!($($arg),+)))
    }};
    ($v:ident, $e:expr) => {{
        let prefix = format!("{}:{}", file!(), line!());
        match $e {
            Ok(val) => Ok(val),
            Err(err) => Err($crate::error::Error::$v(prefix, err.to_string())),
        }
    }};
}
