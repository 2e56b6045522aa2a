//! Error kinds surfaced across the engine boundary.

use thiserror::Error;

/// Stable error discriminant returned by engine operations.
///
/// Absence is never represented here — it is a distinguished `None`/empty
/// return value, not an error.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR no such key")]
    NoSuchKey,

    #[error("ERR value is not an integer or out of range")]
    NotInteger,

    #[error("ERR value is not a valid float")]
    NotFloat,

    #[error("ERR increment or decrement would overflow")]
    Overflow,

    #[error("ERR invalid value")]
    InvalidValue,

    #[error("ERR index out of range")]
    IndexOutOfRange,

    #[error("ERR Invalid stream ID specified as stream command argument")]
    InvalidStreamId,

    #[error("ERR The ID specified in XADD is equal or smaller than the target stream top item")]
    StreamIdTooSmall,

    #[error("ERR Bad data format")]
    InvalidDumpPayload,

    #[error("ERR DUMP payload version or checksum are wrong")]
    DumpChecksumMismatch,

    #[error("ERR unknown DUMP type tag")]
    UnknownDumpType,

    #[error("BUSYKEY Target key name already exists")]
    KeyAlreadyExists,

    #[error("NOGROUP No such consumer group")]
    NoGroup,

    #[error("BUSYGROUP Consumer Group name already exists")]
    GroupExists,

    #[error("ERR no such key in group's pending list")]
    NoKey,

    #[error("OOM command not allowed when used memory > 'maxmemory'")]
    OutOfMemory,
}

pub type EngineResult<T> = Result<T, EngineError>;
