//! The error kinds when processing TAF/MAF alignment files

use std::io;
use thiserror::Error;

/// All errors surfaced by the library
#[derive(Error, Debug)]
pub enum TafError {
    /// Error when file or stream input/output
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Header line does not match the expected prefix or a tag is malformed
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// A record line has missing, malformed or count-inconsistent fields
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// A TAF row-edit opcode outside {i, s, d, g, G}
    #[error("unknown row operation `{0}`")]
    UnknownOp(String),

    /// Stream is gzip (not BGZF) or a pipe, and the operation requires seek
    #[error("unsupported compression: input is not seekable (plain or bgzip required)")]
    UnsupportedCompression,

    /// Region query names a contig/position not covered by the index
    #[error("region `{0}` not found in index")]
    IndexMiss(String),

    /// The indexed file violates an index requirement
    #[error("cannot index: {0}")]
    IndexConflict(String),

    /// Parse Int error
    #[error("parse int error for `{0}`")]
    ParseInt(String),

    /// Parse Strand error
    #[error("parse strand error for `{0}`")]
    ParseStrand(String),

    /// Parse region error
    #[error("parse region error for `{0}`")]
    ParseRegion(String),

    /// Serde error when serializing reports
    #[error("serialize error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Empty file/stream
    #[error("empty input: {0}")]
    Empty(String),
}

impl TafError {
    /// Attach the byte offset where a record error was detected
    pub fn at_offset(self, offset: u64) -> TafError {
        match self {
            TafError::MalformedRecord(msg) => {
                TafError::MalformedRecord(format!("{} (at byte offset {})", msg, offset))
            }
            TafError::MalformedHeader(msg) => {
                TafError::MalformedHeader(format!("{} (at byte offset {})", msg, offset))
            }
            other => other,
        }
    }
}
