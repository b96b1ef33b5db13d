//! ELP codec errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for ELP operations.
pub type ElpResult<T> = Result<T, ElpError>;

/// Why a file was judged corrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Corruption {
    /// Constant-pool tag outside `0x03..=0x07`.
    #[error("unknown constant tag 0x{0:02x}")]
    ConstantTag(u8),
    /// Object kind other than method (`0x01`) or class (`0x02`).
    #[error("unknown object kind 0x{0:02x}")]
    ObjectKind(u8),
    /// Module type other than executable or library.
    #[error("unknown module type 0x{0:02x}")]
    ElpType(u8),
}

#[derive(Debug, Error)]
pub enum ElpError {
    #[error("file not found: '{}'", path.display())]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("'{}' is corrupted: {reason} at byte {offset}", path.display())]
    CorruptFile {
        path: PathBuf,
        offset: u64,
        reason: Corruption,
    },

    #[error("'{}' is truncated: unexpected end of input at byte {offset}", path.display())]
    UnexpectedEof { path: PathBuf, offset: u64 },

    #[error("i/o error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{what} has {len} entries, the format allows at most {max}")]
    LengthOverflow {
        what: &'static str,
        len: usize,
        max: usize,
    },

    #[error("nesting deeper than {limit} levels")]
    NestingTooDeep { limit: usize },
}

impl ElpError {
    /// Opening `path` for reading or writing failed.
    pub(crate) fn open(path: PathBuf, source: io::Error) -> Self {
        ElpError::FileNotFound { path, source }
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, ElpError::CorruptFile { .. } | ElpError::UnexpectedEof { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_corrupt_file_message() {
        let err = ElpError::CorruptFile {
            path: PathBuf::from("main.xp"),
            offset: 25,
            reason: Corruption::ConstantTag(0x08),
        };
        assert_eq!(err.to_string(), "'main.xp' is corrupted: unknown constant tag 0x08 at byte 25");
        assert_eq!(Corruption::ObjectKind(0xff).to_string(), "unknown object kind 0xff");
        assert!(err.is_corrupt());
    }
}
