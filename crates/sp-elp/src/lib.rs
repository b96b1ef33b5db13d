//! # sp-elp
//!
//! Reader and writer for ELP, the binary container the Spade compiler emits
//! and the VM loads.
//!
//! - **Model**: `ElpInfo` and the entity types it owns (`elpdef`)
//! - **Reader**: `ElpReader` decodes a byte stream in one forward pass
//! - **Writer**: `ElpWriter` encodes the model, deriving every count
//!
//! All multi-byte integers are big-endian. Method bytecode is carried as an
//! opaque byte array; see `sp-opcode` for its meaning.
//!
//! # Example
//!
//! ```ignore
//! use sp_elp::{CpInfo, ElpInfo, ElpType, MethodInfo};
//!
//! let mut elp = ElpInfo::new(ElpType::Executable);
//! let main = elp.add_constant(CpInfo::from_string("main"))?;
//! elp.objects.push(MethodInfo::new(main).into());
//! sp_elp::save("hello.xp", &elp)?;
//!
//! assert_eq!(sp_elp::load("hello.xp")?, elp);
//! ```

mod bytes;
mod config;
mod elpdef;
mod error;
mod reader;
mod writer;

use std::fs::File;
use std::io::Write;
use std::path::Path;

use log::debug;

pub use bytes::{ByteReader, ByteWriter};
pub use config::{ElpConfig, MAX_DEPTH_ENV};
pub use elpdef::*;
pub use error::{Corruption, ElpError, ElpResult};
pub use reader::ElpReader;
pub use writer::ElpWriter;

/// Decode an ELP image held in memory.
pub fn decode(bytes: &[u8]) -> ElpResult<ElpInfo> {
    ElpReader::new(bytes, "<memory>")
        .with_config(ElpConfig::from_env())
        .read()
}

/// Encode `elp` into a fresh buffer.
pub fn encode(elp: &ElpInfo) -> ElpResult<Vec<u8>> {
    ElpWriter::new(Vec::new(), "<memory>")
        .with_config(ElpConfig::from_env())
        .write(elp)
}

/// Read the ELP file at `path`.
pub fn load<P: AsRef<Path>>(path: P) -> ElpResult<ElpInfo> {
    ElpReader::open(path)?.with_config(ElpConfig::from_env()).read()
}

/// Write `elp` to `path`, replacing any existing file.
///
/// The module is encoded in memory first; an encoding error leaves the
/// file at `path` untouched.
pub fn save<P: AsRef<Path>>(path: P, elp: &ElpInfo) -> ElpResult<()> {
    let path = path.as_ref();
    let bytes = ElpWriter::new(Vec::new(), path)
        .with_config(ElpConfig::from_env())
        .write(elp)?;
    let mut file = File::create(path).map_err(|e| ElpError::open(path.to_path_buf(), e))?;
    file.write_all(&bytes)
        .and_then(|()| file.flush())
        .map_err(|source| ElpError::Io { path: path.to_path_buf(), source })?;
    debug!("saved '{}': {} bytes", path.display(), bytes.len());
    Ok(())
}
