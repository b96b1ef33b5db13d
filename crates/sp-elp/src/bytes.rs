//! Big-endian primitive codec over byte streams.
//!
//! Each wider integer is built from two reads (or writes) of the next
//! narrower width, most significant half first.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{ElpError, ElpResult};

/// Forward-only big-endian reader that tracks its byte offset.
pub struct ByteReader<R> {
    inner: R,
    offset: u64,
    path: PathBuf,
}

impl<R: Read> ByteReader<R> {
    pub fn new(inner: R, path: impl Into<PathBuf>) -> Self {
        Self { inner, offset: 0, path: path.into() }
    }

    /// Bytes consumed so far.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn fill(&mut self, buf: &mut [u8]) -> ElpResult<()> {
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.offset += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(ElpError::UnexpectedEof {
                path: self.path.clone(),
                offset: self.offset,
            }),
            Err(source) => Err(ElpError::Io { path: self.path.clone(), source }),
        }
    }

    pub fn read_u8(&mut self) -> ElpResult<u8> {
        let mut b = [0u8; 1];
        self.fill(&mut b)?;
        Ok(b[0])
    }

    pub fn read_u16(&mut self) -> ElpResult<u16> {
        let hi = self.read_u8()? as u16;
        let lo = self.read_u8()? as u16;
        Ok(hi << 8 | lo)
    }

    pub fn read_u32(&mut self) -> ElpResult<u32> {
        let hi = self.read_u16()? as u32;
        let lo = self.read_u16()? as u32;
        Ok(hi << 16 | lo)
    }

    pub fn read_u64(&mut self) -> ElpResult<u64> {
        let hi = self.read_u32()? as u64;
        let lo = self.read_u32()? as u64;
        Ok(hi << 32 | lo)
    }

    /// Read exactly `len` raw bytes, growing the buffer as data arrives.
    pub fn read_bytes(&mut self, len: usize) -> ElpResult<Vec<u8>> {
        let mut buf = Vec::new();
        let read = (&mut self.inner)
            .take(len as u64)
            .read_to_end(&mut buf)
            .map_err(|source| ElpError::Io { path: self.path.clone(), source })?;
        self.offset += read as u64;
        if read < len {
            return Err(ElpError::UnexpectedEof { path: self.path.clone(), offset: self.offset });
        }
        Ok(buf)
    }

    /// Error for a discriminator byte that was just consumed.
    pub(crate) fn corrupt(&self, reason: crate::error::Corruption) -> ElpError {
        ElpError::CorruptFile {
            path: self.path.clone(),
            offset: self.offset.saturating_sub(1),
            reason,
        }
    }
}

/// Big-endian writer counting the bytes it has produced.
pub struct ByteWriter<W> {
    inner: W,
    written: u64,
    path: PathBuf,
}

impl<W: Write> ByteWriter<W> {
    pub fn new(inner: W, path: impl Into<PathBuf>) -> Self {
        Self { inner, written: 0, path: path.into() }
    }

    #[inline]
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_u8(&mut self, v: u8) -> ElpResult<()> {
        self.write_bytes(&[v])
    }

    pub fn write_u16(&mut self, v: u16) -> ElpResult<()> {
        self.write_u8((v >> 8) as u8)?;
        self.write_u8((v & 0xFF) as u8)
    }

    pub fn write_u32(&mut self, v: u32) -> ElpResult<()> {
        self.write_u16((v >> 16) as u16)?;
        self.write_u16((v & 0xFFFF) as u16)
    }

    pub fn write_u64(&mut self, v: u64) -> ElpResult<()> {
        self.write_u32((v >> 32) as u32)?;
        self.write_u32((v & 0xFFFF_FFFF) as u32)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> ElpResult<()> {
        self.inner
            .write_all(bytes)
            .map_err(|source| ElpError::Io { path: self.path.clone(), source })?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    /// Write a `u8` count for a collection of `len` entries.
    pub fn write_len_u8(&mut self, what: &'static str, len: usize) -> ElpResult<()> {
        let n = u8::try_from(len).map_err(|_| overflow(what, len, u8::MAX as usize))?;
        self.write_u8(n)
    }

    /// Write a `u16` count for a collection of `len` entries.
    pub fn write_len_u16(&mut self, what: &'static str, len: usize) -> ElpResult<()> {
        let n = u16::try_from(len).map_err(|_| overflow(what, len, u16::MAX as usize))?;
        self.write_u16(n)
    }

    /// Write a `u32` count for a collection of `len` entries.
    pub fn write_len_u32(&mut self, what: &'static str, len: usize) -> ElpResult<()> {
        let n = u32::try_from(len).map_err(|_| overflow(what, len, u32::MAX as usize))?;
        self.write_u32(n)
    }

    pub fn flush(&mut self) -> ElpResult<()> {
        self.inner
            .flush()
            .map_err(|source| ElpError::Io { path: self.path.clone(), source })
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

fn overflow(what: &'static str, len: usize, max: usize) -> ElpError {
    ElpError::LengthOverflow { what, len, max }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_big_endian_layout() {
        let mut w = ByteWriter::new(Vec::new(), "<memory>");
        w.write_u8(0xAB).unwrap();
        w.write_u16(0x0102).unwrap();
        w.write_u32(0x0304_0506).unwrap();
        w.write_u64(0x0708_090A_0B0C_0D0E).unwrap();
        assert_eq!(w.written(), 15);
        let bytes = w.into_inner();
        assert_eq!(
            bytes,
            vec![0xAB, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14]
        );

        let mut r = ByteReader::new(bytes.as_slice(), "<memory>");
        assert_eq!(r.read_u8().unwrap(), 0xAB);
        assert_eq!(r.read_u16().unwrap(), 0x0102);
        assert_eq!(r.read_u32().unwrap(), 0x0304_0506);
        assert_eq!(r.read_u64().unwrap(), 0x0708_090A_0B0C_0D0E);
        assert_eq!(r.offset(), 15);
    }

    #[test]
    fn test_eof_is_an_error() {
        let bytes = [0x00, 0x01, 0x02];
        let mut r = ByteReader::new(&bytes[..], "short.xp");
        assert_eq!(r.read_u16().unwrap(), 1);
        match r.read_u32() {
            Err(ElpError::UnexpectedEof { path, offset }) => {
                assert_eq!(path, PathBuf::from("short.xp"));
                assert_eq!(offset, 3);
            }
            other => panic!("expected UnexpectedEof, got {:?}", other),
        }
    }

    #[test]
    fn test_read_bytes() {
        let bytes = [1, 2, 3, 4];
        let mut r = ByteReader::new(&bytes[..], "<memory>");
        assert_eq!(r.read_bytes(3).unwrap(), vec![1, 2, 3]);
        assert_eq!(r.read_bytes(0).unwrap(), Vec::<u8>::new());
        assert!(matches!(r.read_bytes(2), Err(ElpError::UnexpectedEof { .. })));
    }

    #[test]
    fn test_length_overflow() {
        let mut w = ByteWriter::new(Vec::new(), "<memory>");
        w.write_len_u8("arguments", 255).unwrap();
        assert!(matches!(
            w.write_len_u8("arguments", 256),
            Err(ElpError::LengthOverflow { what: "arguments", len: 256, max: 255 })
        ));
        assert!(matches!(
            w.write_len_u16("globals", 70_000),
            Err(ElpError::LengthOverflow { max: 65535, .. })
        ));
        assert_eq!(w.into_inner(), vec![255]);
    }
}
