//! Single-pass ELP decoder.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use log::{debug, trace, warn};

use crate::bytes::ByteReader;
use crate::config::ElpConfig;
use crate::elpdef::*;
use crate::error::{Corruption, ElpError, ElpResult};

/// Reads one [`ElpInfo`] from a byte source.
///
/// Counts come from the input, so collections grow as entries decode
/// instead of being reserved up front.
///
/// A reader is consumed by [`ElpReader::read`]; decoding the same source
/// twice needs a fresh reader. The underlying file is closed when the
/// reader is dropped.
pub struct ElpReader<R> {
    bytes: ByteReader<R>,
    config: ElpConfig,
    depth: usize,
}

impl ElpReader<BufReader<File>> {
    /// Open `path` for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> ElpResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ElpError::open(path.to_path_buf(), e))?;
        debug!("reading ELP from '{}'", path.display());
        Ok(Self::new(BufReader::new(file), path))
    }
}

impl<R: Read> ElpReader<R> {
    /// Wrap an arbitrary byte source; `path` is only used in errors.
    pub fn new(inner: R, path: impl Into<PathBuf>) -> Self {
        Self {
            bytes: ByteReader::new(inner, path),
            config: ElpConfig::default(),
            depth: 0,
        }
    }

    pub fn with_config(mut self, config: ElpConfig) -> Self {
        self.config = config;
        self
    }

    pub fn path(&self) -> &Path {
        self.bytes.path()
    }

    /// Decode the whole module.
    pub fn read(mut self) -> ElpResult<ElpInfo> {
        let magic = self.bytes.read_u32()?;
        let minor_version = self.bytes.read_u32()?;
        let major_version = self.bytes.read_u32()?;
        let compiled_from = self.bytes.read_u16()?;
        let elp_type = self.read_elp_type()?;
        let this_module = self.bytes.read_u16()?;
        let init = self.bytes.read_u16()?;
        let entry = self.bytes.read_u16()?;
        let imports = self.bytes.read_u16()?;

        let count = self.bytes.read_u16()?;
        let mut constant_pool = Vec::new();
        for _ in 0..count {
            constant_pool.push(self.read_cp_info()?);
        }

        let count = self.bytes.read_u16()?;
        let mut globals = Vec::new();
        for _ in 0..count {
            globals.push(self.read_global_info()?);
        }

        let count = self.bytes.read_u16()?;
        let mut objects = Vec::new();
        for _ in 0..count {
            objects.push(self.read_obj_info()?);
        }

        let meta = self.read_meta_info()?;

        debug!(
            "decoded '{}': {} constants, {} globals, {} objects, {} bytes",
            self.bytes.path().display(),
            constant_pool.len(),
            globals.len(),
            objects.len(),
            self.bytes.offset()
        );

        Ok(ElpInfo {
            magic,
            minor_version,
            major_version,
            compiled_from,
            elp_type,
            this_module,
            init,
            entry,
            imports,
            constant_pool,
            globals,
            objects,
            meta,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Nesting
    // ═══════════════════════════════════════════════════════════════════════

    fn enter(&mut self) -> ElpResult<()> {
        if self.depth >= self.config.max_depth {
            return Err(ElpError::NestingTooDeep { limit: self.config.max_depth });
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn corrupt(&self, reason: Corruption) -> ElpError {
        warn!("'{}': {}", self.bytes.path().display(), reason);
        self.bytes.corrupt(reason)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Entities
    // ═══════════════════════════════════════════════════════════════════════

    fn read_elp_type(&mut self) -> ElpResult<ElpType> {
        let raw = self.bytes.read_u8()?;
        ElpType::try_from(raw).map_err(|_| self.corrupt(Corruption::ElpType(raw)))
    }

    fn read_cp_info(&mut self) -> ElpResult<CpInfo> {
        let tag = self.bytes.read_u8()?;
        match tag {
            CpInfo::TAG_CHAR => Ok(CpInfo::Char(self.bytes.read_u32()?)),
            CpInfo::TAG_INT => Ok(CpInfo::Int(self.bytes.read_u64()?)),
            CpInfo::TAG_FLOAT => Ok(CpInfo::Float(self.bytes.read_u64()?)),
            CpInfo::TAG_STRING => Ok(CpInfo::String(self.read_utf8()?)),
            CpInfo::TAG_ARRAY => {
                self.enter()?;
                let len = self.bytes.read_u16()?;
                let mut items = Vec::new();
                for _ in 0..len {
                    items.push(self.read_cp_info()?);
                }
                self.leave();
                Ok(CpInfo::Array(items))
            }
            _ => Err(self.corrupt(Corruption::ConstantTag(tag))),
        }
    }

    fn read_utf8(&mut self) -> ElpResult<Utf8> {
        let len = self.bytes.read_u16()?;
        Ok(Utf8(self.bytes.read_bytes(len as usize)?))
    }

    fn read_meta_info(&mut self) -> ElpResult<MetaInfo> {
        let len = self.bytes.read_u16()?;
        let mut table = Vec::new();
        for _ in 0..len {
            let key = self.read_utf8()?;
            let value = self.read_utf8()?;
            table.push(MetaEntry { key, value });
        }
        Ok(MetaInfo(table))
    }

    fn read_global_info(&mut self) -> ElpResult<GlobalInfo> {
        Ok(GlobalInfo {
            flags: self.bytes.read_u8()?,
            this_global: self.bytes.read_u16()?,
            ty: self.bytes.read_u16()?,
            meta: self.read_meta_info()?,
        })
    }

    fn read_field_info(&mut self) -> ElpResult<FieldInfo> {
        Ok(FieldInfo {
            flags: self.bytes.read_u8()?,
            this_field: self.bytes.read_u16()?,
            ty: self.bytes.read_u16()?,
            meta: self.read_meta_info()?,
        })
    }

    fn read_obj_info(&mut self) -> ElpResult<ObjInfo> {
        let kind = self.bytes.read_u8()?;
        let obj = match kind {
            ObjInfo::KIND_METHOD => ObjInfo::Method(self.read_method_info()?),
            ObjInfo::KIND_CLASS => ObjInfo::Class(self.read_class_info()?),
            _ => return Err(self.corrupt(Corruption::ObjectKind(kind))),
        };
        trace!("decoded object kind 0x{:02x} (cpidx {})", kind, obj.this());
        Ok(obj)
    }

    fn read_class_info(&mut self) -> ElpResult<ClassInfo> {
        self.enter()?;
        let kind = self.bytes.read_u8()?;
        let access_flags = self.bytes.read_u16()?;
        let this_class = self.bytes.read_u16()?;
        let type_params = self.bytes.read_u16()?;
        let supers = self.bytes.read_u16()?;

        let count = self.bytes.read_u16()?;
        let mut fields = Vec::new();
        for _ in 0..count {
            fields.push(self.read_field_info()?);
        }

        let count = self.bytes.read_u16()?;
        let mut methods = Vec::new();
        for _ in 0..count {
            methods.push(self.read_method_info()?);
        }

        let count = self.bytes.read_u16()?;
        let mut objects = Vec::new();
        for _ in 0..count {
            objects.push(self.read_obj_info()?);
        }

        let meta = self.read_meta_info()?;
        self.leave();
        Ok(ClassInfo {
            kind,
            access_flags,
            this_class,
            type_params,
            supers,
            fields,
            methods,
            objects,
            meta,
        })
    }

    fn read_method_info(&mut self) -> ElpResult<MethodInfo> {
        self.enter()?;
        let access_flags = self.bytes.read_u16()?;
        let kind = self.bytes.read_u8()?;
        let this_method = self.bytes.read_u16()?;
        let type_params = self.bytes.read_u16()?;

        let count = self.bytes.read_u8()?;
        let mut args = Vec::new();
        for _ in 0..count {
            args.push(ArgInfo {
                this_arg: self.bytes.read_u16()?,
                ty: self.bytes.read_u16()?,
                meta: self.read_meta_info()?,
            });
        }

        let count = self.bytes.read_u16()?;
        let closure_start = self.bytes.read_u16()?;
        let mut locals = Vec::new();
        for _ in 0..count {
            locals.push(LocalInfo {
                this_local: self.bytes.read_u16()?,
                ty: self.bytes.read_u16()?,
                meta: self.read_meta_info()?,
            });
        }

        let max_stack = self.bytes.read_u32()?;
        let code_len = self.bytes.read_u32()?;
        let code = self.bytes.read_bytes(code_len as usize)?;

        let count = self.bytes.read_u16()?;
        let mut exception_table = Vec::new();
        for _ in 0..count {
            exception_table.push(ExceptionInfo {
                start_pc: self.bytes.read_u32()?,
                end_pc: self.bytes.read_u32()?,
                target_pc: self.bytes.read_u32()?,
                exception: self.bytes.read_u16()?,
                meta: self.read_meta_info()?,
            });
        }

        let line_info = self.read_line_info()?;

        let count = self.bytes.read_u16()?;
        let mut lambdas = Vec::new();
        for _ in 0..count {
            lambdas.push(self.read_method_info()?);
        }

        let count = self.bytes.read_u16()?;
        let mut matches = Vec::new();
        for _ in 0..count {
            matches.push(self.read_match_info()?);
        }

        let meta = self.read_meta_info()?;
        self.leave();
        Ok(MethodInfo {
            access_flags,
            kind,
            this_method,
            type_params,
            args,
            closure_start,
            locals,
            max_stack,
            code,
            exception_table,
            line_info,
            lambdas,
            matches,
            meta,
        })
    }

    fn read_line_info(&mut self) -> ElpResult<LineInfo> {
        let count = self.bytes.read_u32()?;
        let mut numbers = Vec::new();
        for _ in 0..count {
            numbers.push(LineNumber {
                times: self.bytes.read_u8()?,
                line: self.bytes.read_u32()?,
            });
        }
        Ok(LineInfo(numbers))
    }

    fn read_match_info(&mut self) -> ElpResult<MatchInfo> {
        let count = self.bytes.read_u16()?;
        let mut cases = Vec::new();
        for _ in 0..count {
            cases.push(CaseInfo {
                value: self.bytes.read_u16()?,
                location: self.bytes.read_u32()?,
            });
        }
        Ok(MatchInfo {
            cases,
            default_location: self.bytes.read_u32()?,
            meta: self.read_meta_info()?,
        })
    }
}
