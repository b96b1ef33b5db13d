//! Single-pass ELP encoder.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, trace};

use crate::bytes::ByteWriter;
use crate::config::ElpConfig;
use crate::elpdef::*;
use crate::error::{ElpError, ElpResult};

/// Writes one [`ElpInfo`] to a byte sink.
///
/// Every count on the wire is taken from the length of the collection it
/// precedes. A collection too long for its count field fails with
/// [`ElpError::LengthOverflow`] instead of being truncated.
pub struct ElpWriter<W> {
    bytes: ByteWriter<W>,
    config: ElpConfig,
    depth: usize,
}

impl ElpWriter<BufWriter<File>> {
    /// Create (or truncate) `path` for writing.
    pub fn create<P: AsRef<Path>>(path: P) -> ElpResult<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| ElpError::open(path.to_path_buf(), e))?;
        debug!("writing ELP to '{}'", path.display());
        Ok(Self::new(BufWriter::new(file), path))
    }
}

impl<W: Write> ElpWriter<W> {
    /// Wrap an arbitrary byte sink; `path` is only used in errors.
    pub fn new(inner: W, path: impl Into<PathBuf>) -> Self {
        Self {
            bytes: ByteWriter::new(inner, path),
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

    /// Encode `elp`, flush, and hand back the sink.
    pub fn write(mut self, elp: &ElpInfo) -> ElpResult<W> {
        self.bytes.write_u32(elp.magic)?;
        self.bytes.write_u32(elp.minor_version)?;
        self.bytes.write_u32(elp.major_version)?;
        self.bytes.write_u16(elp.compiled_from)?;
        self.bytes.write_u8(elp.elp_type as u8)?;
        self.bytes.write_u16(elp.this_module)?;
        self.bytes.write_u16(elp.init)?;
        self.bytes.write_u16(elp.entry)?;
        self.bytes.write_u16(elp.imports)?;

        self.bytes.write_len_u16("constant pool", elp.constant_pool.len())?;
        for cp in &elp.constant_pool {
            self.write_cp_info(cp)?;
        }

        self.bytes.write_len_u16("globals", elp.globals.len())?;
        for global in &elp.globals {
            self.write_global_info(global)?;
        }

        self.bytes.write_len_u16("objects", elp.objects.len())?;
        for obj in &elp.objects {
            self.write_obj_info(obj)?;
        }

        self.write_meta_info(&elp.meta)?;
        self.bytes.flush()?;

        debug!(
            "encoded '{}': {} bytes",
            self.bytes.path().display(),
            self.bytes.written()
        );
        Ok(self.bytes.into_inner())
    }

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

    fn write_cp_info(&mut self, cp: &CpInfo) -> ElpResult<()> {
        self.bytes.write_u8(cp.tag())?;
        match cp {
            CpInfo::Char(c) => self.bytes.write_u32(*c),
            CpInfo::Int(i) => self.bytes.write_u64(*i),
            CpInfo::Float(d) => self.bytes.write_u64(*d),
            CpInfo::String(s) => self.write_utf8(s, "string constant"),
            CpInfo::Array(items) => {
                self.enter()?;
                self.bytes.write_len_u16("array constant", items.len())?;
                for item in items {
                    self.write_cp_info(item)?;
                }
                self.leave();
                Ok(())
            }
        }
    }

    fn write_utf8(&mut self, s: &Utf8, what: &'static str) -> ElpResult<()> {
        self.bytes.write_len_u16(what, s.len())?;
        self.bytes.write_bytes(s.as_bytes())
    }

    fn write_meta_info(&mut self, meta: &MetaInfo) -> ElpResult<()> {
        self.bytes.write_len_u16("meta table", meta.len())?;
        for entry in meta.iter() {
            self.write_utf8(&entry.key, "meta key")?;
            self.write_utf8(&entry.value, "meta value")?;
        }
        Ok(())
    }

    fn write_global_info(&mut self, global: &GlobalInfo) -> ElpResult<()> {
        self.bytes.write_u8(global.flags)?;
        self.bytes.write_u16(global.this_global)?;
        self.bytes.write_u16(global.ty)?;
        self.write_meta_info(&global.meta)
    }

    fn write_field_info(&mut self, field: &FieldInfo) -> ElpResult<()> {
        self.bytes.write_u8(field.flags)?;
        self.bytes.write_u16(field.this_field)?;
        self.bytes.write_u16(field.ty)?;
        self.write_meta_info(&field.meta)
    }

    fn write_obj_info(&mut self, obj: &ObjInfo) -> ElpResult<()> {
        trace!("encoding object kind 0x{:02x} (cpidx {})", obj.kind(), obj.this());
        self.bytes.write_u8(obj.kind())?;
        match obj {
            ObjInfo::Method(method) => self.write_method_info(method),
            ObjInfo::Class(class) => self.write_class_info(class),
        }
    }

    fn write_class_info(&mut self, class: &ClassInfo) -> ElpResult<()> {
        self.enter()?;
        self.bytes.write_u8(class.kind)?;
        self.bytes.write_u16(class.access_flags)?;
        self.bytes.write_u16(class.this_class)?;
        self.bytes.write_u16(class.type_params)?;
        self.bytes.write_u16(class.supers)?;

        self.bytes.write_len_u16("fields", class.fields.len())?;
        for field in &class.fields {
            self.write_field_info(field)?;
        }

        self.bytes.write_len_u16("methods", class.methods.len())?;
        for method in &class.methods {
            self.write_method_info(method)?;
        }

        self.bytes.write_len_u16("nested objects", class.objects.len())?;
        for obj in &class.objects {
            self.write_obj_info(obj)?;
        }

        self.write_meta_info(&class.meta)?;
        self.leave();
        Ok(())
    }

    fn write_method_info(&mut self, method: &MethodInfo) -> ElpResult<()> {
        self.enter()?;
        self.bytes.write_u16(method.access_flags)?;
        self.bytes.write_u8(method.kind)?;
        self.bytes.write_u16(method.this_method)?;
        self.bytes.write_u16(method.type_params)?;

        self.bytes.write_len_u8("arguments", method.args.len())?;
        for arg in &method.args {
            self.bytes.write_u16(arg.this_arg)?;
            self.bytes.write_u16(arg.ty)?;
            self.write_meta_info(&arg.meta)?;
        }

        self.bytes.write_len_u16("locals", method.locals.len())?;
        self.bytes.write_u16(method.closure_start)?;
        for local in &method.locals {
            self.bytes.write_u16(local.this_local)?;
            self.bytes.write_u16(local.ty)?;
            self.write_meta_info(&local.meta)?;
        }

        self.bytes.write_u32(method.max_stack)?;
        self.bytes.write_len_u32("code", method.code.len())?;
        self.bytes.write_bytes(&method.code)?;

        self.bytes.write_len_u16("exception table", method.exception_table.len())?;
        for exc in &method.exception_table {
            self.bytes.write_u32(exc.start_pc)?;
            self.bytes.write_u32(exc.end_pc)?;
            self.bytes.write_u32(exc.target_pc)?;
            self.bytes.write_u16(exc.exception)?;
            self.write_meta_info(&exc.meta)?;
        }

        self.bytes.write_len_u32("line table", method.line_info.len())?;
        for number in method.line_info.iter() {
            self.bytes.write_u8(number.times)?;
            self.bytes.write_u32(number.line)?;
        }

        self.bytes.write_len_u16("lambdas", method.lambdas.len())?;
        for lambda in &method.lambdas {
            self.write_method_info(lambda)?;
        }

        self.bytes.write_len_u16("match tables", method.matches.len())?;
        for table in &method.matches {
            self.write_match_info(table)?;
        }

        self.write_meta_info(&method.meta)?;
        self.leave();
        Ok(())
    }

    fn write_match_info(&mut self, table: &MatchInfo) -> ElpResult<()> {
        self.bytes.write_len_u16("match cases", table.cases.len())?;
        for case in &table.cases {
            self.bytes.write_u16(case.value)?;
            self.bytes.write_u32(case.location)?;
        }
        self.bytes.write_u32(table.default_location)?;
        self.write_meta_info(&table.meta)
    }
}
