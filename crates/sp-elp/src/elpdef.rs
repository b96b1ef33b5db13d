//! In-memory model of an ELP file.
//!
//! ELP stands for Executable or Linkable Program. Both kinds share one
//! binary layout and are told apart by [`ElpInfo::elp_type`]:
//! - `.xp` - executable program with an entry point
//! - `.sll` - Spade linkable library, imported by other ELPs
//!
//! Every counted collection of the wire format is a `Vec` here; the writer
//! derives counts from the live length, so there is no count field to go
//! stale.

use num_enum::TryFromPrimitive;
use sp_opcode::{count_instructions, OpcodeError};

use crate::error::{ElpError, ElpResult};

/// Index into the module constant pool.
pub type CpIdx = u16;

/// Magic number at the start of every ELP file.
pub const ELP_MAGIC: u32 = 0xC0FFEEDE;
/// Current minor format version.
pub const ELP_MINOR_VERSION: u32 = 0;
/// Current major format version.
pub const ELP_MAJOR_VERSION: u32 = 1;

/// Length-prefixed byte string, assumed (not checked) to be UTF-8.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Utf8(pub Vec<u8>);

impl Utf8 {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The text, if the bytes are valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Utf8 {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for Utf8 {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl std::fmt::Display for Utf8 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// Constant-pool entry.
///
/// Equality compares the tag first: a `Char` never equals an `Int`, even
/// when their bits agree.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CpInfo {
    /// Unicode code point.
    Char(u32),
    /// Bit pattern of an `i64`.
    Int(u64),
    /// Bit pattern of an `f64`.
    Float(u64),
    String(Utf8),
    Array(Vec<CpInfo>),
}

impl CpInfo {
    pub const TAG_CHAR: u8 = 0x03;
    pub const TAG_INT: u8 = 0x04;
    pub const TAG_FLOAT: u8 = 0x05;
    pub const TAG_STRING: u8 = 0x06;
    pub const TAG_ARRAY: u8 = 0x07;

    pub fn from_char(c: char) -> Self {
        CpInfo::Char(c as u32)
    }

    pub fn from_int(i: i64) -> Self {
        CpInfo::Int(i as u64)
    }

    pub fn from_float(d: f64) -> Self {
        CpInfo::Float(d.to_bits())
    }

    pub fn from_string(s: impl Into<Utf8>) -> Self {
        CpInfo::String(s.into())
    }

    /// Build an array constant; the elements are moved in by value.
    pub fn from_array(items: impl IntoIterator<Item = CpInfo>) -> Self {
        CpInfo::Array(items.into_iter().collect())
    }

    /// Wire tag of this entry.
    pub fn tag(&self) -> u8 {
        match self {
            CpInfo::Char(_) => Self::TAG_CHAR,
            CpInfo::Int(_) => Self::TAG_INT,
            CpInfo::Float(_) => Self::TAG_FLOAT,
            CpInfo::String(_) => Self::TAG_STRING,
            CpInfo::Array(_) => Self::TAG_ARRAY,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            CpInfo::Char(c) => char::from_u32(*c),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            CpInfo::Int(bits) => Some(*bits as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            CpInfo::Float(bits) => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CpInfo::String(s) => s.as_str(),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[CpInfo]> {
        match self {
            CpInfo::Array(items) => Some(items),
            _ => None,
        }
    }
}

/// Executable program or linkable library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ElpType {
    #[default]
    Executable = 0x01,
    Library = 0x02,
}

impl ElpType {
    /// Conventional file suffix, without the dot.
    pub fn suffix(self) -> &'static str {
        match self {
            ElpType::Executable => "xp",
            ElpType::Library => "sll",
        }
    }

    /// Guess the type from a file suffix.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "xp" => Some(ElpType::Executable),
            "sll" => Some(ElpType::Library),
            _ => None,
        }
    }
}

/// One key/value annotation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetaEntry {
    pub key: Utf8,
    pub value: Utf8,
}

/// Ordered annotation table. Duplicate keys are allowed and order matters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetaInfo(pub Vec<MetaEntry>);

impl MetaInfo {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, key: impl Into<Utf8>, value: impl Into<Utf8>) {
        self.0.push(MetaEntry { key: key.into(), value: value.into() });
    }

    /// First value recorded under `key`.
    pub fn get(&self, key: &str) -> Option<&Utf8> {
        self.0
            .iter()
            .find(|e| e.key.as_bytes() == key.as_bytes())
            .map(|e| &e.value)
    }

    /// Every value recorded under `key`, in table order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Utf8> + 'a {
        self.0
            .iter()
            .filter(move |e| e.key.as_bytes() == key.as_bytes())
            .map(|e| &e.value)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MetaEntry> {
        self.0.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<Utf8>, V: Into<Utf8>> FromIterator<(K, V)> for MetaInfo {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| MetaEntry { key: k.into(), value: v.into() })
                .collect(),
        )
    }
}

/// Module-level global variable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GlobalInfo {
    pub flags: u8,
    pub this_global: CpIdx,
    pub ty: CpIdx,
    pub meta: MetaInfo,
}

/// Class field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldInfo {
    pub flags: u8,
    pub this_field: CpIdx,
    pub ty: CpIdx,
    pub meta: MetaInfo,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArgInfo {
    pub this_arg: CpIdx,
    pub ty: CpIdx,
    pub meta: MetaInfo,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocalInfo {
    pub this_local: CpIdx,
    pub ty: CpIdx,
    pub meta: MetaInfo,
}

/// Protected range `[start_pc, end_pc)` with its handler.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExceptionInfo {
    pub start_pc: u32,
    pub end_pc: u32,
    pub target_pc: u32,
    /// Caught exception type.
    pub exception: CpIdx,
    pub meta: MetaInfo,
}

/// A run of `times` consecutive instructions on source line `line`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LineNumber {
    pub times: u8,
    pub line: u32,
}

/// Run-length encoded line table of a method.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LineInfo(pub Vec<LineNumber>);

impl LineInfo {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Number of instructions described by the table.
    pub fn instruction_count(&self) -> u64 {
        self.0.iter().map(|n| u64::from(n.times)).sum()
    }

    /// Record one more instruction on `line`.
    pub fn push_line(&mut self, line: u32) {
        match self.0.last_mut() {
            Some(last) if last.line == line && last.times < u8::MAX => last.times += 1,
            _ => self.0.push(LineNumber { times: 1, line }),
        }
    }

    /// Source line of the instruction at `index`.
    pub fn line_of(&self, index: u64) -> Option<u32> {
        let mut seen = 0u64;
        for n in &self.0 {
            seen += u64::from(n.times);
            if index < seen {
                return Some(n.line);
            }
        }
        None
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LineNumber> {
        self.0.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One `case` of a match table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CaseInfo {
    pub value: CpIdx,
    pub location: u32,
}

/// Dispatch table used by the match opcodes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchInfo {
    pub cases: Vec<CaseInfo>,
    pub default_location: u32,
    pub meta: MetaInfo,
}

impl MatchInfo {
    /// Jump target for a case value, or the default location.
    pub fn target(&self, value: CpIdx) -> u32 {
        self.cases
            .iter()
            .find(|c| c.value == value)
            .map_or(self.default_location, |c| c.location)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MethodInfo {
    pub access_flags: u16,
    pub kind: u8,
    pub this_method: CpIdx,
    pub type_params: CpIdx,
    pub args: Vec<ArgInfo>,
    /// Index of the first local captured from an enclosing scope.
    pub closure_start: u16,
    pub locals: Vec<LocalInfo>,
    pub max_stack: u32,
    /// Raw bytecode; opaque to the codec.
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionInfo>,
    pub line_info: LineInfo,
    /// Lambdas declared inside this method.
    pub lambdas: Vec<MethodInfo>,
    pub matches: Vec<MatchInfo>,
    pub meta: MetaInfo,
}

impl MethodInfo {
    pub fn new(this_method: CpIdx) -> Self {
        Self { this_method, ..Self::default() }
    }

    /// Locals declared by the method itself.
    pub fn plain_locals(&self) -> &[LocalInfo] {
        let split = (self.closure_start as usize).min(self.locals.len());
        &self.locals[..split]
    }

    /// Slots captured from enclosing scopes.
    pub fn closure_locals(&self) -> &[LocalInfo] {
        let split = (self.closure_start as usize).min(self.locals.len());
        &self.locals[split..]
    }

    /// Whether the line table covers exactly the instructions in `code`.
    pub fn check_line_info(&self) -> Result<bool, OpcodeError> {
        let count = count_instructions(&self.code)?;
        Ok(self.line_info.instruction_count() == count as u64)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassInfo {
    pub kind: u8,
    pub access_flags: u16,
    pub this_class: CpIdx,
    pub type_params: CpIdx,
    pub supers: CpIdx,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    /// Nested classes and methods.
    pub objects: Vec<ObjInfo>,
    pub meta: MetaInfo,
}

impl ClassInfo {
    pub fn new(this_class: CpIdx) -> Self {
        Self { this_class, ..Self::default() }
    }
}

/// A declaration that is either a method or a class.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ObjInfo {
    Method(MethodInfo),
    Class(ClassInfo),
}

impl ObjInfo {
    pub const KIND_METHOD: u8 = 0x01;
    pub const KIND_CLASS: u8 = 0x02;

    /// Wire kind byte.
    pub fn kind(&self) -> u8 {
        match self {
            ObjInfo::Method(_) => Self::KIND_METHOD,
            ObjInfo::Class(_) => Self::KIND_CLASS,
        }
    }

    /// The cpidx naming this object.
    pub fn this(&self) -> CpIdx {
        match self {
            ObjInfo::Method(m) => m.this_method,
            ObjInfo::Class(c) => c.this_class,
        }
    }

    pub fn as_method(&self) -> Option<&MethodInfo> {
        match self {
            ObjInfo::Method(m) => Some(m),
            ObjInfo::Class(_) => None,
        }
    }

    pub fn as_class(&self) -> Option<&ClassInfo> {
        match self {
            ObjInfo::Class(c) => Some(c),
            ObjInfo::Method(_) => None,
        }
    }
}

impl From<MethodInfo> for ObjInfo {
    fn from(m: MethodInfo) -> Self {
        ObjInfo::Method(m)
    }
}

impl From<ClassInfo> for ObjInfo {
    fn from(c: ClassInfo) -> Self {
        ObjInfo::Class(c)
    }
}

/// A whole ELP file.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElpInfo {
    pub magic: u32,
    pub minor_version: u32,
    pub major_version: u32,
    /// Source path the module was compiled from.
    pub compiled_from: CpIdx,
    pub elp_type: ElpType,
    pub this_module: CpIdx,
    /// Static initializer.
    pub init: CpIdx,
    /// Entry point.
    pub entry: CpIdx,
    pub imports: CpIdx,
    pub constant_pool: Vec<CpInfo>,
    pub globals: Vec<GlobalInfo>,
    pub objects: Vec<ObjInfo>,
    pub meta: MetaInfo,
}

impl ElpInfo {
    /// Create an empty module of the current format version.
    pub fn new(elp_type: ElpType) -> Self {
        Self {
            magic: ELP_MAGIC,
            minor_version: ELP_MINOR_VERSION,
            major_version: ELP_MAJOR_VERSION,
            compiled_from: 0,
            elp_type,
            this_module: 0,
            init: 0,
            entry: 0,
            imports: 0,
            constant_pool: Vec::new(),
            globals: Vec::new(),
            objects: Vec::new(),
            meta: MetaInfo::new(),
        }
    }

    pub fn has_magic(&self) -> bool {
        self.magic == ELP_MAGIC
    }

    /// Add a constant and return its index.
    pub fn add_constant(&mut self, c: CpInfo) -> ElpResult<CpIdx> {
        // The pool count is itself a u16, so the last usable index is MAX - 1.
        let idx = self.constant_pool.len();
        if idx >= CpIdx::MAX as usize {
            return Err(ElpError::LengthOverflow {
                what: "constant pool",
                len: idx + 1,
                max: CpIdx::MAX as usize,
            });
        }
        self.constant_pool.push(c);
        Ok(idx as CpIdx)
    }

    /// Add a constant, reusing an equal entry already in the pool.
    pub fn intern_constant(&mut self, c: CpInfo) -> ElpResult<CpIdx> {
        match self.constant_pool.iter().position(|e| *e == c) {
            Some(idx) => Ok(idx as CpIdx),
            None => self.add_constant(c),
        }
    }

    pub fn constant(&self, idx: CpIdx) -> Option<&CpInfo> {
        self.constant_pool.get(idx as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sp_opcode::Opcode;

    #[test]
    fn test_constant_equality_is_tag_discriminated() {
        assert_ne!(CpInfo::Char(65), CpInfo::Int(65));
        assert_ne!(CpInfo::Int(1.0f64.to_bits()), CpInfo::from_float(1.0));
        assert_eq!(CpInfo::Float(1.0f64.to_bits()), CpInfo::from_float(1.0));
        assert_eq!(CpInfo::from_string("abc"), CpInfo::String(Utf8::from("abc")));
        assert_ne!(CpInfo::from_string("abc"), CpInfo::from_string("abd"));
        assert_eq!(
            CpInfo::from_array([CpInfo::from_int(1), CpInfo::from_char('x')]),
            CpInfo::Array(vec![CpInfo::Int(1), CpInfo::Char('x' as u32)])
        );
        assert_ne!(
            CpInfo::from_array([CpInfo::from_int(1)]),
            CpInfo::from_array([CpInfo::from_int(1), CpInfo::from_int(1)])
        );
    }

    #[test]
    fn test_constant_bit_patterns() {
        assert_eq!(CpInfo::from_int(-1), CpInfo::Int(u64::MAX));
        assert_eq!(CpInfo::from_int(-1).as_int(), Some(-1));
        assert_eq!(CpInfo::from_float(-0.5).as_float(), Some(-0.5));
        assert_eq!(CpInfo::from_char('λ').as_char(), Some('λ'));
        assert_eq!(CpInfo::from_int(3).as_float(), None);
        assert_eq!(CpInfo::from_string("s").tag(), CpInfo::TAG_STRING);
    }

    #[test]
    fn test_array_elements_are_copied() {
        let mut items = vec![CpInfo::from_int(7), CpInfo::from_string("seven")];
        let array = CpInfo::from_array(items.clone());
        items[0] = CpInfo::from_int(8);
        assert_eq!(array.as_array().unwrap()[0], CpInfo::from_int(7));
        assert_eq!(array.as_array().unwrap()[1].as_str(), Some("seven"));
    }

    #[test]
    fn test_meta_keeps_duplicates_in_order() {
        let mut meta = MetaInfo::new();
        meta.push("line", "1");
        meta.push("doc", "hello");
        meta.push("line", "2");
        assert_eq!(meta.len(), 3);
        assert_eq!(meta.get("line").map(Utf8::to_string_lossy), Some("1".to_string()));
        let lines: Vec<_> = meta.get_all("line").map(Utf8::to_string_lossy).collect();
        assert_eq!(lines, vec!["1", "2"]);
        assert!(meta.get("missing").is_none());

        let reordered: MetaInfo = [("line", "2"), ("doc", "hello"), ("line", "1")]
            .into_iter()
            .collect();
        assert_ne!(meta, reordered);
    }

    #[test]
    fn test_line_info_runs() {
        let mut lines = LineInfo::new();
        for line in [1, 1, 1, 2, 5, 5] {
            lines.push_line(line);
        }
        assert_eq!(
            lines.0,
            vec![
                LineNumber { times: 3, line: 1 },
                LineNumber { times: 1, line: 2 },
                LineNumber { times: 2, line: 5 },
            ]
        );
        assert_eq!(lines.instruction_count(), 6);
        assert_eq!(lines.line_of(0), Some(1));
        assert_eq!(lines.line_of(3), Some(2));
        assert_eq!(lines.line_of(5), Some(5));
        assert_eq!(lines.line_of(6), None);
    }

    #[test]
    fn test_line_run_caps_at_u8() {
        let mut lines = LineInfo::new();
        for _ in 0..300 {
            lines.push_line(9);
        }
        assert_eq!(lines.len(), 2);
        assert_eq!(lines.0[0].times, 255);
        assert_eq!(lines.instruction_count(), 300);
    }

    #[test]
    fn test_check_line_info() {
        let mut method = MethodInfo::new(0);
        method.code = vec![Opcode::Const as u8, 0, Opcode::Println as u8, Opcode::VRet as u8];
        method.line_info.push_line(1);
        method.line_info.push_line(1);
        assert_eq!(method.check_line_info(), Ok(false));
        method.line_info.push_line(2);
        assert_eq!(method.check_line_info(), Ok(true));

        method.code.push(0xF0);
        assert!(method.check_line_info().is_err());
    }

    #[test]
    fn test_closure_locals_split() {
        let mut method = MethodInfo::new(0);
        method.locals = (0..4)
            .map(|i| LocalInfo { this_local: i, ty: 0, meta: MetaInfo::new() })
            .collect();
        method.closure_start = 3;
        assert_eq!(method.plain_locals().len(), 3);
        assert_eq!(method.closure_locals()[0].this_local, 3);

        method.closure_start = 10;
        assert_eq!(method.plain_locals().len(), 4);
        assert!(method.closure_locals().is_empty());
    }

    #[test]
    fn test_match_target() {
        let table = MatchInfo {
            cases: vec![CaseInfo { value: 3, location: 40 }, CaseInfo { value: 4, location: 50 }],
            default_location: 99,
            meta: MetaInfo::new(),
        };
        assert_eq!(table.target(4), 50);
        assert_eq!(table.target(5), 99);
    }

    #[test]
    fn test_constant_pool_helpers() {
        let mut elp = ElpInfo::new(ElpType::Library);
        assert!(elp.has_magic());
        assert_eq!(elp.add_constant(CpInfo::from_string("main")).unwrap(), 0);
        assert_eq!(elp.add_constant(CpInfo::from_int(1)).unwrap(), 1);
        assert_eq!(elp.intern_constant(CpInfo::from_string("main")).unwrap(), 0);
        assert_eq!(elp.intern_constant(CpInfo::from_char('m')).unwrap(), 2);
        assert_eq!(elp.constant(1), Some(&CpInfo::from_int(1)));
        assert_eq!(elp.constant(3), None);
    }

    #[test]
    fn test_elp_type_suffix() {
        assert_eq!(ElpType::Executable.suffix(), "xp");
        assert_eq!(ElpType::from_suffix("sll"), Some(ElpType::Library));
        assert_eq!(ElpType::from_suffix("jar"), None);
        assert_eq!(ElpType::try_from(0x02u8).ok(), Some(ElpType::Library));
        assert!(ElpType::try_from(0x00u8).is_err());
    }
}
