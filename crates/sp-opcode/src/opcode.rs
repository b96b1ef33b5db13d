//! Opcodes of the Spade bytecode and their static operand table.

use num_enum::TryFromPrimitive;

/// Number of operand bytes that follow an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandCount {
    /// A fixed number of operand bytes.
    Fixed(u8),
    /// Opcode-specific encoding (only `closureload`).
    Variable,
}

/// Static description of one opcode.
#[derive(Debug, Clone, Copy)]
pub struct OpcodeInfo {
    pub name: &'static str,
    pub operands: OperandCount,
    /// The operand is an index into the constant pool.
    pub takes_constant: bool,
}

impl OpcodeInfo {
    const fn new(name: &'static str, operands: OperandCount, takes_constant: bool) -> Self {
        Self { name, operands, takes_constant }
    }
}

/// Bytecode opcodes, in encoding order.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
pub enum Opcode {
    // === NOP ===
    Nop = 0,

    // === STACK: Constants and stack shuffling ===
    Const,
    ConstL,
    Pop,
    Dup,

    // === GLOBAL: Module globals ===
    GLoad,
    GFLoad,
    GStore,
    GFStore,
    PGStore,
    PGFStore,

    // === LOCAL: Locals and arguments ===
    LLoad,
    LFLoad,
    LStore,
    LFStore,
    PLStore,
    PLFStore,
    ALoad,
    AStore,
    PAStore,

    // === TYPEARG: Reified type arguments ===
    TLoad,
    TStore,
    PTStore,

    // === MEMBER: Object members ===
    MLoad,
    MFLoad,
    MStore,
    MFStore,
    PMStore,
    PMFStore,

    // === STATIC: Class statics ===
    SLoad,
    SFLoad,
    SStore,
    SFStore,
    PSStore,
    PSFStore,

    // === LAMBDA ===
    BLoad,
    BFLoad,

    // === ARRAY ===
    ArrPack,
    ArrUnpack,
    ArrBuild,
    ArrFBuild,
    ILoad,
    IStore,
    PIStore,
    ArrLen,

    // === CALL ===
    Invoke,
    VInvoke,
    SInvoke,
    LInvoke,
    GInvoke,
    AInvoke,
    VFInvoke,
    SFInvoke,
    LFInvoke,
    GFInvoke,
    CallSub,
    RetSub,

    // === JUMP: Offsets are two-byte operands ===
    Jfw,
    Jbw,
    Jt,
    Jf,
    Jlt,
    Jle,
    Jeq,
    Jne,
    Jge,
    Jgt,

    // === ARITH: Unary, binary and comparison ===
    Not,
    Inv,
    Neg,
    GetType,
    SCast,
    CCast,
    Pow,
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    UShr,
    And,
    Or,
    Xor,
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
    Is,
    NIs,
    IsNull,
    NIsNull,

    // === MONITOR ===
    EnterMonitor,
    ExitMonitor,

    // === MATCH: Pattern dispatch, closures and reified objects ===
    MtPerf,
    MtFPerf,
    ClosureLoad,
    ReifiedLoad,
    ObjLoad,

    // === RETURN ===
    Throw,
    Ret,
    VRet,
    NRet,

    // === DEBUG ===
    Println,
}

/// Indexed by `Opcode as usize`.
static OPCODE_TABLE: [OpcodeInfo; Opcode::COUNT] = [
    OpcodeInfo::new("nop", OperandCount::Fixed(0), false),
    OpcodeInfo::new("const", OperandCount::Fixed(1), true),
    OpcodeInfo::new("constl", OperandCount::Fixed(2), true),
    OpcodeInfo::new("pop", OperandCount::Fixed(0), false),
    OpcodeInfo::new("dup", OperandCount::Fixed(0), false),
    OpcodeInfo::new("gload", OperandCount::Fixed(2), true),
    OpcodeInfo::new("gfload", OperandCount::Fixed(1), true),
    OpcodeInfo::new("gstore", OperandCount::Fixed(2), true),
    OpcodeInfo::new("gfstore", OperandCount::Fixed(1), true),
    OpcodeInfo::new("pgstore", OperandCount::Fixed(2), true),
    OpcodeInfo::new("pgfstore", OperandCount::Fixed(1), true),
    OpcodeInfo::new("lload", OperandCount::Fixed(2), false),
    OpcodeInfo::new("lfload", OperandCount::Fixed(1), false),
    OpcodeInfo::new("lstore", OperandCount::Fixed(2), false),
    OpcodeInfo::new("lfstore", OperandCount::Fixed(1), false),
    OpcodeInfo::new("plstore", OperandCount::Fixed(2), false),
    OpcodeInfo::new("plfstore", OperandCount::Fixed(1), false),
    OpcodeInfo::new("aload", OperandCount::Fixed(1), false),
    OpcodeInfo::new("astore", OperandCount::Fixed(1), false),
    OpcodeInfo::new("pastore", OperandCount::Fixed(1), false),
    OpcodeInfo::new("tload", OperandCount::Fixed(1), false),
    OpcodeInfo::new("tstore", OperandCount::Fixed(1), false),
    OpcodeInfo::new("ptstore", OperandCount::Fixed(1), false),
    OpcodeInfo::new("mload", OperandCount::Fixed(2), true),
    OpcodeInfo::new("mfload", OperandCount::Fixed(1), true),
    OpcodeInfo::new("mstore", OperandCount::Fixed(2), true),
    OpcodeInfo::new("mfstore", OperandCount::Fixed(1), true),
    OpcodeInfo::new("pmstore", OperandCount::Fixed(2), true),
    OpcodeInfo::new("pmfstore", OperandCount::Fixed(1), true),
    OpcodeInfo::new("sload", OperandCount::Fixed(2), true),
    OpcodeInfo::new("sfload", OperandCount::Fixed(1), true),
    OpcodeInfo::new("sstore", OperandCount::Fixed(2), true),
    OpcodeInfo::new("sfstore", OperandCount::Fixed(1), true),
    OpcodeInfo::new("psstore", OperandCount::Fixed(2), true),
    OpcodeInfo::new("psfstore", OperandCount::Fixed(1), true),
    OpcodeInfo::new("bload", OperandCount::Fixed(2), false),
    OpcodeInfo::new("bfload", OperandCount::Fixed(1), false),
    OpcodeInfo::new("arrpack", OperandCount::Fixed(0), false),
    OpcodeInfo::new("arrunpack", OperandCount::Fixed(0), false),
    OpcodeInfo::new("arrbuild", OperandCount::Fixed(2), false),
    OpcodeInfo::new("arrfbuild", OperandCount::Fixed(1), false),
    OpcodeInfo::new("iload", OperandCount::Fixed(0), false),
    OpcodeInfo::new("istore", OperandCount::Fixed(0), false),
    OpcodeInfo::new("pistore", OperandCount::Fixed(0), false),
    OpcodeInfo::new("arrlen", OperandCount::Fixed(0), false),
    OpcodeInfo::new("invoke", OperandCount::Fixed(1), false),
    OpcodeInfo::new("vinvoke", OperandCount::Fixed(2), true),
    OpcodeInfo::new("sinvoke", OperandCount::Fixed(2), true),
    OpcodeInfo::new("linvoke", OperandCount::Fixed(2), false),
    OpcodeInfo::new("ginvoke", OperandCount::Fixed(2), true),
    OpcodeInfo::new("ainvoke", OperandCount::Fixed(1), false),
    OpcodeInfo::new("vfinvoke", OperandCount::Fixed(1), true),
    OpcodeInfo::new("sfinvoke", OperandCount::Fixed(1), true),
    OpcodeInfo::new("lfinvoke", OperandCount::Fixed(1), false),
    OpcodeInfo::new("gfinvoke", OperandCount::Fixed(1), true),
    OpcodeInfo::new("callsub", OperandCount::Fixed(0), false),
    OpcodeInfo::new("retsub", OperandCount::Fixed(0), false),
    OpcodeInfo::new("jfw", OperandCount::Fixed(2), false),
    OpcodeInfo::new("jbw", OperandCount::Fixed(2), false),
    OpcodeInfo::new("jt", OperandCount::Fixed(2), false),
    OpcodeInfo::new("jf", OperandCount::Fixed(2), false),
    OpcodeInfo::new("jlt", OperandCount::Fixed(2), false),
    OpcodeInfo::new("jle", OperandCount::Fixed(2), false),
    OpcodeInfo::new("jeq", OperandCount::Fixed(2), false),
    OpcodeInfo::new("jne", OperandCount::Fixed(2), false),
    OpcodeInfo::new("jge", OperandCount::Fixed(2), false),
    OpcodeInfo::new("jgt", OperandCount::Fixed(2), false),
    OpcodeInfo::new("not", OperandCount::Fixed(0), false),
    OpcodeInfo::new("inv", OperandCount::Fixed(0), false),
    OpcodeInfo::new("neg", OperandCount::Fixed(0), false),
    OpcodeInfo::new("gettype", OperandCount::Fixed(0), false),
    OpcodeInfo::new("scast", OperandCount::Fixed(0), false),
    OpcodeInfo::new("ccast", OperandCount::Fixed(0), false),
    OpcodeInfo::new("pow", OperandCount::Fixed(0), false),
    OpcodeInfo::new("mul", OperandCount::Fixed(0), false),
    OpcodeInfo::new("div", OperandCount::Fixed(0), false),
    OpcodeInfo::new("rem", OperandCount::Fixed(0), false),
    OpcodeInfo::new("add", OperandCount::Fixed(0), false),
    OpcodeInfo::new("sub", OperandCount::Fixed(0), false),
    OpcodeInfo::new("shl", OperandCount::Fixed(0), false),
    OpcodeInfo::new("shr", OperandCount::Fixed(0), false),
    OpcodeInfo::new("ushr", OperandCount::Fixed(0), false),
    OpcodeInfo::new("and", OperandCount::Fixed(0), false),
    OpcodeInfo::new("or", OperandCount::Fixed(0), false),
    OpcodeInfo::new("xor", OperandCount::Fixed(0), false),
    OpcodeInfo::new("lt", OperandCount::Fixed(0), false),
    OpcodeInfo::new("le", OperandCount::Fixed(0), false),
    OpcodeInfo::new("eq", OperandCount::Fixed(0), false),
    OpcodeInfo::new("ne", OperandCount::Fixed(0), false),
    OpcodeInfo::new("ge", OperandCount::Fixed(0), false),
    OpcodeInfo::new("gt", OperandCount::Fixed(0), false),
    OpcodeInfo::new("is", OperandCount::Fixed(0), false),
    OpcodeInfo::new("nis", OperandCount::Fixed(0), false),
    OpcodeInfo::new("isnull", OperandCount::Fixed(0), false),
    OpcodeInfo::new("nisnull", OperandCount::Fixed(0), false),
    OpcodeInfo::new("entermonitor", OperandCount::Fixed(0), false),
    OpcodeInfo::new("exitmonitor", OperandCount::Fixed(0), false),
    OpcodeInfo::new("mtperf", OperandCount::Fixed(2), false),
    OpcodeInfo::new("mtfperf", OperandCount::Fixed(1), false),
    OpcodeInfo::new("closureload", OperandCount::Variable, false),
    OpcodeInfo::new("reifiedload", OperandCount::Fixed(1), false),
    OpcodeInfo::new("objload", OperandCount::Fixed(0), false),
    OpcodeInfo::new("throw", OperandCount::Fixed(0), false),
    OpcodeInfo::new("ret", OperandCount::Fixed(0), false),
    OpcodeInfo::new("vret", OperandCount::Fixed(0), false),
    OpcodeInfo::new("nret", OperandCount::Fixed(1), false),
    OpcodeInfo::new("println", OperandCount::Fixed(0), false),
];

impl Opcode {
    /// Number of opcodes in the instruction set.
    pub const COUNT: usize = Opcode::Println as usize + 1;

    /// Decode an opcode byte.
    #[inline]
    pub fn from_u8(v: u8) -> Option<Self> {
        Self::try_from(v).ok()
    }

    /// Look up an opcode by its mnemonic.
    ///
    /// Unknown mnemonics map to [`Opcode::Nop`] rather than failing.
    pub fn from_name(name: &str) -> Self {
        OPCODE_TABLE
            .iter()
            .position(|info| info.name == name)
            .and_then(|idx| Self::from_u8(idx as u8))
            .unwrap_or(Opcode::Nop)
    }

    #[inline]
    pub fn info(self) -> &'static OpcodeInfo {
        &OPCODE_TABLE[self as usize]
    }

    /// The lowercase mnemonic.
    #[inline]
    pub fn name(self) -> &'static str {
        self.info().name
    }

    #[inline]
    pub fn operand_count(self) -> OperandCount {
        self.info().operands
    }

    /// Whether the operand of this opcode indexes the constant pool.
    #[inline]
    pub fn takes_constant(self) -> bool {
        self.info().takes_constant
    }

    /// Iterate every opcode in encoding order.
    pub fn all() -> impl Iterator<Item = Opcode> {
        (0..Self::COUNT as u8).filter_map(Self::from_u8)
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_enum() {
        assert_eq!(Opcode::COUNT, 107);
        assert_eq!(Opcode::all().count(), Opcode::COUNT);
        for op in Opcode::all() {
            assert_eq!(Opcode::from_name(op.name()), op, "{}", op.name());
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(Opcode::Const.name(), "const");
        assert_eq!(Opcode::Const.operand_count(), OperandCount::Fixed(1));
        assert!(Opcode::Const.takes_constant());
        assert_eq!(Opcode::Jlt.operand_count(), OperandCount::Fixed(2));
        assert!(!Opcode::Jlt.takes_constant());
        assert_eq!(Opcode::ClosureLoad.operand_count(), OperandCount::Variable);
        assert_eq!(Opcode::Println.to_string(), "println");
    }

    #[test]
    fn test_unknown_name_is_nop() {
        assert_eq!(Opcode::from_name("frobnicate"), Opcode::Nop);
        assert_eq!(Opcode::from_name(""), Opcode::Nop);
    }

    #[test]
    fn test_from_u8() {
        assert_eq!(Opcode::from_u8(0), Some(Opcode::Nop));
        assert_eq!(Opcode::from_u8(1), Some(Opcode::Const));
        assert_eq!(Opcode::from_u8(106), Some(Opcode::Println));
        assert_eq!(Opcode::from_u8(107), None);
        assert_eq!(Opcode::from_u8(0xFF), None);
    }
}
