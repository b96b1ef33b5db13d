//! Walking raw method code one instruction at a time.

use thiserror::Error;

use crate::opcode::{Opcode, OperandCount};

/// Error raised while splitting code into instructions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpcodeError {
    #[error("unknown opcode 0x{opcode:02x} at offset {offset}")]
    UnknownOpcode { offset: usize, opcode: u8 },
    #[error("`{opcode}` at offset {offset} is missing operand bytes")]
    Truncated { offset: usize, opcode: Opcode },
}

/// A single decoded instruction borrowing its operand bytes from the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction<'a> {
    pub offset: usize,
    pub opcode: Opcode,
    pub operands: &'a [u8],
}

impl Instruction<'_> {
    /// Encoded size including the opcode byte.
    pub fn len(&self) -> usize {
        1 + self.operands.len()
    }

    /// Operands read as one big-endian number (`const 5`, `jfw 0x0102`).
    pub fn operand_value(&self) -> u64 {
        self.operands
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
    }
}

/// Iterator over the instructions of a code array.
///
/// Stops after the first error.
pub struct Instructions<'a> {
    code: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> Instructions<'a> {
    pub fn new(code: &'a [u8]) -> Self {
        Self { code, pos: 0, failed: false }
    }

    /// Number of operand bytes for the instruction starting at `offset`.
    fn operand_len(&self, offset: usize, opcode: Opcode) -> Result<usize, OpcodeError> {
        match opcode.operand_count() {
            OperandCount::Fixed(n) => Ok(n as usize),
            // closureload: a slot count byte followed by two-byte slot indexes
            OperandCount::Variable => {
                let count = *self
                    .code
                    .get(offset + 1)
                    .ok_or(OpcodeError::Truncated { offset, opcode })?;
                Ok(1 + 2 * count as usize)
            }
        }
    }

    fn decode_at(&self, offset: usize) -> Result<Instruction<'a>, OpcodeError> {
        let byte = self.code[offset];
        let opcode = Opcode::from_u8(byte)
            .ok_or(OpcodeError::UnknownOpcode { offset, opcode: byte })?;
        let len = self.operand_len(offset, opcode)?;
        let operands = self
            .code
            .get(offset + 1..offset + 1 + len)
            .ok_or(OpcodeError::Truncated { offset, opcode })?;
        Ok(Instruction { offset, opcode, operands })
    }
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<Instruction<'a>, OpcodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.code.len() {
            return None;
        }
        match self.decode_at(self.pos) {
            Ok(instr) => {
                self.pos += instr.len();
                Some(Ok(instr))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Count the instructions in `code`.
pub fn count_instructions(code: &[u8]) -> Result<usize, OpcodeError> {
    let mut count = 0;
    for instr in Instructions::new(code) {
        instr?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_walk_fixed_operands() {
        // const 3; constl 0x0102; add; println; vret
        let code = [
            &[Opcode::Const as u8, 3][..],
            &[Opcode::ConstL as u8, 1, 2],
            &[Opcode::Add as u8, Opcode::Println as u8, Opcode::VRet as u8],
        ]
        .concat();
        let instrs: Vec<_> = Instructions::new(&code).collect::<Result<_, _>>().unwrap();
        let ops: Vec<_> = instrs.iter().map(|i| i.opcode).collect();
        assert_eq!(
            ops,
            vec![Opcode::Const, Opcode::ConstL, Opcode::Add, Opcode::Println, Opcode::VRet]
        );
        assert_eq!(instrs[1].offset, 2);
        assert_eq!(instrs[1].operand_value(), 0x0102);
        assert_eq!(count_instructions(&code), Ok(5));
    }

    #[test]
    fn test_closureload_is_variable_width() {
        let code = [Opcode::ClosureLoad as u8, 2, 0, 1, 0, 2, Opcode::Ret as u8];
        let instrs: Vec<_> = Instructions::new(&code).collect::<Result<_, _>>().unwrap();
        assert_eq!(instrs.len(), 2);
        assert_eq!(instrs[0].operands, &[2, 0, 1, 0, 2]);
        assert_eq!(instrs[1].offset, 6);
    }

    #[test]
    fn test_empty_code() {
        assert_eq!(count_instructions(&[]), Ok(0));
    }

    #[test]
    fn test_truncated_operand() {
        let code = [Opcode::Nop as u8, Opcode::GLoad as u8, 0];
        assert_eq!(
            count_instructions(&code),
            Err(OpcodeError::Truncated { offset: 1, opcode: Opcode::GLoad })
        );

        let code = [Opcode::ClosureLoad as u8];
        assert!(matches!(count_instructions(&code), Err(OpcodeError::Truncated { .. })));
    }

    #[test]
    fn test_unknown_opcode_stops_iteration() {
        let code = [Opcode::Pop as u8, 0xEE, Opcode::Pop as u8];
        let mut it = Instructions::new(&code);
        assert!(matches!(it.next(), Some(Ok(_))));
        assert_eq!(
            it.next(),
            Some(Err(OpcodeError::UnknownOpcode { offset: 1, opcode: 0xEE }))
        );
        assert_eq!(it.next(), None);
    }
}
