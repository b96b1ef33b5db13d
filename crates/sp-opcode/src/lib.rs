//! # sp-opcode
//!
//! The instruction set of the Spade bytecode VM, as a static table.
//!
//! Method code inside an ELP file is an opaque byte array to the container
//! codec. This crate is the read-only view that gives those bytes meaning:
//! - `Opcode` - opcode enum with name, operand count and constant-pool flag
//! - `Instructions` - iterator splitting raw code into instructions

mod opcode;
mod walk;

pub use opcode::{Opcode, OpcodeInfo, OperandCount};
pub use walk::{count_instructions, Instruction, Instructions, OpcodeError};
