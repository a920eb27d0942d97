// SPDX-License-Identifier: AGPL-3.0

//! Instruction decoding for EVM bytecode
//!
//! Walks the byte sequence left to right, stepping over the immediate operand of
//! every PUSH1..PUSH32. Unrecognized opcodes are single-byte instructions.

pub mod opcodes;

pub use opcodes::{mnemonic, EVM};

use soloptic_constants::{PUSH1, PUSH32};
use soloptic_exceptions::DecodeError;

/// One decoded instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// Byte offset in the code
    pub pc: usize,
    pub opcode: u8,
    /// Position in decode order
    pub index: usize,
    /// Bytes occupied, including immediates. A push truncated by the end of the
    /// code only counts the bytes actually present.
    pub size: usize,
}

impl Instruction {
    pub fn is_push(&self) -> bool {
        is_push(self.opcode)
    }

    /// Declared immediate length (0 for non-push opcodes)
    pub fn immediate_len(&self) -> usize {
        push_data_len(self.opcode)
    }

    /// Program counter of the following instruction
    pub fn next_pc(&self) -> usize {
        self.pc + self.size
    }

    pub fn mnemonic(&self) -> &'static str {
        mnemonic(self.opcode)
    }
}

pub fn is_push(opcode: u8) -> bool {
    (PUSH1..=PUSH32).contains(&opcode)
}

/// Number of immediate bytes following a push opcode
pub fn push_data_len(opcode: u8) -> usize {
    if is_push(opcode) {
        (opcode - PUSH1) as usize + 1
    } else {
        0
    }
}

/// Decode a hex string (optionally `0x`-prefixed) into raw bytes
pub fn decode_hex(code: &str) -> Result<Vec<u8>, DecodeError> {
    let code = code.trim();
    let code = code
        .strip_prefix("0x")
        .or_else(|| code.strip_prefix("0X"))
        .unwrap_or(code);

    if code.is_empty() {
        return Err(DecodeError::Empty);
    }
    if code.len() % 2 != 0 {
        return Err(DecodeError::OddLength(code.len()));
    }

    hex::decode(code).map_err(|e| match e {
        hex::FromHexError::InvalidHexCharacter { c, index } => {
            DecodeError::InvalidHex { ch: c, index }
        }
        _ => DecodeError::OddLength(code.len()),
    })
}

/// Decode raw bytecode into its ordered instruction list
pub fn decode_instructions(code: &[u8]) -> Result<Vec<Instruction>, DecodeError> {
    if code.is_empty() {
        return Err(DecodeError::Empty);
    }

    let mut instructions = Vec::new();
    let mut pc = 0;

    while pc < code.len() {
        let opcode = code[pc];
        let size = (1 + push_data_len(opcode)).min(code.len() - pc);
        instructions.push(Instruction {
            pc,
            opcode,
            index: instructions.len(),
            size,
        });
        pc += size;
    }

    Ok(instructions)
}

/// Decode hex-encoded bytecode into its ordered instruction list
pub fn decode_hex_instructions(code: &str) -> Result<Vec<Instruction>, DecodeError> {
    decode_instructions(&decode_hex(code)?)
}

/// Human-readable listing, one instruction per line
pub fn disassemble(code: &[u8]) -> Result<String, DecodeError> {
    let instructions = decode_instructions(code)?;
    let mut out = String::new();

    for insn in &instructions {
        out.push_str(&format!("{:06x}: {}", insn.pc, insn.mnemonic()));
        if insn.size > 1 {
            out.push_str(" 0x");
            out.push_str(&hex::encode(&code[insn.pc + 1..insn.next_pc()]));
        }
        out.push('\n');
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_data_len() {
        assert_eq!(push_data_len(EVM::PUSH0), 0);
        assert_eq!(push_data_len(EVM::PUSH1), 1);
        assert_eq!(push_data_len(EVM::PUSH4), 4);
        assert_eq!(push_data_len(EVM::PUSH32), 32);
        assert_eq!(push_data_len(EVM::DUP1), 0);
    }

    #[test]
    fn test_decode_simple() {
        // PUSH1 0x80 PUSH1 0x40 MSTORE CALLVALUE
        let code = decode_hex("0x608060405234").unwrap();
        let insns = decode_instructions(&code).unwrap();

        let pcs: Vec<usize> = insns.iter().map(|i| i.pc).collect();
        assert_eq!(pcs, vec![0, 2, 4, 5]);
        let indices: Vec<usize> = insns.iter().map(|i| i.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(insns[2].mnemonic(), "MSTORE");
    }

    #[test]
    fn test_push_skips_immediate() {
        // PUSH4 with data that looks like opcodes, then STOP
        let code = [EVM::PUSH4, 0x60, 0x60, 0x60, 0x60, EVM::STOP];
        let insns = decode_instructions(&code).unwrap();
        assert_eq!(insns.len(), 2);
        assert_eq!(insns[1].pc, 5);
        assert_eq!(insns[1].opcode, EVM::STOP);
    }

    #[test]
    fn test_next_pc_for_every_push() {
        for op in PUSH1..=PUSH32 {
            let mut code = vec![op];
            code.extend(std::iter::repeat(0xff).take(push_data_len(op)));
            code.push(EVM::JUMPDEST);

            let insns = decode_instructions(&code).unwrap();
            assert_eq!(insns.len(), 2);
            assert_eq!(insns[1].pc, 1 + (op - 0x5f) as usize);
        }
    }

    #[test]
    fn test_sizes_cover_code() {
        let code = decode_hex("6080604052348015600f57600080fd5b50603f80601d6000396000f3fe").unwrap();
        let insns = decode_instructions(&code).unwrap();
        let total: usize = insns.iter().map(|i| i.size).sum();
        assert_eq!(total, code.len());

        // idempotent
        assert_eq!(insns, decode_instructions(&code).unwrap());
    }

    #[test]
    fn test_truncated_push() {
        let code = [EVM::STOP, EVM::PUSH32, 0x01, 0x02];
        let insns = decode_instructions(&code).unwrap();
        assert_eq!(insns.len(), 2);
        assert_eq!(insns[1].size, 3);
        assert_eq!(insns[1].next_pc(), code.len());
    }

    #[test]
    fn test_unknown_opcode_is_single_byte() {
        let insns = decode_instructions(&[0x0c, 0xef, EVM::STOP]).unwrap();
        assert_eq!(insns.len(), 3);
        assert_eq!(insns[0].mnemonic(), "UNKNOWN");
        assert_eq!(insns[2].pc, 2);
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(decode_instructions(&[]), Err(DecodeError::Empty));
        assert_eq!(decode_hex(""), Err(DecodeError::Empty));
        assert_eq!(decode_hex("0x"), Err(DecodeError::Empty));
        assert_eq!(decode_hex("0x608"), Err(DecodeError::OddLength(3)));
        assert_eq!(
            decode_hex("60zz"),
            Err(DecodeError::InvalidHex { ch: 'z', index: 2 })
        );
    }

    #[test]
    fn test_disassemble() {
        let listing = disassemble(&[EVM::PUSH2, 0x01, 0x02, EVM::JUMP]).unwrap();
        assert_eq!(listing, "000000: PUSH2 0x0102\n000003: JUMP\n");
    }

    #[test]
    fn test_disassemble_truncated_push() {
        let listing = disassemble(&[EVM::PUSH2, 0x01]).unwrap();
        assert_eq!(listing, "000000: PUSH2 0x01\n");
    }
}
