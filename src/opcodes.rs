// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Instruction table for the base MOS 6502.
//!
//! One entry per legal (mnemonic, addressing mode) pair. The static table
//! is immutable data; each assembler instance builds its own [`OpcodeSet`]
//! with the lookup indexes, so no mutable process-wide state is shared
//! between runs.

use std::collections::{HashMap, HashSet};

use crate::addressing::AddressingMode;

/// A single (mnemonic, mode) -> opcode row.
#[derive(Debug, Clone, Copy)]
pub struct OpcodeEntry {
    pub mnemonic: &'static str,
    pub mode: AddressingMode,
    pub opcode: u8,
}

const fn row(mnemonic: &'static str, mode: AddressingMode, opcode: u8) -> OpcodeEntry {
    OpcodeEntry {
        mnemonic,
        mode,
        opcode,
    }
}

use AddressingMode::{
    Absolute as Abs, AbsoluteX as AbsX, AbsoluteY as AbsY, Immediate as Imm, Implied as Imp,
    Indirect as Ind, IndirectX as IndX, IndirectY as IndY, Relative as Rel, ZeroPage as Zp,
    ZeroPageX as ZpX, ZeroPageY as ZpY,
};

/// Every documented opcode of the base 6502.
pub static OPCODE_TABLE: &[OpcodeEntry] = &[
    row("ADC", Imm, 0x69),
    row("ADC", Zp, 0x65),
    row("ADC", ZpX, 0x75),
    row("ADC", Abs, 0x6D),
    row("ADC", AbsX, 0x7D),
    row("ADC", AbsY, 0x79),
    row("ADC", IndX, 0x61),
    row("ADC", IndY, 0x71),
    row("AND", Imm, 0x29),
    row("AND", Zp, 0x25),
    row("AND", ZpX, 0x35),
    row("AND", Abs, 0x2D),
    row("AND", AbsX, 0x3D),
    row("AND", AbsY, 0x39),
    row("AND", IndX, 0x21),
    row("AND", IndY, 0x31),
    row("ASL", Imp, 0x0A),
    row("ASL", Zp, 0x06),
    row("ASL", ZpX, 0x16),
    row("ASL", Abs, 0x0E),
    row("ASL", AbsX, 0x1E),
    row("BCC", Rel, 0x90),
    row("BCS", Rel, 0xB0),
    row("BEQ", Rel, 0xF0),
    row("BIT", Zp, 0x24),
    row("BIT", Abs, 0x2C),
    row("BMI", Rel, 0x30),
    row("BNE", Rel, 0xD0),
    row("BPL", Rel, 0x10),
    row("BRK", Imp, 0x00),
    row("BVC", Rel, 0x50),
    row("BVS", Rel, 0x70),
    row("CLC", Imp, 0x18),
    row("CLD", Imp, 0xD8),
    row("CLI", Imp, 0x58),
    row("CLV", Imp, 0xB8),
    row("CMP", Imm, 0xC9),
    row("CMP", Zp, 0xC5),
    row("CMP", ZpX, 0xD5),
    row("CMP", Abs, 0xCD),
    row("CMP", AbsX, 0xDD),
    row("CMP", AbsY, 0xD9),
    row("CMP", IndX, 0xC1),
    row("CMP", IndY, 0xD1),
    row("CPX", Imm, 0xE0),
    row("CPX", Zp, 0xE4),
    row("CPX", Abs, 0xEC),
    row("CPY", Imm, 0xC0),
    row("CPY", Zp, 0xC4),
    row("CPY", Abs, 0xCC),
    row("DEC", Zp, 0xC6),
    row("DEC", ZpX, 0xD6),
    row("DEC", Abs, 0xCE),
    row("DEC", AbsX, 0xDE),
    row("DEX", Imp, 0xCA),
    row("DEY", Imp, 0x88),
    row("EOR", Imm, 0x49),
    row("EOR", Zp, 0x45),
    row("EOR", ZpX, 0x55),
    row("EOR", Abs, 0x4D),
    row("EOR", AbsX, 0x5D),
    row("EOR", AbsY, 0x59),
    row("EOR", IndX, 0x41),
    row("EOR", IndY, 0x51),
    row("INC", Zp, 0xE6),
    row("INC", ZpX, 0xF6),
    row("INC", Abs, 0xEE),
    row("INC", AbsX, 0xFE),
    row("INX", Imp, 0xE8),
    row("INY", Imp, 0xC8),
    row("JMP", Abs, 0x4C),
    row("JMP", Ind, 0x6C),
    row("JSR", Abs, 0x20),
    row("LDA", Imm, 0xA9),
    row("LDA", Zp, 0xA5),
    row("LDA", ZpX, 0xB5),
    row("LDA", Abs, 0xAD),
    row("LDA", AbsX, 0xBD),
    row("LDA", AbsY, 0xB9),
    row("LDA", IndX, 0xA1),
    row("LDA", IndY, 0xB1),
    row("LDX", Imm, 0xA2),
    row("LDX", Zp, 0xA6),
    row("LDX", ZpY, 0xB6),
    row("LDX", Abs, 0xAE),
    row("LDX", AbsY, 0xBE),
    row("LDY", Imm, 0xA0),
    row("LDY", Zp, 0xA4),
    row("LDY", ZpX, 0xB4),
    row("LDY", Abs, 0xAC),
    row("LDY", AbsX, 0xBC),
    row("LSR", Imp, 0x4A),
    row("LSR", Zp, 0x46),
    row("LSR", ZpX, 0x56),
    row("LSR", Abs, 0x4E),
    row("LSR", AbsX, 0x5E),
    row("NOP", Imp, 0xEA),
    row("ORA", Imm, 0x09),
    row("ORA", Zp, 0x05),
    row("ORA", ZpX, 0x15),
    row("ORA", Abs, 0x0D),
    row("ORA", AbsX, 0x1D),
    row("ORA", AbsY, 0x19),
    row("ORA", IndX, 0x01),
    row("ORA", IndY, 0x11),
    row("PHA", Imp, 0x48),
    row("PHP", Imp, 0x08),
    row("PLA", Imp, 0x68),
    row("PLP", Imp, 0x28),
    row("ROL", Imp, 0x2A),
    row("ROL", Zp, 0x26),
    row("ROL", ZpX, 0x36),
    row("ROL", Abs, 0x2E),
    row("ROL", AbsX, 0x3E),
    row("ROR", Imp, 0x6A),
    row("ROR", Zp, 0x66),
    row("ROR", ZpX, 0x76),
    row("ROR", Abs, 0x6E),
    row("ROR", AbsX, 0x7E),
    row("RTI", Imp, 0x40),
    row("RTS", Imp, 0x60),
    row("SBC", Imm, 0xE9),
    row("SBC", Zp, 0xE5),
    row("SBC", ZpX, 0xF5),
    row("SBC", Abs, 0xED),
    row("SBC", AbsX, 0xFD),
    row("SBC", AbsY, 0xF9),
    row("SBC", IndX, 0xE1),
    row("SBC", IndY, 0xF1),
    row("SEC", Imp, 0x38),
    row("SED", Imp, 0xF8),
    row("SEI", Imp, 0x78),
    row("STA", Zp, 0x85),
    row("STA", ZpX, 0x95),
    row("STA", Abs, 0x8D),
    row("STA", AbsX, 0x9D),
    row("STA", AbsY, 0x99),
    row("STA", IndX, 0x81),
    row("STA", IndY, 0x91),
    row("STX", Zp, 0x86),
    row("STX", ZpY, 0x96),
    row("STX", Abs, 0x8E),
    row("STY", Zp, 0x84),
    row("STY", ZpX, 0x94),
    row("STY", Abs, 0x8C),
    row("TAX", Imp, 0xAA),
    row("TAY", Imp, 0xA8),
    row("TSX", Imp, 0xBA),
    row("TXA", Imp, 0x8A),
    row("TXS", Imp, 0x9A),
    row("TYA", Imp, 0x98),
];

/// Per-assembler lookup indexes over [`OPCODE_TABLE`].
///
/// The table is small enough that (mnemonic, mode) lookups stay linear;
/// only the opcode-byte decode used by the disassembler gets an index.
#[derive(Debug)]
pub struct OpcodeSet {
    by_opcode: HashMap<u8, &'static OpcodeEntry>,
    mnemonics: HashSet<&'static str>,
}

impl Default for OpcodeSet {
    fn default() -> Self {
        Self::new()
    }
}

impl OpcodeSet {
    pub fn new() -> Self {
        let mut by_opcode = HashMap::new();
        let mut mnemonics = HashSet::new();
        for entry in OPCODE_TABLE {
            by_opcode.insert(entry.opcode, entry);
            mnemonics.insert(entry.mnemonic);
        }
        Self {
            by_opcode,
            mnemonics,
        }
    }

    /// Look up the opcode byte for a (mnemonic, mode) pair. The mnemonic
    /// is matched case-insensitively.
    pub fn lookup(&self, mnemonic: &str, mode: AddressingMode) -> Option<u8> {
        OPCODE_TABLE
            .iter()
            .find(|entry| entry.mode == mode && entry.mnemonic.eq_ignore_ascii_case(mnemonic))
            .map(|entry| entry.opcode)
    }

    pub fn has_mnemonic(&self, mnemonic: &str) -> bool {
        self.mnemonics.contains(mnemonic.to_ascii_uppercase().as_str())
    }

    /// Reverse lookup for the disassembler.
    pub fn decode(&self, opcode: u8) -> Option<&'static OpcodeEntry> {
        self.by_opcode.get(&opcode).copied()
    }

    pub fn is_branch(&self, mnemonic: &str) -> bool {
        self.lookup(mnemonic, AddressingMode::Relative).is_some()
    }
}
