// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Disassembly map generation.
//!
//! The map is produced by decoding the already-assembled bytes back
//! through the opcode table, so it reflects exactly what was emitted
//! rather than what the source said. Bytes that decode to no documented
//! opcode render as `.db` rows, keeping the requested window fully
//! covered.

use serde::Serialize;

use crate::addressing::AddressingMode;
use crate::image::RomImage;
use crate::opcodes::OpcodeSet;

/// One decoded row of the address -> instruction map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisasmLine {
    pub addr: u16,
    pub bytes: Vec<u8>,
    pub text: String,
}

/// Decode the image over `[window_start, window_end]` inclusive.
pub fn disassemble(
    image: &RomImage,
    opcodes: &OpcodeSet,
    window_start: u16,
    window_end: u16,
) -> Vec<DisasmLine> {
    let mut out = Vec::new();
    let mut addr = window_start;
    while addr <= window_end {
        let Some(opcode) = image.read(addr) else {
            break;
        };
        let line = match opcodes.decode(opcode) {
            Some(entry) => {
                let size = entry.mode.operand_size();
                let operand_bytes = image.window(addr.wrapping_add(1), size as usize);
                if operand_bytes.len() < size as usize {
                    // Truncated tail; fall back to a data row.
                    data_row(addr, opcode)
                } else {
                    let mut bytes = vec![opcode];
                    bytes.extend_from_slice(operand_bytes);
                    let text = format_instruction(entry.mnemonic, entry.mode, operand_bytes, addr);
                    DisasmLine { addr, bytes, text }
                }
            }
            None => data_row(addr, opcode),
        };
        let step = line.bytes.len() as u16;
        out.push(line);
        let Some(next) = addr.checked_add(step) else {
            break;
        };
        addr = next;
    }
    out
}

fn data_row(addr: u16, value: u8) -> DisasmLine {
    DisasmLine {
        addr,
        bytes: vec![value],
        text: format!(".db ${value:02x}"),
    }
}

fn format_instruction(
    mnemonic: &str,
    mode: AddressingMode,
    operand: &[u8],
    addr: u16,
) -> String {
    let mnemonic = mnemonic.to_ascii_lowercase();
    let byte = operand.first().copied().unwrap_or(0);
    let word = u16::from_le_bytes([
        operand.first().copied().unwrap_or(0),
        operand.get(1).copied().unwrap_or(0),
    ]);
    match mode {
        AddressingMode::Implied => mnemonic,
        AddressingMode::Immediate => format!("{mnemonic} #${byte:02x}"),
        AddressingMode::ZeroPage => format!("{mnemonic} ${byte:02x}"),
        AddressingMode::ZeroPageX => format!("{mnemonic} ${byte:02x},x"),
        AddressingMode::ZeroPageY => format!("{mnemonic} ${byte:02x},y"),
        AddressingMode::Absolute => format!("{mnemonic} ${word:04x}"),
        AddressingMode::AbsoluteX => format!("{mnemonic} ${word:04x},x"),
        AddressingMode::AbsoluteY => format!("{mnemonic} ${word:04x},y"),
        AddressingMode::Indirect => format!("{mnemonic} (${word:04x})"),
        AddressingMode::IndirectX => format!("{mnemonic} (${byte:02x},x)"),
        AddressingMode::IndirectY => format!("{mnemonic} (${byte:02x}),y"),
        AddressingMode::Relative => {
            let target = addr
                .wrapping_add(2)
                .wrapping_add((byte as i8) as i16 as u16);
            format!("{mnemonic} ${target:04x}")
        }
    }
}
