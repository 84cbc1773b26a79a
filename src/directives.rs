// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Directive registry: a closed set of pseudo-instructions with their
//! per-pass behavior. Variants are dispatched exhaustively from the
//! assembler's pass loops; an unknown directive mnemonic is rejected here,
//! at classification time, before pass 1 runs.

use crate::expr::is_symbol_name;
use crate::macros::PARAM_SENTINEL;

/// Marker introducing a directive line.
pub const DIRECTIVE_MARKER: char = '.';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// `.org expr` - move the memory pointer; emits nothing.
    Org,
    /// `.db ops…` - one byte per operand.
    Db,
    /// `.dw ops…` - one little-endian word per operand.
    Dw,
    /// `.globl names…` - promote labels to cross-file visibility.
    Globl,
    /// `.macro name placeholders…` - open a macro body.
    Macro,
    /// `.endm` - close the macro body.
    Endm,
}

impl Directive {
    /// Resolve a directive mnemonic (without the marker), lowercase-keyed.
    pub fn from_mnemonic(name: &str) -> Option<Directive> {
        match name.to_ascii_lowercase().as_str() {
            "org" => Some(Directive::Org),
            "db" => Some(Directive::Db),
            "dw" => Some(Directive::Dw),
            "globl" => Some(Directive::Globl),
            "macro" => Some(Directive::Macro),
            "endm" => Some(Directive::Endm),
            _ => None,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Directive::Org => "org",
            Directive::Db => "db",
            Directive::Dw => "dw",
            Directive::Globl => "globl",
            Directive::Macro => "macro",
            Directive::Endm => "endm",
        }
    }

    /// Bytes the directive will emit, decided in pass 1 without evaluating
    /// any operand expression.
    pub fn size(self, operands: &[String]) -> u16 {
        match self {
            Directive::Db => operands.len() as u16,
            Directive::Dw => operands.len() as u16 * 2,
            Directive::Org | Directive::Globl | Directive::Macro | Directive::Endm => 0,
        }
    }

    /// Operand-count contract, checked in pass 1.
    pub fn check_arity(self, operands: &[String]) -> Result<(), String> {
        match self {
            Directive::Org => {
                if operands.len() != 1 {
                    return Err(format!(
                        ".org takes exactly one operand, got {}",
                        operands.len()
                    ));
                }
            }
            Directive::Db | Directive::Dw => {
                if operands.is_empty() {
                    return Err(format!(".{} needs at least one operand", self.mnemonic()));
                }
            }
            Directive::Globl => {
                if operands.is_empty() {
                    return Err(".globl needs at least one label name".to_string());
                }
            }
            Directive::Macro => {
                if operands.is_empty() {
                    return Err(".macro needs a macro name".to_string());
                }
            }
            Directive::Endm => {
                if !operands.is_empty() {
                    return Err(".endm takes no operands".to_string());
                }
            }
        }
        Ok(())
    }
}

/// Split a directive operand field on commas and on whitespace outside
/// parentheses, so `.db 1 2 3` and `.db 1,2,3` list the same operands
/// while `(2 + 3)` stays one expression.
pub fn split_operands(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' | ' ' | '\t' if depth == 0 => {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Split on commas and whitespace unconditionally. `.macro` operands are
/// names and placeholders, never expressions, so parentheses do not group
/// here; a standalone `(` or `)` stays its own token for the header
/// validation to judge.
pub fn split_plain(text: &str) -> Vec<String> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// `.globl` takes whitespace-separated names only. A comma stays inside
/// the token, so an addressing-mode suffix like `a,x` reaches name
/// validation intact and fails there.
pub fn split_names(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

/// A label name must be a bare identifier: no addressing-mode suffixes, no
/// expression characters.
pub fn validate_label_name(name: &str) -> Result<(), String> {
    if is_symbol_name(name) {
        Ok(())
    } else {
        Err(format!("Illegal label name: {name}"))
    }
}

/// Parsed `.macro` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroHeader {
    pub name: String,
    pub params: Vec<String>,
}

/// Validate a `.macro` operand list. The first operand names the macro;
/// the rest are sentinel-prefixed placeholders, optionally wrapped in one
/// balanced pair of parentheses whose opening may only lead the first
/// placeholder and whose closing may only trail the last.
pub fn parse_macro_header(operands: &[String]) -> Result<MacroHeader, String> {
    let name = operands.first().ok_or(".macro needs a macro name")?;
    if name.starts_with(DIRECTIVE_MARKER) {
        return Err(format!("Macro name may not start with '{DIRECTIVE_MARKER}': {name}"));
    }
    if name.contains('(') || name.contains(')') {
        return Err(format!("Macro name may not contain parentheses: {name}"));
    }
    if !is_symbol_name(name) {
        return Err(format!("Illegal macro name: {name}"));
    }

    let mut raw: Vec<String> = operands[1..].to_vec();
    let last = raw.len().saturating_sub(1);
    let mut open = false;
    let mut close = false;
    for (ix, token) in raw.iter_mut().enumerate() {
        while let Some(rest) = token.strip_prefix('(') {
            if ix != 0 || open {
                return Err(format!(
                    "Misplaced '(' in placeholder list at operand {}",
                    ix + 2
                ));
            }
            open = true;
            *token = rest.to_string();
        }
        while let Some(rest) = token.strip_suffix(')') {
            if ix != last || close {
                return Err(format!(
                    "Misplaced ')' in placeholder list at operand {}",
                    ix + 2
                ));
            }
            close = true;
            *token = rest.to_string();
        }
        if token.contains('(') || token.contains(')') {
            return Err(format!(
                "Misplaced parenthesis in placeholder list at operand {}",
                ix + 2
            ));
        }
    }
    if open != close {
        return Err("Unbalanced parentheses around placeholder list".to_string());
    }

    let mut params = Vec::new();
    for (ix, token) in raw.iter().enumerate() {
        if token.is_empty() {
            // A bare "(" or ")" token reduces to nothing once stripped.
            continue;
        }
        let Some(param) = token.strip_prefix(PARAM_SENTINEL) else {
            return Err(format!(
                "Placeholder must start with '{PARAM_SENTINEL}' at operand {}: {token}",
                ix + 2
            ));
        };
        if param.is_empty() || !is_symbol_name(param) {
            return Err(format!("Illegal placeholder name at operand {}: {token}", ix + 2));
        }
        if params.iter().any(|existing| existing == param) {
            return Err(format!("Duplicate placeholder name: {PARAM_SENTINEL}{param}"));
        }
        params.push(param.to_string());
    }

    Ok(MacroHeader {
        name: name.clone(),
        params,
    })
}
