// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Assembler driver: four passes from source text to a ROM image.
//!
//! Pass 1 sizes every line, allocates addresses, declares labels, and
//! captures/expands macros. Pass 2 materializes the expanded bodies into
//! the definitive line stream. Pass 3 selects addressing modes and
//! opcodes. Pass 4 evaluates operand expressions against the complete
//! symbol table and emits bytes. A hard error in any pass aborts the run
//! before the next pass; nothing partial is returned.

pub mod cli;
pub mod error;

use std::io::{self, Write};

use tracing::debug;

use crate::addressing::{self, AddressingMode};
use crate::directives::{self, Directive};
use crate::disasm::{self, DisasmLine};
use crate::expr::{self, SymbolLookup};
use crate::image::RomImage;
use crate::macros::{MacroDef, MacroTable};
use crate::opcodes::OpcodeSet;
use crate::symbols::SymbolTable;

pub use cli::run;
pub use error::{AsmError, AsmErrorKind, Diagnostic, RelatedSite, RunError, RunReport, Severity};

/// One logical source line after comment stripping and classification.
#[derive(Debug, Clone)]
struct SourceLine {
    file: String,
    line: u32,
    text: String,
    label: Option<String>,
    content: Content,
    /// Address allocated in pass 1.
    addr: u16,
    /// Bytes this line will emit, decided in pass 1.
    size: u16,
    /// Addressing mode and opcode, chosen in pass 3.
    mode: Option<AddressingMode>,
    opcode: Option<u8>,
    /// Bytes emitted in pass 4, kept for the listing.
    bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
enum Content {
    Empty,
    Directive {
        directive: Directive,
        operands: Vec<String>,
    },
    Instruction {
        mnemonic: String,
        operand: String,
    },
    Equivalence {
        name: String,
        expr: String,
    },
    /// Identifier-led line that is not a known instruction; resolved in
    /// pass 1 once macro definitions exist.
    Candidate {
        mnemonic: String,
        operand: String,
    },
    /// A line swallowed by a macro definition body.
    MacroBody,
    /// A macro invocation with its expanded, invocation-owned lines.
    Invocation { expansion: Vec<SourceLine> },
}

/// A row of the final listing.
#[derive(Debug, Clone)]
pub struct ListingRow {
    pub addr: u16,
    pub bytes: Vec<u8>,
    pub file: String,
    pub line: u32,
    pub text: String,
}

/// Result of a successful assembly.
#[derive(Debug)]
pub struct Assembly {
    image: RomImage,
    symbols: SymbolTable,
    opcodes: OpcodeSet,
    rows: Vec<ListingRow>,
    warnings: Vec<Diagnostic>,
    assembled: bool,
}

impl Assembly {
    /// True only when all four passes completed with zero hard errors.
    pub fn assembled(&self) -> bool {
        self.assembled
    }

    pub fn image(&self) -> &RomImage {
        &self.image
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    /// Decode the assembled bytes over an address window.
    pub fn disassembly(&self, window_start: u16, window_end: u16) -> Vec<DisasmLine> {
        disasm::disassemble(&self.image, &self.opcodes, window_start, window_end)
    }

    pub fn listing_rows(&self) -> &[ListingRow] {
        &self.rows
    }

    pub fn write_listing<W: Write>(&self, mut out: W) -> io::Result<()> {
        writeln!(out, "addr  bytes         source")?;
        for row in &self.rows {
            let hex: Vec<String> = row.bytes.iter().map(|b| format!("{b:02x}")).collect();
            writeln!(out, "{:04x}  {:<12}  {}", row.addr, hex.join(" "), row.text)?;
        }
        Ok(())
    }
}

/// Symbol view from one file: same-file locals first, then globals.
struct ScopedLookup<'a> {
    symbols: &'a SymbolTable,
    file: &'a str,
}

impl SymbolLookup for ScopedLookup<'_> {
    fn lookup(&self, name: &str) -> Option<i64> {
        self.symbols.resolve(name, self.file).map(i64::from)
    }
}

/// Ceiling on driver-level re-expansion of labeled invocation lines.
const MAX_EXPANSION_DEPTH: usize = 64;

/// In-progress `.macro` capture state during pass 1.
struct MacroCapture {
    name: String,
    params: Vec<String>,
    body: Vec<String>,
    file: String,
    line: u32,
}

pub struct Assembler {
    opcodes: OpcodeSet,
    symbols: SymbolTable,
    macros: MacroTable,
    diagnostics: Vec<Diagnostic>,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    /// Every instance owns its tables; parallel assemblies never share
    /// state.
    pub fn new() -> Self {
        Self {
            opcodes: OpcodeSet::new(),
            symbols: SymbolTable::new(),
            macros: MacroTable::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Assemble the ordered multi-file set into a ROM image starting at
    /// `start` with at most `max_size` bytes.
    pub fn assemble(
        mut self,
        start: u16,
        max_size: usize,
        sources: &[(String, String)],
    ) -> Result<Assembly, RunError> {
        let mut image = RomImage::new(start, max_size);

        let mut lines = self.load(sources);
        if self.has_errors() {
            return Err(self.into_run_error());
        }

        self.pass1(&mut lines, &mut image);
        debug!(lines = lines.len(), cursor = image.cursor(), "pass 1 complete");
        if self.has_errors() {
            return Err(self.into_run_error());
        }

        let mut stream = materialize(lines);
        debug!(lines = stream.len(), "pass 2 complete");

        self.pass3(&mut stream);
        debug!("pass 3 complete");
        if self.has_errors() {
            return Err(self.into_run_error());
        }

        self.pass4(&mut stream, &mut image);
        debug!(bytes = image.extent(), "pass 4 complete");
        if self.has_errors() {
            return Err(self.into_run_error());
        }

        let rows = stream
            .into_iter()
            .map(|line| ListingRow {
                addr: line.addr,
                bytes: line.bytes,
                file: line.file,
                line: line.line,
                text: line.text,
            })
            .collect();
        Ok(Assembly {
            image,
            symbols: self.symbols,
            opcodes: self.opcodes,
            rows,
            warnings: self.diagnostics,
            assembled: true,
        })
    }

    // ----- loading and classification ---------------------------------

    fn load(&mut self, sources: &[(String, String)]) -> Vec<SourceLine> {
        let mut out = Vec::new();
        for (file, text) in sources {
            for (ix, raw) in text.lines().enumerate() {
                let line_num = ix as u32 + 1;
                let stripped = strip_comment(raw);
                match classify(&stripped, &self.opcodes) {
                    Ok((label, content)) => out.push(SourceLine {
                        file: file.clone(),
                        line: line_num,
                        text: stripped,
                        label,
                        content,
                        addr: 0,
                        size: 0,
                        mode: None,
                        opcode: None,
                        bytes: Vec::new(),
                    }),
                    Err(error) => {
                        self.diagnostics.push(
                            Diagnostic::new(line_num, Severity::Error, error)
                                .with_file(file.clone())
                                .with_source(stripped),
                        );
                    }
                }
            }
        }
        out
    }

    // ----- pass 1: size, allocate, declare, capture/expand macros -----

    fn pass1(&mut self, lines: &mut [SourceLine], image: &mut RomImage) {
        let mut capture: Option<MacroCapture> = None;
        for line in lines.iter_mut() {
            let capture_state = capture
                .as_ref()
                .map(|active| (active.file == line.file, active.line));
            if let Some((same_file, open_line)) = capture_state {
                if !same_file {
                    // Bodies cannot span files; report and resume normal
                    // processing in the new file.
                    self.error_at(
                        line,
                        AsmErrorKind::Macro,
                        format!(".macro opened at line {open_line} never closed with .endm"),
                    );
                    capture = None;
                } else {
                    match &line.content {
                        Content::Directive {
                            directive: Directive::Endm,
                            ..
                        } => {
                            line.addr = image.cursor();
                            line.content = Content::MacroBody;
                            let finished = capture.take().expect("capture is active");
                            self.define_macro(finished, line);
                        }
                        Content::Directive {
                            directive: Directive::Macro,
                            ..
                        } => {
                            self.error_at(
                                line,
                                AsmErrorKind::Macro,
                                "Nested .macro definitions are not supported",
                            );
                        }
                        _ => {
                            if let Some(active) = capture.as_mut() {
                                active.body.push(line.text.clone());
                            }
                            line.addr = image.cursor();
                            line.content = Content::MacroBody;
                        }
                    }
                    continue;
                }
            }

            if let Content::Directive {
                directive: Directive::Macro,
                operands,
            } = &line.content
            {
                line.addr = image.cursor();
                match directives::parse_macro_header(operands) {
                    Ok(header) => {
                        capture = Some(MacroCapture {
                            name: header.name,
                            params: header.params,
                            body: Vec::new(),
                            file: line.file.clone(),
                            line: line.line,
                        });
                        line.content = Content::MacroBody;
                    }
                    Err(message) => {
                        self.error_at(line, AsmErrorKind::Macro, message);
                    }
                }
                continue;
            }

            self.size_line(line, image, 0);
        }

        if let Some(active) = capture {
            let diag = Diagnostic::new(
                active.line,
                Severity::Error,
                AsmError::new(
                    AsmErrorKind::Macro,
                    format!(".macro {} never closed with .endm", active.name),
                ),
            )
            .with_file(active.file);
            self.diagnostics.push(diag);
        }
    }

    fn define_macro(&mut self, capture: MacroCapture, endm_line: &SourceLine) {
        let def = MacroDef {
            name: capture.name,
            params: capture.params,
            body: capture.body,
            file: capture.file,
            line: capture.line,
        };
        if let Err(err) = self.macros.define(def) {
            let mut diag = Diagnostic::new(
                endm_line.line,
                Severity::Error,
                AsmError::new(AsmErrorKind::Macro, err.message()),
            )
            .with_file(endm_line.file.clone());
            if let Some((file, line)) = err.def_site() {
                diag = diag.with_related(RelatedSite {
                    file: file.to_string(),
                    line,
                    label: "first defined here".to_string(),
                });
            }
            self.diagnostics.push(diag);
        }
    }

    /// Allocate one line: declare its label at the current address, decide
    /// its size, and move the cursor. `depth` counts driver-level macro
    /// re-expansion of labeled invocation lines, which the expander's own
    /// cycle stack cannot see.
    fn size_line(&mut self, line: &mut SourceLine, image: &mut RomImage, depth: usize) {
        line.addr = image.cursor();

        if let Some(label) = line.label.clone() {
            self.declare_symbol(line, &label, line.addr, false);
        }

        let content = line.content.clone();
        match content {
            Content::Empty | Content::MacroBody | Content::Invocation { .. } => {}
            Content::Equivalence { name, expr } => {
                self.define_equivalence(line, &name, &expr);
            }
            Content::Directive {
                directive,
                operands,
            } => {
                if let Err(message) = directive.check_arity(&operands) {
                    self.error_at(line, AsmErrorKind::Syntax, message);
                    return;
                }
                match directive {
                    Directive::Org => self.apply_org(line, &operands[0], image),
                    Directive::Db | Directive::Dw => {
                        line.size = directive.size(&operands);
                        image.advance(line.size);
                    }
                    Directive::Globl => self.apply_globl(line, &operands),
                    Directive::Macro => unreachable!("captured before sizing"),
                    Directive::Endm => {
                        self.error_at(line, AsmErrorKind::Macro, ".endm without an open .macro");
                    }
                }
            }
            Content::Instruction { mnemonic, operand } => {
                match self.select_mode(&line.file, &mnemonic, &operand) {
                    Some((mode, _opcode)) => {
                        line.size = 1 + mode.operand_size();
                        image.advance(line.size);
                    }
                    None => {
                        self.error_at(
                            line,
                            AsmErrorKind::Addressing,
                            format!("No addressing mode matches {mnemonic} operand '{operand}'"),
                        );
                    }
                }
            }
            Content::Candidate { mnemonic, operand } => {
                self.expand_invocation(line, &mnemonic, &operand, image, depth);
            }
        }
    }

    /// Resolve a pass-1 candidate line as a macro invocation, expanding
    /// and sizing its body in place.
    fn expand_invocation(
        &mut self,
        line: &mut SourceLine,
        name: &str,
        operand: &str,
        image: &mut RomImage,
        depth: usize,
    ) {
        if !self.macros.contains(name) {
            self.error_at(
                line,
                AsmErrorKind::Instruction,
                format!("Unknown instruction or macro: {name}"),
            );
            return;
        }
        if depth >= MAX_EXPANSION_DEPTH {
            self.error_at(
                line,
                AsmErrorKind::Macro,
                "Macro expansion exceeded maximum depth",
            );
            return;
        }
        let args = directives::split_operands(operand);
        let expanded = match self.macros.expand(name, &args) {
            Ok(lines) => lines,
            Err(err) => {
                let mut diag = Diagnostic::new(
                    line.line,
                    Severity::Error,
                    AsmError::new(AsmErrorKind::Macro, err.message()),
                )
                .with_file(line.file.clone())
                .with_source(line.text.clone());
                if let Some((file, def_line)) = err.def_site() {
                    diag = diag.with_related(RelatedSite {
                        file: file.to_string(),
                        line: def_line,
                        label: "macro defined here".to_string(),
                    });
                }
                self.diagnostics.push(diag);
                return;
            }
        };

        let mut expansion = Vec::with_capacity(expanded.len());
        for text in expanded {
            match classify(&text, &self.opcodes) {
                Ok((label, content)) => {
                    if matches!(
                        content,
                        Content::Directive {
                            directive: Directive::Macro | Directive::Endm,
                            ..
                        }
                    ) {
                        self.error_at(
                            line,
                            AsmErrorKind::Macro,
                            "Macro definitions may not appear inside an expansion",
                        );
                        continue;
                    }
                    let mut synthetic = SourceLine {
                        file: line.file.clone(),
                        line: line.line,
                        text,
                        label,
                        content,
                        addr: 0,
                        size: 0,
                        mode: None,
                        opcode: None,
                        bytes: Vec::new(),
                    };
                    self.size_line(&mut synthetic, image, depth + 1);
                    expansion.push(synthetic);
                }
                Err(error) => {
                    self.diagnostics.push(
                        Diagnostic::new(line.line, Severity::Error, error)
                            .with_file(line.file.clone())
                            .with_source(text),
                    );
                }
            }
        }
        debug!(name, lines = expansion.len(), "macro invocation expanded");
        line.content = Content::Invocation { expansion };
    }

    fn apply_org(&mut self, line: &SourceLine, operand: &str, image: &mut RomImage) {
        let out = {
            let lookup = ScopedLookup {
                symbols: &self.symbols,
                file: &line.file,
            };
            expr::evaluate(operand, &lookup, false)
        };
        match out {
            Ok(out) => {
                if out.value < 0 || !expr::fits_word_range(out.value) {
                    self.error_at(
                        line,
                        AsmErrorKind::Range,
                        format!(".org address out of range: {}", out.value),
                    );
                    return;
                }
                image.set_cursor(out.value as u16);
            }
            Err(err) => {
                self.error_at(
                    line,
                    AsmErrorKind::Expression,
                    format!(".org operand: {}", err.message),
                );
            }
        }
    }

    fn apply_globl(&mut self, line: &SourceLine, operands: &[String]) {
        for name in operands {
            if let Err(message) = directives::validate_label_name(name) {
                self.error_at(line, AsmErrorKind::Syntax, message);
                return;
            }
        }
        for name in operands {
            self.symbols.promote_to_global(name);
        }
    }

    fn define_equivalence(&mut self, line: &SourceLine, name: &str, expr_text: &str) {
        let out = {
            let lookup = ScopedLookup {
                symbols: &self.symbols,
                file: &line.file,
            };
            expr::evaluate(expr_text, &lookup, false)
        };
        let out = match out {
            Ok(out) => out,
            Err(err) => {
                self.error_at(line, AsmErrorKind::Expression, err.message);
                return;
            }
        };
        for symbol in &out.symbols {
            self.symbols
                .reference(symbol, line.addr, &line.file, line.line);
        }
        if !expr::fits_word_range(out.value) {
            self.error_at(
                line,
                AsmErrorKind::Range,
                format!("Equivalence value out of 16-bit range: {}", out.value),
            );
            return;
        }
        self.declare_symbol(line, name, (out.value & 0xffff) as u16, false);
    }

    fn declare_symbol(&mut self, line: &SourceLine, name: &str, addr: u16, global: bool) {
        if let Err(dup) = self
            .symbols
            .declare(name, addr, &line.file, line.line, global)
        {
            let diag = Diagnostic::new(
                line.line,
                Severity::Error,
                AsmError::new(
                    AsmErrorKind::Symbol,
                    format!("Duplicate declaration: {name}"),
                ),
            )
            .with_file(line.file.clone())
            .with_source(line.text.clone())
            .with_related(RelatedSite {
                file: dup.existing_file,
                line: dup.existing_line,
                label: "first declared here".to_string(),
            });
            self.diagnostics.push(diag);
        }
    }

    /// Try modes in the fixed priority order, restricted to the modes the
    /// mnemonic actually encodes; first structural match wins.
    fn select_mode(
        &self,
        file: &str,
        mnemonic: &str,
        operand: &str,
    ) -> Option<(AddressingMode, u8)> {
        let lookup = ScopedLookup {
            symbols: &self.symbols,
            file,
        };
        for mode in AddressingMode::PRIORITY {
            let Some(opcode) = self.opcodes.lookup(mnemonic, mode) else {
                continue;
            };
            if addressing::matches(mode, operand, &lookup).matched {
                return Some((mode, opcode));
            }
        }
        None
    }

    // ----- pass 3: structural resolve ---------------------------------

    fn pass3(&mut self, stream: &mut [SourceLine]) {
        for line in stream.iter_mut() {
            let (mnemonic, operand) = match &line.content {
                Content::Instruction { mnemonic, operand } => {
                    (mnemonic.clone(), operand.clone())
                }
                _ => continue,
            };
            match self.select_mode(&line.file, &mnemonic, &operand) {
                Some((mode, opcode)) => {
                    line.mode = Some(mode);
                    line.opcode = Some(opcode);
                }
                None => {
                    self.error_at(
                        line,
                        AsmErrorKind::Addressing,
                        format!("No addressing mode matches {mnemonic} operand '{operand}'"),
                    );
                }
            }
        }
    }

    // ----- pass 4: evaluate and emit ----------------------------------

    fn pass4(&mut self, stream: &mut [SourceLine], image: &mut RomImage) {
        let mut fatal = false;
        for line in stream.iter_mut() {
            let content = line.content.clone();
            match content {
                Content::Directive {
                    directive: directive @ (Directive::Db | Directive::Dw),
                    operands,
                } => {
                    let mut bytes = Vec::with_capacity(line.size as usize);
                    let mut failed = false;
                    for operand in &operands {
                        match self.eval_operand(line, operand) {
                            Some(value) => match directive {
                                Directive::Db => {
                                    if !expr::fits_byte_range(value) {
                                        self.warn_at(
                                            line,
                                            AsmErrorKind::Range,
                                            format!("Value truncated to 8 bits: {value}"),
                                        );
                                    }
                                    bytes.push((value & 0xff) as u8);
                                }
                                Directive::Dw => {
                                    if !expr::fits_word_range(value) {
                                        self.warn_at(
                                            line,
                                            AsmErrorKind::Range,
                                            format!("Value truncated to 16 bits: {value}"),
                                        );
                                    }
                                    bytes.push((value & 0xff) as u8);
                                    bytes.push(((value >> 8) & 0xff) as u8);
                                }
                                _ => unreachable!("only db/dw emit here"),
                            },
                            None => failed = true,
                        }
                    }
                    if failed {
                        fatal = true;
                    } else if !fatal {
                        self.emit(line, image, bytes, &mut fatal);
                    }
                }
                Content::Instruction { operand, .. } => {
                    let (mode, opcode) = match (line.mode, line.opcode) {
                        (Some(mode), Some(opcode)) => (mode, opcode),
                        _ => continue,
                    };
                    let Some(expr_text) = addressing::operand_expr(mode, &operand) else {
                        continue;
                    };
                    let mut bytes = vec![opcode];
                    let mut failed = false;
                    if !expr_text.is_empty() {
                        match self.eval_operand(line, &expr_text) {
                            Some(value) => {
                                if !self.encode_operand(line, mode, value, &mut bytes) {
                                    failed = true;
                                }
                            }
                            None => failed = true,
                        }
                    }
                    if failed {
                        fatal = true;
                    } else if !fatal {
                        self.emit(line, image, bytes, &mut fatal);
                    }
                }
                _ => {}
            }
        }

        for (name, sites) in self.symbols.unresolved() {
            let site = &sites[0];
            let mut message = format!("Unresolved symbol: {name}");
            if sites.len() > 1 {
                message.push_str(&format!(" ({} reference sites)", sites.len()));
            }
            self.diagnostics.push(
                Diagnostic::new(
                    site.line,
                    Severity::Error,
                    AsmError::new(AsmErrorKind::Symbol, message),
                )
                .with_file(site.file.clone()),
            );
        }
    }

    /// Evaluate one pass-4 operand, recording reference sites. `None`
    /// means the expression failed or still has unresolved names; the
    /// unresolved case surfaces through the per-name sweep afterwards.
    fn eval_operand(&mut self, line: &SourceLine, operand: &str) -> Option<i64> {
        let out = {
            let lookup = ScopedLookup {
                symbols: &self.symbols,
                file: &line.file,
            };
            expr::evaluate(operand, &lookup, true)
        };
        let out = match out {
            Ok(out) => out,
            Err(err) => {
                self.error_at(line, AsmErrorKind::Expression, err.message);
                return None;
            }
        };
        for symbol in &out.symbols {
            self.symbols
                .reference(symbol, line.addr, &line.file, line.line);
        }
        if out.overflow {
            self.warn_at(
                line,
                AsmErrorKind::Expression,
                "Byte selector truncated a wider value",
            );
        }
        out.is_resolved().then_some(out.value)
    }

    /// Append the operand bytes for a resolved value; false on range
    /// failure.
    fn encode_operand(
        &mut self,
        line: &SourceLine,
        mode: AddressingMode,
        value: i64,
        bytes: &mut Vec<u8>,
    ) -> bool {
        match mode {
            AddressingMode::Implied => {}
            AddressingMode::Relative => {
                let offset = value - (line.addr as i64 + 2);
                if !(-128..=127).contains(&offset) {
                    self.error_at(
                        line,
                        AsmErrorKind::Range,
                        format!("Branch target out of range: offset {offset}"),
                    );
                    return false;
                }
                bytes.push((offset & 0xff) as u8);
            }
            AddressingMode::Immediate
            | AddressingMode::ZeroPage
            | AddressingMode::ZeroPageX
            | AddressingMode::ZeroPageY
            | AddressingMode::IndirectX
            | AddressingMode::IndirectY => {
                if !expr::fits_byte_range(value) {
                    self.error_at(
                        line,
                        AsmErrorKind::Range,
                        format!("Operand does not fit in one byte: {value}"),
                    );
                    return false;
                }
                bytes.push((value & 0xff) as u8);
            }
            AddressingMode::Absolute
            | AddressingMode::AbsoluteX
            | AddressingMode::AbsoluteY
            | AddressingMode::Indirect => {
                if !expr::fits_word_range(value) {
                    self.error_at(
                        line,
                        AsmErrorKind::Range,
                        format!("Operand does not fit in 16 bits: {value}"),
                    );
                    return false;
                }
                bytes.push((value & 0xff) as u8);
                bytes.push(((value >> 8) & 0xff) as u8);
            }
        }
        true
    }

    fn emit(
        &mut self,
        line: &mut SourceLine,
        image: &mut RomImage,
        bytes: Vec<u8>,
        fatal: &mut bool,
    ) {
        if let Err(err) = image.write_all(line.addr, &bytes) {
            self.error_at(line, AsmErrorKind::Range, err.message);
            *fatal = true;
            return;
        }
        line.bytes = bytes;
    }

    // ----- diagnostics ------------------------------------------------

    fn error_at(&mut self, line: &SourceLine, kind: AsmErrorKind, message: impl Into<String>) {
        self.diagnostics.push(
            Diagnostic::new(line.line, Severity::Error, AsmError::new(kind, message))
                .with_file(line.file.clone())
                .with_source(line.text.clone()),
        );
    }

    fn warn_at(&mut self, line: &SourceLine, kind: AsmErrorKind, message: impl Into<String>) {
        self.diagnostics.push(
            Diagnostic::new(line.line, Severity::Warning, AsmError::new(kind, message))
                .with_file(line.file.clone())
                .with_source(line.text.clone()),
        );
    }

    fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diag| diag.severity() == Severity::Error)
    }

    fn into_run_error(self) -> RunError {
        let errors = self
            .diagnostics
            .iter()
            .filter(|diag| diag.severity() == Severity::Error)
            .count();
        RunError::new(
            AsmError::new(
                AsmErrorKind::Syntax,
                format!("Assembly failed with {errors} error(s)"),
            ),
            self.diagnostics,
        )
    }
}

/// Pass 2: splice every invocation's expanded lines into the definitive
/// stream. Each expansion is already an independent copy owned by its
/// invocation site.
fn materialize(lines: Vec<SourceLine>) -> Vec<SourceLine> {
    let mut stream = Vec::with_capacity(lines.len());
    for mut line in lines {
        if let Content::Invocation { expansion, .. } = &mut line.content {
            let expanded = std::mem::take(expansion);
            line.content = Content::Empty;
            stream.push(line);
            stream.extend(expanded);
        } else {
            stream.push(line);
        }
    }
    stream
}

/// Strip a `;` comment, tracking quoted string/char literals and their
/// escapes so a `;` inside quotes survives.
fn strip_comment(line: &str) -> String {
    let mut out = String::new();
    let mut quote: Option<char> = None;
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                ';' => break,
                '"' | '\'' => {
                    quote = Some(c);
                    out.push(c);
                }
                _ => out.push(c),
            },
        }
    }
    out.trim_end().to_string()
}

/// Split a leading identifier off the text. Returns (identifier, rest).
fn split_ident(text: &str) -> Option<(&str, &str)> {
    let bytes = text.as_bytes();
    let first = *bytes.first()?;
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return None;
    }
    let end = bytes
        .iter()
        .position(|&c| !(c.is_ascii_alphanumeric() || c == b'_'))
        .unwrap_or(bytes.len());
    Some((&text[..end], &text[end..]))
}

/// Classify one comment-stripped line into its label and content. Unknown
/// directive mnemonics fail here, before pass 1 ever runs.
fn classify(text: &str, opcodes: &OpcodeSet) -> Result<(Option<String>, Content), AsmError> {
    let trimmed = text.trim();
    let mut label = None;
    let mut rest = trimmed;

    if let Some((head, tail)) = split_ident(trimmed) {
        if let Some(after) = tail.trim_start().strip_prefix(':') {
            label = Some(head.to_string());
            rest = after.trim();
        }
    }

    if rest.is_empty() {
        return Ok((label, Content::Empty));
    }

    if let Some(after_marker) = rest.strip_prefix(directives::DIRECTIVE_MARKER) {
        let (mnemonic, operand_field) = match split_ident(after_marker) {
            Some(parts) => parts,
            None => {
                return Err(AsmError::new(
                    AsmErrorKind::Syntax,
                    format!("Malformed directive: {rest}"),
                ));
            }
        };
        let directive = Directive::from_mnemonic(mnemonic).ok_or_else(|| {
            AsmError::new(
                AsmErrorKind::Directive,
                format!("Unknown directive: .{mnemonic}"),
            )
        })?;
        let operands = match directive {
            Directive::Macro => directives::split_plain(operand_field),
            Directive::Globl => directives::split_names(operand_field),
            _ => directives::split_operands(operand_field),
        };
        return Ok((
            label,
            Content::Directive {
                directive,
                operands,
            },
        ));
    }

    let Some((head, tail)) = split_ident(rest) else {
        return Err(AsmError::new(
            AsmErrorKind::Syntax,
            format!("Unparseable line: {rest}"),
        ));
    };
    let after = tail.trim_start();
    if let Some(value) = after.strip_prefix('=') {
        return Ok((
            label,
            Content::Equivalence {
                name: head.to_string(),
                expr: value.trim().to_string(),
            },
        ));
    }
    if opcodes.has_mnemonic(head) {
        return Ok((
            label,
            Content::Instruction {
                mnemonic: head.to_string(),
                operand: tail.trim().to_string(),
            },
        ));
    }
    Ok((
        label,
        Content::Candidate {
            mnemonic: head.to_string(),
            operand: tail.trim().to_string(),
        },
    ))
}

#[cfg(test)]
mod tests;
