// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Error types, diagnostics, and reporting for the assembler.

use std::fmt;

/// Categories of assembler errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsmErrorKind {
    /// Operand structurally matched no addressing mode.
    Addressing,
    Cli,
    Directive,
    Expression,
    Instruction,
    Io,
    Macro,
    /// Value outside the accepted range for its destination width.
    Range,
    /// Duplicate declaration or unresolved symbol.
    Symbol,
    Syntax,
}

/// An assembler error with a kind and message.
#[derive(Debug, Clone)]
pub struct AsmError {
    kind: AsmErrorKind,
    message: String,
}

impl AsmError {
    pub fn new(kind: AsmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> AsmErrorKind {
        self.kind
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AsmError {}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A secondary location attached to a diagnostic, e.g. the original
/// declaration site of a duplicated symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedSite {
    pub file: String,
    pub line: u32,
    pub label: String,
}

/// A diagnostic message with location and context.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    line: u32,
    column: Option<usize>,
    severity: Severity,
    error: AsmError,
    file: Option<String>,
    source: Option<String>,
    related: Option<RelatedSite>,
}

impl Diagnostic {
    pub fn new(line: u32, severity: Severity, error: AsmError) -> Self {
        Self {
            line,
            column: None,
            severity,
            error,
            file: None,
            source: None,
            related: None,
        }
    }

    pub fn with_column(mut self, column: Option<usize>) -> Self {
        self.column = column;
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_related(mut self, related: RelatedSite) -> Self {
        self.related = Some(related);
        self
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> Option<usize> {
        self.column
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn error(&self) -> &AsmError {
        &self.error
    }

    pub fn related(&self) -> Option<&RelatedSite> {
        self.related.as_ref()
    }

    pub fn format(&self) -> String {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        let file = self.file.as_deref().unwrap_or("<input>");
        let mut out = format!("{file}:{}: {severity}: {}", self.line, self.error);
        if let Some(related) = &self.related {
            out.push_str(&format!(
                "\n  {}:{}: note: {}",
                related.file, related.line, related.label
            ));
        }
        out
    }

    /// Render with the offending source line underneath, optionally
    /// colorized for terminals.
    pub fn format_with_context(&self, use_color: bool) -> String {
        let mut out = if use_color {
            let color = match self.severity {
                Severity::Warning => "\x1b[33m",
                Severity::Error => "\x1b[31m",
            };
            let formatted = self.format();
            match formatted.split_once(": ") {
                Some((loc, rest)) => format!("{loc}: {color}{rest}\x1b[0m"),
                None => formatted,
            }
        } else {
            self.format()
        };
        if let Some(source) = &self.source {
            out.push_str(&format!("\n  | {source}"));
            if let Some(column) = self.column {
                out.push_str(&format!("\n  | {}^", " ".repeat(column.saturating_sub(1))));
            }
        }
        out
    }
}

/// Successful run summary: warnings only.
#[derive(Debug, Default)]
pub struct RunReport {
    diagnostics: Vec<Diagnostic>,
}

impl RunReport {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|diag| diag.severity() == Severity::Warning)
            .count()
    }
}

/// Failed run: the summary error plus every collected diagnostic.
#[derive(Debug)]
pub struct RunError {
    error: AsmError,
    diagnostics: Vec<Diagnostic>,
}

impl RunError {
    pub fn new(error: AsmError, diagnostics: Vec<Diagnostic>) -> Self {
        Self { error, diagnostics }
    }

    pub fn error(&self) -> &AsmError {
        &self.error
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for RunError {}
