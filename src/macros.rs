// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Macro definitions and expansion.
//!
//! A macro is a name, an ordered list of placeholder parameters (each
//! written with the `\` sentinel), and the captured body lines. Invoking a
//! macro substitutes the positional arguments textually and yields a fresh
//! copy of the body; nested invocations expand recursively, and any
//! expansion cycle, direct or indirect, is a hard error.

use std::collections::HashMap;

use crate::directives::split_operands;
use crate::expr::is_symbol_name;

/// Placeholder sentinel used in parameter lists and macro bodies.
pub const PARAM_SENTINEL: char = '\\';

#[derive(Debug, Clone)]
pub struct MacroDef {
    pub name: String,
    /// Parameter names with the sentinel stripped.
    pub params: Vec<String>,
    pub body: Vec<String>,
    pub file: String,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct MacroError {
    message: String,
    /// Definition site of the macro involved, when one exists.
    def_site: Option<(String, u32)>,
}

impl MacroError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            def_site: None,
        }
    }

    fn with_def_site(message: impl Into<String>, def: &MacroDef) -> Self {
        Self {
            message: message.into(),
            def_site: Some((def.file.clone(), def.line)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn def_site(&self) -> Option<(&str, u32)> {
        self.def_site
            .as_ref()
            .map(|(file, line)| (file.as_str(), *line))
    }
}

impl std::fmt::Display for MacroError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for MacroError {}

#[derive(Debug, Default)]
pub struct MacroTable {
    defs: HashMap<String, MacroDef>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, def: MacroDef) -> Result<(), MacroError> {
        if let Some(existing) = self.defs.get(&def.name) {
            return Err(MacroError::with_def_site(
                format!("Macro already defined: {}", def.name),
                existing,
            ));
        }
        self.defs.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&MacroDef> {
        self.defs.get(name)
    }

    /// Expand an invocation into concrete source lines. Nested invocations
    /// are expanded in place; the returned lines are an independent copy
    /// owned by this invocation.
    pub fn expand(&self, name: &str, args: &[String]) -> Result<Vec<String>, MacroError> {
        let mut stack = Vec::new();
        self.expand_inner(name, args, &mut stack)
    }

    fn expand_inner(
        &self,
        name: &str,
        args: &[String],
        stack: &mut Vec<String>,
    ) -> Result<Vec<String>, MacroError> {
        if stack.iter().any(|active| active == name) {
            let mut chain: Vec<&str> = stack.iter().map(String::as_str).collect();
            chain.push(name);
            return Err(MacroError::new(format!(
                "Macro expansion cycle: {}",
                chain.join(" -> ")
            )));
        }
        let def = self
            .defs
            .get(name)
            .ok_or_else(|| MacroError::new(format!("Unknown macro: {name}")))?;
        if args.len() != def.params.len() {
            return Err(MacroError::with_def_site(
                format!(
                    "Macro {} takes {} argument(s), got {}",
                    name,
                    def.params.len(),
                    args.len()
                ),
                def,
            ));
        }

        stack.push(name.to_string());
        let mut out = Vec::new();
        for body_line in &def.body {
            let substituted = substitute(body_line, &def.params, args);
            match parse_invocation(&substituted, self) {
                Some((nested, nested_args)) => {
                    out.extend(self.expand_inner(&nested, &nested_args, stack)?);
                }
                None => out.push(substituted),
            }
        }
        stack.pop();
        Ok(out)
    }
}

/// Substitute `\param` occurrences positionally. Longer parameter names
/// are replaced first so `\count` is never clipped by a `\c` parameter.
fn substitute(line: &str, params: &[String], args: &[String]) -> String {
    let mut order: Vec<usize> = (0..params.len()).collect();
    order.sort_by_key(|&ix| std::cmp::Reverse(params[ix].len()));
    let mut out = line.to_string();
    for ix in order {
        let needle = format!("{PARAM_SENTINEL}{}", params[ix]);
        out = out.replace(&needle, &args[ix]);
    }
    out
}

/// Recognize a macro invocation line: optional `label:` prefix, then a
/// defined macro name, then comma/whitespace-separated arguments. Returns
/// the name and arguments; the label prefix, if any, stays with the caller.
pub fn parse_invocation(line: &str, table: &MacroTable) -> Option<(String, Vec<String>)> {
    let text = line.trim();
    let (head, rest) = match text.find(|c: char| c.is_whitespace()) {
        Some(ix) => (&text[..ix], &text[ix..]),
        None => (text, ""),
    };
    if !is_symbol_name(head) || !table.contains(head) {
        return None;
    }
    Some((head.to_string(), split_operands(rest)))
}

#[cfg(test)]
mod tests {
    use super::{parse_invocation, MacroDef, MacroTable};

    fn def(name: &str, params: &[&str], body: &[&str]) -> MacroDef {
        MacroDef {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            body: body.iter().map(|l| l.to_string()).collect(),
            file: "test.asm".to_string(),
            line: 1,
        }
    }

    #[test]
    fn positional_substitution() {
        let mut table = MacroTable::new();
        table
            .define(def("store", &["val", "addr"], &[" lda #\\val", " sta \\addr"]))
            .unwrap();
        let lines = table
            .expand("store", &["$10".to_string(), "$0200".to_string()])
            .unwrap();
        assert_eq!(lines, vec![" lda #$10".to_string(), " sta $0200".to_string()]);
    }

    #[test]
    fn expansions_are_independent() {
        let mut table = MacroTable::new();
        table.define(def("put", &["v"], &[" .db \\v"])).unwrap();
        let mut first = table.expand("put", &["1".to_string()]).unwrap();
        let second = table.expand("put", &["2".to_string()]).unwrap();
        first[0].push_str(" ; mutated");
        assert_eq!(second, vec![" .db 2".to_string()]);
    }

    #[test]
    fn nested_expansion() {
        let mut table = MacroTable::new();
        table.define(def("inner", &["v"], &[" .db \\v"])).unwrap();
        table
            .define(def("outer", &["v"], &["inner \\v", "inner \\v"]))
            .unwrap();
        let lines = table.expand("outer", &["7".to_string()]).unwrap();
        assert_eq!(lines, vec![" .db 7".to_string(), " .db 7".to_string()]);
    }

    #[test]
    fn direct_recursion_is_an_error() {
        let mut table = MacroTable::new();
        table.define(def("loop", &[], &["loop"])).unwrap();
        let err = table.expand("loop", &[]).unwrap_err();
        assert!(err.message().contains("cycle"));
    }

    #[test]
    fn indirect_recursion_is_an_error() {
        let mut table = MacroTable::new();
        table.define(def("ping", &[], &["pong"])).unwrap();
        table.define(def("pong", &[], &["ping"])).unwrap();
        let err = table.expand("ping", &[]).unwrap_err();
        assert!(err.message().contains("ping -> pong -> ping"));
    }

    #[test]
    fn redefinition_reports_original_site() {
        let mut table = MacroTable::new();
        table.define(def("twice", &[], &[" nop"])).unwrap();
        let err = table.define(def("twice", &[], &[" brk"])).unwrap_err();
        assert_eq!(err.def_site(), Some(("test.asm", 1)));
    }

    #[test]
    fn argument_count_must_match() {
        let mut table = MacroTable::new();
        table.define(def("pair", &["a", "b"], &[" .db \\a, \\b"])).unwrap();
        assert!(table.expand("pair", &["1".to_string()]).is_err());
    }

    #[test]
    fn longer_params_substitute_first() {
        let mut table = MacroTable::new();
        table
            .define(def("mix", &["c", "count"], &[" .db \\count, \\c"]))
            .unwrap();
        let lines = table
            .expand("mix", &["1".to_string(), "9".to_string()])
            .unwrap();
        assert_eq!(lines, vec![" .db 9, 1".to_string()]);
    }

    #[test]
    fn invocation_recognition() {
        let mut table = MacroTable::new();
        table.define(def("put", &["v"], &[" .db \\v"])).unwrap();
        let (name, args) = parse_invocation("put 1, 2", &table).unwrap();
        assert_eq!(name, "put");
        assert_eq!(args, vec!["1".to_string(), "2".to_string()]);
        assert!(parse_invocation("lda #1", &table).is_none());
    }
}
