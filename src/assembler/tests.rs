// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use super::error::{AsmErrorKind, Severity};
use super::{Assembler, Assembly, RunError};

fn assemble_named(sources: &[(&str, &str)]) -> Result<Assembly, RunError> {
    let owned: Vec<(String, String)> = sources
        .iter()
        .map(|(name, text)| (name.to_string(), text.to_string()))
        .collect();
    Assembler::new().assemble(0x8000, 0x4000, &owned)
}

fn assemble_src(src: &str) -> Result<Assembly, RunError> {
    assemble_named(&[("main.asm", src)])
}

fn assemble_ok(src: &str) -> Assembly {
    match assemble_src(src) {
        Ok(assembly) => assembly,
        Err(err) => {
            let mut report = String::new();
            for diag in err.diagnostics() {
                report.push_str(&diag.format());
                report.push('\n');
            }
            panic!("assembly failed: {err}\n{report}");
        }
    }
}

fn error_messages(err: &RunError) -> Vec<String> {
    err.diagnostics()
        .iter()
        .filter(|diag| diag.severity() == Severity::Error)
        .map(|diag| diag.error().message().to_string())
        .collect()
}

#[test]
fn jmp_to_own_label_round_trips() {
    let assembly = assemble_ok(".org $8000\ntest:\n jmp test\n");
    assert!(assembly.assembled());
    assert_eq!(assembly.image().bytes(), &[0x4c, 0x00, 0x80]);
    assert_eq!(assembly.image().read(0x8000), Some(0x4c));
}

#[test]
fn db_emits_operand_bytes_in_order() {
    let assembly = assemble_ok(".org $8000\n.db 1 2 3\n");
    assert_eq!(assembly.image().bytes(), &[1, 2, 3]);

    let assembly = assemble_ok(".org $8000\n.db 1, 2, 3\n");
    assert_eq!(assembly.image().bytes(), &[1, 2, 3]);
}

#[test]
fn dw_is_little_endian() {
    let assembly = assemble_ok(".org $8000\n.dw $1234 $abcd\n");
    assert_eq!(assembly.image().bytes(), &[0x34, 0x12, 0xcd, 0xab]);
}

#[test]
fn undeclared_label_fails_naming_it() {
    let err = assemble_src(".org $8000\n jmp nowhere\n").unwrap_err();
    let messages = error_messages(&err);
    assert!(
        messages.iter().any(|m| m.contains("Unresolved symbol: nowhere")),
        "got {messages:?}"
    );
}

#[test]
fn duplicate_label_reports_both_sites() {
    let err = assemble_src(".org $8000\nspot:\n nop\nspot:\n").unwrap_err();
    let diag = err
        .diagnostics()
        .iter()
        .find(|diag| diag.error().kind() == AsmErrorKind::Symbol)
        .expect("duplicate diagnostic");
    assert!(diag.error().message().contains("spot"));
    let related = diag.related().expect("related site");
    assert_eq!(related.line, 2);
}

#[test]
fn forward_reference_resolves() {
    let assembly = assemble_ok(".org $8000\n jmp later\nlater:\n rts\n");
    // jmp later (3 bytes) then rts at $8003.
    assert_eq!(assembly.image().bytes(), &[0x4c, 0x03, 0x80, 0x60]);
    let entry = assembly.symbols().entry("later", "main.asm").unwrap();
    assert_eq!(entry.address, 0x8003);
    assert_eq!(entry.references.len(), 1);
}

#[test]
fn zero_page_wins_over_absolute_for_byte_literals() {
    let assembly = assemble_ok(".org $8000\n lda $20,x\n lda $1234,x\n");
    assert_eq!(
        assembly.image().bytes(),
        &[0xb5, 0x20, 0xbd, 0x34, 0x12]
    );
}

#[test]
fn indirect_x_wins_over_plain_indirect() {
    let assembly = assemble_ok(".org $8000\n lda ($20,x)\n jmp ($9000)\n");
    assert_eq!(
        assembly.image().bytes(),
        &[0xa1, 0x20, 0x6c, 0x00, 0x90]
    );
}

#[test]
fn accumulator_operand_uses_implied_slot() {
    let assembly = assemble_ok(".org $8000\n asl A\n lsr\n");
    assert_eq!(assembly.image().bytes(), &[0x0a, 0x4a]);
}

#[test]
fn label_addresses_assemble_as_absolute() {
    // `low` resolves to $20, but symbolic operands never shrink to zero
    // page, so the size never depends on pass ordering.
    let assembly = assemble_ok("low = $20\n.org $8000\n lda low\n");
    assert_eq!(assembly.image().bytes(), &[0xad, 0x20, 0x00]);
}

#[test]
fn relative_branch_backwards() {
    let assembly = assemble_ok(".org $8000\nloop:\n bne loop\n");
    assert_eq!(assembly.image().bytes(), &[0xd0, 0xfe]);
}

#[test]
fn relative_branch_out_of_range_is_a_range_error() {
    let err = assemble_src(".org $8000\nfar:\n.org $9000\n beq far\n").unwrap_err();
    let messages = error_messages(&err);
    assert!(
        messages.iter().any(|m| m.contains("Branch target out of range")),
        "got {messages:?}"
    );
}

#[test]
fn unknown_directive_fails_before_pass1() {
    let err = assemble_src(".org $8000\n.byte 1\n").unwrap_err();
    let messages = error_messages(&err);
    assert!(messages.iter().any(|m| m.contains("Unknown directive: .byte")));
}

#[test]
fn unknown_mnemonic_is_an_error() {
    let err = assemble_src(".org $8000\n mov a, b\n").unwrap_err();
    let messages = error_messages(&err);
    assert!(
        messages.iter().any(|m| m.contains("Unknown instruction or macro: mov")),
        "got {messages:?}"
    );
}

#[test]
fn no_addressing_mode_reports_mnemonic_and_operand() {
    let err = assemble_src(".org $8000\n sta #5\n").unwrap_err();
    let messages = error_messages(&err);
    assert!(
        messages
            .iter()
            .any(|m| m.contains("sta") && m.contains("#5")),
        "got {messages:?}"
    );
}

#[test]
fn write_beyond_max_size_fails() {
    let err = Assembler::new()
        .assemble(
            0x8000,
            2,
            &[("main.asm".to_string(), ".org $8000\n.db 1 2 3\n".to_string())],
        )
        .unwrap_err();
    let messages = error_messages(&err);
    assert!(
        messages.iter().any(|m| m.contains("outside declared range")),
        "got {messages:?}"
    );
}

#[test]
fn org_forward_reference_is_an_error() {
    let err = assemble_src(".org start\nstart:\n").unwrap_err();
    let messages = error_messages(&err);
    assert!(messages.iter().any(|m| m.contains("Undefined symbol: start")));
}

#[test]
fn equivalence_defines_a_value() {
    let assembly = assemble_ok("count = 3+2\n.org $8000\n lda #count\n");
    assert_eq!(assembly.image().bytes(), &[0xa9, 0x05]);
}

#[test]
fn byte_selector_truncation_warns() {
    let assembly = assemble_ok("addr = $1234\n.org $8000\n lda #addr.b\n");
    assert_eq!(assembly.image().bytes(), &[0xa9, 0x34]);
    assert_eq!(assembly.warnings().len(), 1);
    assert_eq!(assembly.warnings()[0].severity(), Severity::Warning);
}

#[test]
fn macro_expands_per_invocation() {
    let src = "\
.macro store \\val \\addr
 lda #\\val
 sta \\addr
.endm
.org $8000
store 1 $0200
store 2 $0201
";
    let assembly = assemble_ok(src);
    assert_eq!(
        assembly.image().bytes(),
        &[0xa9, 0x01, 0x8d, 0x00, 0x02, 0xa9, 0x02, 0x8d, 0x01, 0x02]
    );
}

#[test]
fn nested_macro_invocations_expand() {
    let src = "\
.macro one \\v
 .db \\v
.endm
.macro three \\v
one \\v
one \\v
one \\v
.endm
.org $8000
three 9
";
    let assembly = assemble_ok(src);
    assert_eq!(assembly.image().bytes(), &[9, 9, 9]);
}

#[test]
fn macro_cycle_is_detected() {
    let src = "\
.macro ping
pong
.endm
.macro pong
ping
.endm
.org $8000
ping
";
    let err = assemble_src(src).unwrap_err();
    let messages = error_messages(&err);
    assert!(
        messages.iter().any(|m| m.contains("Macro expansion cycle")),
        "got {messages:?}"
    );
}

#[test]
fn labeled_macro_invocation_declares_the_label() {
    let src = "\
.macro put \\v
 .db \\v
.endm
.org $8000
entry: put 7
 jmp entry
";
    let assembly = assemble_ok(src);
    assert_eq!(assembly.image().bytes(), &[7, 0x4c, 0x00, 0x80]);
    let entry = assembly.symbols().entry("entry", "main.asm").unwrap();
    assert_eq!(entry.address, 0x8000);
}

#[test]
fn labeled_self_invocation_hits_the_depth_guard() {
    let src = ".macro spin\nagain: spin\n.endm\n.org $8000\nspin\n";
    let err = assemble_src(src).unwrap_err();
    let messages = error_messages(&err);
    assert!(
        messages.iter().any(|m| m.contains("maximum depth")),
        "got {messages:?}"
    );
}

#[test]
fn macro_redefinition_is_an_error() {
    let src = ".macro m\n nop\n.endm\n.macro m\n brk\n.endm\n";
    let err = assemble_src(src).unwrap_err();
    let messages = error_messages(&err);
    assert!(messages.iter().any(|m| m.contains("Macro already defined")));
}

#[test]
fn unclosed_macro_is_an_error() {
    let err = assemble_src(".macro m \\a\n nop\n").unwrap_err();
    let messages = error_messages(&err);
    assert!(messages.iter().any(|m| m.contains("never closed")));
}

#[test]
fn globl_spans_files_in_order() {
    let lib = ".globl entry\n.org $8000\nentry:\n rts\n";
    let main = " jmp entry\n";
    let assembly = assemble_named(&[("lib.asm", lib), ("main.asm", main)]).unwrap();
    assert_eq!(assembly.image().bytes(), &[0x60, 0x4c, 0x00, 0x80]);
}

#[test]
fn local_labels_do_not_cross_files() {
    let lib = ".org $8000\nhidden:\n rts\n";
    let main = " jmp hidden\n";
    let err = assemble_named(&[("lib.asm", lib), ("main.asm", main)]).unwrap_err();
    let messages = error_messages(&err);
    assert!(
        messages.iter().any(|m| m.contains("Unresolved symbol: hidden")),
        "got {messages:?}"
    );
}

#[test]
fn globl_rejects_illegal_names() {
    let err = assemble_src(".globl a,x\n").unwrap_err();
    let messages = error_messages(&err);
    assert!(messages.iter().any(|m| m.contains("Illegal label name: x"))
        || messages.iter().any(|m| m.contains("Illegal label name")));
}

#[test]
fn comments_and_blank_lines_are_ignored() {
    let src = "; header comment\n.org $8000 ; set origin\n nop ; do nothing\n\n";
    let assembly = assemble_ok(src);
    assert_eq!(assembly.image().bytes(), &[0xea]);
}

#[test]
fn disassembly_window_round_trips() {
    let assembly = assemble_ok(".org $8000\nstart:\n lda #$10\n jmp start\n");
    let lines = assembly.disassembly(0x8000, 0x8004);
    let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(texts, vec!["lda #$10", "jmp $8000"]);
}

#[test]
fn listing_rows_carry_addresses_and_bytes() {
    let assembly = assemble_ok(".org $8000\n lda #1\n");
    let row = assembly
        .listing_rows()
        .iter()
        .find(|row| !row.bytes.is_empty())
        .expect("emitting row");
    assert_eq!(row.addr, 0x8000);
    assert_eq!(row.bytes, vec![0xa9, 0x01]);
    assert_eq!(row.file, "main.asm");
}

#[test]
fn separate_assemblies_are_independent() {
    let first = assemble_ok(".org $8000\none:\n rts\n");
    let second = assemble_ok(".org $8000\ntwo:\n rts\n");
    assert!(first.symbols().entry("two", "main.asm").is_none());
    assert!(second.symbols().entry("one", "main.asm").is_none());
}

#[test]
fn indirect_y_operand_must_fit_a_byte() {
    let err = assemble_src(".org $8000\n lda ($1234),y\n").unwrap_err();
    let messages = error_messages(&err);
    assert!(
        messages.iter().any(|m| m.contains("does not fit in one byte")),
        "got {messages:?}"
    );
}
