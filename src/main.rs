// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for romforge.

use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let use_color = std::env::var("NO_COLOR").is_err();
    match romforge::assembler::run() {
        Ok(report) => {
            for diag in report.diagnostics() {
                eprintln!("{}", diag.format_with_context(use_color));
            }
        }
        Err(err) => {
            for diag in err.diagnostics() {
                eprintln!("{}", diag.format_with_context(use_color));
            }
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
