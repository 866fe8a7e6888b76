// ─────────────────────────────────────────────────────────────────────
// Truthal — Operator Binary
// (C) 2026 Truthal Contributors. All rights reserved.
// License: GNU AGPL v3
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]

mod audit_files;
mod cli;
mod snapshot;

use anyhow::Result;

fn main() -> Result<()> {
    cli::run()
}
