// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! CLI entry point for the K600 step replay driver.

use anyhow::Result;
use k600_cli::cli::entrypoint;

fn main() -> Result<()> {
    entrypoint()
}
