// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `k600-sim`: replays recorded transport steps through the K600 detector
//! core and writes the committed rows as JSON lines.

pub mod cli;
pub mod jsonl;
pub mod replay;
