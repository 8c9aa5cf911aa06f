//! CLI subcommands. `root` runs the daemon proper; `diagnostics` is the
//! ambient operability extra (SPEC_FULL.md §4.6), outside the hard core.

pub mod diagnostics;
pub mod root;
