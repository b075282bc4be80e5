//! Pipeline stages and their reserved error-code ranges.

use serde::{Deserialize, Serialize};

/// A pipeline stage that can originate an error.
///
/// Compile-time stages (`Scanning` through `Bytecode`) never reach the VM —
/// the front-end's error collector reports and aborts before execution
/// begins (spec §7, "Propagation policy"). They are kept here anyway so the
/// code-range invariant (Testable Property 5) is a single table instead of
/// being split across crates that never talk to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Scanning,
    Parsing,
    Semantic,
    Bytecode,
    Runtime,
    Compile,
}

impl Stage {
    /// Inclusive lower bound of this stage's reserved error-code range.
    pub const fn range_start(self) -> u32 {
        match self {
            Stage::Scanning => 1,
            Stage::Parsing => 100,
            Stage::Semantic => 200,
            Stage::Bytecode => 300,
            Stage::Runtime => 400,
            Stage::Compile => 600,
        }
    }

    /// Inclusive upper bound of this stage's reserved error-code range.
    pub const fn range_end(self) -> u32 {
        match self {
            Stage::Scanning => 99,
            Stage::Parsing => 199,
            Stage::Semantic => 299,
            Stage::Bytecode => 399,
            Stage::Runtime => 499,
            Stage::Compile => 699,
        }
    }

    /// True iff `code` falls inside this stage's reserved range.
    pub fn contains(self, code: u32) -> bool {
        (self.range_start()..=self.range_end()).contains(&code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_do_not_overlap() {
        let stages = [
            Stage::Scanning,
            Stage::Parsing,
            Stage::Semantic,
            Stage::Bytecode,
            Stage::Runtime,
            Stage::Compile,
        ];
        for (i, a) in stages.iter().enumerate() {
            for b in &stages[i + 1..] {
                assert!(a.range_end() < b.range_start() || b.range_end() < a.range_start());
            }
        }
    }
}
