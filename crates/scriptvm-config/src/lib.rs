//! `VMConfig`: resource limits and an instruction-count cost model, analogous
//! to `move-vm-config::VMConfig` and its gas-schedule sibling. This spec has
//! no gas-metering requirement, so [`CostConfig`] reduces to pure
//! instruction-count accounting used only for `StackOverflow`/`TimedOut`
//! checks — never billed to a caller.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VMConfig {
    /// Maximum operand-stack depth per `VMContext` before `StackOverflow`.
    pub max_operand_stack_depth: usize,
    /// Maximum call-frame nesting depth before `StackOverflow`.
    pub max_call_frame_depth: usize,
    /// Starting capacity of the root `MemoryRegion`'s size-class pools.
    pub region_pool_starting_capacity: usize,
    /// Upper bound on concurrently-running child contexts spawned by a
    /// single `BeginParallel` (spec §5).
    pub max_concurrency_workers: usize,
    /// When set, arithmetic/comparison/property-access handlers re-check
    /// `TypeSystem::is_compatible` at every step instead of trusting the
    /// bytecode emitter (costlier, used for test and debug builds).
    pub paranoid_type_checks: bool,
    /// Default wall-clock budget applied to a context with no explicit
    /// deadline, or `None` for unbounded (spec §5, cancellation/timeout).
    pub default_deadline: Option<Duration>,
    pub cost: CostConfig,
}

impl Default for VMConfig {
    fn default() -> Self {
        VMConfig {
            max_operand_stack_depth: 4096,
            max_call_frame_depth: 1024,
            region_pool_starting_capacity: 64,
            max_concurrency_workers: 32,
            paranoid_type_checks: false,
            default_deadline: None,
            cost: CostConfig::default(),
        }
    }
}

/// Pure instruction-count accounting, unrelated to any fee — this exists
/// only so a context can raise `TimedOut` on an instruction budget instead
/// of (or in addition to) a wall-clock deadline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CostConfig {
    pub max_instructions_per_context: u64,
}

impl Default for CostConfig {
    fn default() -> Self {
        CostConfig {
            max_instructions_per_context: 10_000_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_finite_and_nonzero() {
        let config = VMConfig::default();
        assert!(config.max_operand_stack_depth > 0);
        assert!(config.max_call_frame_depth > 0);
        assert!(config.cost.max_instructions_per_context > 0);
    }
}
