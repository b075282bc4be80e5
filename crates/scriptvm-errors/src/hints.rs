//! Contextual hint/suggestion catalog.
//!
//! Grounded on `original_source/src/error/contextual_hint_provider.cpp`,
//! which selects a hint purely by substring-matching the raw error message
//! against a fixed table — no regex engine, just `message.find(pattern)`.
//! `scriptvm-errors` keeps that exact matching strategy.

use crate::stage::Stage;
use once_cell::sync::Lazy;

struct HintRule {
    stage: Option<Stage>,
    pattern: &'static str,
    hint: &'static str,
    suggestion: &'static str,
}

static CATALOG: Lazy<Vec<HintRule>> = Lazy::new(|| {
    vec![
        HintRule {
            stage: Some(Stage::Runtime),
            pattern: "Division by zero",
            hint: "dividing by zero has no defined result for this numeric type",
            suggestion: "guard the divisor with a conditional or a non-zero-checked native",
        },
        HintRule {
            stage: Some(Stage::Runtime),
            pattern: "Modulo by zero",
            hint: "taking a remainder modulo zero has no defined result",
            suggestion: "guard the modulus with a conditional before the Mod instruction",
        },
        HintRule {
            stage: Some(Stage::Semantic),
            pattern: "variable",
            hint: "the name is not bound in any enclosing environment",
            suggestion: "check for a typo or a missing StoreVar before this LoadVar",
        },
        HintRule {
            stage: Some(Stage::Semantic),
            pattern: "function",
            hint: "no function with this name is registered",
            suggestion: "confirm the function was defined or registered as a native before calling it",
        },
        HintRule {
            stage: None,
            pattern: "type",
            hint: "the value's runtime type does not satisfy the expected type",
            suggestion: "insert an explicit conversion or widen the destination's declared type",
        },
        HintRule {
            stage: Some(Stage::Semantic),
            pattern: "visible",
            hint: "the accessed member's visibility excludes the current access site",
            suggestion: "access the member through a public accessor or from within the declaring class",
        },
        HintRule {
            stage: Some(Stage::Runtime),
            pattern: "generation",
            hint: "the value was allocated in a scope that has already exited",
            suggestion: "extend the value's lifetime past the scope, or clone it before the scope exits",
        },
        HintRule {
            stage: Some(Stage::Runtime),
            pattern: "overflow",
            hint: "the conversion would change the numeric value",
            suggestion: "convert to a wider type first, or check the value's range before narrowing",
        },
        HintRule {
            stage: Some(Stage::Runtime),
            pattern: "match",
            hint: "no arm covered the value's actual variant",
            suggestion: "add an arm for the missing variant or a catch-all pattern",
        },
    ]
});

/// Looks up a `(hint, suggestion)` pair for `message` within `stage`, purely
/// from the `(stage, message)` pair (spec §7: "Hints and suggestions are
/// generated purely from the error's `(stage, message, context)` triple").
pub fn lookup_hint(stage: Stage, message: &str) -> (Option<&'static str>, Option<&'static str>) {
    for rule in CATALOG.iter() {
        if let Some(rule_stage) = rule.stage {
            if rule_stage != stage {
                continue;
            }
        }
        if message.contains(rule.pattern) {
            return (Some(rule.hint), Some(rule.suggestion));
        }
    }
    (None, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_division_by_zero() {
        let (hint, suggestion) = lookup_hint(Stage::Runtime, "Division by zero");
        assert!(hint.is_some());
        assert!(suggestion.is_some());
    }

    #[test]
    fn stage_scoped_pattern_does_not_leak_across_stages() {
        let (hint, _) = lookup_hint(Stage::Bytecode, "Division by zero");
        assert!(hint.is_none());
    }

    #[test]
    fn unmatched_message_yields_no_hint() {
        let (hint, suggestion) = lookup_hint(Stage::Runtime, "a wholly novel failure");
        assert!(hint.is_none());
        assert!(suggestion.is_none());
    }
}
