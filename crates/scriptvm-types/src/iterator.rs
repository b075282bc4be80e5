//! Iterator handles boxed onto the operand stack by `GetIterator` (spec
//! §4.6, "Iteration").

use crate::value::Value;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IteratorHandle {
    List {
        items: Vec<Value>,
        position: usize,
    },
    /// Iterating a Dict yields key/value pairs in insertion order (spec
    /// §4.6).
    DictPairs {
        pairs: Vec<(Value, Value)>,
        position: usize,
    },
    /// Ranges may be materialized lazily (spec §4.6): this handle never
    /// expands the full sequence.
    Range {
        current: i64,
        end: i64,
        step: i64,
        inclusive: bool,
    },
}

impl IteratorHandle {
    pub fn has_next(&self) -> bool {
        match self {
            IteratorHandle::List { items, position } => *position < items.len(),
            IteratorHandle::DictPairs { pairs, position } => *position < pairs.len(),
            IteratorHandle::Range {
                current,
                end,
                step,
                inclusive,
            } => {
                if *step == 0 {
                    return false;
                }
                if *step > 0 {
                    if *inclusive {
                        current <= end
                    } else {
                        current < end
                    }
                } else if *inclusive {
                    current >= end
                } else {
                    current > end
                }
            }
        }
    }

    /// Advances and returns the next element (spec's `IteratorNext`).
    pub fn next(&mut self) -> Option<Value> {
        match self {
            IteratorHandle::List { items, position } => {
                let value = items.get(*position).cloned();
                if value.is_some() {
                    *position += 1;
                }
                value
            }
            IteratorHandle::DictPairs { pairs, position } => {
                let value = pairs.get(*position).map(|(k, _)| k.clone());
                if value.is_some() {
                    *position += 1;
                }
                value
            }
            IteratorHandle::Range {
                current,
                step,
                end: _,
                inclusive: _,
            } => {
                if !self.has_next() {
                    return None;
                }
                let value = *current;
                *current += *step;
                Some(Value::int64(value))
            }
        }
    }

    /// Advances and returns the next key/value pair (spec's
    /// `IteratorNextKeyValue`); only meaningful for dict iteration.
    pub fn next_key_value(&mut self) -> Option<(Value, Value)> {
        match self {
            IteratorHandle::DictPairs { pairs, position } => {
                let pair = pairs.get(*position).cloned();
                if pair.is_some() {
                    *position += 1;
                }
                pair
            }
            _ => self.next().map(|v| (v.clone(), v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusive_range_stops_before_end() {
        let mut it = IteratorHandle::Range {
            current: 0,
            end: 3,
            step: 1,
            inclusive: false,
        };
        let mut seen = Vec::new();
        while it.has_next() {
            seen.push(it.next().unwrap());
        }
        assert_eq!(seen, vec![Value::int64(0), Value::int64(1), Value::int64(2)]);
    }

    #[test]
    fn inclusive_range_includes_end() {
        let mut it = IteratorHandle::Range {
            current: 0,
            end: 2,
            step: 1,
            inclusive: true,
        };
        let mut count = 0;
        while it.has_next() {
            it.next();
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn dict_iteration_preserves_insertion_order() {
        let pairs = vec![
            (Value::string("b"), Value::int64(2)),
            (Value::string("a"), Value::int64(1)),
        ];
        let mut it = IteratorHandle::DictPairs { pairs, position: 0 };
        let (k1, _) = it.next_key_value().unwrap();
        assert_eq!(k1, Value::string("b"));
    }
}
