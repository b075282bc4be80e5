//! `ClassId`: a stable integer identity for a registered class (spec §4.3,
//! §9 Design Note — "class identity = stable integer id" avoids the
//! circular shared-pointer ownership a name-or-pointer identity would need
//! between a class and its own field/method tables).

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassId(pub u32);

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class#{}", self.0)
    }
}
