use derive_more::{From, Into};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte offset of a feature's count vector in the matrix blob.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash, From, Into,
)]
pub struct Offset(u64);

impl Offset {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
    pub fn zero() -> Self {
        Offset(0x0)
    }
    /// where the literal sequence starts, past a vector of `nb_smp` floats.
    pub fn past_counts(&self, nb_smp: usize) -> Offset {
        Offset(self.0 + (nb_smp * std::mem::size_of::<f32>()) as u64)
    }
}

impl fmt::Debug for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
