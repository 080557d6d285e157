//! Query slot identity and lifecycle state.

use std::collections::HashMap;
use std::fmt;

use ash::vk::{self, Handle};

/// One query slot, as seen by one performance-counter pass.
///
/// The pass index is part of the identity: the same slot submitted with two
/// different counter passes is two independent queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryObject {
    pub pool: vk::QueryPool,
    pub slot: u32,
    pub perf_pass: u32,
}

impl QueryObject {
    pub fn new(pool: vk::QueryPool, slot: u32) -> Self {
        Self {
            pool,
            slot,
            perf_pass: 0,
        }
    }

    pub fn with_perf_pass(self, perf_pass: u32) -> Self {
        Self { perf_pass, ..self }
    }
}

impl fmt::Display for QueryObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VkQueryPool 0x{:x} query {}", self.pool.as_raw(), self.slot)?;
        if self.perf_pass != 0 {
            write!(f, " (counter pass {})", self.perf_pass)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryState {
    /// Never reset since pool creation
    #[default]
    Unknown,
    Reset,
    Running,
    /// Ended on the device; results not yet known to be written
    Ended,
    /// Results written and no later submission touches the slot
    Available,
}

pub type QueryMap = HashMap<QueryObject, QueryState>;
