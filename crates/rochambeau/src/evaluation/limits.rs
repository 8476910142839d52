//! Per-runtime resource limit adjustments

use serde::{Deserialize, Serialize};

use crate::types::ResourceLimits;

/// Processes every contestant run needs: the judge wrapper and the program itself
pub const BASE_PROCESSES: u32 = 2;

/// Runtime family of a submission language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeClass {
    /// Compiled to a standalone executable, or a light interpreter
    #[default]
    Native,
    /// Java-style VM spawning many threads and limiting its own heap
    Jvm,
    /// .NET-style runtime with a moderate startup footprint
    Clr,
}

/// How a runtime class changes the declared memory limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryAdjustment {
    Unchanged,
    /// No sandbox limit; the runtime enforces the declared limit itself
    Unlimited,
    ExtraMb(u64),
}

#[derive(Debug, Clone, Copy)]
pub struct LimitRule {
    pub runtime: RuntimeClass,
    pub extra_processes: u32,
    pub memory: MemoryAdjustment,
}

pub const LIMIT_RULES: &[LimitRule] = &[
    LimitRule {
        runtime: RuntimeClass::Native,
        extra_processes: 1,
        memory: MemoryAdjustment::Unchanged,
    },
    LimitRule {
        runtime: RuntimeClass::Jvm,
        extra_processes: 20,
        memory: MemoryAdjustment::Unlimited,
    },
    LimitRule {
        runtime: RuntimeClass::Clr,
        extra_processes: 5,
        memory: MemoryAdjustment::ExtraMb(100),
    },
];

impl RuntimeClass {
    pub fn rule(self) -> &'static LimitRule {
        LIMIT_RULES
            .iter()
            .find(|rule| rule.runtime == self)
            .unwrap_or(&LIMIT_RULES[0])
    }
}

/// Process and memory limits for a contestant run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimitProfile {
    pub max_processes: u32,
    /// Memory limit in MB. `Some(0)` means unlimited, `None` means the job
    /// declared none and the sandbox default applies.
    pub memory_limit_mb: Option<u64>,
}

impl ResourceLimitProfile {
    pub fn resolve(runtime: RuntimeClass, declared_memory_mb: Option<u64>) -> Self {
        let rule = runtime.rule();
        let memory_limit_mb = match rule.memory {
            MemoryAdjustment::Unchanged => declared_memory_mb,
            MemoryAdjustment::Unlimited => Some(0),
            MemoryAdjustment::ExtraMb(extra) => declared_memory_mb.map(|mb| mb.saturating_add(extra)),
        };

        Self {
            max_processes: BASE_PROCESSES + rule.extra_processes,
            memory_limit_mb,
        }
    }

    /// Step limits for the contestant run
    ///
    /// Memory saturates instead of overflowing for absurd declared limits.
    /// The wall clock gets twice the CPU time plus a second, since the judge
    /// and the contestant alternate.
    pub fn to_limits(&self, time_limit: Option<f64>) -> ResourceLimits {
        let mut limits = ResourceLimits::none().with_max_processes(self.max_processes);
        if let Some(mb) = self.memory_limit_mb {
            limits = limits.with_memory_limit(mb.saturating_mul(ResourceLimits::MB));
        }
        if let Some(seconds) = time_limit {
            limits = limits
                .with_time_limit(seconds)
                .with_wall_time_limit(2.0 * seconds + 1.0);
        }
        limits
    }
}
