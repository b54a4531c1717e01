//! Data model shared by the tracker and the reconciliation pipeline
//!
//! - [`task`]: operation handles, task status and terminal results
//! - [`nic`]: per-VM, per-NIC network settings for both recovery phases

pub mod nic;
pub mod task;

pub use nic::{
    AddressingMode, NetworkPhase, NicConfiguration, NicIdentity, PhaseField, PhaseSettings,
    normalize_cell,
};
pub use task::{OperationHandle, TaskError, TaskResult, TaskState, TaskStatus};
