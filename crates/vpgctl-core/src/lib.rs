// # vpgctl-core
//
// Core library for driving a disaster-recovery manager (ZVM): asynchronous
// task tracking and declarative reconciliation of VPG NIC settings.
//
// ## Architecture Overview
//
// - **TaskTracker**: Polls an operation handle to a terminal state
// - **Loader**: Tabular rows → desired `NicConfiguration`s
// - **CurrentStateFetcher**: Live VPG settings → current `NicConfiguration`s
// - **reconcile**: Desired vs current → validated `ChangeSet`
// - **ApplyOrchestrator**: Confirmation, whole-document submission, tracking
// - **VpgProvisioner**: VPG creation from blueprint rows, journal history edits
// - **Transport / CredentialSource**: Collaborator traits, implemented in
//   `vpgctl-http`
//
// ## Flow
//
// ```text
// rows ──load──► desired ─┐
//                         ├─reconcile─► ChangeSet ─confirm─► submit ─► handle ─track─► TaskResult
// VPG ──fetch──► current ─┘
// ```
//
// ## Design Principles
//
// 1. **Explicit session**: every remote call receives a `Session`; no global
//    token state
// 2. **Whole-object updates**: change entries carry complete records
// 3. **Collected input errors**: row and validation problems are reported
//    together, never one at a time
// 4. **Tracker owns retry**: transports make exactly one attempt

pub mod apply;
pub mod config;
mod edit;
pub mod error;
pub mod fetcher;
pub mod loader;
pub mod model;
pub mod provision;
pub mod reconcile;
pub mod report;
pub mod session;
pub mod settings;
pub mod tracker;
pub mod traits;

// Re-export core types for convenience
pub use apply::{ApplyOptions, ApplyOrchestrator};
pub use config::{ClientConfig, TrackerConfig, VpgctlConfig};
pub use error::{Error, Result};
pub use fetcher::CurrentStateFetcher;
pub use loader::{RowError, TabularRow, load};
pub use model::{
    AddressingMode, NetworkPhase, NicConfiguration, NicIdentity, OperationHandle, PhaseField,
    PhaseSettings, TaskError, TaskResult, TaskState, TaskStatus,
};
pub use provision::{
    CreationOutcome, CreationReport, JournalChange, VmOutcome, VpgBlueprint, VpgProvisioner,
    load_blueprints,
};
pub use reconcile::{
    ChangeEntry, ChangeSet, FieldChange, Reconciliation, ValidationError, reconcile,
    reconcile_rows,
};
pub use session::{BearerToken, Session};
pub use tracker::{TaskTracker, TrackOptions, TrackerEvent};
pub use traits::{ApiResponse, CredentialSource, Method, Transport};
