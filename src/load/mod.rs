//! Synthetic traffic: concurrent batches, sustained windows, dependent
//! workflows, and static asset checks.

pub mod assets;
pub mod batch;
pub mod sustained;
pub mod workflow;

pub use self::assets::{check_assets, AssetCheck};
pub use self::batch::{run_batch, BatchSpec};
pub use self::sustained::{run_sustained, SustainedOutcome, SustainedSpec};
pub use self::workflow::{
    run_workflow, run_workflows, Capture, StepOutcome, ThinkTime, Variables, Workflow,
    WorkflowOutcome, WorkflowStatus, WorkflowStep,
};
