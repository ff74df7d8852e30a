//! Reduces a run's probe results and monitor history into the final report.

pub mod report;
pub mod stats;

pub use self::report::{
    EndpointReport, HealthReport, PhaseRecord, PhaseStatus, ReportAggregator, ReportInput,
    RunInfo, RunReport, Summary, WorkflowReport,
};
pub use self::stats::{group_by_endpoint, success_rate, EndpointStats};
