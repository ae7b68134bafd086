//! Turning a declarative step list into ordered execution stages

pub mod dag;

pub use dag::{plan_operation_stages, OperationNode, OperationStage, ScheduledOperation};
