pub mod params;
pub mod schema;
pub mod steps;

pub use params::{ParamDef, Params};
pub use schema::{OnFailure, RetryConfig, Script};
pub use steps::{LogStep, Step, WaitStep};
