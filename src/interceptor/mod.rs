//! Ready-made endpoint interceptors.

pub mod logging;
pub mod validating;

pub use logging::LoggingInterceptor;
pub use validating::{
    PayloadAnalysis, PayloadValidatingInterceptor, ValidationResult, VALIDATION_ERROR_NS,
    VALIDATION_FAULT_REASON,
};
