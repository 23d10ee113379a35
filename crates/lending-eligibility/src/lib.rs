//! Post-ITI eligibility decisions for loan applications.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
