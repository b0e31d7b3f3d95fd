/// Layer that traces calls with `tracing`.
pub mod trace;
