pub mod config;
pub mod error;
pub mod io;
pub mod paths;
pub mod plan;
pub mod qr;
pub mod types;

pub use error::{PlannerError, Result};
