pub use crate::errors::{RegressError, Result};

pub mod cli;
pub mod config;
pub mod csr;
pub mod errors;
pub mod layout;
pub mod pipeline;
pub mod process;
pub mod profile;
pub mod report;
pub mod selector;
pub mod template;
