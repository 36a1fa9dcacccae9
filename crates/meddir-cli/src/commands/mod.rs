//! CLI command implementations

pub mod cache;
pub mod config;
pub mod pending;
pub mod resync;
pub mod run;
pub mod status;
pub mod sync;

use std::path::PathBuf;

use anyhow::Result;
use meddir_core::config::Config;

use crate::{
    output::{get_formatter, OutputFormat, OutputFormatter},
    services::Services,
};

/// Settings every command receives from the global flags
pub struct CommandContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub format: OutputFormat,
    pub quiet: bool,
}

impl CommandContext {
    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format, self.quiet)
    }

    pub async fn open_services(&self) -> Result<Services> {
        Services::open(&self.config).await
    }
}
