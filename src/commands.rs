//! CLI argument definitions

use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Folder with test scenario YAMLs (default: tests_yaml)
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Run only scenarios carrying this tag; repeat to require several
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Run only scenarios whose name contains this substring (case-insensitive)
    #[arg(long)]
    pub name: Option<String>,

    /// List the selected scenarios without running them
    #[arg(long)]
    pub list: bool,

    /// Delete each submitted workflow after its scenario finishes
    #[arg(long)]
    pub cleanup: bool,

    /// Configuration file (default: platform config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, short)]
    pub verbose: bool,
}
