use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "relaybox")]
#[command(about = "Stream remote files into storage and keep their metadata", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $RELAYBOX_CONFIG or config/relaybox.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transfer files into storage and print the batch report
    Upload(UploadArgs),
    /// List stored files, newest first
    List(ListArgs),
    /// Show one stored file
    Get(GetArgs),
}

#[derive(clap::Args, Debug)]
pub struct UploadArgs {
    /// Source URLs
    #[arg(required = true)]
    pub urls: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    #[arg(long, default_value_t = 1)]
    pub page: usize,

    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

#[derive(clap::Args, Debug)]
pub struct GetArgs {
    pub id: String,
}
