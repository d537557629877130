use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Environment;

mod handlers;
pub mod render;
pub mod shell;

pub use handlers::*;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Backend to talk to. Overrides SCOUT_ENV and the config file.
    #[clap(long, value_enum, global = true)]
    pub env: Option<Environment>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search the index with a text query
    Search {
        /// e.g. "striped shirt"
        query: String,
    },

    /// Search the index with an image or a video
    Upload {
        /// bmp, gif, jpeg or png image, or a video up to the configured size
        path: PathBuf,
    },

    /// Print the backend url and index size
    Info {},

    /// Interactive search
    Shell {},
}
