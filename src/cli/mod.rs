//! CLI module for Storyline.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Storyline - topic to stories to audio reel
///
/// Plans three short news stories about a topic, writes them, saves the results
/// and optionally narrates them into a single uploaded audio reel.
#[derive(Parser, Debug)]
#[command(name = "storyline")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "STORYLINE_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate stories (and optionally an audio reel) for a topic
    Generate {
        /// The topic to write about
        topic: String,

        /// Model to use, e.g. gpt-5.2 or gateway/anthropic:claude-sonnet-4-5
        #[arg(short, long)]
        model: Option<String>,

        /// Upstream provider routed through the gateway
        #[arg(short, long)]
        provider: Option<String>,

        /// Gateway API key (overrides GATEWAY_API_KEY)
        #[arg(long)]
        api_key: Option<String>,

        /// Speech API key (overrides CARTESIA_API_KEY)
        #[arg(long)]
        cartesia_api_key: Option<String>,

        /// Narrate the stories, combine and upload the audio reel
        #[arg(long)]
        with_audio: bool,

        /// Directory that receives the run folder
        #[arg(short, long)]
        output_dir: Option<String>,

        /// Print the structured result line for a remote launcher
        #[arg(long)]
        emit_result: bool,
    },

    /// Start the web form
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long)]
        port: Option<u16>,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration, secrets masked
    Show,

    /// Show configuration file path
    Path,

    /// Write a default configuration file if none exists
    Init,
}
