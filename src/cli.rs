use clap::{Parser, Subcommand};

/// msgbridge: Messages API front end for Chat Completions backends
#[derive(Parser)]
#[command(name = "msgbridge", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the bridge server (the default when no command is given)
    Serve {
        /// Port to bind; overrides PORT
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Send one request to a running bridge and print the reply
    Probe {
        /// Base URL of the bridge
        #[arg(long, default_value = "http://localhost:8000")]
        url: String,
        /// Request a streamed reply and print deltas as they arrive
        #[arg(long)]
        stream: bool,
        /// User prompt to send
        #[arg(long, default_value = "Say hello in one short sentence.")]
        prompt: String,
        /// max_tokens for the request
        #[arg(long, default_value = "256")]
        max_tokens: u32,
    },
}
