use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "qna",
    about = "Answer questions with the closest stored snippet",
    version
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(global = true, long, short)]
    pub verbose: bool,

    /// Record store file (defaults to $QNA_STORE or ~/.qna/records.jsonl)
    #[arg(global = true, long)]
    pub store: Option<String>,

    /// Embedding provider (command, ollama, openai, hash)
    #[arg(global = true, long)]
    pub provider: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Embed a text snippet and store it
    Add {
        /// Text to store
        text: String,
    },

    /// Return the stored snippet closest to a question
    Ask {
        /// The question to answer
        question: String,

        /// Show this many ranked matches with their scores
        #[arg(long, default_value = "1")]
        top: usize,
    },

    /// Show record count, embedding dimension and store size
    Stats,

    /// Serve addText/ask requests as JSON lines on stdio
    Serve {
        /// Keep records in memory only
        #[arg(long)]
        ephemeral: bool,
    },
}
