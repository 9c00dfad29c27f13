//! voice-reader-rs: read text files, news feeds and website summaries aloud
//! through a VOICEVOX engine.

mod batch;
mod chunker;
mod commands;
mod config;
mod error;
mod http;
mod news;
mod player;
mod progress;
mod rate_limiter;
mod read_ignore;
mod reader;
mod reading_files;
mod summarizer;
mod text_utils;
mod voicevox;
mod website;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::text_utils::SummaryLength;

#[derive(Parser, Debug)]
#[command(name = "voice-reader", about = "Read text, news and websites aloud with VOICEVOX")]
struct Args {
    /// Path to config.json (or .yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read a file, or every readable file in a directory
    Read { path: PathBuf },

    /// Read the given text
    Say { text: String },

    /// Fetch and digest news, then read it aloud
    News {
        /// Start reading without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Fetch and digest news into files only
    NewsFetch,

    /// Summarize one URL, or every configured URL when --url is absent
    Website {
        #[arg(long)]
        url: Option<String>,

        /// Output directory (defaults to websites.output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// short | medium | long | <chars>
        #[arg(short, long)]
        length: Option<SummaryLength>,
    },

    /// Summarize configured URLs and read the summaries aloud
    WebsiteRead,

    /// News, then websites
    All,

    /// List VOICEVOX speakers
    Speakers,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Keep HTTP and audio internals quiet
    let filter = if args.verbose {
        EnvFilter::new("debug,reqwest=info,hyper=info,hyper_util=info,rodio=info")
    } else {
        EnvFilter::new("info,reqwest=warn,hyper=warn,hyper_util=warn,rodio=warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = config::Config::load(args.config.as_deref())?;
    info!(
        "Config loaded: VOICEVOX {} speaker {} ({})",
        config.api.url, config.speaker.default_id, config.speaker.name
    );

    match args.command {
        Command::Read { path } => commands::read(&config, &path).await,
        Command::Say { text } => commands::say(&config, &text).await,
        Command::News { yes } => commands::news(&config, yes).await,
        Command::NewsFetch => commands::news_fetch(&config).await.map(|_| ()),
        Command::Website {
            url,
            output,
            length,
        } => commands::website(&config, url.as_deref(), output.as_deref(), length).await,
        Command::WebsiteRead => commands::website_read(&config).await,
        Command::All => commands::all(&config).await,
        Command::Speakers => commands::speakers(&config).await,
    }
}
