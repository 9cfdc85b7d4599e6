mod answer_service;
mod cli;
mod config;
mod message;
mod model;
mod openai_client;

use std::io;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use eyre::Result;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::cli::chat::prompt::system_prompt;
use crate::cli::chat::ChatContext;
use crate::config::ChatConfig;
use crate::model::{ModelConfig, ModelTier};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    chat: ChatArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a chat session
    Chat(ChatArgs),
}

#[derive(Args, Clone)]
struct ChatArgs {
    /// Input to send to the chat; prints the answer and exits
    #[arg(short, long)]
    input: Option<String>,

    /// Model to answer with
    #[arg(short, long, value_enum, default_value_t = ModelTier::Gpt35)]
    model: ModelTier,

    /// Sampling temperature, 0.0 to 2.0
    #[arg(short, long, default_value_t = 0.0)]
    temperature: f32,

    /// Guide the conversation with the five-whys root-cause analysis
    #[arg(long)]
    five_whys: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();
    let args = match cli.command {
        Some(Commands::Chat(args)) => args,
        None => cli.chat,
    };

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let mut config = ChatConfig::from_env()?;
    config.system_prompt = system_prompt(&config.system_prompt, args.five_whys);

    let model_config = ModelConfig::new(args.model, args.temperature);
    info!(
        model = model_config.model_identifier(),
        temperature = model_config.temperature(),
        five_whys = args.five_whys,
        "Starting なぁぜなぁぜGPT"
    );

    let interactive = args.input.is_none();
    let mut chat_context = ChatContext::new(
        Box::new(io::stdout()),
        args.input,
        interactive,
        config,
        model_config,
    );
    chat_context.run().await
}
