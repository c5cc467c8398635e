use std::process::ExitCode;
use std::sync::Arc;

use chrono::Local;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use voxtask_gateway::api::ApiServerBuilder;
use voxtask_gateway::db::{self, UserRepo, VoiceCommandRepo};
use voxtask_gateway::queue::{CommandExecutor, CommandQueue, LocalCommandExecutor};
use voxtask_gateway::voice::{
    CaptureAdapter, ConsoleRecognizer, ConsoleSpeechOutput, FeedbackSpeaker, OpenAiTts,
    WhisperStt,
};
use voxtask_gateway::{
    CommandExtractor, Config, Dispatcher, HttpCommandExecutor, RecognizedCommand, VoiceSession,
};

/// Voxtask - Voice commands for tasks and personal finance
#[derive(Parser)]
#[command(name = "voxtask", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API server (default)
    Serve {
        /// Port to listen on
        #[arg(long, env = "VOXTASK_PORT")]
        port: Option<u16>,
    },
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserCommand,
    },
    /// Show how a phrase would be understood
    Extract {
        /// Language tag for the rule set
        #[arg(short, long)]
        language: Option<String>,
        /// Phrase to analyze
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Type commands as if speaking them
    Listen {
        /// User to act for
        #[arg(short, long)]
        user: String,
        /// Send commands to a running gateway instead of the local database
        #[arg(long, env = "VOXTASK_SERVER")]
        server: Option<String>,
    },
    /// Show recent voice commands for a user
    History {
        /// User ID
        #[arg(short, long)]
        user: String,
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum UserCommand {
    /// Register a user
    Add {
        /// User ID
        id: String,
    },
    /// List registered users
    List,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,voxtask_gateway=info",
        1 => "info,voxtask_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;

    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => serve(config, port).await,
        Command::User { action } => match action {
            UserCommand::Add { id } => user_add(&config, &id),
            UserCommand::List => user_list(&config),
        },
        Command::Extract { language, text } => {
            extract(language.as_deref().unwrap_or(&config.voice.language), &text.join(" "))
        }
        Command::Listen { user, server } => listen(config, &user, server).await,
        Command::History { user, limit } => history(&config, &user, limit),
    }
}

/// Run the API server until interrupted
async fn serve(config: Config, port: Option<u16>) -> anyhow::Result<()> {
    let port = port.unwrap_or(config.api_server.port);
    tracing::info!(port, db = %config.db_path.display(), "starting voxtask gateway");
    tracing::debug!(?config, "loaded configuration");

    let pool = db::init(&config.db_path)?;

    let mut builder = ApiServerBuilder::new(pool, port)
        .api_key(config.api_server.api_key.clone())
        .rate_limit(config.api_server.rate_limit_per_minute)
        .dedup_ttl(config.dedup_ttl)
        .language(config.voice.language.clone());

    if let Some(key) = config.api_keys.openai.clone() {
        let stt = WhisperStt::new(key.clone(), config.voice.stt_model.clone())?;
        #[allow(clippy::cast_possible_truncation)]
        let tts = OpenAiTts::with_model(
            key,
            config.voice.tts_voice.clone(),
            config.voice.tts_speed as f32,
            config.voice.tts_model.clone(),
        )?;
        builder = builder.stt(Arc::new(stt)).tts(Arc::new(tts));
    } else {
        tracing::info!("no OpenAI key configured, audio endpoints disabled");
    }

    let server = builder.build();

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }

    Ok(())
}

/// Register a user
fn user_add(config: &Config, id: &str) -> anyhow::Result<()> {
    let users = UserRepo::new(db::init(&config.db_path)?);
    let user = users.find_or_create(id)?;
    println!("User {} registered at {}", user.id, user.created_at.to_rfc3339());
    Ok(())
}

/// List registered users
fn user_list(config: &Config) -> anyhow::Result<()> {
    let users = UserRepo::new(db::init(&config.db_path)?).list_all()?;
    if users.is_empty() {
        println!("No users registered");
    }
    for user in users {
        println!("{}\t{}", user.id, user.created_at.to_rfc3339());
    }
    Ok(())
}

/// Print the recognized command for a phrase
fn extract(language: &str, text: &str) -> anyhow::Result<()> {
    let extractor = CommandExtractor::for_language(language);
    let extraction = extractor.extract(text, Local::now().date_naive());
    tracing::debug!(rule = extraction.rule.unwrap_or("-"), "matched rule");

    let command = RecognizedCommand::new(text.trim(), extraction, 1.0, extractor.language());
    println!("{}", serde_json::to_string_pretty(&command)?);
    Ok(())
}

/// Read commands from stdin and execute them in order
async fn listen(config: Config, user_id: &str, server: Option<String>) -> anyhow::Result<()> {
    let executor: Arc<dyn CommandExecutor> = if let Some(url) = server {
        Arc::new(
            HttpCommandExecutor::new(url, user_id)?
                .with_api_key(config.api_server.api_key.clone()),
        )
    } else {
        let pool = db::init(&config.db_path)?;
        UserRepo::new(pool.clone()).find_or_create(user_id)?;
        let dispatcher = Dispatcher::new(pool).with_dedup_ttl(config.dedup_ttl);
        Arc::new(LocalCommandExecutor::new(dispatcher, user_id))
    };

    let speaker = Arc::new(FeedbackSpeaker::new(Arc::new(ConsoleSpeechOutput)));
    let (queue, mut reports, consumer) =
        CommandQueue::spawn(executor, Some(Arc::clone(&speaker)), config.queue.clone());

    let printer = tokio::spawn(async move {
        while let Some(report) = reports.recv().await {
            if let Some(error) = &report.error {
                tracing::warn!(
                    sequence = report.sequence,
                    attempts = report.attempts,
                    %error,
                    "command failed"
                );
            }
        }
    });

    let (capture, events) = CaptureAdapter::new(
        Arc::new(ConsoleRecognizer::stdin()),
        config.voice.capture(),
    );
    let extractor = CommandExtractor::for_language(&config.voice.language);
    let session = VoiceSession::new(capture, extractor, queue).with_speaker(speaker);

    println!("Listening for commands as {user_id} (Ctrl-D to finish)");
    let submitted = session.run(events).await;

    consumer.await?;
    printer.await?;
    println!("{submitted} command(s) processed");
    Ok(())
}

/// Print a user's recent voice commands
fn history(config: &Config, user_id: &str, limit: usize) -> anyhow::Result<()> {
    let log = VoiceCommandRepo::new(db::init(&config.db_path)?);
    let entries = log.list_for_user(user_id, limit)?;
    if entries.is_empty() {
        println!("No commands recorded for {user_id}");
    }
    for entry in entries {
        let status = if entry.success { "ok " } else { "err" };
        println!(
            "{} {status} {:<18} {}",
            entry.created_at.format("%Y-%m-%d %H:%M"),
            entry.intent,
            entry.transcription
        );
    }
    Ok(())
}
