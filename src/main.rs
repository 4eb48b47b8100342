use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::*;
use std::sync::Arc;

use aicounsel_core::profile::{self, Gender, UserProfile};
use aicounsel_core::{
    logging, ChatSession, CommandPlayer, Config, LogPersistence, OpenAIClient, Settings,
    SpeechSynthesizer, SupabaseStore,
};

mod chat;

#[derive(Parser)]
#[command(name = "aicounsel")]
#[command(about = "Counseling chat with a hosted language model")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Remember the email that keys your conversation log
    Login {
        email: String,
    },
    /// Register your profile
    Register {
        #[arg(short, long)]
        nickname: String,
        /// Birthdate as YYYY-MM-DD
        #[arg(short, long)]
        birthdate: String,
        /// male, female or unspecified
        #[arg(short, long)]
        gender: Option<String>,
    },
    /// Start a conversation (type /quit to leave)
    Chat {
        /// Speak replies aloud
        #[arg(short, long)]
        voice: bool,
    },
    /// Print the stored conversation log
    History,
    /// Speak a line of text with the configured voice
    Say {
        text: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init("warn");
    let cli = Cli::parse();

    match cli.command {
        Commands::Login { email } => login(&email)?,
        Commands::Register { nickname, birthdate, gender } => {
            let (config, mut settings) = load_runtime()?;
            register(&config, &mut settings, &nickname, &birthdate, gender.as_deref()).await?
        }
        Commands::Chat { voice } => {
            let (config, settings) = load_runtime()?;
            let session = build_session(&config, &settings, voice)?;
            chat::run(session, voice).await?
        }
        Commands::History => {
            let (config, settings) = load_runtime()?;
            show_history(&config, &settings).await?
        }
        Commands::Say { text } => {
            let (config, _) = load_runtime()?;
            say(&config, &text).await?
        }
    }

    Ok(())
}

/// Commands that reach the services need complete configuration up front.
fn load_runtime() -> Result<(Config, Settings)> {
    let config = Config::load().context("startup configuration is incomplete")?;
    let settings = Settings::load()?;
    Ok((config, settings))
}

fn login(email: &str) -> Result<()> {
    if !email.contains('@') {
        return Err(anyhow!("'{}' does not look like an email address", email));
    }
    let mut settings = Settings::load().unwrap_or_else(|_| Settings::new());
    settings.user_email = Some(email.to_string());
    settings.save()?;
    println!("{} {}", "Logged in as".green(), email.bold());
    Ok(())
}

async fn register(
    config: &Config,
    settings: &mut Settings,
    nickname: &str,
    birthdate: &str,
    gender: Option<&str>,
) -> Result<()> {
    let birthdate = NaiveDate::parse_from_str(birthdate, "%Y-%m-%d")
        .with_context(|| format!("birthdate '{}' is not YYYY-MM-DD", birthdate))?;
    let gender = match gender {
        Some(key) => Some(Gender::from_key(key).ok_or_else(|| anyhow!("unknown gender '{}'", key))?),
        None => None,
    };

    let profile = UserProfile::new(nickname, birthdate, gender, config.utc_offset)?;
    let store = SupabaseStore::new(&config.supabase_url, &config.supabase_key);

    profile::register(&store, settings, &profile).await?;
    settings.save()?;

    println!("{}", "ユーザ登録に成功しました".green().bold());
    Ok(())
}

fn build_session(config: &Config, settings: &Settings, voice: bool) -> Result<ChatSession> {
    let email = settings.require_email()?;
    let client = Arc::new(OpenAIClient::with_base_url(
        &config.openai_api_key,
        &config.model,
        &config.openai_base_url,
    ));
    let store = Arc::new(SupabaseStore::new(&config.supabase_url, &config.supabase_key));
    let persistence = LogPersistence::new(store, config.utc_offset);

    let mut session = ChatSession::new(email, client.clone(), persistence);
    if voice {
        session = session.with_speech(Arc::new(build_synthesizer(config, client)));
    }
    Ok(session)
}

fn build_synthesizer(config: &Config, client: Arc<OpenAIClient>) -> SpeechSynthesizer {
    let player = config
        .player_command
        .as_deref()
        .and_then(CommandPlayer::from_command_line)
        .unwrap_or_else(CommandPlayer::platform_default);

    SpeechSynthesizer::new(client, Arc::new(player), config.voice.clone(), config.speech_path())
}

async fn show_history(config: &Config, settings: &Settings) -> Result<()> {
    let email = settings.require_email()?;
    let store = Arc::new(SupabaseStore::new(&config.supabase_url, &config.supabase_key));
    let persistence = LogPersistence::new(store, config.utc_offset);

    let turns = persistence.load_or_empty(email).await;
    if turns.is_empty() {
        println!("{}", "No conversation stored yet".yellow());
        return Ok(());
    }

    for turn in &turns {
        chat::print_turn(turn);
    }
    println!("\n{} turns", turns.len().to_string().bold());
    Ok(())
}

async fn say(config: &Config, text: &str) -> Result<()> {
    let client = Arc::new(OpenAIClient::with_base_url(
        &config.openai_api_key,
        &config.model,
        &config.openai_base_url,
    ));
    let synth = build_synthesizer(config, client);
    synth.synthesize(text).await?;
    Ok(())
}
