use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sphere_gateway::api::{self, ApiState};
use sphere_gateway::config::{self, SessionTuning};
use sphere_gateway::providers::{ChatModel, GigaChat, SpeechKit, SpeechSynthesizer};
use sphere_gateway::session::{self, GatewayClient, ListenMode, VoiceSession};
use sphere_gateway::voice::{AudioCapture, AudioInput, AudioPlayback, SAMPLE_RATE};
use sphere_gateway::{Config, TranscriptStore};

/// Sphere - voice chatbot gateway
#[derive(Parser)]
#[command(name = "sphere", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a local voice session against a gateway
    Talk {
        /// Gateway base URL
        #[arg(long, env = "SPHERE_URL", default_value = "http://localhost:8080")]
        url: String,

        /// TTS voice for replies
        #[arg(long)]
        voice: Option<String>,

        /// Wait for sound before recording instead of capturing continuously
        #[arg(long)]
        gated: bool,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Привет! Это проверка синтеза речи.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,sphere_gateway=info",
        1 => "info,sphere_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
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
    match cli.command {
        None => serve().await,
        Some(Command::Talk { url, voice, gated }) => talk(&url, voice, gated).await,
        Some(Command::TestMic { duration }) => test_mic(duration).await,
        Some(Command::TestTts { text }) => test_tts(&text).await,
    }
}

/// Run the gateway server
async fn serve() -> anyhow::Result<()> {
    // Missing speech credentials abort startup; missing GigaChat credentials
    // only degrade conversation to the fallback reply
    let config = Config::load()?;
    tracing::info!(port = config.port, data_dir = %config.data_dir.display(), "starting gateway");

    let speechkit = Arc::new(SpeechKit::new(
        config.speech.api_key.clone(),
        config.speech.folder_id.clone(),
    )?);

    let chat: Option<Arc<dyn ChatModel>> = match &config.gigachat {
        Some(gc) => Some(Arc::new(GigaChat::new(
            gc.client_id.clone(),
            gc.client_secret.clone(),
            gc.model.clone(),
        )?)),
        None => None,
    };

    let state = Arc::new(ApiState {
        store: TranscriptStore::open(config.chats_dir())?,
        chat,
        recognizer: speechkit.clone(),
        synthesizer: speechkit,
        system_prompt: config.system_prompt.clone(),
        default_voice: config.tts_voice.clone(),
    });

    api::serve(state, config.port, config.static_dir).await?;
    Ok(())
}

/// Run the local voice session loop
async fn talk(url: &str, voice: Option<String>, gated: bool) -> anyhow::Result<()> {
    // A client-only run needs tuning and a user id but no provider credentials
    let fc = config::file::load_config_file();
    let tuning = SessionTuning::from_file(&fc.voice);

    let voice = voice
        .or(fc.voice.tts_voice)
        .unwrap_or_else(|| config::DEFAULT_TTS_VOICE.to_string());

    let data_dir = std::env::var("SPHERE_DATA_DIR")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| {
            directories::BaseDirs::new().map_or_else(
                || std::path::PathBuf::from(".sphere"),
                |d| d.data_dir().join("sphere").join("gateway"),
            )
        });
    std::fs::create_dir_all(&data_dir)?;
    let user_id = load_or_create_user_id(&data_dir)?;

    let mode = if gated {
        ListenMode::VadGated
    } else {
        ListenMode::Continuous
    };

    let mut session = VoiceSession::new(mode, tuning, SAMPLE_RATE);
    let mut capture = AudioCapture::new()?;
    let mut playback = AudioPlayback::new()?;
    let backend = GatewayClient::new(url, voice);

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel(1);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = shutdown_tx.send(()).await;
    });

    tracing::info!(url, user_id, "voice session ready, speak!");
    session::run_session(
        &mut session,
        &mut capture,
        &mut playback,
        &backend,
        &user_id,
        &mut shutdown_rx,
    )
    .await?;

    Ok(())
}

/// Load the stable local user id, generating it on first run
fn load_or_create_user_id(data_dir: &Path) -> anyhow::Result<String> {
    #[derive(serde::Serialize, serde::Deserialize)]
    struct LocalSession {
        #[serde(rename = "userId")]
        user_id: String,
    }

    let path = data_dir.join("session.json");
    if path.exists() {
        let content = std::fs::read_to_string(&path)?;
        let session: LocalSession = serde_json::from_str(&content)?;
        return Ok(session.user_id);
    }

    let session = LocalSession {
        user_id: uuid::Uuid::new_v4().to_string(),
    };
    std::fs::write(&path, serde_json::to_string_pretty(&session)?)?;
    tracing::info!(user_id = session.user_id, "generated local user id");
    Ok(session.user_id)
}

/// Test microphone input
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;
    println!("Sample rate: {} Hz", capture.sample_rate());
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_frames();
        let mean = if samples.is_empty() {
            0.0
        } else {
            samples.iter().map(|s| s.abs()).sum::<f32>() / samples.len() as f32
        };
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (mean * 400.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] mean: {mean:.4} | peak: {peak:.4} | [{meter}]", i + 1);
    }

    capture.stop();
    println!("\nDone.");
    Ok(())
}

/// Test TTS output through SpeechKit and the speakers
async fn test_tts(text: &str) -> anyhow::Result<()> {
    let config = Config::load()?;
    let speechkit = SpeechKit::new(config.speech.api_key, config.speech.folder_id)?;

    println!("Synthesizing: {text}");
    let audio = speechkit.synthesize(text, &config.tts_voice).await?;
    println!("Got {} bytes of audio, playing...", audio.len());

    let mut playback = AudioPlayback::new()?;
    playback.play_mp3(&audio).await?;

    println!("Done.");
    Ok(())
}
