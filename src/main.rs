use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use aura_voice::audio::{
    AudioClip, AudioPlayback, CpalInput, InputBackend, PlaybackSink, SAMPLE_RATE, samples_to_wav,
};
use aura_voice::config::TtsBackend;
use aura_voice::services::{ElevenLabsSynthesizer, OpenAiSynthesizer, SpeechSynthesizer};
use aura_voice::{Config, Daemon};

/// Aura - push-to-talk voice assistant
#[derive(Parser)]
#[command(name = "aura", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Stream interpretation snapshots as they arrive
    #[arg(long)]
    streaming: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,aura_voice=info",
        1 => "info,aura_voice=debug",
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

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    // Handle subcommands
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&text).await,
        };
    }

    let mut config = Config::load()?;
    if cli.streaming {
        config.voice.streaming = true;
    }

    tracing::info!(streaming = config.voice.streaming, "starting aura");

    let daemon = Daemon::new(config);
    daemon.run().await?;

    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut backend = CpalInput::new();
    backend.acquire().await?;

    let sink = Arc::new(Mutex::new(Vec::new()));
    let (faults, _fault_rx) = tokio::sync::mpsc::unbounded_channel();
    backend.start_stream(Arc::clone(&sink), faults)?;

    println!("Sample rate: {SAMPLE_RATE} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = sink.lock().map(|mut buf| std::mem::take(&mut *buf)).unwrap_or_default();
        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    backend.release();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");
    println!("  4. Try: pavucontrol (to check levels)");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;

    // Generate 2 seconds of 440Hz sine wave at 24kHz sample rate
    let sample_rate = 24000_u32;
    let frequency = 440.0_f32;
    let duration_secs = 2.0_f32;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let num_samples = (sample_rate as f32 * duration_secs) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), sample_rate);

    let clip = AudioClip::wav(samples_to_wav(&samples, sample_rate)?);
    playback.play(clip)?;

    // play() only enqueues; give the clip time to drain
    tokio::time::sleep(Duration::from_secs(3)).await;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");
    println!("  3. Try: pavucontrol (to check output levels)");

    Ok(())
}

/// Test TTS output
async fn test_tts(text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load()?;

    let synthesizer: Box<dyn SpeechSynthesizer> = match config.voice.tts_backend {
        TtsBackend::OpenAi => Box::new(OpenAiSynthesizer::new(
            config
                .api_keys
                .openai
                .ok_or_else(|| anyhow::anyhow!("OpenAI API key not configured"))?,
            config.voice.tts_model,
            config.voice.tts_voice,
            config.voice.tts_speed,
        )?),
        TtsBackend::ElevenLabs => Box::new(ElevenLabsSynthesizer::new(
            config
                .api_keys
                .elevenlabs
                .ok_or_else(|| anyhow::anyhow!("ElevenLabs API key not configured"))?,
            config.voice.tts_voice,
            config.voice.tts_model,
        )?),
    };

    println!("Synthesizing speech...");
    let clip = synthesizer.synthesize(text).await?;
    println!("Got {} bytes of audio", clip.bytes.len());

    let playback = AudioPlayback::new()?;
    playback.play(clip)?;

    println!("Playing...");
    tokio::time::sleep(Duration::from_secs(8)).await;

    println!("Done!");
    Ok(())
}
