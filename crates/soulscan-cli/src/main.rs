use anyhow::Result;
use clap::{Parser, Subcommand};
use soulscan_engine::{spawn_engine, Config, EngineHandle};
use soulscan_hw::{Camera, Frame};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "soulscan", about = "Screen Soul Scanner — local emotion detection")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze the live webcam stream
    Stream {
        /// Stop after this many seconds (default: run until Ctrl-C)
        #[arg(short, long)]
        duration: Option<u64>,
    },
    /// Analyze a single image file
    Image {
        /// Path to the image (any format the `image` crate decodes)
        path: PathBuf,
        /// Print the full ranked list as JSON
        #[arg(long)]
        json: bool,
    },
    /// List available capture devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Stream { duration } => run_stream(duration).await,
        Commands::Image { path, json } => run_image(&path, json).await,
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("no capture devices found");
            }
            for dev in devices {
                println!("{}  {} ({})", dev.path, dev.name, dev.driver);
            }
            Ok(())
        }
    }
}

fn spawn(config: &Config) -> Result<EngineHandle> {
    let handle = spawn_engine(config)?;
    if handle.fallback_mode() {
        eprintln!("warning: emotion model unavailable; scores are synthesized (fallback mode)");
    }
    Ok(handle)
}

async fn run_stream(duration: Option<u64>) -> Result<()> {
    let config = Config::from_env();
    let handle = spawn(&config)?;

    let mut notices = handle.subscribe_notices();
    tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            eprintln!("{notice}");
        }
    });

    handle.start().await?;
    println!("streaming from {} — Ctrl-C to stop", config.camera_device);

    let deadline = duration.map(|secs| tokio::time::Instant::now() + Duration::from_secs(secs));
    let mut results = handle.results();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = sleep_until_deadline(deadline) => break,
            changed = results.changed() => {
                if changed.is_err() {
                    break;
                }
                let analysis = results.borrow_and_update().clone();
                match analysis.dominant {
                    Some(dominant) => {
                        let score = analysis.emotions[0].score;
                        println!("{dominant} ({score:.2})");
                    }
                    None => println!("no face"),
                }
            }
        }
    }

    handle.stop().await?;
    Ok(())
}

async fn sleep_until_deadline(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn run_image(path: &PathBuf, json: bool) -> Result<()> {
    let config = Config::from_env();
    let handle = spawn(&config)?;

    let img = image::open(path)?.to_rgb8();
    let (width, height) = img.dimensions();
    let frame = Frame::from_rgb(img.into_raw(), width, height);

    let analysis = handle.analyze(frame).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    if analysis.emotions.is_empty() {
        println!("no face detected — ensure there's a clear face in the image");
        return Ok(());
    }

    for entry in &analysis.emotions {
        println!("{:<10} {:.4}", entry.emotion, entry.score);
    }
    if let Some(dominant) = analysis.dominant {
        println!("dominant: {dominant}");
    }

    Ok(())
}
