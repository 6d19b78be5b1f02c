// imgfit-bin - CLI for squeezing a photo under a byte budget

use anyhow::Context;
use clap::Parser;
use imgfit::{JpegCodec, SourceImage, compress};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Re-encode an image as JPEG to fit a byte budget", long_about = None)]
struct Args {
    /// Image to compress
    #[arg(short, long)]
    input: PathBuf,

    /// Where to write the JPEG result
    #[arg(short, long, default_value = "compressed.jpg")]
    output: PathBuf,

    /// Target size in bytes
    #[arg(short, long)]
    budget: usize,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("imgfit={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let data = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("reading {}", args.input.display()))?;

    let file_name = args
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let media_type = match args
        .input
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    };

    let source = SourceImage::new(data, media_type, file_name);
    tracing::info!(
        input = %args.input.display(),
        size = source.byte_len(),
        budget = args.budget,
        "Compressing"
    );

    let result = compress(&JpegCodec::new(), &source, args.budget).await?;
    tokio::fs::write(&args.output, &result.data)
        .await
        .with_context(|| format!("writing {}", args.output.display()))?;

    println!("Wrote {} ({} bytes)", args.output.display(), result.byte_len());
    println!("Passes: {}", result.passes);
    println!("Quality: {:.3}", result.quality);
    println!("Scale: {:.3}", result.scale);
    if result.byte_len() > args.budget {
        println!("Budget of {} bytes not reached at the quality floor", args.budget);
    }

    Ok(())
}
