// cutview - generate haircut reference views from a photo

use anyhow::{Context, bail};
use clap::Parser;
use cutview::validation::{media_type_for_path, validate_image, validate_prompt};
use cutview::workflow::{DisplayCard, RequestOutcome, VariationPayload, WorkflowView};
use cutview::{AppConfig, Studio};
use genapi::GenapiClient;
use imgfit::JpegCodec;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate front, side and back haircut reference views", long_about = None)]
struct Args {
    /// Photo of the person (JPEG, PNG or WebP)
    #[arg(short, long, required_unless_present = "check")]
    image: Option<PathBuf>,

    /// Description of the haircut
    #[arg(short, long, required_unless_present = "check")]
    prompt: Option<String>,

    /// Also generate side and back views
    #[arg(short, long)]
    angles: bool,

    /// Output directory (default: cutview-<timestamp>)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Generation service base URL
    #[arg(long)]
    service_url: Option<String>,

    /// Print the final workflow view as JSON
    #[arg(long)]
    json: bool,

    /// Only check that the service is reachable
    #[arg(long)]
    check: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("cutview={log_level},imgfit={log_level},genapi={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = AppConfig::load(args.config.as_deref())?;

    // Apply CLI overrides
    config.apply_service_url(args.service_url.clone());

    let client = GenapiClient::with_timeout(&config.service.base_url, config.service.timeout())?;
    tracing::info!("Service: {}", client.base_url());

    if args.check {
        if client.health().await? {
            println!("Service at {} is healthy", client.base_url());
            return Ok(());
        }
        bail!("Service at {} did not report healthy", client.base_url());
    }

    let (Some(image_path), Some(prompt)) = (args.image.as_deref(), args.prompt.as_deref()) else {
        bail!("--image and --prompt are required");
    };

    let file_name = image_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "photo".to_string());
    let media_type = media_type_for_path(image_path);
    let data = std::fs::read(image_path)
        .with_context(|| format!("Failed to read {}", image_path.display()))?;

    validate_image(&config.limits, &file_name, media_type, data.len())?;
    validate_prompt(&config.limits, prompt)?;

    let studio = Studio::with_threshold(
        JpegCodec::new(),
        client,
        config.compression.threshold_bytes,
    );

    studio.upload_image(data, &file_name, media_type).await?;
    tracing::info!("Uploaded {} ({})", file_name, media_type);

    tracing::info!("Generating front view");
    let outcome = studio.generate_front(prompt).await;
    check_outcome(&outcome)?;

    if args.angles {
        tracing::info!("Generating side and back views");
        let outcome = studio.generate_angles().await;
        check_outcome(&outcome)?;
    }

    let view = studio.view().await;
    let out_dir = args.out.clone().unwrap_or_else(default_out_dir);
    save_results(&view, &out_dir)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    }

    Ok(())
}

fn check_outcome(outcome: &RequestOutcome) -> anyhow::Result<()> {
    match outcome {
        RequestOutcome::Completed => Ok(()),
        RequestOutcome::Failed(err) => bail!("{err}"),
        RequestOutcome::Rejected => bail!("Request not allowed in the current state"),
        RequestOutcome::Stale => bail!("Photo changed while the request was running"),
    }
}

fn default_out_dir() -> PathBuf {
    PathBuf::from(format!(
        "cutview-{}",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    ))
}

// Images go to <angle>.<ext>; text fallbacks are printed
fn save_results(view: &WorkflowView, out_dir: &Path) -> anyhow::Result<()> {
    let mut created = false;

    for card in &view.cards {
        let DisplayCard::Result(variation) = card else {
            continue;
        };

        match &variation.payload {
            VariationPayload::Image(url) => {
                if !created {
                    std::fs::create_dir_all(out_dir).with_context(|| {
                        format!("Failed to create {}", out_dir.display())
                    })?;
                    created = true;
                }
                let bytes = url
                    .decode()
                    .with_context(|| format!("Invalid {} image payload", variation.angle))?;
                let path = out_dir.join(format!("{}.{}", variation.angle, url.extension()));
                std::fs::write(&path, bytes)?;
                println!("{}: {}", variation.angle, path.display());
            }
            VariationPayload::Text(text) => {
                println!("{} (description): {}", variation.angle, text);
            }
        }
    }

    Ok(())
}
