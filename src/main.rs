use ai_image_studio::app::App;
use ai_image_studio::models::{RequestOutcome, SourceFile};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "ai-image-studio")]
#[command(about = "Create images from a prompt, or edit an existing image")]
struct CliArgs {
    /// Do not save the result to the download directory.
    #[arg(long, global = true)]
    no_save: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a new image from a prompt.
    Generate {
        #[arg(short, long)]
        prompt: String,
    },
    /// Edit an existing image with a prompt.
    Edit {
        #[arg(short, long)]
        prompt: String,
        /// Source image to edit.
        #[arg(short, long, value_name = "FILE")]
        image: Option<PathBuf>,
        /// Media type of the source image; detected from its bytes if omitted.
        #[arg(long, value_name = "TYPE")]
        media_type: Option<String>,
    },
}

fn source_from_args(image: Option<PathBuf>, media_type: Option<String>) -> Option<SourceFile> {
    image.map(|path| match media_type {
        Some(media_type) => SourceFile::new(path).with_media_type(media_type),
        None => SourceFile::new(path),
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ai_image_studio=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    let app = match App::new() {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    let request = match args.command {
        Command::Generate { prompt } => app.submit_generate(prompt)?,
        Command::Edit {
            prompt,
            image,
            media_type,
        } => app.submit_edit(prompt, source_from_args(image, media_type))?,
    };
    let flow = request.flow();

    match request.outcome().await {
        RequestOutcome::Success(image) => {
            info!(
                "Received {} ({} bytes)",
                image.media_type(),
                image.bytes().len()
            );
            if args.no_save {
                return Ok(());
            }
            match app.request_download(flow).await {
                Ok(filename) => {
                    println!("{}", filename);
                    Ok(())
                }
                Err(e) => {
                    error!("Download failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        RequestOutcome::Failure(kind) => {
            let message = app
                .user_message(flow)
                .unwrap_or("Something went wrong. Please try again.");
            error!("{} request failed ({})", flow, kind);
            eprintln!("{}", message);
            std::process::exit(1);
        }
    }
}
