use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facegate_core::crop::prepare_crop;
use facegate_core::{
    AlignmentGate, BrightnessPolicy, DualMetricMatcher, Embedder, Embedding, Matcher, OnnxEmbedder,
};
use facegate_store::{codec, GalleryStore};
use std::path::{Path, PathBuf};

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "facegate", about = "facegate face recognition CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll an identity from a cropped face image
    Enroll {
        /// Display name of the person
        #[arg(short, long)]
        name: String,
        /// Face image, already cropped to the face
        #[arg(short, long)]
        image: PathBuf,
        /// Reference-image locator to store (defaults to the image path)
        #[arg(long)]
        image_ref: Option<String>,
    },
    /// Enroll an identity from a comma-delimited text embedding
    Import {
        #[arg(short, long)]
        name: String,
        /// Embedding values, e.g. "0.12,-0.04,..."
        #[arg(short, long)]
        embedding: String,
        #[arg(long, default_value = "")]
        image_ref: String,
    },
    /// Identify the person in a cropped face image
    Identify {
        #[arg(short, long)]
        image: PathBuf,
    },
    /// List enrolled identities
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Remove an enrolled identity
    Remove {
        /// Identity ID to remove
        id: String,
    },
    /// Evaluate face geometry against the alignment gate
    Gate {
        #[arg(long)]
        width: u32,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        yaw: f32,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        pitch: f32,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        roll: f32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Enroll { name, image, image_ref } => {
            let embedding = embed_image(&config, &image).await?;
            let image_ref = image_ref.unwrap_or_else(|| image.display().to_string());
            let store = GalleryStore::open(&config.db_path).await?;
            let identity = store.enroll(&name, &image_ref, embedding).await?;
            println!("Enrolled {} ({})", identity.name, identity.id);
        }
        Commands::Import { name, embedding, image_ref } => {
            let embedding = codec::parse_delimited(&embedding)?;
            if embedding.len() != config.embedding_dim {
                tracing::warn!(
                    got = embedding.len(),
                    expected = config.embedding_dim,
                    "imported embedding dimension differs from the configured model"
                );
            }
            let store = GalleryStore::open(&config.db_path).await?;
            let identity = store.enroll(&name, &image_ref, embedding).await?;
            println!("Imported {} ({})", identity.name, identity.id);
        }
        Commands::Identify { image } => {
            let query = embed_image(&config, &image).await?.normalize();
            let store = GalleryStore::open(&config.db_path).await?;
            let gallery = store.list().await?;
            let result = DualMetricMatcher::new(config.thresholds()).find_best_match(&query, &gallery);
            match &result.identity {
                Some(identity) => println!(
                    "Recognized {} ({})  l2={:.3} cosine={:.3}",
                    identity.name, identity.id, result.l2_distance, result.similarity
                ),
                None if gallery.is_empty() => println!("No identities enrolled"),
                None => println!(
                    "Unknown face  best l2={:.3} cosine={:.3}",
                    result.l2_distance, result.similarity
                ),
            }
        }
        Commands::List { json } => {
            let store = GalleryStore::open(&config.db_path).await?;
            let identities = store.list().await?;
            if json {
                let rows: Vec<_> = identities
                    .iter()
                    .map(|i| {
                        serde_json::json!({
                            "id": i.id,
                            "name": i.name,
                            "image_ref": i.image_ref,
                            "dim": i.embedding.len(),
                            "created_at": i.created_at,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if identities.is_empty() {
                println!("No identities enrolled");
            } else {
                for i in &identities {
                    println!("{}  {:<24} {}  {}", i.id, i.name, i.created_at, i.image_ref);
                }
            }
        }
        Commands::Remove { id } => {
            let store = GalleryStore::open(&config.db_path).await?;
            if !store.remove(&id).await? {
                bail!("no identity with id {id}");
            }
            println!("Removed {id}");
        }
        Commands::Gate { width, yaw, pitch, roll } => {
            let verdict = AlignmentGate::default().evaluate(width, yaw, pitch, roll);
            println!("{}: {}", if verdict.aligned { "ok" } else { "rejected" }, verdict.feedback);
        }
    }

    Ok(())
}

/// Load a pre-cropped face, normalize brightness, resize and embed it.
async fn embed_image(config: &Config, path: &Path) -> Result<Embedding> {
    let face = image::open(path)
        .with_context(|| format!("opening {}", path.display()))?
        .to_rgb8();

    let embedder = OnnxEmbedder::load(&config.model_path(), config.embedder_options())?;
    let prepared = prepare_crop(&face, embedder.input_size(), &BrightnessPolicy::default())?;
    let embedding = embedder.embed(&prepared).await?;
    if embedding.is_empty() {
        bail!("embedder produced no embedding for {}", path.display());
    }
    Ok(embedding)
}
