use clap::{Parser, Subcommand};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use upload_imaging::deriver::MetadataDeriver;
use upload_imaging::files::FileRepository;
use upload_imaging::imaging::RustBackend;
use upload_imaging::library::{self, Library};
use upload_imaging::metadata::{JsonMetadataStore, MetadataStore};
use upload_imaging::preview::PreviewRewriter;
use upload_imaging::process::{ImageProcessor, Upload};
use upload_imaging::{config, output};

#[derive(Parser)]
#[command(name = "upload-imaging")]
#[command(about = "Image normalization and preview metadata for uploaded files")]
#[command(long_about = "\
Image normalization and preview metadata for uploaded files

Uploads are kept in a library directory. JPEG and PNG uploads are normalized
when they are added (resize, watermark, EXIF orientation). Image dimensions are
derived lazily the first time a preview needs them and cached afterwards.

Library structure:

  library/
  ├── config.toml             # Optional, see 'upload-imaging gen-config'
  ├── files.json              # File index
  ├── .image-metadata.json    # Cached image dimensions
  ├── assets/watermark.png    # Watermark asset (watermark.path)
  └── files/                  # Stored uploads

Rendering rewrites every <UPL-IMAGE-PREVIEW uuid=\"...\"/> in a document with
the file's current url, title and aspectRatio.")]
#[command(version)]
struct Cli {
    /// Library directory
    #[arg(long, default_value = "library", global = true)]
    library: PathBuf,

    /// Config file (defaults to <library>/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Mime type override shared by commands that ingest files.
#[derive(clap::Args, Clone)]
struct MimeArgs {
    /// Mime type of every given file (default: guessed from the extension)
    #[arg(long)]
    mime_type: Option<String>,
}

impl MimeArgs {
    fn for_path(&self, path: &Path) -> String {
        self.mime_type
            .clone()
            .unwrap_or_else(|| library::mime_type_for_path(path).to_string())
    }
}

#[derive(Subcommand)]
enum Command {
    /// Add files to the library, normalizing images on the way in
    Add {
        files: Vec<PathBuf>,
        #[command(flatten)]
        mime: MimeArgs,
        /// Uploading identity
        #[arg(long)]
        actor: Option<String>,
        /// Only the uploading identity may download the files
        #[arg(long)]
        restricted: bool,
    },
    /// Normalize image files in place, outside of any library
    Normalize {
        files: Vec<PathBuf>,
        #[command(flatten)]
        mime: MimeArgs,
    },
    /// Show (and cache) the dimensions of a stored image
    Identify { uuid: String },
    /// Rewrite preview placeholders in a document and print the result
    Render { document: PathBuf },
    /// List stored files
    List,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.library.join("config.toml"));
    let load_config = || config::load_config(&config_path);

    match cli.command {
        Command::Add {
            files,
            mime,
            actor,
            restricted,
        } => {
            let config = load_config()?;
            init_thread_pool(&config.processing);
            let library = open_library(&cli.library, &config)?;
            let results: Vec<_> = files
                .par_iter()
                .map(|path| library.add(path, &mime.for_path(path), actor.as_deref(), restricted))
                .collect();

            let mut rejected = 0;
            for (path, result) in files.iter().zip(&results) {
                let url = result.as_ref().ok().and_then(|f| library.url_for_file(f));
                output::print_add_result(path, result, url.as_deref());
                rejected += usize::from(result.is_err());
            }
            if rejected > 0 {
                return Err(format!("{rejected} of {} files rejected", files.len()).into());
            }
        }
        Command::Normalize { files, mime } => {
            let config = load_config()?;
            init_thread_pool(&config.processing);
            let normalize = config.normalize_config(&cli.library)?;
            let backend = RustBackend::new();
            let processor = ImageProcessor::new(&backend, &normalize);
            let uploads: Vec<Upload> = files
                .iter()
                .map(|path| Upload {
                    path: path.clone(),
                    mime_type: mime.for_path(path),
                })
                .collect();

            let results = processor.process_batch(&uploads);
            let mut failed = 0;
            for (upload, result) in uploads.iter().zip(&results) {
                println!("{}", output::format_normalize_result(&upload.path, result));
                failed += usize::from(result.is_err());
            }
            if failed > 0 {
                return Err(format!("{failed} of {} files failed", files.len()).into());
            }
        }
        Command::Identify { uuid } => {
            let library = Library::open(&cli.library, &load_config()?.library)?;
            let file = library
                .find_by_uuid(&uuid)
                .ok_or_else(|| format!("No file with uuid {uuid}"))?;
            let store = JsonMetadataStore::open(&cli.library);
            let backend = RustBackend::new();
            let deriver = MetadataDeriver::new(&backend, &library, &store);

            let result = deriver.get_or_derive(&file);
            output::print_identify(&file, &result);
            result?;
        }
        Command::Render { document } => {
            let xml = std::fs::read_to_string(&document)?;
            let library = Library::open(&cli.library, &load_config()?.library)?;
            let store = JsonMetadataStore::open(&cli.library);
            let backend = RustBackend::new();
            let deriver = MetadataDeriver::new(&backend, &library, &store);
            let rewriter = PreviewRewriter::new(&library, deriver);
            print!("{}", rewriter.render(&xml)?);
        }
        Command::List => {
            let library = Library::open(&cli.library, &load_config()?.library)?;
            let store = JsonMetadataStore::open(&cli.library);
            let mut metadata = BTreeMap::new();
            let mut entries = Vec::new();
            for file in library.files()? {
                if let Some(row) = store.get(file.id)? {
                    metadata.insert(file.id, row);
                }
                let url = library.url_for_file(&file);
                entries.push((file, url));
            }
            output::print_file_list(&entries, &metadata);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr so command output on stdout stays pipeable.
///
/// `RUST_LOG` overrides the default `upload_imaging=info`.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "upload_imaging=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores. The user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Open the library for ingestion: creates the directory and loads the
/// watermark asset. Read-only commands use [`Library::open`] directly.
fn open_library(
    root: &Path,
    config: &config::UploadConfig,
) -> Result<Library, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(root)?;
    let normalize = config.normalize_config(root)?;
    let library = Library::open(root, &config.library)?;
    Ok(library.with_normalizer(Arc::new(RustBackend::new()), normalize))
}
