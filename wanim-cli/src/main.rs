//! wanim CLI Tool
//!
//! Command-line interface for inspecting, rendering, importing into and flattening wanim
//! animation files.

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use wanim_core::{Color, Compositor, Document, ImageHandle, Session, Settings, WanimContainer};
use wanim_render::{codec, CpuBackend, CpuSurface};

#[derive(Parser)]
#[command(name = "wanim")]
#[command(about = "wanim - Frame-by-frame animation timelines")]
#[command(version)]
struct Cli {
    /// JSON settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show file information
    Info {
        /// Input wanim file path
        input: PathBuf,
    },

    /// Render the composited document at one point in time to a PNG file
    Render {
        /// Input wanim file path
        input: PathBuf,

        /// Output PNG file path
        #[arg(short, long)]
        output: PathBuf,

        /// Time in milliseconds
        #[arg(long, default_value = "0")]
        at: f64,

        /// Background color (#rgb, #rrggbb, #rrggbbaa, white, black, transparent)
        #[arg(long)]
        background: Option<String>,
    },

    /// Export the animation as numbered PNG frames with their durations
    Export {
        /// Input wanim file path
        input: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Sampling interval in milliseconds
        #[arg(long)]
        epsilon: Option<f64>,

        /// Background color
        #[arg(long)]
        background: Option<String>,
    },

    /// Merge every layer into a single-layer wanim file
    Flatten {
        /// Input wanim file path
        input: PathBuf,

        /// Output wanim file path
        #[arg(short, long)]
        output: PathBuf,

        /// Background color painted under all layers
        #[arg(long)]
        background: Option<String>,
    },

    /// Bake a layer's transitions into its frames
    Bake {
        /// Input wanim file path
        input: PathBuf,

        /// Output wanim file path
        #[arg(short, long)]
        output: PathBuf,

        /// Index of the layer to bake
        #[arg(long, default_value = "0")]
        layer: usize,
    },

    /// Paste a PNG image onto a layer at a point in time and record it as a frame
    Import {
        /// Input wanim file path
        input: PathBuf,

        /// PNG image to import
        image: PathBuf,

        /// Output wanim file path
        #[arg(short, long)]
        output: PathBuf,

        /// Index of the target layer
        #[arg(long, default_value = "0")]
        layer: usize,

        /// Time in milliseconds
        #[arg(long, default_value = "0")]
        at: f64,
    },

    /// Stack every frame into a single PNG sprite sheet
    Sheet {
        /// Input wanim file path
        input: PathBuf,

        /// Output PNG file path
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Info { input } => show_info(&input)?,

        Commands::Render {
            input,
            output,
            at,
            background,
        } => render_frame(&settings, &input, &output, at, background.as_deref())?,

        Commands::Export {
            input,
            output,
            epsilon,
            background,
        } => export_frames(&settings, &input, &output, epsilon, background.as_deref())?,

        Commands::Flatten {
            input,
            output,
            background,
        } => flatten(&settings, &input, &output, background.as_deref())?,

        Commands::Bake {
            input,
            output,
            layer,
        } => bake(settings, &input, &output, layer)?,

        Commands::Import {
            input,
            image,
            output,
            layer,
            at,
        } => import_image(settings, &input, &image, &output, layer, at)?,

        Commands::Sheet { input, output } => form_sheet(&settings, &input, &output)?,
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let settings = match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            Settings::from_json_str(&json).context("Failed to parse config file")?
        }
        None => Settings::default(),
    };
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

fn background_or(settings: &Settings, background: Option<&str>) -> Result<Color> {
    match background {
        Some(value) => value
            .parse()
            .with_context(|| format!("Invalid background color {value:?}")),
        None => Ok(settings.background),
    }
}

fn compositor(settings: &Settings) -> Compositor<CpuBackend> {
    Compositor::from_settings(CpuBackend::default(), settings)
}

fn read_document(input: &Path) -> Result<Document> {
    let file = File::open(input).context("Failed to open wanim file")?;
    let container =
        WanimContainer::read(BufReader::new(file)).context("Failed to read wanim container")?;
    container
        .into_document()
        .context("Failed to build document from container")
}

fn write_document(document: &Document, output: &Path) -> Result<()> {
    let container = WanimContainer::from_document(document).context("Failed to encode document")?;
    let file = File::create(output).context("Failed to create output file")?;
    container
        .write(BufWriter::new(file))
        .context("Failed to write wanim container")?;
    println!("Wrote {}", output.display());
    Ok(())
}

fn show_info(input: &Path) -> Result<()> {
    let document = read_document(input)?;

    println!("\n=== wanim File Information ===");
    println!("Resolution: {}x{}", document.width(), document.height());
    println!("Layers: {}", document.len());
    let end = document.true_end();
    if end.is_finite() {
        println!("Duration: {} ms ({:.2} seconds)", end, end / 1000.0);
    } else {
        println!("Duration: unbounded");
    }

    println!("\n=== Layers ===");
    for (index, layer) in document.layers().iter().enumerate() {
        println!(
            "  [{}] {} frames, {} transitions, ends at {} ms{}",
            index,
            layer.frames().len(),
            layer.transitions().len(),
            layer.end(),
            if layer.hidden { " (hidden)" } else { "" }
        );
    }

    let total_size: usize = document.all_frames().map(|(_, frame)| frame.src().len()).sum();
    println!(
        "\nTotal image data: {} bytes ({:.2} KB)",
        total_size,
        total_size as f64 / 1024.0
    );
    Ok(())
}

fn render_frame(
    settings: &Settings,
    input: &Path,
    output: &Path,
    at: f64,
    background: Option<&str>,
) -> Result<()> {
    let document = read_document(input)?;
    let background = background_or(settings, background)?;

    println!("Rendering {} at {}ms", input.display(), at);
    let surface: CpuSurface = compositor(settings)
        .render_frame(&document, at, background)
        .context("Failed to render frame")?;

    surface
        .into_buffer()
        .save(output)
        .context("Failed to save frame")?;
    println!("Saved frame to {}", output.display());
    Ok(())
}

fn export_frames(
    settings: &Settings,
    input: &Path,
    output: &Path,
    epsilon: Option<f64>,
    background: Option<&str>,
) -> Result<()> {
    let document = read_document(input)?;
    let background = background_or(settings, background)?;
    let epsilon = epsilon.unwrap_or(settings.export_epsilon);

    std::fs::create_dir_all(output).context("Failed to create output directory")?;
    println!("Exporting {} to {}", input.display(), output.display());

    let mut entries = Vec::new();
    compositor(settings)
        .collect_frames_with(&document, epsilon, background, |frame| {
            let name = format!("frame_{:06}.png", entries.len());
            std::fs::write(output.join(&name), frame.image.src())?;
            entries.push(serde_json::json!({ "file": name, "duration": frame.duration }));

            if entries.len() % 10 == 0 {
                println!("Exported {} frames", entries.len());
            }
            Ok(())
        })
        .context("Failed to export frames")?;

    let index = File::create(output.join("frames.json")).context("Failed to create frame index")?;
    serde_json::to_writer_pretty(BufWriter::new(index), &entries)
        .context("Failed to write frame index")?;

    println!("Successfully exported {} frames", entries.len());
    Ok(())
}

fn flatten(settings: &Settings, input: &Path, output: &Path, background: Option<&str>) -> Result<()> {
    let document = read_document(input)?;
    let background = background
        .map(str::parse::<Color>)
        .transpose()
        .context("Invalid background color")?;

    println!("Flattening {} layers", document.len());
    let frames = compositor(settings)
        .merge_all(&document, background)
        .context("Failed to merge layers")?;

    let mut flat = Document::new(document.width(), document.height());
    let key = flat.add_layer(0, None);
    flat.replace_frames(key, frames)?;
    write_document(&flat, output)
}

fn check_layer(document: &Document, layer: usize) -> Result<()> {
    if layer >= document.len() {
        bail!(
            "Layer {} does not exist (document has {} layers)",
            layer,
            document.len()
        );
    }
    Ok(())
}

fn bake(settings: Settings, input: &Path, output: &Path, layer: usize) -> Result<()> {
    let document = read_document(input)?;
    check_layer(&document, layer)?;

    let compositor = compositor(&settings);
    let mut session = Session::with_document(document, settings);
    session.set_layer_id(layer);

    println!("Baking transitions of layer {}", layer);
    session
        .bake_transitions(&compositor)
        .context("Failed to bake transitions")?;
    write_document(session.document(), output)
}

fn import_image(
    settings: Settings,
    input: &Path,
    image: &Path,
    output: &Path,
    layer: usize,
    at: f64,
) -> Result<()> {
    let document = read_document(input)?;
    check_layer(&document, layer)?;

    let data = std::fs::read(image).context("Failed to read image file")?;
    let decoded = codec::decode_png(&data).context("Failed to decode image")?;
    let image = ImageHandle::from_encoded(codec::encode_png(&decoded)?);

    let compositor = compositor(&settings);
    let mut session = Session::with_document(document, settings);
    session.set_layer_id(layer);
    session.set_ms(at);

    println!(
        "Importing {}x{} image into layer {} at {}ms",
        decoded.width(),
        decoded.height(),
        layer,
        session.ms()
    );
    session
        .import_image(&compositor, &image)
        .context("Failed to import image")?;
    write_document(session.document(), output)
}

fn form_sheet(settings: &Settings, input: &Path, output: &Path) -> Result<()> {
    let document = read_document(input)?;
    let sheet = compositor(settings)
        .form_sheet(&document)
        .context("Failed to form sprite sheet")?;
    if sheet.is_blank() {
        bail!("Document has no frames");
    }

    std::fs::write(output, sheet.src()).context("Failed to write sprite sheet")?;
    println!("Saved sprite sheet to {}", output.display());
    Ok(())
}
