//! `domsnap` command line: capture an element of a local HTML file.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use domsnap::dom::StaticDocument;
use domsnap::{CaptureOptions, Capturer, CapturerConfig, OutputFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Svg,
    Png,
    Jpeg,
    /// Raw RGBA bytes
    Pixels,
}

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    /// HTML file to load
    html: PathBuf,
    /// Extra stylesheet applied after the document's own styles
    #[arg(long)]
    css: Vec<PathBuf>,
    /// Element to capture (defaults to <body>)
    #[arg(long, short)]
    selector: Option<String>,
    /// Base URL for relative resource references
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long, short, value_enum, default_value_t = Format::Svg)]
    format: Format,
    /// Output file (defaults to stdout)
    #[arg(long, short)]
    output: Option<PathBuf>,
    #[arg(long)]
    width: Option<f64>,
    #[arg(long)]
    height: Option<f64>,
    #[arg(long)]
    pixel_ratio: Option<f64>,
    /// JPEG quality in [0, 1]
    #[arg(long)]
    quality: Option<f64>,
    #[arg(long)]
    background_color: Option<String>,
    #[arg(long)]
    cache_bust: bool,
    /// JSON file with capture options (camelCase keys)
    #[arg(long)]
    options: Option<PathBuf>,
}

impl Args {
    fn capture_options(&self) -> Result<CaptureOptions> {
        let mut options = match &self.options {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading options from {}", path.display()))?;
                serde_json::from_str(&text).context("parsing capture options")?
            }
            None => CaptureOptions::default(),
        };
        options.width = self.width.or(options.width);
        options.height = self.height.or(options.height);
        options.pixel_ratio = self.pixel_ratio.or(options.pixel_ratio);
        options.quality = self.quality.or(options.quality);
        if self.background_color.is_some() {
            options.background_color = self.background_color.clone();
        }
        options.cache_bust |= self.cache_bust;
        if self.format == Format::Jpeg {
            options.blob_format = OutputFormat::Jpeg;
        }
        Ok(options)
    }

    fn load_document(&self) -> Result<StaticDocument> {
        let html = std::fs::read_to_string(&self.html)
            .with_context(|| format!("reading {}", self.html.display()))?;
        let mut builder = StaticDocument::builder(html);
        if let Some(base) = &self.base_url {
            builder = builder.with_base_url(base.clone());
        }
        for path in &self.css {
            let css = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            builder = builder.with_stylesheet(css);
        }
        Ok(builder.build())
    }
}

#[cfg(feature = "resvg")]
fn capturer() -> Capturer {
    Capturer::default().with_decoder(domsnap::rendering::ResvgDecoder::with_system_fonts())
}

#[cfg(not(feature = "resvg"))]
fn capturer() -> Capturer {
    Capturer::default()
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let options = args.capture_options()?;
    let document = args.load_document()?;
    let node = match &args.selector {
        Some(selector) => document.select(selector)?,
        None => document.body(),
    }
    .ok_or_else(|| anyhow!("no element matches {:?}", args.selector.as_deref().unwrap_or("body")))?;

    let capturer = capturer().with_config(CapturerConfig::default());
    if args.format != Format::Svg && !cfg!(feature = "resvg") {
        bail!("raster output needs domsnap built with the `resvg` feature");
    }

    let bytes = match args.format {
        Format::Svg => capturer
            .to_vector_document(&document, &node, &options)
            .await?
            .to_markup()
            .as_bytes()
            .to_vec(),
        Format::Png | Format::Jpeg => capturer.to_blob(&document, &node, &options).await?.bytes,
        Format::Pixels => capturer.to_pixel_data(&document, &node, &options).await?,
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, &bytes).with_context(|| format!("writing {}", path.display()))?;
            log::info!("wrote {} bytes to {}", bytes.len(), path.display());
        }
        None => {
            use std::io::Write;
            std::io::stdout().write_all(&bytes)?;
        }
    }
    Ok(())
}
