use clap::{Parser, Subcommand};
use gal_lightbox::{config, dom, output, registry, render, replay};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "gal-lightbox")]
#[command(about = "Gallery lightbox core: render, inspect and replay portfolio pages")]
#[command(long_about = "\
Gallery lightbox core: render, inspect and replay portfolio pages

A page holds one or more thumbnail galleries and a hidden modal viewer.
Clicking a thumbnail opens the modal on that image; arrows, swipes and the
chrome buttons move through the gallery; Escape or the backdrop closes it.
Thumbnails load lazily as they approach the viewport.

Page markup (stock names, all configurable):

  <div class=\"thumbnails\" data-gallery=\"landscapes\">
    <figure class=\"thumb\" data-full=\"full/01.jpg\">
      <img class=\"lazy\" data-src=\"thumbs/01.jpg\" alt=\"Valley\">
    </figure>
  </div>
  <div id=\"image-modal\">
    <img id=\"modal-image\">
    <button id=\"modal-close\">  <button id=\"modal-prev\">  <button id=\"modal-next\">
  </div>

Run 'gal-lightbox gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml (default: the input file's directory)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// More log output on stderr (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a gallery page from a JSON manifest
    Render {
        /// Page manifest (title, galleries, images)
        #[arg(long)]
        manifest: PathBuf,
        /// Write the page here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List a page's galleries, deferred images and modal chrome
    Inspect {
        page: PathBuf,
    },
    /// Replay a JSON input script against a page
    Replay {
        page: PathBuf,
        script: PathBuf,
        /// Load every deferred image at startup instead of on scroll
        #[arg(long)]
        eager: bool,
        /// Write the final page state as HTML
        #[arg(long)]
        dump: Option<PathBuf>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Command::Render { manifest, out } => {
            let config = config::load_config(&config_dir(&cli, manifest))?;
            match out {
                Some(out) => {
                    let page = render::load_manifest(manifest)?;
                    let html = render::render_page(&page, &config).into_string();
                    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(out, html)?;
                    output::print_render_summary(&page, out);
                }
                None => print!("{}", render::render(manifest, &config)?),
            }
        }
        Command::Inspect { page } => {
            let config = config::load_config(&config_dir(&cli, page))?;
            let doc = dom::Document::read(page)?;
            let registry = registry::Registry::build(&doc, &config.markup);
            output::print_inspect(&doc, &registry, &config);
        }
        Command::Replay {
            page,
            script,
            eager,
            dump,
        } => {
            let config = config::load_config(&config_dir(&cli, page))?;
            let doc = dom::Document::read(page)?;
            let steps = replay::load_script(script)?;
            let mut session = replay::start_session(doc, &config, *eager)?;
            let reports = replay::run_script(&mut session, &steps)?;
            output::print_replay(&reports);
            if let Some(dump) = dump {
                std::fs::write(dump, session.document().to_html())?;
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr so stdout stays clean for command output.
///
/// `RUST_LOG` wins over `-v` when set.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "gal_lightbox=warn",
        1 => "gal_lightbox=debug",
        _ => "gal_lightbox=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

/// `--config-dir`, else the input file's directory, else `.`.
fn config_dir(cli: &Cli, input: &Path) -> PathBuf {
    if let Some(dir) = &cli.config_dir {
        return dir.clone();
    }
    input
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}
