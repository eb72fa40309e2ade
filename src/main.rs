mod util;

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use text_rope::{Geometry, Rope};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::util::{Edit, Summary};

#[derive(Parser)]
#[command(name = "text-rope", about = "Inspect and edit text through a persistent rope", version)]
struct Cli {
    /// log2 of the number of children per tree node.
    #[arg(
        long,
        global = true,
        env = "TEXT_ROPE_BRANCHING_BITS",
        default_value_t = Geometry::DEFAULT_BRANCHING_FACTOR_BITS
    )]
    branching_bits: u32,

    /// log2 of the number of graphemes per chunk.
    #[arg(
        long,
        global = true,
        env = "TEXT_ROPE_LEAF_BITS",
        default_value_t = Geometry::DEFAULT_LEAF_LENGTH_BITS
    )]
    leaf_bits: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print size and shape statistics for a file.
    Inspect { file: PathBuf },

    /// Apply an edit script to a file and print (or write) the result.
    Edit {
        file: PathBuf,

        /// `append:TEXT`, `insert:AT:TEXT`, `replace:START..END:TEXT` or `remove:START..END`.
        #[arg(short, long = "edit", required = true)]
        edits: Vec<Edit>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the UTF-16 code units of a file, optionally limited to a unit range.
    Utf16 {
        file: PathBuf,

        #[arg(long)]
        start: Option<usize>,

        #[arg(long)]
        end: Option<usize>,
    },
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("text_rope=warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn load(path: &Path, geometry: Geometry) -> Result<Rope> {
    let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
    debug!(path = %path.display(), bytes = text.len(), "loaded file");
    Ok(Rope::from_str_with(&text, geometry))
}

fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = Cli::parse();
    let geometry = Geometry::new(cli.branching_bits, cli.leaf_bits)?;

    match cli.command {
        Command::Inspect { file } => {
            let rope = load(&file, geometry)?;
            println!("{}", Summary::of(&rope));
        }
        Command::Edit { file, edits, output } => {
            let rope = edits.iter().try_fold(load(&file, geometry)?, |rope, edit| {
                debug!(%edit, "applying edit");
                edit.apply(&rope).wrap_err_with(|| format!("Failed to apply `{edit}`"))
            })?;

            match output {
                Some(path) => {
                    fs::write(&path, rope.to_string())
                        .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
                    info!(path = %path.display(), graphemes = rope.len(), "wrote result");
                }
                None => {
                    let mut stdout = io::stdout().lock();
                    write!(stdout, "{rope}")?;
                    stdout.flush()?;
                }
            }
        }
        Command::Utf16 { file, start, end } => {
            let rope = load(&file, geometry)?;
            let view = rope.utf16();
            let range = start.unwrap_or(0)..end.unwrap_or(view.len());
            let view = view
                .slice(range.clone())
                .wrap_err_with(|| format!("Invalid unit range {range:?}"))?;

            let units: Vec<String> = view.iter().map(|unit| format!("{unit:04x}")).collect();
            for line in units.chunks(8) {
                println!("{}", line.join(" "));
            }
        }
    }

    Ok(())
}
