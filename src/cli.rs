use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Write as _},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quantbih::{Bih, Blob, MeshData, Options};

/// Bakes OBJ meshes into quantized BIH blobs and inspects existing blobs.
#[derive(Parser, Debug)]
#[command(name = "quantbih", version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Normalize a mesh into the unit cube, build the tree and write it as a blob
    Bake {
        input: PathBuf,
        output: PathBuf,

        #[arg(long, default_value_t = Options::default().max_triangles_per_leaf)]
        max_triangles_per_leaf: usize,

        #[arg(long, default_value_t = Options::default().max_tree_depth)]
        max_depth: usize,

        /// Material (part id) stored in every leaf
        #[arg(long, default_value_t = 0)]
        material: u16,
    },
    /// Validate a blob and print its statistics
    Info { blob: PathBuf },
    /// Print every node of a blob
    Print { blob: PathBuf },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Args::parse().command {
        Command::Bake {
            input,
            output,
            max_triangles_per_leaf,
            max_depth,
            material,
        } => {
            let options = Options::builder()
                .max_triangles_per_leaf(max_triangles_per_leaf)
                .max_tree_depth(max_depth)
                .material(material)
                .build();
            bake(&input, &output, &options)
        }
        Command::Info { blob } => {
            let blob = load(&blob)?;
            let view = blob.view().context("Invalid blob")?;
            println!("Bounds: {:?} - {:?}", view.bounds().min, view.bounds().max);
            println!("Depth: {}", view.depth());
            println!("{}", view.statistics());
            Ok(())
        }
        Command::Print { blob } => {
            let blob = load(&blob)?;
            let view = blob.view().context("Invalid blob")?;
            let mut out = io::stdout().lock();
            view.print_tree(&mut out)?;
            out.flush()?;
            Ok(())
        }
    }
}

fn bake(input: &Path, output: &Path, options: &Options) -> Result<()> {
    let mut mesh = MeshData::from_obj(input)
        .with_context(|| format!("Failed to load mesh {}", input.display()))?;
    let frame = mesh.normalize();
    log::info!(
        "Loaded {} triangles and {} vertices from {}",
        mesh.triangles.len(),
        mesh.positions.len(),
        input.display()
    );

    let bih = Bih::build(&mesh, options).context("Failed to build tree")?;
    let blob = bih.to_blob().context("Failed to serialize tree")?;

    let mut writer = BufWriter::new(
        File::create(output).with_context(|| format!("Failed to create {}", output.display()))?,
    );
    blob.write_to(&mut writer)?;
    writer.flush()?;
    log::info!("Wrote {} bytes to {}", blob.len(), output.display());

    println!("{}", bih.view().statistics());
    println!("Local frame: origin {:?}, scale {}", frame.origin, frame.scale);
    Ok(())
}

fn load(path: &Path) -> Result<Blob> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Blob::read_from(&mut BufReader::new(file))
        .with_context(|| format!("Failed to read blob {}", path.display()))
}
