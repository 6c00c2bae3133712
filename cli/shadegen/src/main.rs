//! shadegen CLI: generate shader source from node graph documents.

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use commands::Request;

#[derive(Parser)]
#[command(name = "shadegen", version, about = "Generate shader source from node graph documents")]
struct Cli {
    /// Log pipeline steps (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct RequestArgs {
    /// Document to read (.json or .toml)
    #[arg(long)]
    document: PathBuf,
    /// Element to generate: graph/output, output, graph or node name
    #[arg(long)]
    element: String,
    /// Target language (glsl, osl, mdl, slang)
    #[arg(long)]
    target: String,
    /// Generation options file (TOML)
    #[arg(long)]
    options: Option<PathBuf>,
    /// Directory searched for implementation source files (repeatable)
    #[arg(long = "search-path")]
    search_path: Vec<PathBuf>,
    /// Shader interface (complete, reduced); overrides the options file
    #[arg(long)]
    interface: Option<String>,
    /// Bind a light shader nodedef to a light type id, e.g. ND_point_light=1
    #[arg(long = "light")]
    lights: Vec<String>,
}

impl RequestArgs {
    fn into_request(self) -> Request {
        Request {
            document: self.document,
            element: self.element,
            target: self.target,
            options: self.options,
            search_path: self.search_path,
            interface: self.interface,
            lights: self.lights,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shader source for an element
    Generate {
        #[command(flatten)]
        request: RequestArgs,
        /// Shader name (default: the element name)
        #[arg(long)]
        name: Option<String>,
        /// Write one file per stage into this directory
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Print stage sources and uniforms as JSON
        #[arg(long)]
        json: bool,
    },
    /// Build and finalize the graph of an element without emitting code
    Validate {
        #[command(flatten)]
        request: RequestArgs,
    },
    /// List the supported targets
    Targets,
}

fn main() {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Generate {
            request,
            name,
            output_dir,
            json,
        } => commands::generate::run(&request.into_request(), name.as_deref(), output_dir.as_deref(), json),
        Commands::Validate { request } => commands::validate::run(&request.into_request()),
        Commands::Targets => commands::targets::run(),
    }
}
