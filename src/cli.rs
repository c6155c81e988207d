use crate::config::types::DemoConfig;
use crate::core::controller;
use crate::roles::{self, worker, Role, RoleContext};
use crate::safety::safe_cleanup;
use crate::utils::obfuscate::xor_cipher_file;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "Orphan, zombie and worker process lifecycle demonstrator", long_about = None)]
struct Cli {
    /// JSON config file (default: ./proclife.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory that holds log/ and output/
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the controller and every configured role; stop with SIGINT/SIGTERM
    Run {
        #[arg(long)]
        workers: Option<u32>,
        #[arg(long)]
        orphans: Option<u32>,
        #[arg(long)]
        zombies: Option<u32>,
        #[arg(long)]
        spawners: Option<u32>,
    },
    /// Run the orphan demonstrator in the foreground
    Orphan,
    /// Run the zombie demonstrator in the foreground
    Zombie,
    /// Run one file worker in the foreground
    Worker {
        /// Stop after this many iterations instead of running until killed
        #[arg(long)]
        iterations: Option<u64>,
    },
    /// Run a worker spawner in the foreground
    Spawner,
    /// Recursively remove a directory without following symlinks
    Cleanup { path: PathBuf },
    /// Apply the XOR pass to a file in place (run twice to restore it)
    Cipher { file: PathBuf },
}

fn load_config(cli: &Cli) -> Result<DemoConfig> {
    let mut config = match &cli.config {
        Some(path) => DemoConfig::load_from_file(path)?,
        None => DemoConfig::load_default()?,
    };
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    Ok(config)
}

fn foreground_context(config: &DemoConfig) -> Result<RoleContext> {
    let ctx = RoleContext::from_config(config);
    ctx.layout
        .ensure()
        .with_context(|| format!("preparing {}", ctx.layout.root().display()))?;
    Ok(ctx)
}

fn run_foreground(role: Role, config: &DemoConfig) -> Result<()> {
    let ctx = foreground_context(config)?;
    roles::run_role(role, &ctx)?;
    Ok(())
}

pub fn run() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Run {
            workers,
            orphans,
            zombies,
            spawners,
        } => {
            let roles = &mut config.roles;
            if let Some(n) = workers {
                roles.workers = n;
            }
            if let Some(n) = orphans {
                roles.orphans = n;
            }
            if let Some(n) = zombies {
                roles.zombies = n;
            }
            if let Some(n) = spawners {
                roles.spawners = n;
            }

            let summary = controller::run(config)?;
            let signal = summary
                .signal
                .map(|s| s.to_string())
                .unwrap_or_else(|| "none".to_string());
            eprintln!(
                "proclife: stopped by {}; reaped {} children, {} killed after grace period",
                signal,
                summary.reaped.len(),
                summary.killed.len()
            );
            if !summary.cleanup.is_clean() {
                eprintln!("proclife: output cleanup incomplete: {:?}", summary.cleanup);
            }
            Ok(())
        }
        Commands::Orphan => run_foreground(Role::Orphan, &config),
        Commands::Zombie => run_foreground(Role::Zombie, &config),
        Commands::Spawner => run_foreground(Role::Spawner, &config),
        Commands::Worker { iterations } => {
            let ctx = foreground_context(&config)?;
            worker::run_file_worker(&ctx, iterations)?;
            Ok(())
        }
        Commands::Cleanup { path } => {
            let report = safe_cleanup::cleanup_directory(&path)
                .with_context(|| format!("cleaning {}", path.display()))?;
            eprintln!("Removed {} entries under {}", report.removed, path.display());
            Ok(())
        }
        Commands::Cipher { file } => {
            let bytes = xor_cipher_file(&file)?;
            eprintln!("Ciphered {} bytes of {}", bytes, file.display());
            Ok(())
        }
    }
}
