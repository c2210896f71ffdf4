mod commands;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use corshim_shared::{ClassManifest, Clsid, KeyStore, MemoryKeyStore, RegistrationLayout};
use std::path::{Path, PathBuf};
use tracing::{Level, debug};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "corshim")]
#[command(about = "Register in-process COM servers and inspect their class records")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StoreArgs {
    /// JSON snapshot to use instead of the system registry (created if missing)
    #[arg(long)]
    store: Option<PathBuf>,
    /// Write below HKCU\Software\Classes instead of HKCR
    #[arg(long)]
    user: bool,
}

impl StoreArgs {
    fn layout(&self) -> RegistrationLayout {
        if self.user {
            RegistrationLayout::per_user()
        } else {
            RegistrationLayout::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Register every class listed in a manifest
    Register {
        /// Class manifest (JSON)
        #[arg(short, long)]
        manifest: PathBuf,
        /// Server path, overriding the one in the manifest
        #[arg(short, long)]
        server: Option<String>,
        #[command(flatten)]
        target: StoreArgs,
    },
    /// Remove the records of every class listed in a manifest
    Unregister {
        /// Class manifest (JSON)
        #[arg(short, long)]
        manifest: PathBuf,
        /// Server path, overriding the one in the manifest
        #[arg(short, long)]
        server: Option<String>,
        #[command(flatten)]
        target: StoreArgs,
    },
    /// Show what is stored for a class
    Show {
        /// Class identifier, with or without braces
        #[arg(short, long)]
        clsid: String,
        /// Print the record as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        target: StoreArgs,
    },
    /// Print the .NET Framework install root
    InstallRoot {
        /// JSON snapshot to use instead of the system registry
        #[arg(long)]
        store: Option<PathBuf>,
    },
}

impl Commands {
    fn store_path(&self) -> Option<&Path> {
        match self {
            Commands::Register { target, .. }
            | Commands::Unregister { target, .. }
            | Commands::Show { target, .. } => target.store.as_deref(),
            Commands::InstallRoot { store } => store.as_deref(),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    if let Err(e) = run(&cli.command) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(command: &Commands) -> anyhow::Result<()> {
    match command.store_path() {
        Some(path) => {
            let store = MemoryKeyStore::load(path)
                .with_context(|| format!("Failed to load store {}", path.display()))?;
            if execute(&store, command)? {
                store
                    .save(path)
                    .with_context(|| format!("Failed to save store {}", path.display()))?;
                debug!(path = %path.display(), "Saved store snapshot");
            }
            Ok(())
        }
        None => run_system(command),
    }
}

#[cfg(windows)]
fn run_system(command: &Commands) -> anyhow::Result<()> {
    execute(&corshim_shared::WindowsRegistry::new(), command).map(|_| ())
}

#[cfg(not(windows))]
fn run_system(_command: &Commands) -> anyhow::Result<()> {
    anyhow::bail!("the system registry is only available on Windows, pass --store <json>")
}

fn load_manifest(path: &Path) -> anyhow::Result<ClassManifest> {
    ClassManifest::load(path)
        .with_context(|| format!("Failed to load manifest {}", path.display()))
}

/// Run `command` against `store`. Returns whether the store was modified.
fn execute<S: KeyStore>(store: &S, command: &Commands) -> anyhow::Result<bool> {
    match command {
        Commands::Register {
            manifest,
            server,
            target,
        } => {
            let manifest = load_manifest(manifest)?;
            let applied =
                commands::apply(store, &manifest, server.as_deref(), target.layout(), true)?;
            println!(
                "Registered {} class(es) for {}",
                applied.classes, applied.server
            );
            Ok(true)
        }
        Commands::Unregister {
            manifest,
            server,
            target,
        } => {
            let manifest = load_manifest(manifest)?;
            let applied =
                commands::apply(store, &manifest, server.as_deref(), target.layout(), false)?;
            println!("Unregistered {} class(es)", applied.classes);
            Ok(true)
        }
        Commands::Show {
            clsid,
            json,
            target,
        } => {
            let clsid = Clsid::parse(clsid)?;
            match commands::show(store, &clsid, target.layout())? {
                Some(record) if *json => {
                    println!("{}", serde_json::to_string_pretty(&record)?);
                }
                Some(record) => {
                    println!("{}", record.clsid);
                    println!("    Name: {}", record.name.as_deref().unwrap_or("<none>"));
                    println!(
                        "    Server: {}",
                        record.server_path.as_deref().unwrap_or("<none>")
                    );
                    if let Some(model) = &record.threading_model {
                        println!("    ThreadingModel: {}", model);
                    }
                }
                None => println!("{} is not registered", clsid),
            }
            Ok(false)
        }
        Commands::InstallRoot { .. } => {
            println!("{}", commands::install_root(store)?);
            Ok(false)
        }
    }
}
