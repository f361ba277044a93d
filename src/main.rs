use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use key_presser::keys::{display_key, known_keys, parse_key_list};
use key_presser::runner::MIN_DELAY_SECS;
use key_presser::{
    platform, Config, HotkeyManager, InputBackend, InputInjector, KeySet, LogBackend, Macro,
    MacroRunner, MacroStore, SharedState,
};

#[derive(Parser)]
#[command(name = "kp", version, about = "Press a chord of keys on a timer")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Macro store file (overrides the config)
    #[arg(short, long, global = true)]
    store: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Press keys repeatedly until Ctrl+C
    Run {
        /// Keys to press together, e.g. "a,b" or "ctrl space"
        #[arg(short, long, conflicts_with = "macro_name")]
        keys: Option<String>,

        /// Load keys and delay from a saved macro
        #[arg(short = 'm', long = "macro")]
        macro_name: Option<String>,

        /// Seconds between presses
        #[arg(short, long)]
        delay: Option<u32>,

        /// Wait a random 10-100% of the delay each time
        #[arg(short, long)]
        randomize: bool,

        /// Log key events instead of sending them
        #[arg(long)]
        dry_run: bool,

        /// Do not register the global start/stop hotkey
        #[arg(long)]
        no_hotkey: bool,
    },

    /// Append a macro to the store
    Save {
        name: String,

        /// Keys to press together
        #[arg(short, long)]
        keys: String,

        /// Seconds between presses
        #[arg(short, long)]
        delay: Option<u32>,
    },

    /// List saved macros
    List,

    /// List key names accepted by --keys
    Keys,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path).context("failed to load configuration")?,
        None => Config::default(),
    };
    if let Some(store) = cli.store {
        config.store_path = store;
    }
    config.verbose |= cli.verbose;

    setup_logging(config.verbose);
    config.validate().context("invalid configuration")?;

    let store = MacroStore::new(&config.store_path);

    match cli.command {
        Command::Run {
            keys,
            macro_name,
            delay,
            randomize,
            dry_run,
            no_hotkey,
        } => {
            let shared = Arc::new(SharedState::with_keys(Vec::new(), config.delay));
            shared.set_randomize(randomize || config.randomize);

            if let Some(name) = macro_name {
                let Some(m) = store.find(&name)? else {
                    bail!("no macro named '{}' in {}", name, store.path().display());
                };
                shared.apply_macro(&m);
            } else if let Some(keys) = keys {
                shared.set_keys(parse_key_list(&keys)?);
            } else {
                bail!("nothing to press: pass --keys or --macro");
            }
            if let Some(delay) = delay {
                shared.set_delay(delay);
            }

            let backend: Arc<dyn InputBackend> = if dry_run || config.dry_run {
                Arc::new(LogBackend)
            } else {
                platform::native_backend()
            };

            run(shared, backend, (!no_hotkey).then_some(config.toggle_hotkey.as_str())).await
        }
        Command::Save { name, keys, delay } => {
            let delay = delay.unwrap_or(config.delay).max(MIN_DELAY_SECS);
            let m = Macro::new(name, parse_key_list(&keys)?, delay);
            store.save(&m).context("failed to save macro")?;
            println!(
                "{} saved '{}' to {}",
                "✔".green(),
                m.name.bold(),
                store.path().display()
            );
            Ok(())
        }
        Command::List => {
            let macros = store.load_all().context("failed to read macro store")?;
            if macros.is_empty() {
                println!("no macros in {}", store.path().display());
            }
            for (i, m) in macros.iter().enumerate() {
                println!(
                    "{:>3}. {}  {}  [{}]",
                    i + 1,
                    m.name.bold(),
                    format!("{}s", m.delay).cyan(),
                    describe_keys(&m.keys)
                );
            }
            Ok(())
        }
        Command::Keys => {
            for (name, code) in known_keys() {
                println!("{:<10} {}", name.bold(), format!("{code:#04x}").dimmed());
            }
            Ok(())
        }
    }
}

/// Run until Ctrl+C, letting the toggle hotkey stop and restart the runner.
async fn run(
    shared: Arc<SharedState>,
    backend: Arc<dyn InputBackend>,
    toggle_hotkey: Option<&str>,
) -> Result<()> {
    let initial = shared.snapshot();
    let mut runner = MacroRunner::new(shared, InputInjector::new(backend));

    // Kept alive for the whole run; dropping it unregisters the hotkey.
    let mut hotkeys = None;
    let mut toggles = None;
    if let Some(hotkey) = toggle_hotkey {
        match HotkeyManager::spawn(hotkey, true) {
            Ok(manager) => {
                toggles = Some(manager.subscribe());
                hotkeys = Some(manager);
                println!("{} press {} to stop or restart", "⌨".cyan(), hotkey.bold());
            }
            Err(e) => warn!("continuing without toggle hotkey: {:#}", e),
        }
    }

    println!(
        "{} pressing [{}] every {}s{}, Ctrl+C to quit",
        "▶".green(),
        describe_keys(&initial.keys),
        initial.delay,
        if initial.randomize { " (randomized)" } else { "" }
    );
    runner.start();

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for Ctrl+C")?;
                break;
            }
            toggle = next_toggle(&mut toggles) => match toggle {
                Some(true) => {
                    if runner.start() {
                        println!("{} resumed", "▶".green());
                    }
                }
                Some(false) => {
                    if tokio::task::block_in_place(|| runner.stop()) {
                        println!("{} stopped (hotkey again to restart)", "⏸".yellow());
                    }
                }
                None => toggles = None,
            },
        }
    }

    tokio::task::block_in_place(|| runner.stop());
    drop(hotkeys);
    info!("exiting");
    Ok(())
}

async fn next_toggle(toggles: &mut Option<watch::Receiver<bool>>) -> Option<bool> {
    match toggles {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(*rx.borrow_and_update()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}

fn describe_keys(keys: &KeySet) -> String {
    let names: Vec<String> = keys.iter().copied().map(display_key).collect();
    names.join(" ")
}

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
