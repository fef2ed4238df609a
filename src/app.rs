use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use crossterm::{
    cursor::{Hide, Show},
    event::{self, DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{info, warn};

use crate::backend::{Backend, FileSystemBackend};
use crate::crypto::EncryptedBackend;
use crate::demo::seed_demo_notes;
use crate::logging::init_file_logging;
use crate::state::App;
use crate::storage::{
    Config, config_path, default_base_dir, default_notes_path, home_dir, load_config, log_path,
    resolve_notes_path,
};
use crate::store::{Store, SyncPolicy};
use crate::ui::draw;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Options {
    pub file: Option<PathBuf>,
    pub memory: bool,
    pub strict_sync: bool,
    pub encrypted: bool,
    pub demo: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Invocation {
    Run(Options),
    SelfCheck(Options),
    Version,
    Help,
}

pub fn parse_args<I>(args: I) -> Result<Invocation>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut opts = Options::default();
    let mut self_check = false;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => return Ok(Invocation::Version),
            "--help" | "-h" => return Ok(Invocation::Help),
            "-f" | "--file" => match args.next() {
                Some(p) => opts.file = Some(PathBuf::from(p)),
                None => bail!("--file requires a path"),
            },
            "--memory" => opts.memory = true,
            "--strict-sync" => opts.strict_sync = true,
            "--encrypted" => opts.encrypted = true,
            "--demo" => opts.demo = true,
            "--self-check" => self_check = true,
            other => bail!("Unknown argument: {other}"),
        }
    }
    if opts.memory && opts.file.is_some() {
        bail!("--memory and --file cannot be combined");
    }
    Ok(if self_check {
        Invocation::SelfCheck(opts)
    } else {
        Invocation::Run(opts)
    })
}

pub fn run() -> Result<()> {
    let bin_name = executable_name();
    let opts = match parse_args(std::env::args().skip(1))? {
        Invocation::Version => {
            println!("{bin_name} v{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Invocation::Help => {
            print_usage(&bin_name);
            return Ok(());
        }
        Invocation::SelfCheck(opts) => return run_self_check(&opts),
        Invocation::Run(opts) => opts,
    };

    let config = load_config()?;
    if let Err(e) = init_file_logging(&log_path()?, config.log_level.as_deref()) {
        eprintln!("Warning: logging disabled: {e:#}");
    }
    info!(version = env!("CARGO_PKG_VERSION"), "starting");

    let mut store = open_store(&opts, &config)?;
    if opts.demo {
        let seeded = seed_demo_notes(&mut store).context("Failed to seed demo notes")?;
        info!(seeded, "demo notes added");
    }

    let mut app = App::new(store);
    run_tui(&mut app)?;
    info!("exiting");
    Ok(())
}

fn sync_policy(opts: &Options, config: &Config) -> SyncPolicy {
    if opts.strict_sync {
        SyncPolicy::Hard
    } else {
        config.sync_policy.unwrap_or_default()
    }
}

fn notes_path(opts: &Options, config: &Config) -> Result<PathBuf> {
    if let Some(path) = &opts.file {
        return Ok(path.clone());
    }
    match &config.notes_path {
        Some(raw) => resolve_notes_path(Path::new(raw), &home_dir()?),
        None => default_notes_path(),
    }
}

/// Builds the store the session runs on. Any failure here is fatal.
pub fn open_store(opts: &Options, config: &Config) -> Result<Store> {
    if opts.memory {
        info!("ephemeral session, nothing will be saved");
        return Ok(Store::in_memory());
    }
    let policy = sync_policy(opts, config);
    let path = notes_path(opts, config)?;
    let backend = FileSystemBackend::new(&path)
        .with_context(|| format!("Failed to prepare notes file {}", path.display()))?;
    info!(path = %path.display(), ?policy, "opening notes");

    let backend: Box<dyn Backend> = if opts.encrypted || config.encrypted {
        let passphrase = rpassword::prompt_password("Notes passphrase: ")?;
        if passphrase.is_empty() {
            return Err(anyhow!("A passphrase is required for encrypted notes"));
        }
        Box::new(EncryptedBackend::new(backend, passphrase)?)
    } else {
        Box::new(backend)
    };
    Store::open(backend, policy)
        .with_context(|| format!("Failed to load notes from {}", path.display()))
}

fn run_tui(app: &mut App) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture, Hide)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = (|| -> Result<()> {
        let size = terminal.size()?;
        app.resize(size.width, size.height);
        while !app.should_quit() {
            terminal.draw(|f| draw(f, app))?;
            let event = event::read()?;
            app.handle_event(&event);
        }
        Ok(())
    })();

    disable_raw_mode().ok();
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        Show
    )
    .ok();
    terminal.show_cursor().ok();

    result
}

fn run_self_check(opts: &Options) -> Result<()> {
    let mut warnings = 0u32;
    let mut failures = 0u32;

    println!("Termnotes self-check");

    let config = match load_config() {
        Ok(cfg) => {
            if config_path()?.exists() {
                println!("[PASS] Config is readable: {}", config_path()?.display());
            } else {
                println!("[WARN] No config at {}; using defaults", config_path()?.display());
                warnings += 1;
            }
            cfg
        }
        Err(e) => {
            println!("[FAIL] Config is invalid: {e:#}");
            failures += 1;
            Config::default()
        }
    };

    let base_dir = default_base_dir()?;
    if base_dir.exists() {
        println!("[PASS] Notes directory exists: {}", base_dir.display());
    } else {
        println!("[WARN] Notes directory does not exist yet: {}", base_dir.display());
        warnings += 1;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if base_dir.exists() {
            let mode = std::fs::metadata(&base_dir)?.permissions().mode() & 0o777;
            if mode == 0o700 {
                println!("[PASS] Notes directory permissions are 0o700");
            } else {
                println!("[WARN] Notes directory permissions are {mode:o}, expected 700");
                warnings += 1;
            }
        }
    }

    match notes_path(opts, &config) {
        Ok(path) if path.exists() => {
            let mut backend = FileSystemBackend::new(&path)?;
            match backend.load_all() {
                Ok(notes) => println!("[PASS] Notes file decodes ({} notes)", notes.len()),
                Err(e) => {
                    println!("[FAIL] Notes file is unreadable: {e}");
                    failures += 1;
                }
            }
        }
        Ok(path) => {
            println!("[WARN] Notes file does not exist yet: {}", path.display());
            warnings += 1;
        }
        Err(e) => {
            println!("[FAIL] Notes path is invalid: {e:#}");
            failures += 1;
        }
    }

    match scratch_round_trip() {
        Ok(()) => println!("[PASS] Create/update/delete survive a reload"),
        Err(e) => {
            println!("[FAIL] Scratch round trip failed: {e:#}");
            failures += 1;
        }
    }

    println!("Self-check complete: {failures} failure(s), {warnings} warning(s).");
    if failures > 0 {
        Err(anyhow!("Self-check failed"))
    } else {
        Ok(())
    }
}

/// Exercises the store against a throwaway file.
fn scratch_round_trip() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("notes.json");

    let mut store = Store::open(FileSystemBackend::new(&path)?, SyncPolicy::Hard)?;
    let first = store.create("First Note", "This is my **first** note")?;
    let second = store.create("Second Note", "- one\n- two")?;
    store.update(first.id, "First Note (edited)", "changed")?;
    store.delete(second.id)?;

    let reloaded = Store::open(FileSystemBackend::new(&path)?, SyncPolicy::Hard)?;
    let notes = reloaded.list();
    if notes.len() != 1 || notes[0].title != "First Note (edited)" {
        warn!(count = notes.len(), "unexpected notes after reload");
        bail!("reloaded {} notes, expected the edited first note only", notes.len());
    }
    Ok(())
}

fn print_usage(bin_name: &str) {
    eprintln!("Usage: {bin_name} [OPTIONS]");
    eprintln!("  -f, --file <PATH>       Use this notes file instead of ~/.termnotes/notes.json");
    eprintln!("      --memory            Keep notes in memory only for this session");
    eprintln!("      --strict-sync       Fail a change if it cannot be written to disk");
    eprintln!("      --encrypted         Encrypt note text with a passphrase");
    eprintln!("      --demo              Add sample notes when the notebook is empty");
    eprintln!("      --self-check        Run integrity checks");
    eprintln!("  -V, --version           Show version and exit");
}

fn executable_name() -> String {
    let fallback = "termnotes".to_string();
    let arg0 = match std::env::args().next() {
        Some(v) => v,
        None => return fallback,
    };
    let path = Path::new(&arg0);
    match path.file_name().and_then(|name| name.to_str()) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => fallback,
    }
}
