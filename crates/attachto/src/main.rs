use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use attachto_core::command::{Catalog, CommandAction, CommandKey, CommandNamespace};
use attachto_core::host::SnapshotRegistry;
use attachto_core::session::{DisconnectReason, Session};
use attachto_core::settings::{
    init_settings, load_settings, resolve_namespace, resolve_settings_path,
};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "attachto",
    version,
    about = "Declarative attach-command manager: validates launch targets and plans host command registry reconciliation"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH", help = "Settings file (default: ./attachto.toml)")]
    settings: Option<PathBuf>,
    #[arg(long, global = true, value_name = "NAME", help = "Command namespace prefix")]
    namespace: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Write a starter attachto.toml")]
    Init(InitArgs),
    #[command(about = "Load and validate launch target definitions")]
    Validate,
    #[command(about = "Dry-run a full activation/deactivation cycle against a registry snapshot")]
    Plan(PlanArgs),
    #[command(about = "Classify a registry snapshot against the declared targets")]
    Status(StatusArgs),
}

#[derive(Debug, Args)]
struct InitArgs {
    #[arg(long, help = "Overwrite an existing settings file")]
    force: bool,
}

#[derive(Debug, Args)]
struct PlanArgs {
    #[arg(long, value_name = "PATH", help = "JSON array of currently registered command names")]
    snapshot: Option<PathBuf>,
    #[arg(long, help = "Also plan the teardown a user-close would perform")]
    teardown: bool,
    #[arg(long, help = "Emit the reports as JSON")]
    json: bool,
}

#[derive(Debug, Args)]
struct StatusArgs {
    #[arg(long, value_name = "PATH", help = "JSON array of currently registered command names")]
    snapshot: Option<PathBuf>,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    settings: Option<PathBuf>,
    namespace: Option<String>,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            settings: cli.settings.clone(),
            namespace: cli.namespace.clone(),
        }
    }

    fn settings_path(&self) -> Result<PathBuf> {
        let cwd = env::current_dir().context("failed to read current directory")?;
        Ok(resolve_settings_path(&cwd, self.settings.as_deref()))
    }

    fn namespace(&self) -> CommandNamespace {
        CommandNamespace::new(resolve_namespace(self.namespace.as_deref()))
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let runtime = RuntimeOptions::from_cli(&cli);

    match cli.command {
        Commands::Init(args) => run_init(&runtime, args),
        Commands::Validate => run_validate(&runtime),
        Commands::Plan(args) => run_plan(&runtime, args),
        Commands::Status(args) => run_status(&runtime, args),
    }
}

fn run_init(runtime: &RuntimeOptions, args: InitArgs) -> Result<()> {
    let settings_path = runtime.settings_path()?;
    let wrote = init_settings(&settings_path, args.force)?;
    if wrote {
        println!("Wrote starter settings: {}", normalize_path(&settings_path));
    } else {
        println!(
            "Settings already exist: {} (use --force to overwrite)",
            normalize_path(&settings_path)
        );
    }
    Ok(())
}

fn run_validate(runtime: &RuntimeOptions) -> Result<()> {
    let settings_path = runtime.settings_path()?;
    let namespace = runtime.namespace();
    let settings = load_settings(&settings_path)?;
    let (catalog, report) = Catalog::build(&namespace, &settings);

    println!("validate");
    println!("settings_path: {}", normalize_path(&settings_path));
    println!("namespace: {namespace}");
    println!("display_in_tools_menu: {}", settings.display_in_tools_menu);
    println!("targets: {}", settings.targets.len());
    println!("commands: {}", report.commands);
    for command in catalog.commands() {
        println!(
            "command: {} [{}] {}",
            command.key.full_name(),
            action_kind(&command.action),
            command.display_text
        );
    }
    if report.dropped_duplicates.is_empty() {
        println!("dropped_duplicates: <none>");
    } else {
        for name in &report.dropped_duplicates {
            println!("dropped_duplicate: {name}");
        }
    }

    if catalog.is_empty() {
        bail!(
            "no launch targets declared in {} (run `attachto init` for a starter file)",
            normalize_path(&settings_path)
        );
    }
    Ok(())
}

fn run_plan(runtime: &RuntimeOptions, args: PlanArgs) -> Result<()> {
    let settings_path = runtime.settings_path()?;
    let namespace = runtime.namespace();
    let settings = load_settings(&settings_path)?;
    let mut registry = load_snapshot(args.snapshot.as_deref())?;

    let mut session = Session::new(namespace.clone());
    let activation = session.activate(&settings, &mut registry)?;
    let teardown = if args.teardown {
        Some(session.deactivate(DisconnectReason::UserClosed, &mut registry)?)
    } else {
        None
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&activation)?);
        if let Some(teardown) = &teardown {
            println!("{}", serde_json::to_string_pretty(teardown)?);
        }
        return Ok(());
    }

    println!("plan");
    println!("settings_path: {}", normalize_path(&settings_path));
    println!("namespace: {namespace}");
    println!("display_in_tools_menu: {}", settings.display_in_tools_menu);
    println!("commands: {}", activation.catalog.commands);
    println!("matched: {}", activation.reconcile.matched);
    println!("created: {}", activation.reconcile.created);
    println!("deleted_orphans: {}", activation.reconcile.deleted_orphans);
    println!("ignored_foreign: {}", activation.reconcile.ignored_foreign);
    println!("attached: {}", activation.reconcile.attached);
    println!(
        "halted_on: {}",
        activation.reconcile.halted_on.as_deref().unwrap_or("<none>")
    );
    for entry in &activation.reconcile.entries {
        println!("entry: {} -> {}", entry.name, entry.action);
    }
    if let Some(teardown) = &teardown {
        println!("teardown.reason: {}", teardown.reason.as_str());
        println!("teardown.deleted: {}", teardown.deleted);
    }
    println!("host_mutations: {}", registry.mutations().len());
    Ok(())
}

fn run_status(runtime: &RuntimeOptions, args: StatusArgs) -> Result<()> {
    let settings_path = runtime.settings_path()?;
    let namespace = runtime.namespace();
    let settings = load_settings(&settings_path)?;
    let (catalog, _) = Catalog::build(&namespace, &settings);
    let registry = load_snapshot(args.snapshot.as_deref())?;

    let mut matched = 0usize;
    let mut orphaned = 0usize;
    let mut foreign = 0usize;
    println!("status");
    println!("settings_path: {}", normalize_path(&settings_path));
    println!("namespace: {namespace}");
    println!("declared: {}", catalog.len());
    for name in registry.names() {
        if CommandKey::parse(name, &namespace).is_none() {
            foreign += 1;
            continue;
        }
        if catalog.find_by_full_name(name).is_some() {
            matched += 1;
            println!("registered: {name} (matched)");
        } else {
            orphaned += 1;
            println!("registered: {name} (orphaned)");
        }
    }
    let missing = catalog
        .commands()
        .iter()
        .filter(|command| !registry.contains(&command.key.full_name()))
        .count();
    println!("matched: {matched}");
    println!("orphaned: {orphaned}");
    println!("foreign: {foreign}");
    println!("missing: {missing}");
    Ok(())
}

fn load_snapshot(snapshot_path: Option<&Path>) -> Result<SnapshotRegistry> {
    match snapshot_path {
        Some(path) => SnapshotRegistry::load(path),
        None => Ok(SnapshotRegistry::default()),
    }
}

fn action_kind(action: &CommandAction) -> &'static str {
    match action {
        CommandAction::Standard(_) => "standard",
        CommandAction::Iis(_) => "iis",
    }
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
