//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use curriculum_core::{
    ImportOptions, ImportResult, MemoryStore, ProgressReporter, import_course,
};
use curriculum_outline::{parse_outline, render_outline, validate};
use curriculum_shared::{
    AppConfig, ContentType, CourseStore, CurriculumError, OrphanPolicy, ParseOptions,
    database_path, init_config, load_config,
};
use curriculum_storage::Storage;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Curriculum: import course outlines with stable identifiers.
#[derive(Parser)]
#[command(
    name = "curriculum",
    version,
    about = "Import course outline documents into a local course database.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Parser flags shared by `import` and `parse`.
#[derive(clap::Args)]
pub(crate) struct ParseFlags {
    /// Drop orphaned nodes with a warning instead of failing.
    #[arg(long)]
    pub lenient: bool,

    /// Content type for classes without a `Content Type:` line.
    #[arg(long)]
    pub default_content_type: Option<ContentType>,
}

impl ParseFlags {
    fn apply(&self, options: &mut ParseOptions) {
        if self.lenient {
            options.strict = false;
        }
        if let Some(content_type) = self.default_content_type {
            options.default_content_type = content_type;
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Import an outline, creating or updating the stored course.
    Import {
        /// Outline document to import.
        file: PathBuf,

        /// Database file (defaults to the configured path).
        #[arg(long)]
        db: Option<PathBuf>,

        /// Print the merge plan without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Delete stored nodes the outline no longer contains.
        #[arg(long)]
        prune: bool,

        #[command(flatten)]
        parse: ParseFlags,
    },

    /// Parse and validate an outline, printing the course as JSON.
    Parse {
        /// Outline document to parse.
        file: PathBuf,

        #[command(flatten)]
        parse: ParseFlags,
    },

    /// Write a stored course back out as an outline.
    Export {
        /// Course identifier.
        #[arg(long)]
        course: String,

        /// Database file (defaults to the configured path).
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// List stored courses.
    List {
        /// Database file (defaults to the configured path).
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "curriculum=info",
        1 => "curriculum=debug",
        _ => "curriculum=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Import {
            file,
            db,
            dry_run,
            prune,
            parse,
        } => cmd_import(&file, db, dry_run, prune, &parse).await,
        Command::Parse { file, parse } => cmd_parse(&file, &parse),
        Command::Export { course, db } => cmd_export(&course, db).await,
        Command::List { db } => cmd_list(db).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

fn resolve_db(db: Option<PathBuf>, config: &AppConfig) -> Result<PathBuf> {
    match db {
        Some(path) => Ok(path),
        None => Ok(database_path(config)?),
    }
}

fn read_outline(file: &Path) -> Result<String> {
    Ok(std::fs::read_to_string(file).map_err(|e| CurriculumError::io(file, e))?)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_import(
    file: &Path,
    db: Option<PathBuf>,
    dry_run: bool,
    prune: bool,
    flags: &ParseFlags,
) -> Result<()> {
    let config = load_config()?;
    let mut options = ImportOptions::from(&config);
    options.dry_run = dry_run;
    if prune {
        options.orphans = OrphanPolicy::Prune;
    }
    flags.apply(&mut options.parse);

    let source = read_outline(file)?;
    let db_path = resolve_db(db, &config)?;

    info!(
        file = %file.display(),
        db = %db_path.display(),
        dry_run,
        orphans = ?options.orphans,
        "importing outline"
    );

    // A dry run only reads, and works before the database exists.
    let store: Box<dyn CourseStore> = if dry_run {
        if db_path.exists() {
            Box::new(Storage::open_readonly(&db_path).await?)
        } else {
            Box::new(MemoryStore::new())
        }
    } else {
        Box::new(Storage::open(&db_path).await?)
    };

    let reporter = CliProgress::new();
    let result = import_course(&source, &options, store.as_ref(), &reporter).await?;

    if dry_run {
        print_plan(&result);
    } else {
        print_summary(&result);
    }

    Ok(())
}

fn print_summary(result: &ImportResult) {
    let summary = &result.summary;
    println!();
    println!("  Course imported!");
    println!("  ID:        {}", result.course_id.as_deref().unwrap_or("-"));
    println!("  Created:   {}", summary.created);
    println!("  Updated:   {}", summary.updated);
    println!("  Unchanged: {}", summary.unchanged);
    println!("  Deleted:   {}", summary.deleted);
    println!("  Untouched: {}", summary.untouched);
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    println!();
}

fn print_plan(result: &ImportResult) {
    let plan = &result.plan;
    println!();
    println!("  Dry run: nothing was written.");
    println!(
        "  Course:    {} ({})",
        plan.course.id.as_deref().unwrap_or("<generated>"),
        match (plan.course.exists, plan.course.changed) {
            (false, _) => "create",
            (true, true) => "update",
            (true, false) => "keep",
        }
    );
    for op in &plan.ops {
        println!("    {op}");
    }
    for node in &plan.untouched {
        println!("    untouched {} {} ({})", node.level, node.order, node.id);
    }
    println!("  Plan:      {}", result.summary);
    println!();
}

fn cmd_parse(file: &Path, flags: &ParseFlags) -> Result<()> {
    let config = load_config()?;
    let mut options = ParseOptions::from(&config);
    flags.apply(&mut options);

    let source = read_outline(file)?;
    let outline = parse_outline(&source, &options)?;
    validate(&outline)?;

    println!("{}", serde_json::to_string_pretty(&outline.course)?);
    Ok(())
}

async fn cmd_export(course_id: &str, db: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let db_path = resolve_db(db, &config)?;
    let storage = Storage::open_readonly(&db_path).await?;

    let tree = storage
        .persisted_tree(course_id)
        .await?
        .ok_or_else(|| eyre!("course '{course_id}' not found in {}", db_path.display()))?;

    print!("{}", render_outline(&tree.to_document()));
    Ok(())
}

async fn cmd_list(db: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let db_path = resolve_db(db, &config)?;
    if !db_path.exists() {
        println!("No courses imported yet.");
        return Ok(());
    }

    info!(db = %db_path.display(), "listing courses");
    let storage = Storage::open_readonly(&db_path).await?;
    let courses = storage.list_courses().await?;
    if courses.is_empty() {
        println!("No courses imported yet.");
        return Ok(());
    }

    for course in courses {
        println!(
            "{:<38} {:>3} modules  {}  {}",
            course.id, course.modules, course.updated_at, course.title
        );
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn op_applied(&self, description: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Writing [{current}/{total}] {description}"));
    }

    fn done(&self, _result: &ImportResult) {
        self.spinner.finish_and_clear();
    }
}
