use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use locator_repair::config::{apply_plan, load_from_path, publish_plan, PlanOutcome};
use locator_repair::locator::{LocatorRewriter, NewLocator, UpdateOutcome, DEFAULT_NAMESPACE};
use locator_repair::publish::{publish, PublishOptions, ReconcileStrategy};
use locator_repair::report::ConsoleReporter;
use similar::{ChangeTag, TextDiff};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "locator-repair")]
#[command(about = "Repair UI element locators and publish the fix on a git branch", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite a single locator assignment in a file
    Update {
        /// Locator file to edit
        #[arg(short, long)]
        file: PathBuf,

        /// Locator variable name (e.g. EMAILBOX_LOCATOR)
        #[arg(short, long)]
        name: String,

        /// Lookup strategy (xpath, id, "css selector", ...)
        #[arg(short, long)]
        strategy: String,

        /// New selector expression
        #[arg(long)]
        selector: String,

        /// Namespace token before the strategy
        #[arg(long, default_value = DEFAULT_NAMESPACE)]
        namespace: String,

        /// Show what would change without writing the file
        #[arg(long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,

        /// Exit with an error when the locator is not found
        #[arg(long)]
        strict: bool,
    },

    /// Commit local changes and push them to a fix branch
    Publish {
        /// Repository root
        #[arg(short, long, default_value = ".")]
        repo: PathBuf,

        /// Branch to publish the fix on
        #[arg(short, long)]
        branch: String,

        #[command(flatten)]
        options: PublishArgs,
    },

    /// Apply repair plans and publish the result
    Apply {
        /// Repair plan to apply (otherwise applies all in <repo>/repairs/)
        #[arg(short, long)]
        plan: Option<PathBuf>,

        /// Repository to repair; plans without `target.repo` apply here and
        /// are discovered in its repairs/ directory
        #[arg(short, long, default_value = ".")]
        repo: PathBuf,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,

        /// Apply locator updates but skip publishing
        #[arg(long)]
        no_publish: bool,

        /// Treat locators that are not found as failures
        #[arg(long)]
        strict: bool,
    },

    /// List locator assignments recognized in a file
    List {
        /// Locator file to scan
        #[arg(short, long)]
        file: PathBuf,

        /// Namespace token before the strategy
        #[arg(long, default_value = DEFAULT_NAMESPACE)]
        namespace: String,
    },
}

#[derive(clap::Args)]
struct PublishArgs {
    /// Remote to push to
    #[arg(long, default_value = "origin")]
    remote: String,

    /// Mainline branch to reconcile with
    #[arg(long, default_value = "main")]
    mainline: String,

    /// Reconciliation order: mainline-first or feature-branch-first
    #[arg(long, default_value = "mainline-first")]
    strategy: ReconcileStrategy,

    /// Commit message for local changes
    #[arg(short, long)]
    message: Option<String>,
}

impl PublishArgs {
    fn into_options(self) -> PublishOptions {
        let defaults = PublishOptions::default();
        PublishOptions {
            remote: self.remote,
            mainline: self.mainline,
            commit_message: self.message.unwrap_or(defaults.commit_message),
            strategy: self.strategy,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose { "debug" } else { "error" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Update {
            file,
            name,
            strategy,
            selector,
            namespace,
            dry_run,
            diff,
            strict,
        } => cmd_update(
            &file, &name, &strategy, selector, namespace, dry_run, diff, strict,
        ),
        Commands::Publish {
            repo,
            branch,
            options,
        } => cmd_publish(&repo, &branch, options.into_options()),
        Commands::Apply {
            plan,
            repo,
            dry_run,
            diff,
            no_publish,
            strict,
        } => cmd_apply(plan, &repo, dry_run, diff, no_publish, strict),
        Commands::List { file, namespace } => cmd_list(&file, namespace),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// Helper: Discover all .toml repair plans in `<repo>/repairs`.
fn discover_plan_files(repo: &Path) -> Result<Vec<PathBuf>> {
    let repairs_dir = repo.join("repairs");
    if !repairs_dir.is_dir() {
        anyhow::bail!(
            "No repair plan given and {} does not exist",
            repairs_dir.display()
        );
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&repairs_dir).max_depth(1) {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|s| s.to_str()) == Some("toml")
        {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No .toml repair plans found in {}", repairs_dir.display());
    }
    Ok(files)
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (repaired)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => continue,
        };
        print!("{}", sign);
    }
    println!();
}

#[allow(clippy::too_many_arguments)]
fn cmd_update(
    file: &Path,
    name: &str,
    strategy: &str,
    selector: String,
    namespace: String,
    dry_run: bool,
    show_diff: bool,
    strict: bool,
) -> Result<ExitCode> {
    let locator = NewLocator::parse(strategy, selector)?;
    let rewriter = LocatorRewriter::new()
        .with_namespace(namespace)
        .with_reporter(&ConsoleReporter);

    let outcome = if dry_run || show_diff {
        let preview = rewriter
            .preview(file, name, &locator)
            .with_context(|| format!("failed to preview {}", file.display()))?;
        if show_diff && preview.original != preview.modified {
            display_diff(file, &preview.original, &preview.modified);
        }
        if dry_run {
            print_dry_run(name, &preview.outcome);
            preview.outcome
        } else {
            rewriter.update(file, name, &locator)?
        }
    } else {
        rewriter.update(file, name, &locator)?
    };

    if strict && !outcome.updated() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_dry_run(name: &str, outcome: &UpdateOutcome) {
    match outcome {
        UpdateOutcome::Updated {
            line_number,
            previous,
            new_line,
            ..
        } => {
            println!("{} {}: Would update line {}", "✓".green(), name, line_number);
            println!("  {} {}", "-".red(), previous);
            println!("  {} {}", "+".green(), new_line);
        }
        UpdateOutcome::AlreadyCurrent { .. } => {
            println!("{} {}: Already up to date", "⊙".yellow(), name)
        }
        UpdateOutcome::NotFound { file, suggestion } => {
            eprintln!(
                "{} {}: Not found in {}",
                "⚠".yellow(),
                name,
                file.display()
            );
            if let Some(suggestion) = suggestion {
                eprintln!("  Did you mean {}?", suggestion.bold());
            }
        }
    }
}

fn cmd_publish(repo: &Path, branch: &str, options: PublishOptions) -> Result<ExitCode> {
    println!("Repository: {}", repo.display());
    println!("Branch: {} ({})", branch, options.strategy);
    println!();

    let report = publish(repo, branch, &options, &ConsoleReporter)
        .with_context(|| format!("failed to publish branch '{}'", branch))?;
    debug!(?report, "publish finished");

    println!();
    match &report.fix_commit {
        Some(commit) => println!("{} committed {}", "Published:".bold(), commit),
        None => println!("{} no new commit", "Published:".bold()),
    }
    Ok(ExitCode::SUCCESS)
}

/// `error: cause: cause`, the same shape anyhow prints with `{:#}`.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

fn print_plan_results(outcome: &PlanOutcome, dry_run: bool) {
    for result in &outcome.results {
        match &result.outcome {
            Ok(o) if dry_run => print_dry_run(&result.name, o),
            // Live updates were already reported by the rewriter.
            Ok(_) => {}
            Err(e) => eprintln!("{} {}: Error - {}", "✗".red(), result.name, error_chain(e)),
        }
    }
}

fn cmd_apply(
    plan: Option<PathBuf>,
    repo: &Path,
    dry_run: bool,
    show_diff: bool,
    no_publish: bool,
    strict: bool,
) -> Result<ExitCode> {
    let plan_files = match plan {
        Some(path) => vec![path],
        None => discover_plan_files(repo)?,
    };

    let mut total_updated = 0;
    let mut total_unchanged = 0;
    let mut total_not_found = 0;
    let mut total_failed = 0;

    for plan_file in plan_files {
        println!("Loading repair plan from {}...", plan_file.display());
        let plan = load_from_path(&plan_file)?;

        if dry_run {
            println!("{}", "  [DRY RUN - showing what would be applied]".cyan());
        }

        let outcome = apply_plan(&plan, repo, dry_run, &ConsoleReporter)?;
        print_plan_results(&outcome, dry_run);

        if show_diff && outcome.original != outcome.modified {
            display_diff(&outcome.locator_file, &outcome.original, &outcome.modified);
        }

        total_updated += outcome.updated_count();
        total_unchanged += outcome.unchanged_count();
        total_not_found += outcome.not_found().len();
        total_failed += outcome.failed_count();

        let blocked = outcome.failed_count() > 0 || (strict && !outcome.not_found().is_empty());
        if dry_run || no_publish || plan.publish.is_none() {
            continue;
        }
        if blocked {
            eprintln!("{}", "  Skipping publish: plan had failures".yellow());
            continue;
        }
        if !outcome.publish_needed() {
            println!("{}", "  Nothing to publish".dimmed());
            continue;
        }
        publish_plan(&plan, repo, &ConsoleReporter)?;
        println!();
    }

    println!("{}", "Summary:".bold());
    println!("  {} updated", format!("{}", total_updated).green());
    println!("  {} already up to date", format!("{}", total_unchanged).yellow());
    println!("  {} not found", format!("{}", total_not_found).cyan());
    println!("  {} failed", format!("{}", total_failed).red());

    if total_failed > 0 || (strict && total_not_found > 0) {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_list(file: &Path, namespace: String) -> Result<ExitCode> {
    let rewriter = LocatorRewriter::new().with_namespace(namespace);
    let assignments = rewriter
        .list(file)
        .with_context(|| format!("failed to scan {}", file.display()))?;

    if assignments.is_empty() {
        println!("{}", "No locator assignments found".yellow());
        return Ok(ExitCode::SUCCESS);
    }

    for assignment in assignments {
        let strategy = match assignment.strategy() {
            Some(_) => assignment.strategy_token.normal(),
            None => assignment.strategy_token.yellow(),
        };
        println!(
            "{} {} {}",
            assignment.name.bold(),
            strategy,
            assignment.selector
        );
    }
    Ok(ExitCode::SUCCESS)
}
