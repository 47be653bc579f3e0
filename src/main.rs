use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use patch_suite::{check, load_from_path, process, Outcome, RuleSet, Severity};
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "patch-suite")]
#[command(about = "Pattern-based patching for files, folders and ZIP/CRX archives", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Patch a file, folder or archive
    Apply {
        /// File, folder, .zip or .crx to patch
        target: PathBuf,

        /// Rule file to use instead of the built-in rules
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report what apply would change without modifying anything
    Check {
        /// File, folder, .zip or .crx to inspect
        target: PathBuf,

        /// Rule file to use instead of the built-in rules
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// List active rules and eligible file extensions
    Rules {
        /// Rule file to use instead of the built-in rules
        #[arg(short, long)]
        rules: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose {
            "patch_suite=debug"
        } else {
            "patch_suite=warn"
        })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    match cli.command {
        Commands::Apply {
            target,
            rules,
            json,
        } => cmd_apply(&target, rules, json, false),

        Commands::Check {
            target,
            rules,
            json,
        } => cmd_apply(&target, rules, json, true),

        Commands::Rules { rules } => cmd_rules(rules),
    }
}

/// Resolve the rule set using multiple sources
///
/// Priority order:
/// 1. Explicit --rules flag
/// 2. PATCH_SUITE_RULES environment variable
/// 3. ./patch-rules.toml
/// 4. ~/.patch-suite/rules.toml
/// 5. Built-in rules
fn resolve_rules(cli_rules: Option<PathBuf>) -> Result<(RuleSet, String)> {
    // 1. Explicit flag (highest priority)
    if let Some(path) = cli_rules {
        if !path.exists() {
            anyhow::bail!("Rule file not found: {}", path.display());
        }
        return load(&path);
    }

    // 2. Environment variable
    if let Ok(env_path) = env::var("PATCH_SUITE_RULES") {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return load(&path);
        }
        eprintln!(
            "{}",
            format!(
                "Warning: PATCH_SUITE_RULES is set but path doesn't exist: {}",
                env_path
            )
            .yellow()
        );
    }

    // 3./4. Conventional locations
    let candidates = env::current_dir()
        .ok()
        .map(|cwd| cwd.join("patch-rules.toml"))
        .into_iter()
        .chain(home::home_dir().map(|home| home.join(".patch-suite").join("rules.toml")));
    for path in candidates {
        if path.is_file() {
            return load(&path);
        }
    }

    Ok((RuleSet::builtin(), "built-in".to_string()))
}

fn load(path: &Path) -> Result<(RuleSet, String)> {
    let rules = load_from_path(path)?;
    Ok((rules, path.display().to_string()))
}

fn cmd_apply(target: &Path, rules: Option<PathBuf>, json: bool, dry_run: bool) -> Result<()> {
    let (rules, source) = resolve_rules(rules)?;

    let outcome = if dry_run {
        check(&rules, target)
    } else {
        process(&rules, target)
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("Target: {}", target.display());
        println!("Rules: {}", source);
        if dry_run {
            println!("{}", "[DRY RUN - nothing will be written]".cyan());
        }
        println!();
        report(&outcome, dry_run);
    }

    if outcome.is_failure() {
        std::process::exit(1);
    }

    Ok(())
}

/// Print an outcome the way a status dialog would show it.
fn report(outcome: &Outcome, dry_run: bool) {
    if let Outcome::Patched { count, output, .. } = outcome {
        let verb = if dry_run { "would be patched" } else { "patched" };
        println!("{} {} file(s) {}", "✓".green(), count, verb);
        if let Some(output) = output {
            println!("{} Patched archive saved to {}", "📦".green(), output.display());
        }
    } else {
        match outcome.severity() {
            Severity::Info => println!("{} {}", "⊙".yellow(), outcome),
            Severity::Warning => println!("{} {}", "⊘".cyan(), outcome),
            Severity::Error => eprintln!("{} {}", "✗".red(), outcome),
        }
    }

    let failures = outcome.failures();
    if !failures.is_empty() {
        eprintln!();
        eprintln!(
            "{}",
            format!("{} file(s) could not be patched:", failures.len()).red()
        );
        for failure in failures {
            eprintln!("  {} {}", "✗".red(), failure);
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} changed", format!("{}", outcome.count()).green());
    println!("  {} failed", format!("{}", failures.len()).red());
}

fn cmd_rules(rules: Option<PathBuf>) -> Result<()> {
    let (rules, source) = resolve_rules(rules)?;

    println!("{}", "Active rules".bold());
    println!("Source: {}", source);
    println!();

    for (index, rule) in rules.rules().iter().enumerate() {
        println!("{}. {}", index + 1, rule.id().green());
        if let Some(description) = rule.description() {
            println!("   {}", description.dimmed());
        }
        println!("   pattern:     {}", rule.pattern().as_str());
        println!("   replacement: {}", rule.replacement());
    }

    println!();
    let extensions: Vec<&str> = rules.extensions().collect();
    println!("{} {}", "Eligible extensions:".bold(), extensions.join(" "));

    Ok(())
}
