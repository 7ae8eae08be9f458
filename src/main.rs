//! rsblocker 命令行：对本地状态文件执行校验、导入导出、同步预览与开关
//! 外部引擎在命令行下由 InMemoryEngine 代替，每次运行都从空规则表开始

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use rsblocker::{
    ConfigManager, GlobalConfig, ImportOutcome, InMemoryEngine, MsgPackFileStore, RegexCapabilityChecker,
    RuleStore, RuleSyncService, RuleValidationError, RuleValidator,
};

#[derive(Parser)]
#[command(name = "rsblocker", version, about = "Request-blocking rule set manager")]
struct Cli {
    /// Path to the state file
    #[arg(short, long, global = true)]
    store: Option<PathBuf>,

    /// Origin of the extension, used by the reserved allow rule
    #[arg(long, global = true)]
    origin: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum DocumentKind {
    Rule,
    RuleSet,
    RuleSets,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a JSON document without touching the state file
    Validate {
        file: PathBuf,
        #[arg(short, long, value_enum, default_value = "rule-sets")]
        kind: DocumentKind,
    },
    /// Import an exported document and merge it by rule set name
    Import { file: PathBuf },
    /// Export stored rule sets
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List stored rule sets
    List,
    /// Show the delta a full sync would submit to the engine
    Plan,
    /// Enable blocking
    Enable,
    /// Disable blocking
    Disable,
}

fn init_tracing(config: &GlobalConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if config.verbose { "debug" } else { "info" }));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_config(cli: &Cli) -> GlobalConfig {
    let mut builder = ConfigManager::custom().verbose(cli.verbose);
    if let Some(store) = &cli.store {
        builder = builder.store_path(store.clone());
    }
    if let Some(origin) = &cli.origin {
        builder = builder.extension_origin(origin.clone());
    }
    builder.build()
}

async fn read_json(file: &PathBuf) -> Result<Value> {
    let text = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| anyhow::anyhow!("read '{}': {e}", file.display()))?;
    Ok(serde_json::from_str(&text)?)
}

fn print_errors(errors: &[RuleValidationError]) {
    for error in errors {
        eprintln!("  {}", error);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_tracing(&config);

    let engine = Arc::new(InMemoryEngine::new(&config));
    let store = RuleStore::new(Arc::new(MsgPackFileStore::from_config(&config)));
    let service = RuleSyncService::new(engine.clone(), store, &config)?;

    match cli.command {
        Commands::Validate { file, kind } => {
            let doc = read_json(&file).await?;
            let validator = RuleValidator::new(RegexCapabilityChecker::new(engine, &config));
            let errors = match kind {
                DocumentKind::Rule => validator.validate_rule(&doc).await.errors().to_vec(),
                DocumentKind::RuleSet => validator.validate_rule_set(&doc).await.errors().to_vec(),
                DocumentKind::RuleSets => validator.validate_rule_sets(&doc).await.errors().to_vec(),
            };
            if !errors.is_empty() {
                eprintln!("{}: {} error(s)", file.display(), errors.len());
                print_errors(&errors);
                bail!("validation failed");
            }
            println!("{}: ok", file.display());
        }
        Commands::Import { file } => {
            let doc = read_json(&file).await?;
            match service.import_rule_sets(&doc).await? {
                ImportOutcome::Imported(rule_sets) => {
                    println!("imported, {} rule set(s) stored", rule_sets.len());
                }
                ImportOutcome::Rejected(err) => {
                    eprintln!("{}", err);
                    print_errors(err.validation_errors());
                    bail!("import rejected");
                }
            }
        }
        Commands::Export { output } => {
            let text = service.export_rule_sets().await?.to_pretty_json()?;
            match output {
                Some(path) => tokio::fs::write(&path, text).await?,
                None => println!("{}", text),
            }
        }
        Commands::List => {
            println!("state: {}", service.state().await?);
            for rule_set in service.rule_sets().await? {
                println!("{} ({} rule(s))", rule_set.name, rule_set.rules.len());
                for (index, rule) in rule_set.rules.iter().enumerate() {
                    let id = rule.id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string());
                    println!(
                        "  #{} [{}] {} {}",
                        index + 1,
                        id,
                        rule.action.action_type.as_str(),
                        serde_json::to_string(&rule.condition)?
                    );
                }
            }
        }
        Commands::Plan => {
            let delta = service.plan().await?;
            println!("{}", serde_json::to_string_pretty(&delta)?);
        }
        Commands::Enable => {
            if service.enable().await? {
                println!("enabled, {} active rule(s)", engine.snapshot().await.len());
            } else {
                println!("already enabled");
            }
        }
        Commands::Disable => {
            if service.disable().await? {
                println!("disabled");
            } else {
                println!("already disabled");
            }
        }
    }

    Ok(())
}
