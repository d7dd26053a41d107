use serde::Serialize;
use std::path::{Path, PathBuf};
use tracelens::cli::{Cli, Commands, ConfigAction, QueryArgs};
use tracelens::config::Config;
use tracelens::dataset::FileSource;
use tracelens::error::{Result, TracelensError};
use tracelens::extract::parse_timestamp;
use tracelens::query::QueryParams;
use tracelens::repair;
use tracelens::service::TraceService;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    match cli.command {
        Commands::Config { action } => cmd_config(cli.config, action),
        Commands::Repair { input, output } => cmd_repair(&input, output.as_deref()),
        command => {
            let mut config = load_config(cli.config)?;
            if let Some(seed) = cli.seed {
                config.latency.seed = Some(seed);
            }
            let service = open_service(cli.dataset, &config)?;
            run_query(command, &service, &config)
        }
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "tracelens=debug" } else { "tracelens=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_query(command: Commands, service: &TraceService, config: &Config) -> Result<()> {
    match command {
        Commands::Traces => print_json(service.trace_ids()),
        Commands::Events { query } => {
            let params = query_params(&query, config, service.default_window_ms());
            print_json(&service.events(&params))
        }
        Commands::Graph { trace_id } => print_json(service.trace_graph(&trace_id).as_ref()),
        Commands::Clusters { query, window } => {
            let window = window.unwrap_or(service.default_window_ms());
            check_window(window, config)?;
            let params = query_params(&query, config, window);
            print_json(service.clusters(&params).as_ref())
        }
        Commands::ClusterGraph { start, window } => {
            let window = window.unwrap_or(service.default_window_ms());
            check_window(window, config)?;
            let start = start
                .map(|s| parse_timestamp(&s).ok_or(TracelensError::InvalidTimestamp(s)))
                .transpose()?;
            print_json(service.window_graph(start, window).as_ref())
        }
        Commands::Repair { .. } | Commands::Config { .. } => Ok(()),
    }
}

fn query_params(args: &QueryArgs, config: &Config, window_ms: i64) -> QueryParams {
    QueryParams::new(
        args.search_value.clone(),
        args.search_type.unwrap_or(config.query.search_type),
    )
    .with_time_range(args.time_range.unwrap_or(config.query.time_range))
    .with_time_window(window_ms)
}

fn check_window(window_ms: i64, config: &Config) -> Result<()> {
    let max = config.clustering.max_time_window_ms;
    if window_ms <= 0 || window_ms > max {
        return Err(TracelensError::InvalidConfigValue {
            path: "--window".to_string(),
            message: format!("must be between 1 and {} ms, got {}", max, window_ms),
        });
    }
    Ok(())
}

fn open_service(dataset: Option<PathBuf>, config: &Config) -> Result<TraceService> {
    let path = dataset
        .or_else(|| config.dataset.path.clone())
        .ok_or_else(|| {
            TracelensError::Dataset(
                "No dataset given; pass --dataset or set dataset.path in the config".to_string(),
            )
        })?;
    let source = FileSource::new(expand_path(&path)?);
    TraceService::from_source(&source, config)
}

fn cmd_repair(input: &Path, output: Option<&Path>) -> Result<()> {
    let content = std::fs::read_to_string(input).map_err(|e| TracelensError::Io {
        source: e,
        context: format!("Failed to read {:?}", input),
    })?;

    let objects = repair::split_concatenated(&content);
    if objects.is_empty() {
        return Err(TracelensError::Dataset(format!(
            "No JSON objects could be recovered from {:?}",
            input
        )));
    }
    tracing::info!("Recovered {} object(s) from {:?}", objects.len(), input);

    let json = to_json(&objects)?;
    match output {
        Some(path) => {
            std::fs::write(path, json).map_err(|e| TracelensError::Io {
                source: e,
                context: format!("Failed to write {:?}", path),
            })?;
            eprintln!("✓ Repaired JSON written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            print_json(&config)?;
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            // Create parent directory
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| TracelensError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::debug!(
            "Config file not found, using defaults. Run 'tracelens config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        return Ok(config);
    }

    Config::load(&path)
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| TracelensError::Json {
        source: e,
        context: "Failed to serialize output".to_string(),
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", to_json(value)?);
    Ok(())
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| TracelensError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| TracelensError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
