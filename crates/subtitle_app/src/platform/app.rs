use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use subtitle_core::SourceFile;
use subtitle_engine::{
    ensure_output_dir, export_converted, AtomicFileWriter, BatchOrchestrator, ConvertOptions,
    ExportOptions, ZhConvertClient,
};
use subtitle_logging::{subtitle_info, subtitle_warn};
use subtitle_proxy::ProxyServer;

use super::config::AppConfig;
use super::logging;
use super::preferences::{load_theme, save_theme};
use super::render::render;
use crate::{Cli, Command, ConversionFlags, ConvertArgs, DiffArgs, ThemeAction};

pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    logging::initialize(config.log_destination, config.log_level_filter()?);
    if let Some(path) = &config.source {
        subtitle_info!("Loaded configuration from {:?}", path);
    }

    match cli.command {
        Command::Serve { bind, upstream } => serve(config, bind, upstream).await,
        Command::Info => info(&config).await,
        Command::Convert(args) => convert(&config, args).await,
        Command::Diff(args) => diff(&config, args).await,
        Command::Theme { action } => theme(&config, action.unwrap_or(ThemeAction::Show)),
    }
}

fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(url) = &cli.api_base_url {
        config.api_base_url = url.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(destination) = cli.log_destination {
        config.log_destination = destination;
    }
    Ok(config)
}

async fn serve(mut config: AppConfig, bind: Option<String>, upstream: Option<String>) -> Result<()> {
    if let Some(bind) = bind {
        config.proxy_bind = bind;
    }
    if let Some(upstream) = upstream {
        config.proxy_upstream = upstream;
    }
    let addr: SocketAddr = config
        .proxy_bind
        .parse()
        .with_context(|| format!("invalid bind address {:?}", config.proxy_bind))?;

    let server = ProxyServer::new(config.proxy_settings())?;
    println!("Proxying http://{addr}/api/ -> {}", config.proxy_upstream);
    server
        .serve(addr, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                subtitle_warn!("Failed to listen for ctrl-c: {}", err);
            }
        })
        .await?;
    Ok(())
}

async fn info(config: &AppConfig) -> Result<()> {
    let client = ZhConvertClient::new(config.client_settings())?;
    let state = client.check_connection().await;
    if !state.is_connected {
        bail!(
            "service at {} is unreachable: {}",
            client.base_url(),
            state.error.unwrap_or_default()
        );
    }

    let info = state.service_info.unwrap_or_default();
    println!("Service: {} (version {})", client.base_url(), info.version);
    println!(
        "Converters: {}",
        info.converters.keys().cloned().collect::<Vec<_>>().join(", ")
    );
    println!(
        "Modules: {}",
        info.modules.keys().cloned().collect::<Vec<_>>().join(", ")
    );
    Ok(())
}

async fn convert(config: &AppConfig, args: ConvertArgs) -> Result<()> {
    let options = conversion_options(config, &args.flags)?;
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.output_dir.clone());
    ensure_output_dir(&output_dir)?;

    let client = ZhConvertClient::new(config.client_settings())?;
    let orchestrator = BatchOrchestrator::new(Arc::new(client), options.clone());

    let sources = read_sources(&args.files).await?;
    let stats = orchestrator.add_files(sources)?;
    if stats.skipped > 0 {
        println!("Skipped {} duplicate file(s)", stats.skipped);
    }

    let summary = orchestrator.convert_selected().await;
    subtitle_info!(
        "Batch finished: {} converted, {} failed",
        summary.succeeded,
        summary.failed
    );

    for attempt in 1..=args.retries {
        let failed = orchestrator.view().error_count;
        if failed == 0 {
            break;
        }
        println!("Retry {attempt}: {failed} file(s)");
        let summary = orchestrator.convert_selected().await;
        subtitle_info!(
            "Retry {} finished: {} converted, {} failed",
            attempt,
            summary.succeeded,
            summary.failed
        );
    }

    print!("{}", render(&orchestrator.view()));

    let export_options = ExportOptions {
        manifest_filename: if args.no_manifest {
            None
        } else {
            ExportOptions::default().manifest_filename
        },
        converter: options.converter.clone(),
        exported_utc: chrono::Utc::now().to_rfc3339(),
    };
    let export = {
        let registry = orchestrator.registry();
        let registry = registry
            .lock()
            .map_err(|_| anyhow::anyhow!("registry lock poisoned"))?;
        export_converted(&registry, &output_dir, &export_options)?
    };
    println!(
        "Wrote {} file(s) to {}",
        export.written.len(),
        output_dir.display()
    );

    let failed = orchestrator.view().error_count;
    if failed > 0 {
        bail!("{failed} file(s) failed to convert");
    }
    Ok(())
}

async fn diff(config: &AppConfig, args: DiffArgs) -> Result<()> {
    let options = conversion_options(config, &args.flags)?;
    let client = ZhConvertClient::new(config.client_settings())?;
    let orchestrator = BatchOrchestrator::new(Arc::new(client), options);

    let sources = read_sources(std::slice::from_ref(&args.file)).await?;
    let stats = orchestrator.add_files(sources)?;
    let Some(&id) = stats.added.first() else {
        bail!("{} could not be registered", args.file.display());
    };
    let html = orchestrator.diff(id).await?;

    let target = match args.output {
        Some(path) => path,
        None => config.output_dir.join(diff_filename(&args.file)),
    };
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let filename = target
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("invalid output path {}", target.display()))?;
    let written = AtomicFileWriter::new(dir).write(filename, &wrap_diff_html(&html))?;
    println!("Wrote diff to {}", written.display());
    Ok(())
}

fn theme(config: &AppConfig, action: ThemeAction) -> Result<()> {
    let path = &config.preferences_path;
    let current = load_theme(path);
    let next = match action {
        ThemeAction::Show => {
            println!("{current}");
            return Ok(());
        }
        ThemeAction::Set { theme } => theme,
        ThemeAction::Cycle => current.cycle(),
    };
    save_theme(path, next)?;
    println!("{current} -> {next}");
    Ok(())
}

fn conversion_options(config: &AppConfig, flags: &ConversionFlags) -> Result<ConvertOptions> {
    let mut options = config.convert_options();
    if let Some(converter) = &flags.converter {
        options.converter = converter.clone();
    }
    for module in &flags.modules {
        let (name, value) = parse_module(module)?;
        options.modules.insert(name, value);
    }
    Ok(options)
}

fn parse_module(raw: &str) -> Result<(String, i32)> {
    let Some((name, value)) = raw.split_once('=') else {
        bail!("module override {raw:?} must look like NAME=VALUE");
    };
    let value: i32 = value
        .trim()
        .parse()
        .with_context(|| format!("module {name:?} needs an integer value"))?;
    if !(-1..=1).contains(&value) {
        bail!("module {name:?} value must be -1, 0 or 1");
    }
    Ok((name.trim().to_string(), value))
}

async fn read_sources(paths: &[PathBuf]) -> Result<Vec<SourceFile>> {
    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .with_context(|| format!("{} is not a file", path.display()))?;
        sources.push(SourceFile::new(name, bytes));
    }
    Ok(sources)
}

fn diff_filename(source: &Path) -> String {
    let stem = source
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "subtitle".to_string());
    format!("{stem}.diff.html")
}

/// The service returns a fragment; give it a document around it.
fn wrap_diff_html(fragment: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>zhconvert diff</title></head>\n<body>\n{fragment}\n</body>\n</html>\n"
    )
}
