//! specref CLI.
//!
//! Resolves `$ref` pointers in Swagger/OpenAPI documents (`resolve`) and
//! reports references that cannot be resolved (`check`).

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use serde_json::Value;
use url::Url;

use specref_resolver::{
    parse_document, HttpTransport, HttpTransportConfig, Resolution, Resolver, ResolverManifest,
    Transport, UnresolvedRegistry,
};
use specref_telemetry::{LogFormat, Telemetry, TelemetryConfig};

#[derive(Parser, Debug)]
#[command(
    name = "specref",
    about = "Resolve $ref pointers in Swagger/OpenAPI documents",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Resolver manifest (transport settings and mirrors).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG).
    #[arg(long, global = true, env = "SPECREF_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Log format (pretty or json).
    #[arg(long, global = true, env = "SPECREF_LOG_FORMAT", default_value = "pretty")]
    log_format: String,

    /// Request timeout in seconds for remote documents.
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Refuse plaintext http:// documents.
    #[arg(long, global = true)]
    deny_plaintext: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve all references and write the resolved document.
    Resolve {
        /// Input spec: a file path or an http(s)/file URL.
        #[arg(short, long)]
        spec: String,

        /// Base URL for relative references (default: where the spec was loaded from).
        #[arg(long)]
        root: Option<String>,

        /// Output path (default: stdout).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format.
        #[arg(long, default_value = "json", value_parser = ["json", "yaml"])]
        format: String,

        /// Exit with status 1 when any reference is unresolved.
        #[arg(long)]
        strict: bool,
    },

    /// Report references that cannot be resolved.
    Check {
        /// Input spec: a file path or an http(s)/file URL.
        #[arg(short, long)]
        spec: String,

        /// Base URL for relative references (default: where the spec was loaded from).
        #[arg(long)]
        root: Option<String>,

        /// Output format.
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },
}

/// Build the transport from the manifest (if any) and the global flags.
fn build_transport(cli: &Cli) -> anyhow::Result<HttpTransport> {
    let mut config = match &cli.config {
        Some(path) => {
            let manifest = ResolverManifest::load(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            manifest.transport_config(base)
        }
        None => HttpTransportConfig::default(),
    };

    if let Some(secs) = cli.timeout {
        config.timeout = Duration::from_secs(secs);
    }
    if cli.deny_plaintext {
        config.allow_plaintext = false;
    }

    Ok(HttpTransport::new(config)?)
}

/// A spec argument that names a URL rather than a file.
fn spec_url(spec: &str) -> Option<Url> {
    let url = Url::parse(spec).ok()?;
    matches!(url.scheme(), "http" | "https" | "file").then_some(url)
}

/// Load the spec and return it with its root URL.
async fn load_spec(spec: &str, transport: &HttpTransport) -> anyhow::Result<(Value, String)> {
    if let Some(url) = spec_url(spec) {
        let fetched = transport
            .get(url.as_str())
            .await
            .with_context(|| format!("failed to fetch {}", spec))?;
        let document =
            parse_document(&fetched.body, fetched.content_type.as_deref(), url.as_str())?;
        return Ok((document, url.to_string()));
    }

    let path = Path::new(spec);
    let body = std::fs::read(path).with_context(|| format!("failed to read {}", spec))?;
    let document = parse_document(&body, None, spec)?;

    let absolute = path
        .canonicalize()
        .with_context(|| format!("failed to resolve path {}", spec))?;
    let root = Url::from_file_path(&absolute)
        .map_err(|_| anyhow!("cannot express {} as a file URL", absolute.display()))?;

    Ok((document, root.to_string()))
}

/// Load and resolve a spec.
async fn resolve_spec(
    cli: &Cli,
    spec: &str,
    root: Option<&str>,
) -> anyhow::Result<(Value, Resolution)> {
    let transport = build_transport(cli)?;
    let (mut document, loaded_from) = load_spec(spec, &transport).await?;
    let root = root.map(str::to_string).unwrap_or(loaded_from);

    let resolver = Resolver::new(transport);
    let resolution = resolver.resolve(&mut document, Some(&root)).await?;
    Ok((document, resolution))
}

fn render(document: &Value, format: &str) -> anyhow::Result<String> {
    if format == "yaml" {
        Ok(serde_yaml::to_string(document)?)
    } else {
        let mut rendered = serde_json::to_string_pretty(document)?;
        rendered.push('\n');
        Ok(rendered)
    }
}

fn print_unresolved(unresolved: &UnresolvedRegistry) {
    for (reference, entry) in unresolved {
        eprintln!("  {}: {}", reference, entry.reason);
    }
}

/// Run the resolve command.
async fn run_resolve(
    cli: &Cli,
    spec: &str,
    root: Option<&str>,
    output: Option<&Path>,
    format: &str,
    strict: bool,
) -> ExitCode {
    let (document, resolution) = match resolve_spec(cli, spec, root).await {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return ExitCode::from(1);
        }
    };

    let rendered = match render(&document, format) {
        Ok(rendered) => rendered,
        Err(e) => {
            eprintln!("error: failed to serialize resolved document: {}", e);
            return ExitCode::from(1);
        }
    };

    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, rendered) {
                eprintln!("error: failed to write {}: {}", path.display(), e);
                return ExitCode::from(1);
            }
        }
        None => print!("{}", rendered),
    }

    let unresolved = &resolution.unresolved;
    if !unresolved.is_empty() {
        eprintln!("✗ {} unresolved reference(s)", unresolved.len());
        print_unresolved(unresolved);
    }
    eprintln!(
        "resolved {}: {} substitution(s), {} imported model(s), {} request(s)",
        spec,
        resolution.stats.substitutions,
        resolution.stats.imports,
        resolution.stats.requests
    );

    if strict && !unresolved.is_empty() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

/// Run the check command.
async fn run_check(cli: &Cli, spec: &str, root: Option<&str>, format: &str) -> ExitCode {
    let resolution = match resolve_spec(cli, spec, root).await {
        Ok((_, resolution)) => resolution,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return ExitCode::from(1);
        }
    };
    let unresolved = &resolution.unresolved;

    if format == "json" {
        let output = serde_json::json!({
            "spec": spec,
            "unresolved": unresolved,
            "stats": resolution.stats,
        });
        match serde_json::to_string_pretty(&output) {
            Ok(rendered) => println!("{}", rendered),
            Err(e) => {
                eprintln!("error: {}", e);
                return ExitCode::from(1);
            }
        }
    } else if unresolved.is_empty() {
        eprintln!("✓ {} has no unresolved references", spec);
    } else {
        eprintln!("✗ {} has {} unresolved reference(s)", spec, unresolved.len());
        print_unresolved(unresolved);
    }

    if unresolved.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let telemetry_config = TelemetryConfig::new()
        .with_log_level(cli.log_level.clone())
        .with_log_format(LogFormat::parse(&cli.log_format).unwrap_or_default());
    if let Err(e) = Telemetry::init(telemetry_config) {
        eprintln!("warning: {}", e);
    }

    match &cli.command {
        Command::Resolve {
            spec,
            root,
            output,
            format,
            strict,
        } => {
            run_resolve(
                &cli,
                spec,
                root.as_deref(),
                output.as_deref(),
                format,
                *strict,
            )
            .await
        }
        Command::Check { spec, root, format } => {
            run_check(&cli, spec, root.as_deref(), format).await
        }
    }
}
