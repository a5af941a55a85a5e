//! Agreement Kit CLI
//!
//! Console host for the agreement flow: fetches the configured agreement,
//! renders it, and reports the user's decision.

use agreement_kit::{
    AgreementClient, AgreementConfig, AgreementController, AgreementDocument, ControllerState,
    DeviceIdentity, FileIdentityStore, FixedIdentity, HttpClient, VERSION,
};
use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "agreement-kit")]
#[command(version = VERSION)]
#[command(about = "Fetch and acknowledge terms-of-service agreements", long_about = None)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the agreement and ask for a decision
    Show {
        #[command(flatten)]
        service: ServiceArgs,

        /// Accept without prompting
        #[arg(long, conflicts_with = "decline")]
        accept: bool,

        /// Decline without prompting
        #[arg(long)]
        decline: bool,

        /// Print the fetched document as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print this install's device identifier
    DeviceId {
        /// Identity file (defaults to the local data directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Show the effective configuration
    Config {
        #[command(flatten)]
        service: ServiceArgs,

        /// Write the effective configuration to the default location
        #[arg(long)]
        save: bool,
    },
}

/// Service options; each overrides the config file.
#[derive(Args, Default)]
struct ServiceArgs {
    /// Config file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Agreement endpoint URL
    #[arg(long)]
    route: Option<String>,

    /// Application identifier
    #[arg(long)]
    app_id: Option<String>,

    /// Application version
    #[arg(long = "app-version")]
    app_version: Option<String>,

    /// Agreement content name
    #[arg(long)]
    name: Option<String>,

    /// Language tag used to localize the document
    #[arg(long)]
    lang: Option<String>,

    /// Device identifier (generated and persisted when omitted)
    #[arg(long)]
    device_id: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Retries after a transient failure
    #[arg(long)]
    max_retries: Option<u32>,

    /// Sleep between retries in milliseconds
    #[arg(long)]
    retry_backoff_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Accept,
    Decline,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let result = match cli.command {
        Commands::Show {
            service,
            accept,
            decline,
            json,
        } => {
            let decision = if accept {
                Some(Decision::Accept)
            } else if decline {
                Some(Decision::Decline)
            } else {
                None
            };
            cmd_show(service, decision, json).await
        }
        Commands::DeviceId { path } => cmd_device_id(path),
        Commands::Config { service, save } => cmd_config(service, save),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn cmd_show(
    args: ServiceArgs,
    decision: Option<Decision>,
    json: bool,
) -> anyhow::Result<()> {
    let config = resolve_config(args)?;
    let http = HttpClient::new(config.http_config())?;
    let identity: Arc<dyn DeviceIdentity> = match config.device_id {
        Some(ref id) => Arc::new(FixedIdentity(id.clone())),
        None => Arc::new(FileIdentityStore::new()),
    };

    let controller =
        AgreementController::with_config(Arc::new(AgreementClient::new(http)), identity, config);
    let dismiss = controller.dismiss_events();

    controller.fetch().await;

    match fetched_document(&controller)? {
        Some(document) => {
            controller.show_dialog();
            if json {
                println!("{}", serde_json::to_string_pretty(&document)?);
            } else {
                render(&document);
            }

            let decision = match decision {
                Some(decision) => decision,
                None => prompt(&document).await?,
            };

            let outcome = match decision {
                Decision::Accept => controller.accept_action().await,
                Decision::Decline => controller.decline_action().await,
            };
            match outcome {
                Ok(()) => println!(
                    "{} recorded.",
                    match decision {
                        Decision::Accept => "Acceptance",
                        Decision::Decline => "Decline",
                    }
                ),
                Err(e) => eprintln!("Warning: decision not reported: {e}"),
            }

            if dismiss.try_recv().is_ok() {
                println!("Dismissed.");
            }
        }
        None => println!("No agreement to show."),
    }

    // Let the background view report finish before the runtime shuts down.
    controller.flush_reports().await;
    Ok(())
}

/// Document fetched by the last `fetch`.
///
/// Read from the controller's document rather than its state: the background
/// view report may already have replaced `ShowView`.
fn fetched_document(
    controller: &AgreementController,
) -> anyhow::Result<Option<AgreementDocument>> {
    if let Some(document) = controller.document() {
        return Ok(Some(document));
    }
    match controller.state() {
        ControllerState::FetchError(e) => Err(e).context("failed to fetch agreement"),
        _ => Ok(None),
    }
}

fn render(document: &AgreementDocument) {
    let title = document.title_or_default();
    println!("{title}");
    println!("{}", "=".repeat(title.chars().count()));
    println!();
    if let Some(ref heading) = document.agreement_title {
        println!("{heading}");
        println!();
    }
    if let Some(ref body) = document.body {
        println!("{body}");
        println!();
    }
    if let Some(ref version) = document.version {
        println!("Version: {version}");
    }
}

async fn prompt(document: &AgreementDocument) -> anyhow::Result<Decision> {
    loop {
        print!(
            "[a] {}  [d] {}: ",
            document.accept_label_or_default(),
            document.decline_label_or_default()
        );
        std::io::stdout().flush()?;

        let (read, line) = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|read| (read, line))
        })
        .await??;

        if read == 0 {
            bail!("input closed before a decision was made");
        }
        match parse_decision(&line) {
            Some(decision) => return Ok(decision),
            None => println!("Please answer 'a' or 'd'."),
        }
    }
}

fn parse_decision(input: &str) -> Option<Decision> {
    match input.trim().to_lowercase().as_str() {
        "a" | "accept" | "y" | "yes" => Some(Decision::Accept),
        "d" | "decline" | "n" | "no" => Some(Decision::Decline),
        _ => None,
    }
}

fn cmd_device_id(path: Option<PathBuf>) -> anyhow::Result<()> {
    let store = match path {
        Some(path) => FileIdentityStore::at(path),
        None => FileIdentityStore::new(),
    };

    match store.load_or_create() {
        Ok(id) => println!("{id}"),
        Err(e) => {
            eprintln!("Warning: {e}");
            println!("{} (ephemeral)", store.get_or_create());
        }
    }
    Ok(())
}

fn cmd_config(args: ServiceArgs, save: bool) -> anyhow::Result<()> {
    let config = resolve_config(args)?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", AgreementConfig::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);

    if save {
        config.save()?;
        println!();
        println!("Saved to {:?}", AgreementConfig::config_path());
    }
    Ok(())
}

/// Merge the config file with command-line overrides.
fn resolve_config(args: ServiceArgs) -> anyhow::Result<AgreementConfig> {
    let base = match args.config {
        Some(ref path) => Some(
            AgreementConfig::load_from(path)
                .with_context(|| format!("failed to load config from {path:?}"))?,
        ),
        None => AgreementConfig::load().context("failed to load config")?,
    };

    let mut config = match base {
        Some(config) => config,
        None => {
            let (Some(route), Some(app_id), Some(app_version), Some(name)) = (
                args.route.clone(),
                args.app_id.clone(),
                args.app_version.clone(),
                args.name.clone(),
            ) else {
                bail!(
                    "no config file found; --route, --app-id, --app-version and --name are required"
                );
            };
            AgreementConfig::new(route, app_id, app_version, name)
        }
    };

    if let Some(route) = args.route {
        config.service_route = route;
    }
    if let Some(app_id) = args.app_id {
        config.app_id = app_id;
    }
    if let Some(app_version) = args.app_version {
        config.app_version = app_version;
    }
    if let Some(name) = args.name {
        config.content_name = name;
    }
    if let Some(lang) = args.lang {
        config.language_tag = lang;
    }
    if let Some(device_id) = args.device_id {
        config.device_id = Some(device_id);
    }
    if let Some(ms) = args.timeout_ms {
        config.timeout = Duration::from_millis(ms);
    }
    if let Some(retries) = args.max_retries {
        config.max_retries = retries;
    }
    if let Some(ms) = args.retry_backoff_ms {
        config.retry_backoff = Duration::from_millis(ms);
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agreement_kit::{
        AgreementAction, AgreementService, ApiError, LocalizedText, RawAgreementPayload,
        RequestContext, TransportError,
    };
    use async_trait::async_trait;

    struct StubService {
        payload: Result<RawAgreementPayload, ApiError>,
    }

    #[async_trait]
    impl AgreementService for StubService {
        async fn fetch_document(
            &self,
            _ctx: &RequestContext,
            _content_name: &str,
        ) -> Result<RawAgreementPayload, ApiError> {
            self.payload.clone()
        }

        async fn submit_action(
            &self,
            _ctx: &RequestContext,
            _item_id: &str,
            _action: AgreementAction,
        ) -> Result<(), ApiError> {
            Ok(())
        }
    }

    fn stub_controller(payload: Result<RawAgreementPayload, ApiError>) -> AgreementController {
        AgreementController::with_config(
            Arc::new(StubService { payload }),
            Arc::new(FixedIdentity("device-1".to_string())),
            AgreementConfig::new("https://x/api", "A", "1.0.0", "Privacy"),
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_fetched_document_after_view_report() {
        let controller = stub_controller(Ok(RawAgreementPayload {
            id: Some("42".to_string()),
            title: Some(vec![LocalizedText::new("en", "T")]),
            ..Default::default()
        }));

        controller.fetch().await;
        // Let the view report land before the host looks.
        controller.flush_reports().await;
        assert!(!matches!(controller.state(), ControllerState::ShowView(_)));

        let document = fetched_document(&controller).unwrap().unwrap();
        assert_eq!(document.id, "42");
        assert_eq!(document.title.as_deref(), Some("T"));
    }

    #[tokio::test]
    async fn test_fetched_document_without_content() {
        let controller = stub_controller(Ok(RawAgreementPayload::default()));
        controller.fetch().await;
        assert!(fetched_document(&controller).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetched_document_reports_fetch_error() {
        let controller = stub_controller(Err(ApiError::from(TransportError::Timeout)));
        controller.fetch().await;
        assert!(fetched_document(&controller).is_err());
    }

    #[test]
    fn test_parse_decision() {
        assert_eq!(parse_decision("a\n"), Some(Decision::Accept));
        assert_eq!(parse_decision(" Yes "), Some(Decision::Accept));
        assert_eq!(parse_decision("d\n"), Some(Decision::Decline));
        assert_eq!(parse_decision("no"), Some(Decision::Decline));
        // Stray input is asked again, never taken as a decline.
        assert_eq!(parse_decision("\n"), None);
        assert_eq!(parse_decision("maybe"), None);
    }

    #[test]
    fn test_resolve_config_from_args() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        AgreementConfig::new("https://x/api", "A", "1.0.0", "Privacy")
            .save_to(&path)
            .unwrap();

        let config = resolve_config(ServiceArgs {
            config: Some(path),
            lang: Some("fa".to_string()),
            timeout_ms: Some(750),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(config.app_id, "A");
        assert_eq!(config.language_tag, "fa");
        assert_eq!(config.timeout, Duration::from_millis(750));
    }

    #[test]
    fn test_resolve_config_rejects_bad_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        AgreementConfig::new("https://x/api", "A", "1.0.0", "Privacy")
            .save_to(&path)
            .unwrap();

        let result = resolve_config(ServiceArgs {
            config: Some(path),
            route: Some("not-a-url".to_string()),
            ..Default::default()
        });
        assert!(result.is_err());
    }
}
