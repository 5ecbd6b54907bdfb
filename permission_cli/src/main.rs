use clap::{Parser, Subcommand};
use permission_core::{
    queue::EventReceiver,
    sim::{CallbackLog, CallbackRecord, SimScreen},
    AuthorizationOutcome, CapabilitySet, PermissionConfig, Permissions, Platform, QueueEvent,
    QueueEventKind,
};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn Error>>;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "permission-cli", version = "0.1.0")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print queue events and results as JSON lines
    #[arg(long, global = true)]
    json: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the identifiers a media capability set resolves to
    Resolve {
        /// Categories joined with '+', e.g. images+video
        #[arg(long)]
        media: String,
        /// Override the configured platform level
        #[arg(long)]
        level: Option<u32>,
    },
    /// Submit one media request to a simulated screen
    Request {
        #[arg(long)]
        media: String,
        /// Identifiers the simulated user denies
        #[arg(long)]
        deny: Vec<String>,
        /// Identifiers granted before the request is made
        #[arg(long)]
        granted: Vec<String>,
        #[arg(long)]
        level: Option<u32>,
    },
    /// Run three requests: one granted, one partially denied, one whose
    /// screen is destroyed before its turn
    Demo,
}

fn load_config(path: Option<&PathBuf>, level: Option<u32>) -> CliResult<PermissionConfig> {
    let mut config = match path {
        Some(path) => PermissionConfig::from_file(path)?,
        None => PermissionConfig::default(),
    };
    if let Some(level) = level {
        config.platform.level = level;
    }
    config.validate()?;
    Ok(config)
}

async fn next_event(events: &mut EventReceiver) -> CliResult<QueueEvent> {
    Ok(timeout(EVENT_TIMEOUT, events.recv()).await??)
}

/// Print events until `pred` matches one, returning it
async fn follow_until<F>(events: &mut EventReceiver, json: bool, mut pred: F) -> CliResult<QueueEvent>
where
    F: FnMut(&QueueEvent) -> bool,
{
    loop {
        let event = next_event(events).await?;
        print_event(&event, json)?;
        if pred(&event) {
            return Ok(event);
        }
    }
}

/// Join the coordinator thread off the async runtime
async fn shut_down(permissions: Permissions) -> CliResult<()> {
    tokio::task::spawn_blocking(move || permissions.shutdown()).await?;
    Ok(())
}

fn print_event(event: &QueueEvent, json: bool) -> CliResult<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
    } else {
        println!("  [{}] {}", short_id(event), describe(&event.kind));
    }
    Ok(())
}

fn short_id(event: &QueueEvent) -> String {
    event.request_id.to_string().chars().take(8).collect()
}

fn describe(kind: &QueueEventKind) -> String {
    match kind {
        QueueEventKind::Queued => "queued".to_string(),
        QueueEventKind::GrantedImmediately => "already granted".to_string(),
        QueueEventKind::Dropped { reason } => format!("dropped ({:?})", reason),
        QueueEventKind::Launched => "prompt shown".to_string(),
        QueueEventKind::Completed { outcome } => format!("completed: {}", describe_outcome(outcome)),
        QueueEventKind::Cancelled => "cancelled, owner destroyed".to_string(),
        QueueEventKind::Abandoned => "abandoned".to_string(),
    }
}

fn describe_outcome(outcome: &AuthorizationOutcome) -> String {
    match outcome {
        AuthorizationOutcome::Granted => "granted".to_string(),
        AuthorizationOutcome::Denied(denied) => {
            let denied: Vec<&str> = denied.iter().map(String::as_str).collect();
            format!("denied {}", denied.join(", "))
        }
    }
}

fn print_callbacks(records: &[CallbackRecord], json: bool) -> CliResult<()> {
    for record in records {
        if json {
            let line = serde_json::json!({
                "callback": record.label,
                "outcome": record.outcome,
                "on_coordinator": record.on_coordinator,
            });
            println!("{}", line);
        } else {
            println!("{}: {}", record.label, describe_outcome(&record.outcome));
        }
    }
    Ok(())
}

fn resolve(config: PermissionConfig, media: &str, json: bool) -> CliResult<()> {
    let platform = Platform::new(config.platform)?;
    let set: CapabilitySet = media.parse()?;
    let identifiers = set.resolve(&platform);
    info!(level = platform.level(), capabilities = %set, "Resolved capability set");

    if json {
        println!("{}", serde_json::to_string(&identifiers)?);
    } else {
        println!("{} at level {}:", set, platform.level());
        for identifier in identifiers {
            println!("  {}", identifier);
        }
    }
    Ok(())
}

async fn request(
    config: PermissionConfig,
    media: &str,
    deny: Vec<String>,
    granted: Vec<String>,
    json: bool,
) -> CliResult<()> {
    let set: CapabilitySet = media.parse()?;
    let permissions = Permissions::new(config)?;
    let mut events = permissions.subscribe();
    let log = CallbackLog::new();

    let screen = SimScreen::resumed();
    for identifier in granted {
        screen.grants_handle().grant(identifier);
    }
    screen
        .registry_handle()
        .answer_with(move |identifier| !deny.iter().any(|d| d == identifier));

    let id = permissions.request_read_media(Permissions::screen(&screen), set, log.callback("request"));
    let event = follow_until(&mut events, json, |event| {
        event.request_id == id && event.is_terminal()
    })
    .await?;
    let delivered = !matches!(
        event.kind,
        QueueEventKind::Dropped { .. } | QueueEventKind::Cancelled | QueueEventKind::Abandoned
    );

    shut_down(permissions).await?;
    if delivered {
        print_callbacks(&log.records(), json)?;
    }
    Ok(())
}

async fn demo(config: PermissionConfig, json: bool) -> CliResult<()> {
    let permissions = Permissions::new(config)?;
    let mut events = permissions.subscribe();
    let log = CallbackLog::new();

    let screen = SimScreen::resumed();
    let short_lived = SimScreen::resumed();
    let registry = screen.registry_handle().clone();

    let a = permissions.request(
        Permissions::screen(&screen),
        ["demo.permission.A".to_string()].into(),
        log.callback("A"),
    );
    let b = permissions.request(
        Permissions::screen(&screen),
        ["demo.permission.B1".to_string(), "demo.permission.B2".to_string()].into(),
        log.callback("B"),
    );
    let c = permissions.request(
        Permissions::screen(&short_lived),
        ["demo.permission.C".to_string()].into(),
        log.callback("C"),
    );

    follow_until(&mut events, json, |event| {
        event.request_id == a && event.kind == QueueEventKind::Launched
    })
    .await?;
    short_lived.destroy();
    registry.respond_next(|_| true);

    follow_until(&mut events, json, |event| {
        event.request_id == b && event.kind == QueueEventKind::Launched
    })
    .await?;
    registry.respond_next(|identifier| identifier != "demo.permission.B2");

    follow_until(&mut events, json, |event| {
        event.request_id == c && event.is_terminal()
    })
    .await?;

    shut_down(permissions).await?;
    print_callbacks(&log.records(), json)?;
    Ok(())
}

async fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Resolve { media, level } => {
            let config = load_config(cli.config.as_ref(), level)?;
            resolve(config, &media, cli.json)
        }
        Commands::Request {
            media,
            deny,
            granted,
            level,
        } => {
            let config = load_config(cli.config.as_ref(), level)?;
            request(config, &media, deny, granted, cli.json).await
        }
        Commands::Demo => {
            let config = load_config(cli.config.as_ref(), None)?;
            demo(config, cli.json).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(cli).await {
        error!("Command failed: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_override_is_validated() {
        let config = load_config(None, Some(30)).unwrap();
        assert_eq!(config.platform.level, 30);
        assert!(load_config(None, Some(0)).is_err());
    }

    #[test]
    fn test_cli_parses_global_options() {
        let cli = Cli::parse_from([
            "permission-cli",
            "resolve",
            "--media",
            "images+video",
            "--level",
            "33",
            "--json",
        ]);
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::Resolve {
                level: Some(33),
                ..
            }
        ));
    }

    #[test]
    fn test_describe_denied_outcome() {
        let outcome = AuthorizationOutcome::Denied(["b".to_string(), "a".to_string()].into());
        assert_eq!(describe_outcome(&outcome), "denied a, b");
    }

    #[tokio::test]
    async fn test_demo_runs_to_completion() {
        demo(PermissionConfig::default(), true).await.unwrap();
    }
}
