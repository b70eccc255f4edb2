use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use scout_actors::{Response, ResponseBody};
use scout_common::observability::{init_logging, LogConfig, LogFormat};
use scout_config::{default_config_path, ScoutConfig, ScoutConfigLoader};
use serde_json::{json, Value};
use url::Url;
use uuid::Uuid;
use wiring::{PageArgs, Scout};

mod wiring;

/// Capture domain names from HTML pages and rank them with a language model.
#[derive(Debug, Parser)]
#[command(name = "domain-scout", version)]
struct Cli {
    /// YAML configuration file. Defaults to the per-user config if present.
    #[arg(long, env = "SCOUT_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Args)]
struct PageOpts {
    /// HTML file holding the page.
    page: PathBuf,
    /// URL the page was served from; relative links resolve against it.
    #[arg(long)]
    url: Option<Url>,
}

impl From<PageOpts> for PageArgs {
    fn from(o: PageOpts) -> Self {
        PageArgs {
            path: o.page,
            url: o.url,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Extract and print domains.
    Capture(PageOpts),
    /// Auto-capture: print newly seen domains whenever the file changes.
    Watch(PageOpts),
    /// Extract, then apply the stored filters.
    Filter(PageOpts),
    /// Extract, filter, analyze and save the result to history.
    Analyze {
        #[command(flatten)]
        page: PageOpts,
        #[arg(long)]
        provider: String,
        /// Defaults to the stored custom prompt.
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Probe connectivity with the stored key.
    Test {
        #[arg(long)]
        provider: String,
    },
    /// Persist whether auto-capture resumes on start.
    Auto {
        #[arg(value_enum)]
        state: Toggle,
    },
    #[command(subcommand)]
    Key(KeyCmd),
    #[command(subcommand)]
    Prompt(PromptCmd),
    #[command(subcommand)]
    Filters(FiltersCmd),
    #[command(subcommand)]
    Prefs(PrefsCmd),
    #[command(subcommand)]
    History(HistoryCmd),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Debug, Subcommand)]
enum KeyCmd {
    Set { provider: String, key: String },
    Get { provider: String },
}

#[derive(Debug, Subcommand)]
enum PromptCmd {
    Set { text: String },
    Get,
}

#[derive(Debug, Subcommand)]
enum FiltersCmd {
    Show,
    /// Replace the filter settings with a JSON object, e.g. `{"onlyCom":true}`.
    Set { json: String },
}

#[derive(Debug, Subcommand)]
enum PrefsCmd {
    Show,
    Set {
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        tab: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum HistoryCmd {
    List,
    Show { id: Uuid },
    Search { term: String },
    Clear,
}

fn load_config(path: Option<&PathBuf>) -> Result<ScoutConfig> {
    let loader = match (path, default_config_path()) {
        (Some(p), _) => ScoutConfigLoader::new().with_file(p),
        (None, Some(p)) => ScoutConfigLoader::new().with_optional_file(p),
        (None, None) => ScoutConfigLoader::new(),
    };
    Ok(loader.load()?)
}

fn print(resp: &Response) -> Result<bool> {
    println!("{}", serde_json::to_string_pretty(resp)?);
    Ok(resp.success)
}

/// Domains carried by a capture or filter response.
fn domains_of(resp: &Response) -> Vec<String> {
    match &resp.body {
        Some(ResponseBody::Domains { domains, .. } | ResponseBody::Filtered { domains, .. }) => {
            domains.clone()
        }
        _ => Vec::new(),
    }
}

async fn analyze(scout: &Scout, provider: String, prompt: Option<String>) -> Result<Response> {
    let captured = scout.ask(json!({"type": "captureDomainsManually"})).await?;
    if !captured.success {
        return Ok(captured);
    }
    let filtered = scout
        .ask(json!({"type": "applyFilters", "domains": domains_of(&captured)}))
        .await?;
    let domains = domains_of(&filtered);
    if domains.is_empty() {
        return Ok(Response::failure("No domains to analyze"));
    }

    let prompt = match prompt {
        Some(p) => p,
        None => match scout.ask(json!({"type": "getCustomPrompt"})).await?.body {
            Some(ResponseBody::Prompt { prompt }) => prompt,
            _ => scout_llm::DEFAULT_PROMPT.to_string(),
        },
    };

    let analysis = scout
        .ask(json!({
            "type": "sendDomainsToAI",
            "provider": provider,
            "domains": domains,
            "prompt": prompt,
        }))
        .await?;
    let Some(ResponseBody::Analysis { data, usage }) = &analysis.body else {
        return Ok(analysis);
    };
    let saved = scout
        .ask(json!({
            "type": "saveToHistory",
            "entry": {
                "provider": provider.trim().to_ascii_lowercase(),
                "prompt": prompt,
                "domains": domains,
                "result": data,
                "usage": usage,
            }
        }))
        .await?;
    if !saved.success {
        tracing::warn!(message = ?saved.message, "app.history_not_saved");
    }
    Ok(analysis)
}

async fn watch(scout: &mut Scout) -> Result<bool> {
    let resumed = scout.capture.restore(&scout.store).await?;
    if !resumed {
        let resp = scout
            .ask(json!({"type": "toggleAutoCapture", "enabled": true}))
            .await?;
        if !print(&resp)? {
            return Ok(false);
        }
    }
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = scout.events.recv() => match event {
                Some(detected) => println!("{}", serde_json::to_string(&detected)?),
                None => break,
            },
        }
    }
    Ok(true)
}

async fn history(scout: &Scout, cmd: HistoryCmd) -> Result<Response> {
    let resp = match cmd {
        HistoryCmd::List => scout.ask(json!({"type": "getHistory"})).await?,
        HistoryCmd::Clear => scout.ask(json!({"type": "clearHistory"})).await?,
        HistoryCmd::Show { id } => match scout.store.history_entry(id).await? {
            Some(entry) => Response::with_body(ResponseBody::Entry { entry }),
            None => Response::failure(format!("No history entry {id}")),
        },
        HistoryCmd::Search { term } => {
            let history = scout.store.search_history(&term).await?;
            Response::with_body(ResponseBody::History { history })
        }
    };
    Ok(resp)
}

async fn run(cli: Cli, cfg: ScoutConfig) -> Result<bool> {
    let page = match &cli.command {
        Command::Capture(p) | Command::Watch(p) | Command::Filter(p) => Some(PageArgs {
            path: p.page.clone(),
            url: p.url.clone(),
        }),
        Command::Analyze { page, .. } => Some(PageArgs {
            path: page.page.clone(),
            url: page.url.clone(),
        }),
        _ => None,
    };
    let mut scout = wiring::build(&cfg, page).await?;

    let resp = match cli.command {
        Command::Watch(_) => {
            let ok = watch(&mut scout).await?;
            scout.shutdown().await?;
            return Ok(ok);
        }
        Command::Capture(_) => scout.ask(json!({"type": "captureDomainsManually"})).await?,
        Command::Filter(_) => {
            let captured = scout.ask(json!({"type": "captureDomainsManually"})).await?;
            if captured.success {
                scout
                    .ask(json!({"type": "applyFilters", "domains": domains_of(&captured)}))
                    .await?
            } else {
                captured
            }
        }
        Command::Analyze {
            provider, prompt, ..
        } => analyze(&scout, provider, prompt).await?,
        Command::Test { provider } => {
            scout
                .ask(json!({"type": "testApiConnection", "provider": provider}))
                .await?
        }
        Command::Auto { state } => {
            let enabled = matches!(state, Toggle::On);
            scout
                .ask(json!({"type": "toggleAutoCapture", "enabled": enabled}))
                .await?
        }
        Command::Key(KeyCmd::Set { provider, key }) => {
            scout
                .ask(json!({"type": "saveApiKey", "provider": provider, "apiKey": key}))
                .await?
        }
        Command::Key(KeyCmd::Get { provider }) => {
            scout
                .ask(json!({"type": "getApiKey", "provider": provider}))
                .await?
        }
        Command::Prompt(PromptCmd::Set { text }) => {
            scout
                .ask(json!({"type": "saveCustomPrompt", "prompt": text}))
                .await?
        }
        Command::Prompt(PromptCmd::Get) => scout.ask(json!({"type": "getCustomPrompt"})).await?,
        Command::Filters(FiltersCmd::Show) => {
            scout.ask(json!({"type": "getFilterSettings"})).await?
        }
        Command::Filters(FiltersCmd::Set { json: raw }) => {
            let settings: Value =
                serde_json::from_str(&raw).map_err(|e| anyhow!("filter settings: {e}"))?;
            scout
                .ask(json!({"type": "saveFilterSettings", "settings": settings}))
                .await?
        }
        Command::Prefs(PrefsCmd::Show) => scout.ask(json!({"type": "getPreferences"})).await?,
        Command::Prefs(PrefsCmd::Set { language, tab }) => {
            let mut prefs = scout.store.preferences().await?;
            if let Some(language) = language {
                prefs.language = language;
            }
            if let Some(tab) = tab {
                prefs.current_tab = tab;
            }
            scout
                .ask(json!({"type": "savePreferences", "preferences": prefs}))
                .await?
        }
        Command::History(cmd) => history(&scout, cmd).await?,
    };

    let ok = print(&resp)?;
    scout.shutdown().await?;
    Ok(ok)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // 1) Load config (env wins)
    let cfg = load_config(cli.config.as_ref())?;

    let format: LogFormat = cfg.logging.format.parse().map_err(|e: String| anyhow!(e))?;
    init_logging(LogConfig {
        log_dir: cfg.log_dir(),
        emit_stderr: cfg.logging.stderr,
        format,
        default_filter: cfg.logging.level.clone(),
        ..LogConfig::default()
    })?;

    let ok = run(cli, cfg).await?;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
