use anyhow::{Context, Result, anyhow, bail};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use motegao_client::{ApiClient, ApiError, GoogleProfile};
use motegao_core::config::{CONFIG_FILE, Config, SESSION_DB_FILE, config_dir};
use motegao_core::data::{AuthProvider, Session, SessionStore};
use motegao_core::persistence::{ProjectBridge, SaveStatus, graph_from_document};
use motegao_core::{
    Canvas, GraphState, Notice, NoticeLevel, Notifier, TaskEvent, ToolConfig, ToolKind, ToolResult,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;
use url::Url;

// ----------------------------------------------------------------------------
// Argument parsing helpers
// ----------------------------------------------------------------------------

/// Parse `80,443, 8080` into a list of ports
pub fn parse_port_list(raw: &str) -> Result<Vec<u16>, String> {
    parse_u16_list(raw, "port")
}

/// Parse `404,500` into a list of HTTP status codes
pub fn parse_status_list(raw: &str) -> Result<Vec<u16>, String> {
    parse_u16_list(raw, "status code")
}

fn parse_u16_list(raw: &str, what: &str) -> Result<Vec<u16>, String> {
    let values: Vec<u16> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u16>().map_err(|_| format!("Invalid {} '{}'", what, s)))
        .collect::<Result<_, _>>()?;
    if values.is_empty() {
        return Err(format!("No {}s given", what));
    }
    Ok(values)
}

/// Parse `1-1024` into an inclusive port range
pub fn parse_ports_range(raw: &str) -> Result<(u16, u16), String> {
    let (start, end) = raw
        .split_once('-')
        .ok_or_else(|| format!("Port range '{}' must look like START-END", raw))?;
    let start: u16 = start
        .trim()
        .parse()
        .map_err(|_| format!("Invalid range start '{}'", start.trim()))?;
    let end: u16 = end
        .trim()
        .parse()
        .map_err(|_| format!("Invalid range end '{}'", end.trim()))?;
    if start > end {
        return Err(format!("Port range {}-{} is reversed", start, end));
    }
    Ok((start, end))
}

/// Tool options as given on the command line; unset fields keep the tool's
/// defaults.
#[derive(Debug, Default, Clone)]
pub struct ScanOptions {
    pub wordlist: Option<u8>,
    pub threads: Option<u32>,
    pub timing: Option<u8>,
    pub options: Vec<String>,
    pub all_ports: bool,
    pub ports: Option<Vec<u16>>,
    pub ports_range: Option<(u16, u16)>,
    pub exclude_status: Option<Vec<u16>>,
}

impl ScanOptions {
    pub fn from_args(args: &ArgMatches) -> Result<Self, String> {
        Ok(Self {
            wordlist: args.get_one::<u8>("wordlist").copied(),
            threads: args.get_one::<u32>("threads").copied(),
            timing: args.get_one::<u8>("timing").copied(),
            options: args
                .get_many::<String>("option")
                .map(|vals| vals.cloned().collect())
                .unwrap_or_default(),
            all_ports: args.get_flag("all-ports"),
            ports: args
                .get_one::<String>("ports")
                .map(|s| parse_port_list(s))
                .transpose()?,
            ports_range: args
                .get_one::<String>("ports-range")
                .map(|s| parse_ports_range(s))
                .transpose()?,
            exclude_status: args
                .get_one::<String>("exclude-status")
                .map(|s| parse_status_list(s))
                .transpose()?,
        })
    }
}

/// Start from the tool's defaults and apply whatever the user set
pub fn build_tool_config(tool: ToolKind, opts: &ScanOptions) -> ToolConfig {
    match ToolConfig::default_for(tool) {
        ToolConfig::Subdomain { wordlist, threads } => ToolConfig::Subdomain {
            wordlist: opts.wordlist.unwrap_or(wordlist),
            threads: opts.threads.unwrap_or(threads),
        },
        ToolConfig::Nmap {
            timing_template,
            options,
            all_ports,
            ports_range,
            ports_specific,
        } => {
            let custom_ports = opts.all_ports || opts.ports.is_some() || opts.ports_range.is_some();
            ToolConfig::Nmap {
                timing_template: opts.timing.unwrap_or(timing_template),
                options: if opts.options.is_empty() {
                    options
                } else {
                    opts.options.clone()
                },
                all_ports: if custom_ports { opts.all_ports } else { all_ports },
                ports_range: if custom_ports { opts.ports_range } else { ports_range },
                ports_specific: if custom_ports {
                    opts.ports.clone()
                } else {
                    ports_specific
                },
            }
        }
        ToolConfig::Pathfinder {
            wordlist,
            threads,
            exclude_status,
        } => ToolConfig::Pathfinder {
            wordlist: opts.wordlist.unwrap_or(wordlist),
            threads: opts.threads.unwrap_or(threads),
            exclude_status: opts.exclude_status.clone().unwrap_or(exclude_status),
        },
    }
}

// ----------------------------------------------------------------------------
// Rendering helpers
// ----------------------------------------------------------------------------

pub fn print_banner() {
    println!(
        "{}",
        r#"
  __  __       _
 |  \/  | ___ | |_ ___  __ _  __ _  ___
 | |\/| |/ _ \| __/ _ \/ _` |/ _` |/ _ \
 | |  | | (_) | ||  __/ (_| | (_| | (_) |
 |_|  |_|\___/ \__\___|\__, |\__,_|\___/
                       |___/
"#
        .bright_cyan()
        .bold()
    );
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

pub fn render_notice(notice: &Notice) -> String {
    match notice.level {
        NoticeLevel::Info => format!("{} {}", "ℹ".blue(), notice.message),
        NoticeLevel::Warn => format!("{} {}", "⚠".yellow().bold(), notice.message.yellow()),
        NoticeLevel::Error => format!("{} {}", "✗".red().bold(), notice.message.red()),
    }
}

/// Plain-text body for a finished scan
pub fn render_result(result: &ToolResult) -> String {
    if result.is_error() {
        return "Error: Invalid command. Check configuration.".to_string();
    }
    let entries = result.entries();
    if entries.is_empty() {
        return match result.kind() {
            ToolKind::Subdomain => "No subdomains found".to_string(),
            ToolKind::Nmap => "Scan completed, no open ports".to_string(),
            ToolKind::Pathfinder => "No paths found".to_string(),
        };
    }
    entries
        .iter()
        .map(|e| format!("  • {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One line per domain with the scans hanging off it
pub fn render_graph_summary(graph: &GraphState) -> String {
    let mut out = String::new();
    if graph.is_empty() {
        out.push_str("(empty canvas)\n");
        return out;
    }
    for domain in graph.domains() {
        let node_id = domain.node_id();
        out.push_str(&format!("🎯 {} [{}]\n", domain.name, node_id));
        for edge in graph.edges().iter().filter(|e| e.source == node_id) {
            if let Some(node) = graph.node(&edge.target) {
                let title = node.label.lines().next().unwrap_or(node.id.as_str());
                let count = node.result().map_or(0, |r| r.entries().len());
                out.push_str(&format!("   └─ {} ({}) [{}]\n", title, count, node.id));
            }
        }
    }
    let orphans = graph
        .nodes()
        .iter()
        .filter(|n| n.result().is_some())
        .filter(|n| {
            !graph
                .edges()
                .iter()
                .any(|e| e.target == n.id && graph.node(&e.source).is_some())
        })
        .count();
    if orphans > 0 {
        out.push_str(&format!("{} result(s) not attached to a domain\n", orphans));
    }
    out
}

fn flush_notices(spinner: &ProgressBar, notices: &mut UnboundedReceiver<Notice>) {
    while let Ok(notice) = notices.try_recv() {
        spinner.println(render_notice(&notice));
    }
}

fn print_notices(notices: &mut UnboundedReceiver<Notice>) {
    while let Ok(notice) = notices.try_recv() {
        eprintln!("{}", render_notice(&notice));
    }
}

fn prompt(msg: &str) -> Result<String> {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_string())
}

// ----------------------------------------------------------------------------
// Context
// ----------------------------------------------------------------------------

/// What every command needs: resolved paths, config and an API client
pub struct AppContext {
    pub config_dir: PathBuf,
    pub config: Config,
}

impl AppContext {
    pub fn from_args(args: &ArgMatches) -> Result<Self> {
        let raw_dir = args
            .get_one::<String>("config-dir")
            .map(String::as_str)
            .unwrap_or(motegao_core::config::DEFAULT_CONFIG_DIR);
        let config_dir = config_dir(raw_dir);
        let mut config = Config::load(&config_dir.join(CONFIG_FILE))
            .with_context(|| format!("Failed to load config from {}", config_dir.display()))?;
        if let Some(url) = args.get_one::<Url>("api-url") {
            config.api.base_url = url.to_string();
        }
        debug!("Using API at {}", config.api.base_url);
        Ok(Self { config_dir, config })
    }

    pub fn session_path(&self) -> PathBuf {
        self.config_dir.join(SESSION_DB_FILE)
    }

    fn open_sessions(&self) -> Result<SessionStore> {
        std::fs::create_dir_all(&self.config_dir)?;
        SessionStore::new(&self.session_path()).context("Failed to open session database")
    }

    fn anonymous_client(&self) -> Result<ApiClient> {
        Ok(ApiClient::with_timeout(
            &self.config.api.base_url,
            self.config.api.timeout_secs,
        )?)
    }

    /// Client carrying the stored session token
    pub fn client(&self) -> Result<ApiClient> {
        let sessions = self.open_sessions()?;
        let session = sessions
            .current()?
            .ok_or_else(|| anyhow!("Not logged in. Run `motegao login` first."))?;
        Ok(self.anonymous_client()?.with_token(session.access_token))
    }
}

// ----------------------------------------------------------------------------
// Command handlers
// ----------------------------------------------------------------------------

pub fn handle_init(ctx: &AppContext, args: &ArgMatches) -> Result<()> {
    print_divider();
    println!("{}", "  MOTEGAO INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let force = args.get_flag("force");
    let config_path = ctx.config_dir.join(CONFIG_FILE);

    if config_path.exists() && !force {
        println!(
            "{} Keeping existing config: {}",
            "→".blue(),
            config_path.display().to_string().bright_white()
        );
    } else {
        ctx.config.save(&config_path)?;
        println!(
            "{} Config written: {}",
            "✓".green().bold(),
            config_path.display().to_string().bright_white()
        );
    }

    let session_path = ctx.session_path();
    if force && SessionStore::exists(&session_path) {
        println!("{} Deleting existing session database (force mode)", "→".yellow().bold());
        SessionStore::drop(&session_path)?;
        println!("{} Existing session database removed", "✓".green().bold());
    }

    ctx.open_sessions()?;
    println!(
        "{} Session database: {}",
        "✓".green().bold(),
        ctx.session_path().display().to_string().bright_white()
    );
    println!();
    Ok(())
}

/// How a user proves who they are to the backend
pub enum Credentials {
    Password { username: String, password: String },
    Google(GoogleProfile),
}

impl Credentials {
    fn username(&self) -> &str {
        match self {
            Credentials::Password { username, .. } => username,
            Credentials::Google(profile) => &profile.email,
        }
    }

    fn provider(&self) -> AuthProvider {
        match self {
            Credentials::Password { .. } => AuthProvider::Password,
            Credentials::Google(_) => AuthProvider::Google,
        }
    }
}

/// Exchange credentials for a token and store it as the current session
pub async fn sign_in(ctx: &AppContext, credentials: &Credentials) -> Result<Session> {
    let client = ctx.anonymous_client()?;
    let attempt = match credentials {
        Credentials::Password { username, password } => client.login(username, password).await,
        Credentials::Google(profile) => client.google_login(profile).await,
    };
    let token = attempt.map_err(|e| login_error(&ctx.config.api.base_url, e))?;

    let sessions = ctx.open_sessions()?;
    sessions.save_session(credentials.username(), credentials.provider(), &token.access_token)?;
    sessions
        .current()?
        .ok_or_else(|| anyhow!("Session was not stored"))
}

fn login_error(base_url: &str, e: ApiError) -> anyhow::Error {
    if e.is_rejection() {
        anyhow!("Login rejected: {}", e)
    } else {
        anyhow!("Could not reach {}: {}", base_url, e)
    }
}

pub async fn handle_login(ctx: &AppContext, args: &ArgMatches) -> Result<()> {
    let username = required(args, "username")?.to_string();
    let password = match args.get_one::<String>("password") {
        Some(p) => p.clone(),
        None => prompt("Password:")?,
    };

    let session = sign_in(ctx, &Credentials::Password { username, password }).await?;
    println!("{} Logged in as {}", "✓".green().bold(), session.username.bright_white());
    Ok(())
}

pub async fn handle_google_login(ctx: &AppContext, args: &ArgMatches) -> Result<()> {
    let profile = GoogleProfile {
        email: required(args, "email")?.to_string(),
        name: required(args, "name")?.to_string(),
        google_id: required(args, "google-id")?.to_string(),
        picture: args.get_one::<String>("picture").cloned(),
    };

    let session = sign_in(ctx, &Credentials::Google(profile)).await?;
    println!(
        "{} Logged in with Google as {}",
        "✓".green().bold(),
        session.username.bright_white()
    );
    Ok(())
}

pub fn handle_logout(ctx: &AppContext) -> Result<()> {
    let path = ctx.session_path();
    if !SessionStore::exists(&path) {
        println!("{} No stored session", "→".blue());
        return Ok(());
    }
    let removed = SessionStore::new(&path)?.clear()?;
    println!("{} Logged out ({} session(s) removed)", "✓".green().bold(), removed);
    Ok(())
}

fn project_bridge(ctx: &AppContext) -> Result<ProjectBridge> {
    Ok(ProjectBridge::new(ctx.client()?, Notifier::silent()))
}

pub async fn handle_project_list(ctx: &AppContext) -> Result<()> {
    let projects = project_bridge(ctx)?.list().await?;
    if projects.is_empty() {
        println!("No projects yet. Create one with `motegao project create`.");
        return Ok(());
    }
    for project in projects {
        println!(
            "{}  {}  {} nodes  {}",
            project.id.cyan(),
            project.name.bright_white().bold(),
            project.nodes.len(),
            project.last_modified.as_deref().unwrap_or("-").dimmed()
        );
    }
    Ok(())
}

pub async fn handle_project_create(ctx: &AppContext, args: &ArgMatches) -> Result<()> {
    let name = args.get_one::<String>("name").map(String::as_str);
    let project = project_bridge(ctx)?.create(name).await?;
    println!(
        "{} Created {} ({})",
        "✓".green().bold(),
        project.name.bright_white(),
        project.id.cyan()
    );
    Ok(())
}

pub async fn handle_project_rename(ctx: &AppContext, args: &ArgMatches) -> Result<()> {
    let id = required(args, "id")?;
    let name = required(args, "name")?;
    project_bridge(ctx)?.rename(id, name).await?;
    println!("{} Renamed {} to {}", "✓".green().bold(), id.cyan(), name.bright_white());
    Ok(())
}

pub async fn handle_project_delete(ctx: &AppContext, args: &ArgMatches) -> Result<()> {
    let id = required(args, "id")?;
    project_bridge(ctx)?.delete(id).await?;
    println!("{} Deleted {}", "✓".green().bold(), id.cyan());
    Ok(())
}

pub async fn handle_project_show(ctx: &AppContext, args: &ArgMatches) -> Result<()> {
    let id = required(args, "id")?;
    let document = ctx.client()?.get_project(id).await?;
    let graph = graph_from_document(&document);

    if args.get_flag("dot") {
        print!("{}", graph.to_dot());
        return Ok(());
    }
    println!("{} ({})", document.name.bright_white().bold(), document.id.cyan());
    print!("{}", render_graph_summary(&graph));
    Ok(())
}

pub async fn handle_scan(ctx: &AppContext, args: &ArgMatches) -> Result<()> {
    let domain = required(args, "domain")?;
    let tool: ToolKind = required(args, "tool")?
        .parse()
        .map_err(|e: String| anyhow!(e))?;
    let opts = ScanOptions::from_args(args).map_err(|e| anyhow!(e))?;
    let tool_config = build_tool_config(tool, &opts);

    let (notifier, mut notices) = Notifier::channel();
    let mut canvas = Canvas::new(ctx.client()?, &ctx.config, notifier);

    if let Some(project_id) = args.get_one::<String>("project")
        && !canvas.open_project(project_id).await
    {
        println!("{} Project {} not found; starting empty", "→".yellow(), project_id.cyan());
    }

    if canvas.graph().find_domain(domain).is_some() {
        canvas.select_domain_named(domain)?;
    } else {
        let node_id = canvas.add_domain(domain).await?;
        canvas.select_domain(&node_id)?;
    }
    print_notices(&mut notices);

    canvas.run_tool(&tool_config).await?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("{} running against {}", tool.display_name(), domain));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut finished: Option<ToolResult> = None;

    loop {
        tokio::select! {
            event = canvas.next_event() => match event {
                None => break,
                Some(TaskEvent::Progress { progress, .. }) => {
                    spinner.set_message(format!("{} {}%", tool.display_name(), progress));
                }
                Some(TaskEvent::PollFailed { attempts, error, .. }) => {
                    spinner.set_message(format!(
                        "{} (status check failed {} time(s): {})",
                        tool.display_name(),
                        attempts,
                        error
                    ));
                }
                Some(TaskEvent::Completed { result, .. }) => {
                    finished = Some(result);
                    break;
                }
                Some(TaskEvent::Failed { error, .. }) => {
                    flush_notices(&spinner, &mut notices);
                    spinner.finish_and_clear();
                    save_if_needed(&mut canvas).await;
                    print_notices(&mut notices);
                    bail!("{} failed: {}", tool.display_name(), error);
                }
            },
            _ = &mut ctrl_c => {
                spinner.set_message("Cancelling...");
                match canvas.cancel_tool(tool).await {
                    Ok(Some(node_id)) => {
                        finished = canvas.graph().node(&node_id).and_then(|n| n.result()).cloned();
                    }
                    Ok(None) => {}
                    Err(e) => spinner.println(format!("{} {}", "✗".red().bold(), e)),
                }
                break;
            }
        }
        flush_notices(&spinner, &mut notices);
    }
    spinner.finish_and_clear();

    match &finished {
        Some(result) => {
            println!(
                "{} {} on {}",
                "✓".green().bold(),
                tool.display_name().bright_white().bold(),
                domain.bright_white()
            );
            println!("{}", render_result(result));
        }
        None => println!("{} {} stopped without a result", "→".yellow(), tool.display_name()),
    }

    save_if_needed(&mut canvas).await;
    canvas.close().await;
    print_notices(&mut notices);
    Ok(())
}

async fn save_if_needed(canvas: &mut Canvas) {
    if canvas.project_id().is_none() || canvas.save_status() == SaveStatus::Saved {
        return;
    }
    match canvas.save().await {
        Ok(()) => println!("{} Project saved", "✓".green().bold()),
        // The failure already went out as a notice
        Err(e) => debug!("Final save failed: {}", e),
    }
}

fn required<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a str> {
    args.get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("--{} is required", name))
}

