mod gesture;
mod print;

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveTime, TimeDelta, Timelike, Utc};
use clap::{Args, Parser, Subcommand};
use intentlog::config::{Config, ConfigError};
use intentlog::db::PostgrestBackend;
use intentlog::error::{ErrorCode, StoreError};
use intentlog::model::{Intent, IntentPatch, IntentStatus, Tag, TagCategory, TagPatch};
use intentlog::services::auth::{self, AuthError, DEFAULT_PROVIDER, Session};
use intentlog::services::capture::{CaptureError, parse_capture};
use intentlog::services::day;
use intentlog::services::duration::parse_duration;
use intentlog::services::timer::{self, TIMER_TICK_SECS, TimerView};
use intentlog::state::Store;
use timeline::consts::SNAP_MINUTES;
use timeline::engine::{Action, Engine};
use timeline::render::{TextStyle, render_day};
use timeline::scale::Scale;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::print::short_id;

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;

/// Refresh the saved session when it expires within this window.
const SESSION_REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("no intent matches `{0}`")]
    UnknownIntent(String),
    #[error("`{0}` matches more than one intent; use more of the id")]
    AmbiguousIntent(String),
    #[error("no tag named `{0}`")]
    UnknownTag(String),
    #[error("no tag group named `{0}`")]
    UnknownGroup(String),
    #[error("invalid {what}: {value:?}")]
    InvalidArg { what: &'static str, value: String },
    #[error("not signed in; run `intentlog auth url` then `intentlog auth login`")]
    SignedOut,
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("terminal i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorCode for CliError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Config(e) => e.error_code(),
            Self::Store(e) => e.error_code(),
            Self::Capture(e) => e.error_code(),
            Self::Auth(e) => e.error_code(),
            Self::UnknownIntent(_) | Self::AmbiguousIntent(_) | Self::UnknownTag(_) | Self::UnknownGroup(_) => "E_CLI_LOOKUP",
            Self::InvalidArg { .. } => "E_CLI_ARG",
            Self::SignedOut => "E_CLI_SIGNED_OUT",
            Self::Json(_) => "E_CLI_JSON",
            Self::Io(_) => "E_CLI_IO",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.retryable(),
            Self::Auth(e) => e.retryable(),
            _ => false,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "intentlog", about = "Log what you are about to work on")]
struct Cli {
    /// Print JSON instead of text for list-style commands.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Quick capture, e.g. `Deep work 45m #Focus`.
    Capture {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, default_value_t = false)]
        private: bool,
    },
    List {
        /// Only intents with this tag.
        #[arg(long)]
        tag: Option<String>,
        /// Only intents starting on this day (YYYY-MM-DD).
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    Show {
        id: String,
    },
    Update(UpdateArgs),
    Delete {
        id: String,
    },
    /// Draw one day as a timeline, newest hour at the top.
    Day {
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Fit the whole day into this many rows.
        #[arg(long, conflicts_with = "zoom", value_parser = clap::value_parser!(i64).range(1..=1440))]
        rows: Option<i64>,
        /// Minutes per row.
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..=1440))]
        zoom: Option<i64>,
    },
    /// Move an intent to start at HH:MM on its day.
    Move {
        id: String,
        #[arg(long, value_parser = parse_clock)]
        at: NaiveTime,
    },
    /// Change how long an intent lasts.
    Resize {
        id: String,
        #[arg(long)]
        minutes: u32,
    },
    /// Show the in-progress intent's timer.
    Timer {
        /// Redraw every second until Ctrl-C.
        #[arg(long, default_value_t = false, conflicts_with = "complete")]
        watch: bool,
        /// Mark the in-progress intent completed.
        #[arg(long, default_value_t = false)]
        complete: bool,
    },
    Tag(TagCommand),
    Group(GroupCommand),
    Auth(AuthCommand),
}

#[derive(Args, Debug, Default)]
struct UpdateArgs {
    id: String,
    #[arg(long)]
    title: Option<String>,
    #[arg(long, conflicts_with = "clear_description")]
    description: Option<String>,
    #[arg(long, default_value_t = false)]
    clear_description: bool,
    /// `45m`, `1h 30m`, `1.5h` or plain minutes.
    #[arg(long, conflicts_with = "open_ended")]
    duration: Option<String>,
    /// Remove the duration.
    #[arg(long, default_value_t = false)]
    open_ended: bool,
    #[arg(long)]
    status: Option<IntentStatus>,
    #[arg(long)]
    private: Option<bool>,
    /// Replace the tags; comma separated names. Pass "" to clear.
    #[arg(long, value_delimiter = ',')]
    tags: Option<Vec<String>>,
}

#[derive(Args, Debug)]
struct TagCommand {
    #[command(subcommand)]
    command: TagSubcommand,
}

#[derive(Subcommand, Debug)]
enum TagSubcommand {
    List,
    Create {
        name: String,
        #[arg(long)]
        group: Option<String>,
    },
    Update {
        tag: String,
        #[arg(long)]
        name: Option<String>,
        /// Hex color, e.g. `#3b82f6`.
        #[arg(long)]
        color: Option<String>,
        #[arg(long, conflicts_with = "no_group")]
        group: Option<String>,
        #[arg(long, default_value_t = false)]
        no_group: bool,
    },
    Delete {
        tag: String,
    },
}

#[derive(Args, Debug)]
struct GroupCommand {
    #[command(subcommand)]
    command: GroupSubcommand,
}

#[derive(Subcommand, Debug)]
enum GroupSubcommand {
    List,
    Create {
        name: String,
        #[arg(long)]
        icon: Option<String>,
    },
}

#[derive(Args, Debug)]
struct AuthCommand {
    #[command(subcommand)]
    command: AuthSubcommand,
}

#[derive(Subcommand, Debug)]
enum AuthSubcommand {
    /// Print the URL that starts sign-in.
    Url {
        #[arg(long, default_value = DEFAULT_PROVIDER)]
        provider: String,
    },
    /// Finish sign-in with the URL the browser was redirected to.
    Login {
        redirect: String,
    },
    Whoami,
    Logout,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(code = e.error_code(), retryable = e.retryable(), "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = Config::from_env()?;
    match cli.command {
        Command::Auth(command) => run_auth(&config, command).await,
        command => {
            let mut store = open_store(&config).await?;
            run_command(&mut store, command, cli.json).await
        }
    }
}

async fn run_command(store: &mut Store, command: Command, json: bool) -> Result<(), CliError> {
    match command {
        Command::Capture { text, description, private } => run_capture(store, &text.join(" "), description, private).await,
        Command::List { tag, date } => run_list(store, tag.as_deref(), date, json),
        Command::Show { id } => {
            let id = resolve_intent(store, &id)?;
            let intent = store.intent(id).ok_or_else(|| CliError::UnknownIntent(id.to_string()))?;
            if json {
                return print_json(intent);
            }
            print_lines(print::intent_detail(intent));
            Ok(())
        }
        Command::Update(args) => {
            let id = resolve_intent(store, &args.id)?;
            let patch = build_patch(&args, store.tags())?;
            let updated = store.update_intent(id, patch).await?;
            println!("{}", print::intent_line(&updated));
            Ok(())
        }
        Command::Delete { id } => {
            let id = resolve_intent(store, &id)?;
            store.delete_intent(id).await?;
            println!("deleted {}", short_id(id));
            Ok(())
        }
        Command::Day { date, rows, zoom } => run_day(store, date, rows, zoom).await,
        Command::Move { id, at } => {
            let intent = store.intent(resolve_intent(store, &id)?).cloned();
            let intent = intent.ok_or(CliError::UnknownIntent(id))?;
            let mut engine = gesture::engine_for(intent.to_block());
            let minute = i64::from(at.hour() * 60 + at.minute());
            let actions = gesture::drag_to(&mut engine, intent.id, minute);
            apply_actions(store, &actions).await
        }
        Command::Resize { id, minutes } => {
            let id = resolve_intent(store, &id)?;
            let resized = store.update_intent(id, resize_patch(minutes)).await?;
            println!("{}", print::intent_line(&resized));
            Ok(())
        }
        Command::Timer { watch, complete } => run_timer(store, watch, complete).await,
        Command::Tag(command) => run_tag(store, command, json).await,
        Command::Group(command) => run_group(store, command, json).await,
        // Signing in never needs the store; run() handles it first.
        Command::Auth(_) => Ok(()),
    }
}

// =============================================================================
// SESSION + STORE
// =============================================================================

/// The saved session, refreshed when close to expiry. A failed refresh falls
/// back to the anon role rather than aborting the command.
async fn current_session(config: &Config) -> Result<Option<Session>, CliError> {
    let Some(session) = auth::load_session(&config.session_file).await? else {
        return Ok(None);
    };
    if !session.expires_within(Utc::now(), TimeDelta::seconds(SESSION_REFRESH_MARGIN_SECS)) {
        return Ok(Some(session));
    }
    match auth::refresh(config, &session).await {
        Ok(next) => {
            auth::save_session(&config.session_file, &next).await?;
            Ok(Some(next))
        }
        Err(e) => {
            warn!(code = e.error_code(), error = %e, "session refresh failed; continuing signed out");
            Ok(None)
        }
    }
}

async fn open_store(config: &Config) -> Result<Store, CliError> {
    let session = current_session(config).await?;
    let backend = PostgrestBackend::new(config, session.map(|s| s.access_token))?;
    let mut store = Store::new(Arc::new(backend));
    store.refresh().await?;
    Ok(store)
}

// =============================================================================
// INTENTS
// =============================================================================

async fn run_capture(store: &mut Store, text: &str, description: Option<String>, private: bool) -> Result<(), CliError> {
    let parsed = parse_capture(text, store.tags())?;
    let mut new = parsed.into_new_intent();
    new.description = description;
    new.is_private = private.then_some(true);
    let created = store.create_intent(new).await?;
    info!(intent_id = %created.id, "captured");
    println!("{}", print::intent_line(&created));
    Ok(())
}

fn run_list(store: &Store, tag: Option<&str>, date: Option<NaiveDate>, json: bool) -> Result<(), CliError> {
    let tag_id = tag.map(|key| resolve_tag(store.tags(), key).map(|t| t.id)).transpose()?;
    let intents: Vec<&Intent> = store
        .filter_by_tag(tag_id)
        .into_iter()
        .filter(|i| date.is_none_or(|d| i.local_start().date() == d))
        .collect();
    if json {
        return print_json(&intents);
    }
    println!("{}", print::filter_bar(&store.tag_counts(), store.tags()));
    print_lines(intents.iter().map(|i| print::intent_line(i)));
    Ok(())
}

async fn run_day(store: &mut Store, date: Option<NaiveDate>, rows: Option<i64>, zoom: Option<i64>) -> Result<(), CliError> {
    let today = Local::now().date_naive();
    let day = date.unwrap_or(today);
    let intents = store.intents().await?;

    let mut engine = Engine::new(day, Scale::default());
    engine.load_blocks(intents.iter().map(Intent::to_block).collect());
    let defaults = TextStyle::default();
    let minutes_per_row = match (rows, zoom) {
        (Some(rows), _) => (1440 + rows - 1) / rows,
        (None, Some(zoom)) => zoom,
        (None, None) => defaults.minutes_per_row,
    };
    let style = TextStyle { minutes_per_row, ..defaults };
    print_lines(render_day(&engine, Some(Local::now().naive_local()), &style));

    let on_day = day::intents_on(day, intents);
    if on_day.is_empty() {
        return Ok(());
    }
    println!();
    print_lines(print::day_sections(&on_day));
    let pulse = day::daily_pulse(&on_day);
    if !pulse.is_empty() {
        println!();
        print_lines(print::pulse_lines(&pulse));
    }
    Ok(())
}

async fn apply_actions(store: &mut Store, actions: &[Action]) -> Result<(), CliError> {
    let mut changed = false;
    for action in actions {
        if let Some(intent) = store.apply(action).await? {
            println!("{}", print::intent_line(&intent));
            changed = true;
        }
    }
    if !changed {
        println!("no change");
    }
    Ok(())
}

async fn run_timer(store: &mut Store, watch: bool, complete: bool) -> Result<(), CliError> {
    let Some(active) = timer::active_intent(store.cached_intents()).cloned() else {
        println!("no intent in progress");
        return Ok(());
    };
    if complete {
        let patch = IntentPatch { status: Some(IntentStatus::Completed), ..IntentPatch::default() };
        let done = store.update_intent(active.id, patch).await?;
        println!("{}", print::intent_line(&done));
        return Ok(());
    }
    if !watch {
        println!("{}", print::timer_line(&active, &TimerView::at(&active, Utc::now())));
        return Ok(());
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(TIMER_TICK_SECS));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stdout = std::io::stdout();
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let line = print::timer_line(&active, &TimerView::at(&active, Utc::now()));
                write!(stdout, "\r\x1b[2K{line}")?;
                stdout.flush()?;
            }
            signal = &mut ctrl_c => {
                signal?;
                writeln!(stdout)?;
                return Ok(());
            }
        }
    }
}

// =============================================================================
// TAGS + GROUPS
// =============================================================================

async fn run_tag(store: &mut Store, command: TagCommand, json: bool) -> Result<(), CliError> {
    match command.command {
        TagSubcommand::List => {
            if json {
                return print_json(store.tags());
            }
            let counts = store.tag_counts();
            for tag in store.tags() {
                let count = counts.by_tag.iter().find(|(id, _)| *id == tag.id).map_or(0, |(_, n)| *n);
                println!("{}", print::tag_line(tag, count, store.tag_categories()));
            }
            Ok(())
        }
        TagSubcommand::Create { name, group } => {
            let group_id = group.map(|key| resolve_group(store.tag_categories(), &key).map(|g| g.id)).transpose()?;
            let tag = store.create_tag(&name, group_id).await?;
            println!("{}", print::tag_line(&tag, 0, store.tag_categories()));
            Ok(())
        }
        TagSubcommand::Update { tag, name, color, group, no_group } => {
            let id = resolve_tag(store.tags(), &tag)?.id;
            let tag_category_id = if no_group {
                Some(None)
            } else {
                group
                    .map(|key| resolve_group(store.tag_categories(), &key).map(|g| Some(g.id)))
                    .transpose()?
            };
            let patch = TagPatch { name, color: color.map(|c| parse_color(&c)).transpose()?, tag_category_id };
            let updated = store.update_tag(id, patch).await?;
            let count = store.filter_by_tag(Some(id)).len();
            println!("{}", print::tag_line(&updated, count, store.tag_categories()));
            Ok(())
        }
        TagSubcommand::Delete { tag } => {
            let id = resolve_tag(store.tags(), &tag)?.id;
            store.delete_tag(id).await?;
            println!("deleted tag {tag}");
            Ok(())
        }
    }
}

async fn run_group(store: &mut Store, command: GroupCommand, json: bool) -> Result<(), CliError> {
    match command.command {
        GroupSubcommand::List => {
            if json {
                return print_json(store.tag_categories());
            }
            print_lines(store.tag_categories().iter().map(|g| print::group_line(g, store.tags())));
            Ok(())
        }
        GroupSubcommand::Create { name, icon } => {
            let group = store.create_tag_category(&name, icon).await?;
            println!("{}", print::group_line(&group, store.tags()));
            Ok(())
        }
    }
}

// =============================================================================
// AUTH
// =============================================================================

async fn run_auth(config: &Config, command: AuthCommand) -> Result<(), CliError> {
    match command.command {
        AuthSubcommand::Url { provider } => {
            println!("{}", auth::authorize_url(config, &provider)?);
            eprintln!("open it, sign in, then run: intentlog auth login '<the URL you land on>'");
            Ok(())
        }
        AuthSubcommand::Login { redirect } => {
            let mut session = Session::from_redirect(&redirect)?;
            let user = auth::fetch_user(config, &session.access_token).await?;
            println!("signed in as {}", user.email.as_deref().unwrap_or("(no email)"));
            session.user = Some(user);
            auth::save_session(&config.session_file, &session).await?;
            info!(path = %config.session_file.display(), "signed in");
            Ok(())
        }
        AuthSubcommand::Whoami => {
            let session = current_session(config).await?.ok_or(CliError::SignedOut)?;
            let user = auth::fetch_user(config, &session.access_token).await?;
            println!("{} {}", user.id, user.email.as_deref().unwrap_or(""));
            Ok(())
        }
        AuthSubcommand::Logout => {
            if let Some(session) = auth::load_session(&config.session_file).await? {
                if let Err(e) = auth::sign_out(config, &session).await {
                    warn!(code = e.error_code(), error = %e, "remote sign-out failed; clearing local session");
                }
            }
            auth::clear_session(&config.session_file).await?;
            println!("signed out");
            Ok(())
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn parse_clock(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|e| format!("expected HH:MM: {e}"))
}

fn parse_color(raw: &str) -> Result<String, CliError> {
    let hex = raw.trim().trim_start_matches('#');
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(format!("#{}", hex.to_ascii_lowercase()))
    } else {
        Err(CliError::InvalidArg { what: "color", value: raw.to_string() })
    }
}

/// Full uuid, or a unique prefix of one among the cached intents.
fn resolve_intent(store: &Store, key: &str) -> Result<Uuid, CliError> {
    if let Ok(id) = key.parse::<Uuid>() {
        return Ok(id);
    }
    let prefix = key.trim().to_ascii_lowercase().replace('-', "");
    if prefix.is_empty() {
        return Err(CliError::UnknownIntent(key.to_string()));
    }
    let mut matches = store
        .cached_intents()
        .iter()
        .filter(|i| i.id.simple().to_string().starts_with(&prefix));
    match (matches.next(), matches.next()) {
        (Some(intent), None) => Ok(intent.id),
        (Some(_), Some(_)) => Err(CliError::AmbiguousIntent(key.to_string())),
        _ => Err(CliError::UnknownIntent(key.to_string())),
    }
}

/// By name (any case), full id or short id.
fn resolve_tag<'a>(tags: &'a [Tag], key: &str) -> Result<&'a Tag, CliError> {
    let key = key.trim().trim_start_matches('#');
    tags.iter()
        .find(|t| t.name.eq_ignore_ascii_case(key) || t.id.to_string() == key || short_id(t.id) == key)
        .ok_or_else(|| CliError::UnknownTag(key.to_string()))
}

fn resolve_group<'a>(groups: &'a [TagCategory], key: &str) -> Result<&'a TagCategory, CliError> {
    let key = key.trim();
    groups
        .iter()
        .find(|g| g.name.eq_ignore_ascii_case(key) || g.id.to_string() == key || short_id(g.id) == key)
        .ok_or_else(|| CliError::UnknownGroup(key.to_string()))
}

/// An explicit length is taken as given, floored at one snap step. Only
/// pointer drags snap the end to the grid.
fn resize_patch(minutes: u32) -> IntentPatch {
    let floor = u32::try_from(SNAP_MINUTES).unwrap_or(1);
    IntentPatch { duration_minutes: Some(Some(minutes.max(floor))), ..IntentPatch::default() }
}

fn build_patch(args: &UpdateArgs, tags: &[Tag]) -> Result<IntentPatch, CliError> {
    let duration_minutes = if args.open_ended {
        Some(None)
    } else {
        args.duration
            .as_deref()
            .map(|raw| {
                parse_duration(raw)
                    .filter(|m| *m > 0)
                    .map(Some)
                    .ok_or_else(|| CliError::InvalidArg { what: "duration", value: raw.to_string() })
            })
            .transpose()?
    };
    let description = if args.clear_description { Some(None) } else { args.description.clone().map(Some) };
    let tag_ids = args
        .tags
        .as_ref()
        .map(|names| {
            names
                .iter()
                .map(|n| n.trim())
                .filter(|n| !n.is_empty())
                .map(|n| resolve_tag(tags, n).map(|t| t.id))
                .collect::<Result<Vec<Uuid>, CliError>>()
        })
        .transpose()?;
    Ok(IntentPatch {
        title: args.title.clone(),
        description,
        duration_minutes,
        status: args.status,
        is_private: args.private,
        created_at: None,
        tag_ids,
    })
}

fn print_lines(lines: impl IntoIterator<Item = String>) {
    for line in lines {
        println!("{line}");
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
