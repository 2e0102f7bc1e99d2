use std::fmt;
use std::sync::Arc;

use services::{BackendConfig, Clock, HttpBackend, ServerCompletionHydrator, WeekView, WeeklyScheduleService};
use storage::LocalCompletionStore;
use storage::repository::Storage;
use tracker_core::model::{CompletionKey, CompletionMap, PlanId, SessionRef};
use tracker_core::{CalendarDate, WeekWindow};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidDate { raw: String },
    InvalidId { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    BackendNotConfigured,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDate { raw } => {
                write!(f, "invalid --date value (expected YYYY-MM-DD): {raw}")
            }
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw:?}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::BackendNotConfigured => {
                write!(f, "TRACKER_API_BASE_URL must be set for this command")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- week   [--db <sqlite_url>] [--date <YYYY-MM-DD>] [--verbose]");
    eprintln!("  cargo run -p app -- sync   [--db <sqlite_url>] [--date <YYYY-MM-DD>] [--verbose]");
    eprintln!("  cargo run -p app -- mark   --plan <id> [--session <id>] [--date <YYYY-MM-DD>] [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- unmark --plan <id> [--session <id>] [--date <YYYY-MM-DD>] [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://tracker.sqlite3");
    eprintln!("  --date today (local)");
    eprintln!("  --session omitted marks the whole plan for that day");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  TRACKER_DB_URL, TRACKER_API_BASE_URL, TRACKER_API_TOKEN, TRACKER_PAGE_SIZE, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Week,
    Sync,
    Mark,
    Unmark,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "week" => Some(Self::Week),
            "sync" => Some(Self::Sync),
            "mark" => Some(Self::Mark),
            "unmark" => Some(Self::Unmark),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    date: Option<CalendarDate>,
    plan: Option<PlanId>,
    session: Option<String>,
    verbose: bool,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            db_url: std::env::var("TRACKER_DB_URL")
                .ok()
                .map_or_else(|| "sqlite://tracker.sqlite3".into(), normalize_sqlite_url),
            date: None,
            plan: None,
            session: None,
            verbose: false,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--date" => {
                    let value = require_value(args, "--date")?;
                    let date = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidDate { raw: value.clone() })?;
                    parsed.date = Some(date);
                }
                "--plan" => {
                    let value = require_value(args, "--plan")?;
                    let plan = PlanId::new(value.clone()).map_err(|_| ArgsError::InvalidId {
                        flag: "--plan",
                        raw: value,
                    })?;
                    parsed.plan = Some(plan);
                }
                "--session" => {
                    parsed.session = Some(require_value(args, "--session")?);
                }
                "--verbose" | "-v" => parsed.verbose = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }

    fn completion_key(&self, today: CalendarDate) -> Result<CompletionKey, ArgsError> {
        let plan = self
            .plan
            .clone()
            .ok_or(ArgsError::MissingFlag { flag: "--plan" })?;
        let session = SessionRef::from_optional(self.session.as_deref());
        Ok(CompletionKey::new(plan, session, self.date.unwrap_or(today)))
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_week(view: &WeekView) {
    println!(
        "Week {} .. {}  {}/{} done ({}%)",
        view.window.first(),
        view.window.last(),
        view.progress.completed,
        view.progress.total,
        view.progress.percent()
    );
    for day in &view.days {
        println!("{} {}", day.date, day.date.naive().format("%a"));
        if day.entries.is_empty() {
            println!("    rest day");
        }
        for entry in &day.entries {
            let mark = if entry.completed { "x" } else { " " };
            let minutes = entry
                .occurrence
                .duration_minutes
                .map(|m| format!(" ({m} min)"))
                .unwrap_or_default();
            println!(
                "  [{mark}] {}{minutes}  {}",
                entry.occurrence.title,
                entry.occurrence.key()
            );
        }
    }
}

/// Lines for a week when only local completions are known.
fn local_week_lines(window: &WeekWindow, completions: &CompletionMap) -> Vec<String> {
    let mut lines = vec![format!(
        "Week {} .. {}  (offline: schedule unavailable)",
        window.first(),
        window.last()
    )];
    for date in window.iter() {
        lines.push(format!("{date} {}", date.naive().format("%a")));
        lines.extend(
            completions
                .keys()
                .filter(|key| key.date() == date)
                .map(|key| format!("  [x] {key}")),
        );
    }
    lines
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // Default behavior: show the current week when no subcommand is provided.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Week,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Week,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let parsed = Args::parse(&mut argv.into_iter()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    init_logging(parsed.verbose);
    tracing::debug!(db = %parsed.db_url, ?cmd, "opening completion store");

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;
    let store = Arc::new(LocalCompletionStore::new(Arc::clone(&storage.kv)));
    let clock = Clock::default_clock();

    match cmd {
        Command::Mark | Command::Unmark => {
            let key = parsed.completion_key(clock.today())?;
            store.load().await;
            let changed = if cmd == Command::Mark {
                store.mark(key.clone()).await
            } else {
                store.unmark(&key).await
            };
            let state = if changed { "updated" } else { "unchanged" };
            println!("{key}: {state}");
            Ok(())
        }
        Command::Week | Command::Sync => {
            let anchor = parsed.date.unwrap_or_else(|| clock.today());
            let Some(config) = BackendConfig::from_env()? else {
                if cmd == Command::Sync {
                    return Err(ArgsError::BackendNotConfigured.into());
                }
                tracing::warn!("TRACKER_API_BASE_URL is not set; showing local completions only");
                let window = WeekWindow::containing(anchor)?;
                let completions = store.load().await;
                for line in local_week_lines(&window, &completions) {
                    println!("{line}");
                }
                return Ok(());
            };
            let page_size = config.page_size;
            let backend = Arc::new(HttpBackend::new(config));
            let hydrator = ServerCompletionHydrator::new(
                Arc::clone(&backend) as Arc<dyn services::CompletionSource>,
                Arc::clone(&store),
            )
            .with_page_size(page_size);

            if cmd == Command::Sync {
                store.load().await;
                let window = WeekWindow::containing(anchor)?;
                match hydrator.hydrate_window(&window).await {
                    Some(report) => println!(
                        "synced {} .. {}: {} rows, {} new, {} ignored",
                        window.first(),
                        window.last(),
                        report.rows,
                        report.added,
                        report.discarded
                    ),
                    None => println!("sync failed; local completions unchanged"),
                }
                return Ok(());
            }

            let service = WeeklyScheduleService::new(clock, store, hydrator, backend);
            let view = service.open_week(anchor).await?;
            print_week(&view);
            Ok(())
        }
    }
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &[&str]) -> Result<Args, ArgsError> {
        Args::parse(&mut raw.iter().map(|s| (*s).to_string()))
    }

    #[test]
    fn mark_without_session_is_plan_level() {
        let args = parse(&["--plan", "42", "--date", "2024-01-15"]).unwrap();
        let today: CalendarDate = "2024-03-01".parse().unwrap();
        assert_eq!(args.completion_key(today).unwrap().encode(), "42:plan|2024-01-15");
    }

    #[test]
    fn mark_defaults_to_today() {
        let args = parse(&["--plan", "7", "--session", "3"]).unwrap();
        let today: CalendarDate = "2024-03-01".parse().unwrap();
        assert_eq!(args.completion_key(today).unwrap().encode(), "7:3|2024-03-01");
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            parse(&["--date", "03/01/2024"]),
            Err(ArgsError::InvalidDate { .. })
        ));
        assert!(matches!(parse(&["--plan"]), Err(ArgsError::MissingValue { .. })));
        assert!(matches!(parse(&["--bogus"]), Err(ArgsError::UnknownArg(_))));
        let args = parse(&[]).unwrap();
        assert!(matches!(
            args.completion_key("2024-03-01".parse().unwrap()),
            Err(ArgsError::MissingFlag { flag: "--plan" })
        ));
    }

    #[test]
    fn offline_week_lists_local_completions_by_day() {
        let window = WeekWindow::containing("2024-01-17".parse().unwrap()).unwrap();
        let completions: CompletionMap = ["42:plan|2024-01-15", "7:3|2024-01-17", "7:3|2024-01-22"]
            .iter()
            .map(|raw| raw.parse::<CompletionKey>().unwrap())
            .collect();

        let lines = local_week_lines(&window, &completions);
        assert_eq!(lines.len(), 1 + 7 + 2);
        assert_eq!(lines[1], "2024-01-15 Mon");
        assert_eq!(lines[2], "  [x] 42:plan|2024-01-15");
        assert!(lines.iter().any(|line| line == "  [x] 7:3|2024-01-17"));
        assert!(!lines.iter().any(|line| line.contains("2024-01-22")));
    }

    #[test]
    fn relative_sqlite_paths_become_absolute() {
        let url = normalize_sqlite_url("sqlite:data/tracker.sqlite3".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/tracker.sqlite3"));
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
    }
}
