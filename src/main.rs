mod cache;
mod config;
mod error;
mod filter;
mod productive;
mod sync;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

use cache::{CacheRead, CacheReader, ReadOnlyStorage, SqliteStorage};
use config::Config;
use error::SyncError;
use filter::ItemFilter;
use productive::cache::ProductiveQueryKey;
use productive::client::ProductiveClient;
use productive::format::FormatContext;
use productive::resources::ResourceKind;
use productive::types::DisplayItem;
use sync::{RefreshOutcome, Synchronizer};

const START_TIMER: &str = "start-timer";

#[derive(Parser, Debug)]
#[command(name = "prodsync")]
#[command(about = "Cached listings of Productive.io resources")]
#[command(version)]
struct Args {
  /// Resource kind (companies, deals, people, projects, services, tasks) or `start-timer`
  #[arg(default_value = "tasks")]
  command: String,

  /// Refresh the cache from the API instead of reading it
  #[arg(long)]
  update_cache: bool,

  /// Only items belonging to this company
  #[arg(long)]
  company: Option<String>,

  /// Only items whose deal is still open
  #[arg(long)]
  no_ended_deal: bool,

  /// Service to book time on (start-timer)
  #[arg(long)]
  service: Option<String>,

  /// Task to book time on (start-timer)
  #[arg(long)]
  task: Option<String>,

  /// Path to config file (default: $XDG_CONFIG_HOME/prodsync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;
  let _guard = init_logging(&config.log_dir()?)?;

  if args.command == START_TIMER {
    return start_timer(&config, &args).await;
  }

  let kind: ResourceKind = args.command.parse()?;
  let cache_path = config.cache_path()?;

  if args.update_cache {
    let store = Arc::new(SqliteStorage::open(&cache_path)?);
    refresh(&config, store, kind).await
  } else {
    // read mode never writes, not even the schema
    let store = Arc::new(ReadOnlyStorage::open(&cache_path));
    read(&config, store, kind, &args).await
  }
}

/// Log to `<log_dir>/run.log`; stdout carries the item list.
fn init_logging(log_dir: &Path) -> Result<WorkerGuard> {
  std::fs::create_dir_all(log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;

  let appender = RollingFileAppender::builder()
    .rotation(Rotation::NEVER)
    .filename_prefix("run.log")
    .build(log_dir)?;
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_env("PRODSYNC_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
    )
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}

async fn refresh(config: &Config, store: Arc<SqliteStorage>, kind: ResourceKind) -> Result<()> {
  let token = Config::get_api_token()?;
  let org_id = config.require_org_id()?.to_string();
  let client = ProductiveClient::new(&config.api, &token)?;

  let synchronizer = Synchronizer::new(Arc::new(client), store, FormatContext { org_id })
    .with_update_interval(config.update_interval())
    .with_page_size(config.sync.page_size);

  match synchronizer.maybe_refresh(kind, &kind.default_params()).await? {
    RefreshOutcome::Skipped => info!(%kind, "cache is fresh"),
    RefreshOutcome::Completed(summary) => info!(
      %kind,
      pages = summary.pages,
      items = summary.items,
      "cache updated"
    ),
  }
  Ok(())
}

async fn read<S: CacheRead>(
  config: &Config,
  store: Arc<S>,
  kind: ResourceKind,
  args: &Args,
) -> Result<()> {
  let key = ProductiveQueryKey::items(kind, &kind.default_params());
  let reader = CacheReader::new(store, config.poll_interval()).with_max_polls(config.read.max_polls);

  let items = match reader.read_blocking::<DisplayItem>(&key, config.max_wait()).await {
    Ok(items) => items,
    Err(SyncError::CacheTimeout { waited }) => {
      warn!(cache_key = %key, waited_secs = waited.as_secs(), "no cached items, giving up");
      Vec::new()
    }
    Err(e) => return Err(e.into()),
  };

  let filter = ItemFilter {
    company_id: args.company.clone(),
    open_deals_only: args.no_ended_deal,
  };
  let items = filter.apply(items);

  println!("{}", serde_json::to_string(&serde_json::json!({ "items": items }))?);
  Ok(())
}

async fn start_timer(config: &Config, args: &Args) -> Result<()> {
  let service_id = args
    .service
    .as_deref()
    .ok_or_else(|| eyre!("--service is required for {}", START_TIMER))?;
  let token = Config::get_api_token()?;
  config.require_org_id()?;
  let person_id = config.require_person_id()?;

  let client = ProductiveClient::new(&config.api, &token)?;
  let today = chrono::Local::now().date_naive();
  let started = client
    .start_timer(person_id, service_id, args.task.as_deref(), today)
    .await?;

  info!(
    time_entry = %started.time_entry_id,
    timer = %started.timer_id,
    "timer started"
  );
  println!("{}", serde_json::to_string(&started)?);
  Ok(())
}
