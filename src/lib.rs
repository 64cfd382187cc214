pub mod admin;
pub mod db;
pub mod demo;
pub mod identity;
pub mod prediction;
pub mod server;
pub mod settings;
pub mod utils;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Duration;
use tokio_util::sync::CancellationToken;

use db::Database;
use identity::{DatabaseSessionStore, IdentityService, MemorySessionStore, SessionStore};
use prediction::{resolve_model_path, HistoryRecorder, ModelProvider, PredictionService};
use settings::{SessionBackend, Settings};

/// Shared handles given to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub predictions: Arc<PredictionService>,
    pub identity: Arc<IdentityService>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Open the database and resolve the model path from `settings`. The
    /// model itself loads on first use.
    pub fn build(settings: Settings) -> Result<Self> {
        let db = Database::new(settings.database_path.clone())?;
        let base_dir = std::env::current_dir().context("Failed to read working directory")?;
        let model_path = resolve_model_path(settings.model_path.as_deref(), &base_dir);
        let models = Arc::new(ModelProvider::new(model_path));
        log::info!(
            "database at {}, model artifact at {}",
            db.path().display(),
            models.path().display()
        );
        Self::with_models(settings, db, models)
    }

    pub fn with_models(settings: Settings, db: Database, models: Arc<ModelProvider>) -> Result<Self> {
        let labels = settings.labels()?;
        let sessions: Arc<dyn SessionStore> = match settings.session_backend {
            SessionBackend::Memory => Arc::new(MemorySessionStore::new()),
            SessionBackend::Database => Arc::new(DatabaseSessionStore::new(db.clone())),
        };
        let identity = IdentityService::new(
            db.clone(),
            sessions,
            Duration::hours(settings.session_ttl_hours),
        );
        let predictions = PredictionService::new(
            models,
            labels,
            HistoryRecorder::new(Arc::new(db.clone())),
        );

        Ok(Self {
            db,
            predictions: Arc::new(predictions),
            identity: Arc::new(identity),
            settings: Arc::new(settings),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Serve,
    LoadDemoData,
    GrantAdmin(String),
}

impl Command {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let command = match args.next().as_deref() {
            None | Some("serve") => Command::Serve,
            Some("load-demo-data") => Command::LoadDemoData,
            Some("grant-admin") => match args.next() {
                Some(username) => Command::GrantAdmin(username),
                None => bail!("usage: waterguard grant-admin <username>"),
            },
            Some(other) => bail!(
                "unknown command '{other}' (expected serve, load-demo-data or grant-admin)"
            ),
        };
        if let Some(extra) = args.next() {
            bail!("unexpected argument '{extra}'");
        }
        Ok(command)
    }
}

pub fn run() -> Result<()> {
    utils::logging::init_logging();

    let command = Command::parse(std::env::args().skip(1))?;
    let settings = Settings::load()?;
    log::info!("WaterGuard starting ({:?})", settings.environment);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(async move {
        let state = AppState::build(settings)?;
        match command {
            Command::Serve => {
                let shutdown = CancellationToken::new();
                let trigger = shutdown.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        log::info!("shutdown requested");
                    }
                    trigger.cancel();
                });
                server::serve(state, shutdown).await
            }
            Command::LoadDemoData => {
                if demo::load_demo_data(&state.db).await? {
                    log::info!(
                        "created user '{}' with password '{}'",
                        demo::DEMO_USERNAME,
                        demo::DEMO_PASSWORD
                    );
                }
                Ok(())
            }
            Command::GrantAdmin(username) => state
                .identity
                .grant_admin(&username)
                .await
                .with_context(|| format!("Failed to grant admin role to '{username}'")),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> impl Iterator<Item = String> {
        values
            .iter()
            .map(|value| value.to_string())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse(args(&[])).unwrap(), Command::Serve);
        assert_eq!(Command::parse(args(&["serve"])).unwrap(), Command::Serve);
        assert_eq!(
            Command::parse(args(&["load-demo-data"])).unwrap(),
            Command::LoadDemoData
        );
        assert_eq!(
            Command::parse(args(&["grant-admin", "ops"])).unwrap(),
            Command::GrantAdmin("ops".into())
        );
        assert!(Command::parse(args(&["grant-admin"])).is_err());
        assert!(Command::parse(args(&["migrate"])).is_err());
        assert!(Command::parse(args(&["serve", "now"])).is_err());
    }
}
