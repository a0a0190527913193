pub mod cli;
pub mod config;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::{Instrument, field};

use cli::{AdminCmd, Cli, Command, SlotCmd, UserCmd};
use common::logger::{TraceId, child_span, init_logger, root_span};
use config::AppConfig;
use exchange::{ExchangeCoordinator, SlotCatalog};
use store::{Db, SqliteSlotStore, SqliteSwapStore, SqliteUserDirectory};

/// Coordinator and catalog over one shared pool.
struct App {
    coordinator: ExchangeCoordinator,
    catalog: SlotCatalog,
}

async fn init_app(cfg: &AppConfig) -> anyhow::Result<App> {
    let db = Db::connect(&cfg.database_url, cfg.db_max_connections).await?;
    db.migrate().await?;

    let slots = Arc::new(SqliteSlotStore::from_pool(db.pool.clone()));
    let swaps = Arc::new(SqliteSwapStore::from_pool(db.pool.clone()));
    let users = Arc::new(SqliteUserDirectory::from_pool(db.pool.clone()));

    Ok(App {
        coordinator: ExchangeCoordinator::new(slots.clone(), swaps, users.clone()),
        catalog: SlotCatalog::new(slots, users),
    })
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("encode output")?
    );
    Ok(())
}

async fn run(app: &App, command: Command) -> anyhow::Result<()> {
    match command {
        Command::User(UserCmd::Add { name, email }) => {
            print_json(&app.catalog.register_user(&name, &email).await?)
        }

        Command::Slot(cmd) => match cmd {
            SlotCmd::Create { caller, details } => {
                print_json(&app.catalog.create_slot(caller, details.into()).await?)
            }
            SlotCmd::List { caller } => print_json(&app.catalog.my_slots(caller).await?),
            SlotCmd::Swappable { caller, slot, off } => {
                print_json(&app.catalog.set_swappable(caller, slot, !off).await?)
            }
            SlotCmd::Edit {
                caller,
                slot,
                details,
            } => print_json(&app.catalog.update_slot(caller, slot, details.into()).await?),
            SlotCmd::Delete { caller, slot } => {
                app.catalog.delete_slot(caller, slot).await?;
                print_json(&serde_json::json!({ "deleted": slot }))
            }
        },

        Command::Discover { caller } => print_json(&app.coordinator.discover(caller).await?),

        Command::Propose {
            caller,
            offer,
            want,
        } => print_json(&app.coordinator.propose(caller, offer, want).await?),

        Command::Resolve {
            caller,
            request,
            decision,
        } => print_json(
            &app.coordinator
                .resolve(caller, request, decision.into())
                .await?,
        ),

        Command::Requests { caller } => print_json(&app.coordinator.list_requests(caller).await?),

        Command::Admin(AdminCmd::Stuck) => print_json(&app.coordinator.stuck_slots().await?),

        Command::Admin(AdminCmd::Release { slot }) => {
            print_json(&app.coordinator.force_release(slot).await?)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = AppConfig::from_env()?;
    if let Some(url) = cli.database_url {
        cfg.database_url = url;
    }

    init_logger("slotswap", cfg.json_logs);

    let trace_id = TraceId::default();
    let span = root_span(cli.command.name(), &trace_id);
    if let Some(caller) = cli.command.caller() {
        span.record("user_id", field::display(caller));
    }

    async move {
        let app = init_app(&cfg).instrument(child_span("init_app")).await?;
        let result = run(&app, cli.command).await;
        if let Err(e) = &result {
            tracing::warn!(error = ?e, "command failed");
        }
        result
    }
    .instrument(span)
    .await
}
