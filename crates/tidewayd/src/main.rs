//! tidewayd — the Tideway control plane binary.
//!
//! Operates on the on-disk state store and drives the provisioner:
//! - App create / destroy (with background repository cleanup)
//! - Team access grants and checks
//! - Environment variables
//! - Restart and update hooks on the primary unit
//! - Route table snapshot
//!
//! # Usage
//!
//! ```text
//! tidewayd --config /etc/tideway/tideway.toml create blog django
//! tidewayd env-set blog DATABASE_HOST=10.0.0.4
//! tidewayd destroy blog
//! ```

mod context;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use tideway_app::{
    check_user_access, get_env, grant_access, revoke_access, set_env, unset_env,
};
use tideway_core::TidewayConfig;
use tideway_lifecycle::{HookResult, HookRunner};
use tideway_router::{RoutingTable, sync_app};
use tideway_state::{App, AppStore, Team, TeamStore, User};

use crate::context::Context;

const RUNTIME_SHUTDOWN: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "tidewayd", about = "Tideway control plane")]
struct Cli {
    /// Path to tideway.toml. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create and deploy an app.
    Create { name: String, framework: String },

    /// Destroy an app and its machine.
    Destroy { name: String },

    /// List apps, optionally only those a team can access.
    Apps {
        #[arg(long)]
        team: Option<String>,
    },

    /// Set an environment variable (`NAME=value`).
    EnvSet {
        app: String,
        assignment: String,
        /// Mask the value when displayed.
        #[arg(long)]
        private: bool,
    },

    /// Show an environment variable.
    EnvGet { app: String, name: String },

    /// Remove an environment variable.
    EnvUnset { app: String, name: String },

    /// Give a team access to an app.
    Grant { app: String, team: String },

    /// Take a team's access away.
    Revoke { app: String, team: String },

    /// Create or replace a team.
    TeamAdd { name: String, users: Vec<String> },

    /// Check whether a user can access an app.
    Access { app: String, email: String },

    /// Restart an app, running its pre/pos-restart hooks.
    Restart { app: String },

    /// Run the dependency and reload hooks.
    UpdateHooks { app: String },

    /// Print the routing table built from stored units.
    Routes,

    /// Print the effective configuration.
    Config,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tideway=debug,tidewayd=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = TidewayConfig::load(cli.config.as_deref())?;

    if let Command::Config = cli.command {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(serve(&config, cli.command));
    // Blocking calls that outlived their deadline are not waited for.
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN);
    result
}

async fn serve(config: &TidewayConfig, command: Command) -> anyhow::Result<()> {
    let ctx = Context::open(config)?;
    let result = run(&ctx, command).await;
    // Pending cleanups finish even if the command failed.
    ctx.shutdown().await?;
    result
}

async fn run(ctx: &Context, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Create { name, framework } => {
            let controller = ctx.controller.clone();
            let app = ctx
                .blocking("create", move || {
                    let mut app = App::new(&name, &framework);
                    controller.create(&mut app)?;
                    Ok(app)
                })
                .await?;
            println!("app {} created", app.name);
        }

        Command::Destroy { name } => {
            let app = ctx.app(&name)?;
            let controller = ctx.controller.clone();
            ctx.blocking("destroy", move || Ok(controller.destroy(&app)?))
                .await?;
            println!("app {name} destroyed");
        }

        Command::Apps { team } => {
            let apps = match team {
                Some(team) => ctx.controller.apps_for_team(&team)?,
                None => ctx.controller.list()?,
            };
            for app in apps {
                println!("{}\t{}\t{}\t{} units", app.name, app.framework, app.state, app.units.len());
            }
        }

        Command::EnvSet {
            app,
            assignment,
            private,
        } => {
            let Some((name, value)) = assignment.split_once('=') else {
                bail!("expected NAME=value, got {assignment:?}");
            };
            let mut app = ctx.app(&app)?;
            set_env(&mut app, name, value, !private);
            ctx.store.update_app(&mut app)?;
            println!("{}", get_env(&app, name)?);
        }

        Command::EnvGet { app, name } => {
            let app = ctx.app(&app)?;
            println!("{}", get_env(&app, &name)?);
        }

        Command::EnvUnset { app, name } => {
            let mut app = ctx.app(&app)?;
            unset_env(&mut app, &name)?;
            ctx.store.update_app(&mut app)?;
        }

        Command::Grant { app, team } => {
            let mut app = ctx.app(&app)?;
            grant_access(&mut app, &team)?;
            ctx.store.update_app(&mut app)?;
            info!(app = %app.name, %team, "access granted");
        }

        Command::Revoke { app, team } => {
            let mut app = ctx.app(&app)?;
            revoke_access(&mut app, &team)?;
            ctx.store.update_app(&mut app)?;
            info!(app = %app.name, %team, "access revoked");
        }

        Command::TeamAdd { name, users } => {
            let users: Vec<&str> = users.iter().map(String::as_str).collect();
            ctx.store.put_team(&Team::new(&name, &users))?;
        }

        Command::Access { app, email } => {
            let app = ctx.app(&app)?;
            let allowed = check_user_access(&ctx.store, &app, &User::new(&email))?;
            if !allowed {
                bail!("{email} has no access to app {}", app.name);
            }
            println!("{email} can access app {}", app.name);
        }

        Command::Restart { app } => {
            run_hooks(ctx, &app, "restart", |hooks, app| hooks.restart(app)).await?;
        }

        Command::UpdateHooks { app } => {
            run_hooks(ctx, &app, "update-hooks", |hooks, app| hooks.update_hooks(app)).await?;
        }

        Command::Routes => {
            let table = RoutingTable::new();
            for app in ctx.controller.list()? {
                sync_app(&table, &app);
            }
            let mut names = table.app_names();
            names.sort();
            for name in names {
                println!("{name}\t{}", table.routes(&name).join(","));
            }
        }

        // Printed before the store is opened.
        Command::Config => {}
    }
    Ok(())
}

/// Run a hook workflow on the blocking pool, then persist the App log
/// whether or not the hooks succeeded.
async fn run_hooks<F>(ctx: &Context, name: &str, what: &str, f: F) -> anyhow::Result<()>
where
    F: FnOnce(&HookRunner, &mut App) -> HookResult<()> + Send + 'static,
{
    let mut app = ctx.app(name)?;
    let seen = app.logs.len();
    let hooks = ctx.hooks.clone();
    let (mut app, result) = ctx
        .blocking(what, move || {
            let result = f(&hooks, &mut app);
            Ok((app, result))
        })
        .await?;

    if let Err(e) = ctx.store.update_app(&mut app) {
        warn!(app = %app.name, error = %e, "failed to persist hook log");
    }
    for entry in &app.logs[seen..] {
        println!("{}", entry.message);
    }
    result.with_context(|| format!("{what} failed for app {name}"))
}
