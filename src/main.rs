//! sitekit - build-and-deploy pipeline for the site front-end.

mod build;
mod cli;
mod compile;
mod config;
mod deploy;
mod logger;
mod pages;
mod reload;
mod serve;
mod session;
mod state;
mod utils;
mod watch;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use compile::Toolchain;
use config::{Workspace, cfg};
use deploy::FtpTransport;
use serve::serve_site;
use state::PipelineState;
use std::path::Path;

const DEFAULT_INTERFACE: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 7979;

fn main() -> Result<()> {
    let cli: &'static Cli = Box::leak(Box::new(Cli::parse()));
    logger::init(cli.verbosity());

    let root = cli.root.as_deref().unwrap_or(Path::new("./"));
    let workspace = Workspace::load(root)?;

    if workspace.deploy.is_none() && cli.is_serve() {
        crate::log!("warn"; "config-ftp.json not found, deployment disabled");
    }

    let command = cli.command();
    if !matches!(command, Commands::Pages) {
        workspace.validate()?;
    }

    config::handle::init(workspace);

    // Leaked once at startup, shared by every thread for the process lifetime.
    let state: &'static PipelineState = Box::leak(Box::new(PipelineState::new()));
    let toolchain: &'static Toolchain = {
        let ws = cfg();
        Box::leak(Box::new(Toolchain::from_config(&ws.root, &ws.build.tools)))
    };
    let transport: &'static FtpTransport = Box::leak(Box::new(FtpTransport));

    match command {
        Commands::Core => {
            let report = build::run_core(state, toolchain, &cfg())?;
            build::log_report(state, &report);
            Ok(())
        }
        Commands::Pages => pages::sync_manifest(&cfg()).map(|_| ()),
        Commands::Build => {
            let report = build::run_build(state, toolchain, &cfg())?;
            build::log_report(state, &report);
            Ok(())
        }
        Commands::Serve {
            interface,
            port,
            no_watch,
        } => serve_site(
            state,
            toolchain,
            transport,
            interface.as_deref().unwrap_or(DEFAULT_INTERFACE),
            port.unwrap_or(DEFAULT_PORT),
            !no_watch,
        ),
    }
}
