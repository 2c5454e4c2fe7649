//! hop binary entry point.
//!
//! Quick-connect SSH client: pick a host from the catalog, get a shell.

use clap::Parser;
use tracing::{error, info};

use hop_client::{
    Bridge, Cli, RawModeController, Selector, SshEstablisher, StdTerminal, restore_terminal,
    watch_exit_signals,
};
use hop_core::catalog::{Browser, Catalog, render_screen};
use hop_core::session::CancelSignal;

fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    let log_format = cli.log_format.into();
    if let Err(e) = hop_core::init_logging(cli.verbose, cli.log_file.as_deref(), log_format) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "hop starting");

    // Remember the cooked terminal before anything changes it.
    RawModeController::global().capture();

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("hop: failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    let code = rt.block_on(run(cli));

    restore_terminal();
    std::process::exit(code);
}

async fn run(cli: Cli) -> i32 {
    let catalog = match Catalog::discover(cli.config.as_deref()) {
        Ok(catalog) => catalog,
        Err(e) => {
            error!(error = %e, "Failed to load host catalog");
            eprintln!("hop: {}", e);
            return 1;
        }
    };
    info!(hosts = catalog.len(), "Host catalog loaded");

    let mut browser = Browser::new(catalog);
    if let Some(group) = &cli.group {
        browser.set_group(group);
    }

    if cli.list {
        print!("{}", render_screen(&browser, cli.colored()));
        return 0;
    }

    let shutdown = CancelSignal::new();
    let mut bridge = Bridge::new(SshEstablisher::new(), StdTerminal)
        .with_timeout(cli.connect_timeout())
        .with_shutdown(shutdown.listener());
    tokio::spawn(watch_exit_signals(shutdown, bridge.activity()));

    if let Some(host) = &cli.host {
        let target = match browser.select(host) {
            Ok(entry) => entry.to_target(&cli.term_type(), Default::default()),
            Err(e) => {
                eprintln!("hop: {}", e);
                return 1;
            }
        };
        let outcome = bridge.run(&target).await;
        if let Some(diagnostic) = outcome.diagnostic() {
            eprintln!("hop: {}", diagnostic);
        }
        return outcome.exit_code();
    }

    let mut selector = Selector::new(browser, bridge, cli.term_type(), cli.colored());
    match selector.run().await {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, "Selector failed");
            eprintln!("hop: {}", e);
            1
        }
    }
}
