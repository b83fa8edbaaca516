// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concrete transports for [`mux_core`]: a `tungstenite`-backed WebSocket
//! listener for viewers and a Unix-domain admin control socket. Neither
//! the reactor nor a pane ever sees a real fd directly outside this crate.

pub mod config;
pub mod control;
pub mod ws;

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, info};

use mux_core::auth::AuthStore;
use mux_core::event_loop::EventLoop;

use crate::config::Config;
use crate::control::ControlSocket;
use crate::ws::WsAcceptor;

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Registered as the SIGINT/SIGTERM handler; signal handlers may only
/// touch async-signal-safe state, so this just flips a flag for the
/// reactor's main loop to notice on its next tick.
extern "C" fn request_shutdown(_signum: i32) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

/// Registering a signal handler is inherently unsafe: the kernel may
/// invoke `request_shutdown` at any point, including mid-allocation, so
/// its body is restricted to a single atomic store.
#[allow(unsafe_code)]
fn install_signal_handlers() -> anyhow::Result<()> {
    use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

    let action = SigAction::new(SigHandler::Handler(request_shutdown), SaFlags::empty(), SigSet::empty());
    unsafe {
        sigaction(Signal::SIGINT, &action)?;
        sigaction(Signal::SIGTERM, &action)?;
    }
    Ok(())
}

pub fn init_tracing(config: &Config) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let result = match config.log_format.as_str() {
        "json" => tracing_subscriber::fmt().with_env_filter(filter).json().try_init(),
        _ => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

/// Build the reactor, bind its transports, and run it to completion.
/// Returns once a shutdown has been requested and the reactor has
/// stopped ticking.
pub fn run(config: Config) -> anyhow::Result<()> {
    install_signal_handlers()?;

    let token_file_path = config.token_file.clone();
    let control_socket_path = config.control_socket.clone();
    let host = config.host.clone();
    let port = config.port;

    let run_config = config.into_run_config();

    let auth = AuthStore::generate();
    auth.write_token_file(&token_file_path)?;
    info!("wrote master/view tokens to {}", token_file_path.display());

    let mut event_loop = EventLoop::new(run_config, auth)?;

    let acceptor = WsAcceptor::bind(&host, port)?;
    info!("websocket listening on {}", acceptor.local_addr()?);
    event_loop.set_accept(Box::new(acceptor));

    if let Some(path) = control_socket_path.as_ref() {
        let control = ControlSocket::bind(path)?;
        info!("admin control socket listening on {}", path.display());
        event_loop.set_ipc(Box::new(control));
    }

    while event_loop.running {
        if SHUTDOWN_REQUESTED.swap(false, Ordering::SeqCst) {
            info!("shutdown requested");
            event_loop.request_shutdown();
            continue;
        }
        if let Err(e) = event_loop.tick() {
            error!("reactor tick failed: {e}");
        }
    }
    Ok(())
}
