// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use termd::config::Config;

fn main() {
    let config = Config::parse();

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    termd::init_tracing(&config);

    if let Err(e) = termd::run(config) {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
