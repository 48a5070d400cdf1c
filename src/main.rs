//! `subdash` binary: owner and subscriber flows from the terminal.
//!
//! Command results go to stdout, notices and logs to stderr. See
//! `subdash --help` for the command tree.

mod cli;
mod render;
mod run;

use std::process;

use crate::run::run;

#[tokio::main]
async fn main() {
    let result = run().await;
    if let Err(e) = result {
        eprintln!("{e}");
        process::exit(1)
    }
}
