//! sshroute: a SOCKS5 proxy that sends each destination through the SSH
//! tunnel chosen by its filters, or connects directly.

use std::process::ExitCode;

use clap::Parser;
use sshroute_socks::ProxyArgs;

#[tokio::main]
async fn main() -> ExitCode {
    let args = ProxyArgs::parse();

    match sshroute_socks::cli::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
