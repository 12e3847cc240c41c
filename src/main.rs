/// Main entry point for the pickup matching engine
///
/// Thin wrapper that delegates to the interfaces layer; the wiring lives in
/// `interfaces::cli`.

use pickup_matching::interfaces::cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
