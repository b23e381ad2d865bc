/**
 * Widget Bench GUI
 * main.rs
 * Entry point of the graphical benchmark tool. Loads the shared settings file,
 * sets up logging and opens the window.
 */
mod gui;
mod iced_toolkit;

use bench_engine::BenchSettings;
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gui=info,bench_engine=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // A broken settings file should not keep the window from opening.
    let settings = match BenchSettings::discover(None) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("{}, using defaults", e);
            BenchSettings::default()
        }
    };

    match gui::run(settings) {
        Ok(_) => println!("Application exited successfully"),
        Err(e) => println!("Error running application: {}", e),
    }
}
