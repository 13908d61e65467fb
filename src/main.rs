mod cli;
mod config;
mod error;
mod exercises;
mod gestures;
mod ipc;
mod landmarks;
mod logging;
mod session;
mod tracker;

fn main() -> anyhow::Result<()> {
    logging::init();
    cli::run()
}
