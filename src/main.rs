mod cli;
mod config;
mod control;
mod detector;
mod driver;
mod engine;
mod frame;
mod idle;
mod ipc;
mod logging;
mod physics;

fn main() -> anyhow::Result<()> {
    logging::init();
    cli::run()
}
