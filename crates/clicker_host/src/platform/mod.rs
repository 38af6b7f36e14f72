mod app;
mod bridge;
mod framing;
mod logging;
mod persistence;
mod protocol;

pub use app::run_host;
