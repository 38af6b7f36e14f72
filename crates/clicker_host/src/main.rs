//! Native-messaging host for the consent clicker extension.
//!
//! The browser starts this process and talks to it over stdin/stdout, so
//! nothing but protocol frames may ever be written to stdout.
mod platform;

fn main() -> anyhow::Result<()> {
    platform::run_host()
}
