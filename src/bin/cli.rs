use meridian::config;
use meridian::logger;
use meridian::uci::UciSession;
use std::path::Path;
use tracing::warn;

const INIT_FILE: &str = "meridian.ini";

fn main() {
    if let Some(path) = std::env::var_os("MERIDIAN_LOG") {
        logger::init_logging(Path::new(&path), "info");
    }

    let mut session = UciSession::new();

    // Optional init file: `key = value` pairs through the option path.
    if Path::new(INIT_FILE).exists() {
        match config::load(Path::new(INIT_FILE)) {
            Ok(pairs) => {
                for (name, value) in pairs {
                    session.apply_option(&name, &value);
                }
            }
            Err(err) => warn!(%err, "ignoring init file"),
        }
    }

    session.run();
}
