use anyhow::{anyhow, Result};
use log::*;

use engine::config::value_after;
use engine::{samples, Config, Engine};

const DEFAULT_CONFIG: &str = "config.toml";

fn main() -> Result<()> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();

    let path = value_after(&args, "--config").unwrap_or(DEFAULT_CONFIG);
    let mut config = Config::from_file_or_default(path);
    config.apply_args(&args);

    init_logging(&config.logging.level);
    config.validate()?;

    let sample = samples::create(&config.sample.name)
        .ok_or_else(|| anyhow!("Unknown sample `{}`.", config.sample.name))?;

    info!("Starting sample `{}`.", config.sample.name);

    let engine = match Engine::new(&config, sample) {
        Ok(engine) => engine,
        Err(err) => {
            error!("{:#}", err);
            return Err(err);
        }
    };
    engine.run()?;

    Ok(())
}

/// `RUST_LOG` wins over the configured level.
fn init_logging(level: &str) {
    let mut builder = pretty_env_logger::formatted_builder();
    match std::env::var("RUST_LOG") {
        Ok(filters) => builder.parse_filters(&filters),
        Err(_) => builder.parse_filters(level),
    };
    builder.init();
}
