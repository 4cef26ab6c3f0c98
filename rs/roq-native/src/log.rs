use clap::Args;
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Logging configuration, installed once per process with [Log::init].
#[derive(Args, Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Log {
	/// The level of logging; `RUST_LOG` directives are applied on top.
	#[arg(id = "log-level", long = "log-level", env = "ROQ_LOG_LEVEL", default_value_t = Level::INFO)]
	#[serde(with = "level")]
	pub level: Level,
}

impl Default for Log {
	fn default() -> Self {
		Self { level: Level::INFO }
	}
}

impl Log {
	pub fn new(level: Level) -> Self {
		Self { level }
	}

	pub fn level(&self) -> Level {
		self.level
	}

	pub fn init(&self) {
		let filter = EnvFilter::builder()
			.with_default_directive(self.level.into())
			.from_env_lossy()
			.add_directive("quinn=info".parse().unwrap())
			.add_directive("rustls=warn".parse().unwrap());

		let logger = tracing_subscriber::FmtSubscriber::builder()
			.with_writer(std::io::stderr)
			.with_env_filter(filter)
			.finish();

		if let Err(err) = tracing::subscriber::set_global_default(logger) {
			tracing::warn!(%err, "logger already installed");
		}
	}
}

mod level {
	use serde::{Deserialize, Deserializer, Serializer, de::Error};
	use tracing::Level;

	pub fn serialize<S: Serializer>(level: &Level, s: S) -> Result<S::Ok, S::Error> {
		s.serialize_str(level.as_str())
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Level, D::Error> {
		let s = String::deserialize(d)?;
		s.parse().map_err(D::Error::custom)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use clap::Parser;

	#[derive(Parser)]
	struct Cli {
		#[command(flatten)]
		log: Log,
	}

	#[test]
	fn test_level_arg() {
		let cli = Cli::try_parse_from(["roq", "--log-level", "debug"]).unwrap();
		assert_eq!(cli.log.level(), Level::DEBUG);

		let cli = Cli::try_parse_from(["roq"]).unwrap();
		assert_eq!(cli.log.level(), Level::INFO);

		assert!(Cli::try_parse_from(["roq", "--log-level", "loud"]).is_err());
	}

	#[test]
	fn test_level_file() {
		let log: Log = toml::from_str(r#"level = "warn""#).unwrap();
		assert_eq!(log.level(), Level::WARN);

		let log: Log = toml::from_str("").unwrap();
		assert_eq!(log.level(), Level::INFO);
	}
}
