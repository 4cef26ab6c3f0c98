use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, CommandFactory, FromArgMatches, Parser, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
	/// Generated RTP packets at a fixed frame rate.
	TestPattern,
	/// A GStreamer test source, encoded to VP8.
	Gstreamer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Sink {
	/// Validate RTP headers and log sequence gaps.
	Monitor,
	/// Decode VP8 with GStreamer and display it.
	Gstreamer,
}

/// Relay a live video stream over RTP-over-QUIC.
#[derive(Parser, Clone, Debug, Serialize, Deserialize)]
#[command(name = "roq", version)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
	/// Run as the server and send media; otherwise connect as a client and receive media.
	// An explicit value, so an absent flag doesn't override the config file.
	#[arg(
		long,
		env = "ROQ_SERVER",
		action = ArgAction::Set,
		num_args = 0..=1,
		default_value_t = false,
		default_missing_value = "true"
	)]
	pub server: bool,

	/// The address to listen on as the server, or to connect to as the client.
	#[arg(long, env = "ROQ_ADDR", default_value = "localhost:8080")]
	pub addr: String,

	/// The flow identifier used by both endpoints.
	#[arg(long, env = "ROQ_FLOW", default_value_t = 0)]
	pub flow: u32,

	/// Where the sender's media comes from.
	#[arg(long, value_enum, env = "ROQ_SOURCE", default_value_t = Source::TestPattern)]
	pub source: Source,

	/// What the receiver does with the media.
	#[arg(long, value_enum, env = "ROQ_SINK", default_value_t = Sink::Monitor)]
	pub sink: Sink,

	/// How often to log throughput, or 0 to disable.
	#[arg(long, env = "ROQ_STATS_INTERVAL", default_value_t = 5)]
	pub stats_interval: u64,

	#[command(flatten)]
	pub log: roq_native::Log,

	#[command(flatten)]
	pub quic: roq_native::TransportConfig,

	/// TLS options when running as the server.
	#[command(flatten)]
	pub listener: roq_native::ServerConfig,

	/// TLS options when running as the client.
	#[command(flatten)]
	pub dialer: roq_native::ClientConfig,

	/// Read additional configuration from a TOML file.
	///
	/// Arguments given on the command line or via the environment take precedence.
	#[arg(long, env = "ROQ_CONFIG")]
	#[serde(skip)]
	pub config: Option<PathBuf>,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			server: false,
			addr: "localhost:8080".to_string(),
			flow: 0,
			source: Source::TestPattern,
			sink: Sink::Monitor,
			stats_interval: 5,
			log: Default::default(),
			quic: Default::default(),
			listener: Default::default(),
			dialer: Default::default(),
			config: None,
		}
	}
}

impl Config {
	pub fn load() -> anyhow::Result<Self> {
		Self::load_from(std::env::args_os().collect::<Vec<_>>())
	}

	fn load_from<I, T>(args: I) -> anyhow::Result<Self>
	where
		I: IntoIterator<Item = T> + Clone,
		T: Into<std::ffi::OsString> + Clone,
	{
		let config = Self::try_parse_from(args.clone())?;
		let Some(path) = config.config else {
			return Ok(config);
		};

		let contents = std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
		let mut file: Self = toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))?;

		// Apply the arguments again, this time without defaults so they don't clobber the file.
		let matches = Self::command()
			.mut_args(|arg| arg.default_value(None::<&'static str>))
			.try_get_matches_from(args)?;
		file.update_from_arg_matches(&matches)?;
		file.config = Some(path);

		Ok(file)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use std::io::Write;

	#[test]
	fn test_defaults() {
		let config = Config::load_from(["roq"]).unwrap();
		assert!(!config.server);
		assert_eq!(config.addr, "localhost:8080");
		assert_eq!(config.flow, 0);
		assert_eq!(config.source, Source::TestPattern);
		assert_eq!(config.sink, Sink::Monitor);
	}

	#[test]
	fn test_args() {
		let config = Config::load_from(["roq", "--server", "--addr", "0.0.0.0:4443", "--flow", "7"]).unwrap();
		assert!(config.server);
		assert_eq!(config.addr, "0.0.0.0:4443");
		assert_eq!(config.flow, 7);

		let config = Config::load_from(["roq", "--server", "false"]).unwrap();
		assert!(!config.server);

		assert!(Config::load_from(["roq", "--source", "camera"]).is_err());
	}

	#[test]
	fn test_file_then_args() {
		let path = std::env::temp_dir().join(format!("roq-config-{}.toml", std::process::id()));
		let mut file = std::fs::File::create(&path).unwrap();
		writeln!(
			file,
			r#"
			addr = "relay.example:9000"
			flow = 3
			sink = "gstreamer"

			[quic]
			keep_alive = "1s"
			"#
		)
		.unwrap();

		let path_arg = path.to_str().unwrap();
		let config = Config::load_from(["roq", "--config", path_arg, "--flow", "4"]).unwrap();

		// Kept from the file, rather than reset to the default.
		assert_eq!(config.addr, "relay.example:9000");
		assert_eq!(config.sink, Sink::Gstreamer);
		assert_eq!(config.quic.keep_alive, std::time::Duration::from_secs(1));

		// Overridden on the command line.
		assert_eq!(config.flow, 4);
		assert_eq!(config.config.as_deref(), Some(path.as_path()));

		std::fs::remove_file(path).unwrap();
	}

	#[test]
	fn test_file_flags() {
		let path = std::env::temp_dir().join(format!("roq-flags-{}.toml", std::process::id()));
		std::fs::write(&path, "server = true\nstats_interval = 9\n").unwrap();

		let path_arg = path.to_str().unwrap();

		// Not given on the command line, so the file wins.
		let config = Config::load_from(["roq", "--config", path_arg]).unwrap();
		assert!(config.server);
		assert_eq!(config.stats_interval, 9);

		let config = Config::load_from(["roq", "--config", path_arg, "--server", "false"]).unwrap();
		assert!(!config.server);

		std::fs::remove_file(path).unwrap();
	}
}
