//! Command-line interface handling for the structure type host.
//!
//! Uses the `clap` builder API. Every option overrides the matching setting
//! from the configuration file.

use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;
use type_loader::CompatibilityConfig;

/// Command line arguments parsed from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for the extension directory
    pub extension_dir: Option<PathBuf>,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Abort loading on dependency cycles instead of disabling the extension
    pub debug_graph: bool,
    /// Whether to allow extensions built by a different Rust compiler (DANGEROUS)
    pub danger_allow_unsafe_extensions: bool,
    /// Whether to allow extensions built against a different API version (DANGEROUS)
    pub danger_allow_abi_mismatch: bool,
    /// Whether to require exact version matching including patch digits
    pub strict_versioning: bool,
}

fn command() -> Command {
    Command::new("Structure Type Host")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Loads structure type extensions with dependency checking")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("extensions")
                .short('e')
                .long("extensions")
                .value_name("DIR")
                .help("Extension directory path"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("debug-graph")
                .long("debug-graph")
                .help("Fail the whole load on a dependency cycle instead of skipping the extension")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("danger-allow-unsafe-extensions")
                .long("danger-allow-unsafe-extensions")
                .help("Allow loading extensions compiled with different Rust compiler versions (MAY CAUSE CRASHES)")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("danger-allow-abi-mismatch")
                .long("danger-allow-abi-mismatch")
                .help("Allow loading extensions built against a different API version (MAY CAUSE CRASHES OR UNDEFINED BEHAVIOR)")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("strict-versioning")
                .long("strict-versioning")
                .help("Require exact version matching including patch digits (default: only major.minor must match)")
                .action(clap::ArgAction::SetTrue),
        )
}

impl CliArgs {
    /// Parses the process arguments. Exits with usage on invalid input.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    /// Parses an explicit argument list, first element being the program name.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(Self::from_matches(&command().try_get_matches_from(args)?))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config.toml")),
            extension_dir: matches.get_one::<String>("extensions").map(PathBuf::from),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            debug_graph: matches.get_flag("debug-graph"),
            danger_allow_unsafe_extensions: matches.get_flag("danger-allow-unsafe-extensions"),
            danger_allow_abi_mismatch: matches.get_flag("danger-allow-abi-mismatch"),
            strict_versioning: matches.get_flag("strict-versioning"),
        }
    }

    /// Compatibility overrides requested on the command line.
    pub fn to_compatibility_config(&self) -> CompatibilityConfig {
        CompatibilityConfig {
            allow_rustc_mismatch: self.danger_allow_unsafe_extensions,
            allow_abi_mismatch: self.danger_allow_abi_mismatch,
            strict_versioning: self.strict_versioning,
        }
    }
}
