//! Provides a means to read, parse and hold configuration options for runs.
use crate::profile::{Depth, ProfileOverrides};
use clap::Parser;
use serde_derive::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "surfscan",
    version = env!("CARGO_PKG_VERSION"),
    max_term_width = 120,
    help_template = "{bin} {version}\n{about}\n\nUSAGE:\n    {usage}\n\nOPTIONS:\n{options}",
)]
#[allow(clippy::struct_excessive_bools)]
/// Attack surface discovery by orchestrating external recon tools.
/// Runs subdomain enumeration, DNS resolution, HTTP probing, port scanning
/// and web crawling against a target domain and writes a single JSON report.
/// Requires subfinder, dnsx, httpx, naabu and katana on PATH; run
/// `surfscan --check-tools` to verify.
pub struct Opts {
    /// Target URL or domain to discover, e.g. `https://example.com` or `example.com`.
    #[arg(short, long)]
    pub target: Option<String>,

    /// Output file path. Defaults to `discovery_<domain>.json`.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Discovery depth level.
    #[arg(short, long, value_enum, ignore_case = true, default_value = "normal")]
    pub depth: Depth,

    /// Maximum parallel tasks within a stage.
    #[arg(short, long)]
    pub parallel: Option<usize>,

    /// Cap on subdomains carried forward from enumeration.
    #[arg(short, long)]
    pub max_subdomains: Option<usize>,

    /// Path to a TOML authentication configuration file. Enables the
    /// authenticated crawl stage.
    #[arg(short, long)]
    pub auth_config: Option<PathBuf>,

    /// Check whether the required external tools are installed, then exit.
    #[arg(long)]
    pub check_tools: bool,

    /// Whether to ignore the configuration file or not.
    #[arg(short, long)]
    pub no_config: bool,

    /// Hide the banner
    #[arg(long)]
    pub no_banner: bool,

    /// Custom path to config file
    #[arg(short, long, value_parser)]
    pub config_path: Option<PathBuf>,
}

#[cfg(not(tarpaulin_include))]
impl Opts {
    pub fn read() -> Self {
        Opts::parse()
    }
}

impl Opts {
    /// Merges values found within the user configuration file under the
    /// command line arguments.
    pub fn merge(&mut self, config: &Config) {
        if !self.no_config {
            self.merge_required(config);
            self.merge_optional(config);
        }
    }

    fn merge_required(&mut self, config: &Config) {
        macro_rules! merge_required {
            ($($field: ident),+) => {
                $(
                    if let Some(e) = &config.$field {
                        self.$field = e.clone();
                    }
                )+
            }
        }

        merge_required!(depth);
    }

    fn merge_optional(&mut self, config: &Config) {
        macro_rules! merge_optional {
            ($($field: ident),+) => {
                $(
                    if config.$field.is_some() {
                        self.$field = config.$field.clone();
                    }
                )+
            }
        }

        merge_optional!(parallel, max_subdomains, auth_config, output);
    }

    /// The profile overrides this invocation asks for: the config file's
    /// `[profile]` table with the CLI flags applied on top.
    pub fn profile_overrides(&self, config: &Config) -> ProfileOverrides {
        let mut overrides = if self.no_config {
            ProfileOverrides::default()
        } else {
            config.profile.clone().unwrap_or_default()
        };
        if self.parallel.is_some() {
            overrides.parallel = self.parallel;
        }
        if self.max_subdomains.is_some() {
            overrides.max_subdomains = self.max_subdomains;
        }
        overrides
    }
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            target: None,
            output: None,
            depth: Depth::Normal,
            parallel: None,
            max_subdomains: None,
            auth_config: None,
            check_tools: false,
            no_config: true,
            no_banner: false,
            config_path: None,
        }
    }
}

/// Struct used to deserialize the options specified within our config file.
/// These will be further merged with our command line arguments in order to
/// generate the final Opts struct.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    depth: Option<Depth>,
    parallel: Option<usize>,
    max_subdomains: Option<usize>,
    auth_config: Option<PathBuf>,
    output: Option<PathBuf>,
    profile: Option<ProfileOverrides>,
}

#[cfg(not(tarpaulin_include))]
impl Config {
    /// Reads the configuration file with TOML format and parses it into a
    /// Config struct.
    ///
    /// # Format
    ///
    /// depth = "deep"
    /// parallel = 20
    /// max_subdomains = 100
    ///
    /// [profile]
    /// crawl_timeout = 900
    /// port_scan_rate = 2000
    ///
    pub fn read(custom_config_path: Option<PathBuf>) -> Self {
        let mut content = String::new();
        let config_path = custom_config_path.unwrap_or_else(default_config_path);
        if config_path.exists() {
            content = match fs::read_to_string(config_path) {
                Ok(content) => content,
                Err(_) => String::new(),
            }
        }

        let config: Config = match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                println!("Found {e} in configuration file.\nAborting scan.\n");
                std::process::exit(1);
            }
        };

        config
    }
}

/// Constructs default path to config toml
pub fn default_config_path() -> PathBuf {
    let Some(mut config_path) = dirs::home_dir() else {
        panic!("Could not infer config file path.");
    };
    config_path.push(".surfscan.toml");
    config_path
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use parameterized::parameterized;

    use super::{Config, Opts};
    use crate::profile::{Depth, ProfileOverrides};

    impl Config {
        fn sample() -> Self {
            Self {
                depth: Some(Depth::Deep),
                parallel: Some(20),
                max_subdomains: Some(100),
                auth_config: None,
                output: None,
                profile: Some(ProfileOverrides {
                    crawl_timeout: Some(900),
                    ..ProfileOverrides::default()
                }),
            }
        }
    }

    #[test]
    fn verify_cli() {
        Opts::command().debug_assert();
    }

    #[parameterized(input = {
        vec!["surfscan", "--target", "example.com"],
        vec!["surfscan", "-t", "example.com", "--depth", "DEEP"],
        vec!["surfscan", "-t", "example.com", "-d", "shallow", "-p", "3"],
    }, depth = {
        Depth::Normal,
        Depth::Deep,
        Depth::Shallow,
    })]
    fn parse_depth(input: Vec<&str>, depth: Depth) {
        let opts = Opts::parse_from(input);

        assert_eq!(opts.target.as_deref(), Some("example.com"));
        assert_eq!(opts.depth, depth);
    }

    #[test]
    fn opts_no_merge_when_config_is_ignored() {
        let mut opts = Opts::default();
        let config = Config::sample();

        opts.merge(&config);

        assert_eq!(opts.depth, Depth::Normal);
        assert_eq!(opts.parallel, None);
        assert_eq!(opts.max_subdomains, None);
    }

    #[test]
    fn opts_merge_config_values() {
        let mut opts = Opts {
            no_config: false,
            ..Opts::default()
        };
        let config = Config::sample();

        opts.merge(&config);

        assert_eq!(opts.depth, Depth::Deep);
        assert_eq!(opts.parallel, Some(20));
        assert_eq!(opts.max_subdomains, Some(100));
    }

    #[test]
    fn cli_flags_win_over_profile_table() {
        let opts = Opts {
            no_config: false,
            parallel: Some(3),
            ..Opts::default()
        };
        let mut config = Config::sample();
        config.profile = Some(ProfileOverrides {
            parallel: Some(50),
            crawl_timeout: Some(900),
            ..ProfileOverrides::default()
        });

        let overrides = opts.profile_overrides(&config);

        assert_eq!(overrides.parallel, Some(3));
        assert_eq!(overrides.crawl_timeout, Some(900));
    }

    #[test]
    fn config_file_format_parses() {
        let raw = "\
depth = \"deep\"
parallel = 20

[profile]
crawl_timeout = 900
port_scan_rate = 2000
";
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.depth, Some(Depth::Deep));
        assert_eq!(config.parallel, Some(20));
        let profile = config.profile.unwrap();
        assert_eq!(profile.crawl_timeout, Some(900));
        assert_eq!(profile.port_scan_rate, Some(2000));
    }
}
