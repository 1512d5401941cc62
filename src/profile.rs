//! Provides the depth presets that control how aggressive a discovery run is.
//!
//! A [`DepthProfile`] is pure data: per-tool timeouts, parallelism, port scan
//! rate, crawl depth and feature toggles. Three built-in presets exist and
//! callers may override individual fields, but the merged result always has
//! to pass the same bounds checks as the presets themselves.

use crate::errors::ConfigError;
use clap::ValueEnum;
use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// How aggressive the discovery run should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    /// Quick look: few subdomains, top 100 ports, shallow crawl.
    Shallow,
    /// The default: top 1000 ports, moderate crawl depth.
    Normal,
    /// Everything: full port range on small host sets, deep crawling with
    /// script execution and form interaction.
    Deep,
}

impl Depth {
    /// Parses a depth name, falling back to `Normal` for unrecognized input.
    pub fn parse_lossy(input: &str) -> Self {
        match input.to_ascii_lowercase().as_str() {
            "shallow" => Self::Shallow,
            "deep" => Self::Deep,
            _ => Self::Normal,
        }
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shallow => write!(f, "shallow"),
            Self::Normal => write!(f, "normal"),
            Self::Deep => write!(f, "deep"),
        }
    }
}

/// Per-capability timeouts in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToolTimeouts {
    /// Subdomain enumeration deadline.
    pub subdomain_enum: u64,
    /// DNS resolution deadline.
    pub dns: u64,
    /// HTTP probing deadline.
    pub http_probe: u64,
    /// Port scanning deadline.
    pub port_scan: u64,
    /// Web crawling deadline (plain and authenticated).
    pub crawl: u64,
}

impl ToolTimeouts {
    /// The DNS deadline as a [`Duration`].
    pub fn dns_duration(&self) -> Duration {
        Duration::from_secs(self.dns)
    }
}

/// Resolved configuration for one discovery run. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct DepthProfile {
    /// The preset this profile was derived from.
    pub depth: Depth,
    /// Per-capability timeouts.
    pub timeouts: ToolTimeouts,
    /// Bound on concurrent fan-out within a stage.
    pub parallel: usize,
    /// Cap on subdomains carried forward from enumeration, if any.
    pub max_subdomains: Option<usize>,
    /// Cap on live services handed to the crawler.
    pub max_crawl_services: usize,
    /// Link depth for web crawling.
    pub crawl_depth: u8,
    /// Packets per second for port scanning.
    pub port_scan_rate: u32,
    /// Whether the crawler may submit and interact with forms.
    pub form_interaction: bool,
    /// Whether the crawler executes page scripts.
    pub javascript_execution: bool,
}

impl DepthProfile {
    /// Returns the built-in preset for `depth`.
    pub fn preset(depth: Depth) -> Self {
        match depth {
            Depth::Shallow => Self {
                depth,
                timeouts: ToolTimeouts {
                    subdomain_enum: 60,
                    dns: 120,
                    http_probe: 180,
                    port_scan: 90,
                    crawl: 300,
                },
                parallel: 5,
                max_subdomains: Some(20),
                max_crawl_services: 3,
                crawl_depth: 2,
                port_scan_rate: 1000,
                form_interaction: false,
                javascript_execution: false,
            },
            Depth::Normal => Self {
                depth,
                timeouts: ToolTimeouts {
                    subdomain_enum: 180,
                    dns: 120,
                    http_probe: 180,
                    port_scan: 180,
                    crawl: 600,
                },
                parallel: 10,
                max_subdomains: None,
                max_crawl_services: 10,
                crawl_depth: 3,
                port_scan_rate: 1500,
                form_interaction: false,
                javascript_execution: false,
            },
            Depth::Deep => Self {
                depth,
                timeouts: ToolTimeouts {
                    subdomain_enum: 300,
                    dns: 120,
                    http_probe: 180,
                    // Full port range scans need the long leash.
                    port_scan: 900,
                    crawl: 1200,
                },
                parallel: 15,
                max_subdomains: None,
                max_crawl_services: 20,
                crawl_depth: 5,
                port_scan_rate: 3000,
                form_interaction: true,
                javascript_execution: true,
            },
        }
    }
}

/// Optional field-by-field overrides applied on top of a preset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileOverrides {
    /// Override for concurrent fan-out.
    pub parallel: Option<usize>,
    /// Override for the subdomain cap.
    pub max_subdomains: Option<usize>,
    /// Override for the crawled-services cap.
    pub max_crawl_services: Option<usize>,
    /// Override for crawl link depth.
    pub crawl_depth: Option<u8>,
    /// Override for port scan packet rate.
    pub port_scan_rate: Option<u32>,
    /// Override for the subdomain enumeration timeout.
    pub subdomain_enum_timeout: Option<u64>,
    /// Override for the DNS timeout.
    pub dns_timeout: Option<u64>,
    /// Override for the HTTP probing timeout.
    pub http_probe_timeout: Option<u64>,
    /// Override for the port scan timeout.
    pub port_scan_timeout: Option<u64>,
    /// Override for the crawl timeout.
    pub crawl_timeout: Option<u64>,
    /// Override for form interaction.
    pub form_interaction: Option<bool>,
    /// Override for script execution.
    pub javascript_execution: Option<bool>,
}

/// Builds a validated profile from a preset plus caller overrides.
///
/// Overrides are merged field by field over the matching preset, then the
/// merged profile is checked against the same bounds as the presets. A
/// violated bound fails with a [`ConfigError`] naming the field rather than
/// being clamped.
pub fn resolve(depth: Depth, overrides: &ProfileOverrides) -> Result<DepthProfile, ConfigError> {
    let mut profile = DepthProfile::preset(depth);

    macro_rules! merge_field {
        ($($field:ident),+ $(,)?) => {
            $(
                if let Some(value) = overrides.$field {
                    profile.$field = value;
                }
            )+
        }
    }
    macro_rules! merge_timeout {
        ($($override_field:ident => $field:ident),+ $(,)?) => {
            $(
                if let Some(value) = overrides.$override_field {
                    profile.timeouts.$field = value;
                }
            )+
        }
    }

    merge_field!(
        parallel,
        max_crawl_services,
        crawl_depth,
        port_scan_rate,
        form_interaction,
        javascript_execution,
    );
    merge_timeout!(
        subdomain_enum_timeout => subdomain_enum,
        dns_timeout => dns,
        http_probe_timeout => http_probe,
        port_scan_timeout => port_scan,
        crawl_timeout => crawl,
    );

    if overrides.max_subdomains.is_some() {
        profile.max_subdomains = overrides.max_subdomains;
    }

    validate(&profile)?;
    Ok(profile)
}

fn validate(profile: &DepthProfile) -> Result<(), ConfigError> {
    fn positive(field: &'static str, value: u64) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::InvalidField {
                field,
                reason: "must be a positive integer".to_owned(),
            });
        }
        Ok(())
    }

    positive("parallel", profile.parallel as u64)?;
    positive("max_crawl_services", profile.max_crawl_services as u64)?;
    positive("crawl_depth", u64::from(profile.crawl_depth))?;
    positive("port_scan_rate", u64::from(profile.port_scan_rate))?;
    positive("subdomain_enum_timeout", profile.timeouts.subdomain_enum)?;
    positive("dns_timeout", profile.timeouts.dns)?;
    positive("http_probe_timeout", profile.timeouts.http_probe)?;
    positive("port_scan_timeout", profile.timeouts.port_scan)?;
    positive("crawl_timeout", profile.timeouts.crawl)?;

    if let Some(max) = profile.max_subdomains {
        positive("max_subdomains", max as u64)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{resolve, Depth, DepthProfile, ProfileOverrides};
    use parameterized::parameterized;

    #[test]
    fn presets_widen_with_depth() {
        let shallow = DepthProfile::preset(Depth::Shallow);
        let normal = DepthProfile::preset(Depth::Normal);
        let deep = DepthProfile::preset(Depth::Deep);

        assert!(shallow.timeouts.subdomain_enum <= normal.timeouts.subdomain_enum);
        assert!(normal.timeouts.subdomain_enum <= deep.timeouts.subdomain_enum);
        assert!(shallow.timeouts.port_scan <= normal.timeouts.port_scan);
        assert!(normal.timeouts.port_scan <= deep.timeouts.port_scan);
        assert!(shallow.timeouts.crawl <= normal.timeouts.crawl);
        assert!(normal.timeouts.crawl <= deep.timeouts.crawl);
        assert!(shallow.crawl_depth <= normal.crawl_depth);
        assert!(normal.crawl_depth <= deep.crawl_depth);
        assert!(shallow.max_crawl_services <= normal.max_crawl_services);
        assert!(normal.max_crawl_services <= deep.max_crawl_services);
        assert!(shallow.port_scan_rate <= normal.port_scan_rate);
        assert!(normal.port_scan_rate <= deep.port_scan_rate);
    }

    #[test]
    fn unknown_depth_falls_back_to_normal() {
        assert_eq!(Depth::parse_lossy("extreme"), Depth::Normal);
        assert_eq!(Depth::parse_lossy("SHALLOW"), Depth::Shallow);
        assert_eq!(Depth::parse_lossy("deep"), Depth::Deep);
    }

    #[test]
    fn overrides_merge_over_preset() {
        let overrides = ProfileOverrides {
            parallel: Some(3),
            max_subdomains: Some(5),
            crawl_timeout: Some(42),
            ..ProfileOverrides::default()
        };
        let profile = resolve(Depth::Normal, &overrides).unwrap();

        assert_eq!(profile.parallel, 3);
        assert_eq!(profile.max_subdomains, Some(5));
        assert_eq!(profile.timeouts.crawl, 42);
        // Untouched fields keep their preset values.
        assert_eq!(profile.crawl_depth, 3);
        assert_eq!(profile.port_scan_rate, 1500);
    }

    #[parameterized(overrides = {
        ProfileOverrides { parallel: Some(0), ..ProfileOverrides::default() },
        ProfileOverrides { max_subdomains: Some(0), ..ProfileOverrides::default() },
        ProfileOverrides { crawl_depth: Some(0), ..ProfileOverrides::default() },
        ProfileOverrides { port_scan_rate: Some(0), ..ProfileOverrides::default() },
        ProfileOverrides { dns_timeout: Some(0), ..ProfileOverrides::default() },
    }, field = {
        "parallel",
        "max_subdomains",
        "crawl_depth",
        "port_scan_rate",
        "dns_timeout",
    })]
    fn zero_values_are_rejected_by_name(overrides: ProfileOverrides, field: &str) {
        let err = resolve(Depth::Deep, &overrides).unwrap_err();
        assert!(err.to_string().contains(field), "error was: {err}");
    }

    #[test]
    fn presets_validate_cleanly() {
        for depth in [Depth::Shallow, Depth::Normal, Depth::Deep] {
            resolve(depth, &ProfileOverrides::default()).unwrap();
        }
    }
}
