//! Spawns the external scanning tools as child processes.
//!
//! Targets are piped on stdin, stdout is collected whole, and every
//! invocation runs under a deadline. `kill_on_drop` ensures a child that
//! outlives its deadline is killed when the wait future is dropped.

use crate::errors::ToolFailure;
use crate::tools::{CrawlOptions, DnsRecordType, PortScanOptions, PortSelection, Tools};
use async_trait::async_trait;
use log::{debug, warn};
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Names of the external tools the pipeline shells out to.
pub const REQUIRED_TOOLS: &[&str] = &["subfinder", "dnsx", "httpx", "naabu", "katana", "whois"];

const STDERR_SNIPPET: usize = 500;

/// Production [`Tools`] implementation backed by child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Whether `tool` can be found on `PATH`.
    #[must_use]
    pub fn tool_available(tool: &str) -> bool {
        let Some(path) = std::env::var_os("PATH") else {
            return false;
        };
        std::env::split_paths(&path).any(|dir| dir.join(tool).is_file())
    }

    /// Availability of every required tool, in a stable order.
    #[must_use]
    pub fn check_tools() -> Vec<(&'static str, bool)> {
        REQUIRED_TOOLS
            .iter()
            .map(|tool| (*tool, Self::tool_available(tool)))
            .collect()
    }

    async fn run(
        tool: &'static str,
        args: &[String],
        stdin_data: Option<String>,
        deadline: Duration,
    ) -> Result<String, ToolFailure> {
        debug!("running {tool} {}", args.join(" "));

        let mut command = Command::new(tool);
        command
            .args(args)
            .stdin(if stdin_data.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                ToolFailure::NotFound { tool }
            } else {
                ToolFailure::Io { tool, source }
            }
        })?;

        if let Some(data) = stdin_data {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| ToolFailure::Io {
                    tool,
                    source: std::io::Error::new(ErrorKind::BrokenPipe, "stdin not captured"),
                })?;
            stdin
                .write_all(data.as_bytes())
                .await
                .map_err(|source| ToolFailure::Io { tool, source })?;
            // Closing stdin lets line-reading tools finish.
            drop(stdin);
        }

        let output = tokio::time::timeout(deadline, child.wait_with_output())
            .await
            .map_err(|_| ToolFailure::Timeout {
                tool,
                seconds: deadline.as_secs(),
            })?
            .map_err(|source| ToolFailure::Io { tool, source })?;

        if !output.status.success() {
            let stderr: String = String::from_utf8_lossy(&output.stderr)
                .chars()
                .take(STDERR_SNIPPET)
                .collect();
            warn!("{tool} exited with {}: {stderr}", output.status);
            return Err(ToolFailure::Failed {
                tool,
                code: output.status.code(),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Tools for ProcessRunner {
    async fn enumerate_subdomains(
        &self,
        domain: &str,
        timeout: Duration,
    ) -> Result<String, ToolFailure> {
        let args = vec!["-d".to_owned(), domain.to_owned(), "-silent".to_owned()];
        Self::run("subfinder", &args, None, timeout).await
    }

    async fn resolve_dns(
        &self,
        hosts: &[String],
        records: &[DnsRecordType],
        timeout: Duration,
    ) -> Result<String, ToolFailure> {
        let mut args = vec!["-silent".to_owned(), "-json".to_owned(), "-resp".to_owned()];
        args.extend(records.iter().map(|r| r.flag().to_owned()));
        Self::run("dnsx", &args, Some(hosts.join("\n")), timeout).await
    }

    async fn probe_http(
        &self,
        targets: &[String],
        timeout: Duration,
    ) -> Result<String, ToolFailure> {
        let args = vec![
            "-silent".to_owned(),
            "-json".to_owned(),
            "-tech-detect".to_owned(),
            "-follow-redirects".to_owned(),
        ];
        Self::run("httpx", &args, Some(targets.join("\n")), timeout).await
    }

    async fn scan_ports(
        &self,
        hosts: &[String],
        options: PortScanOptions,
        timeout: Duration,
    ) -> Result<String, ToolFailure> {
        let mut args = vec![
            "-silent".to_owned(),
            "-json".to_owned(),
            "-rate".to_owned(),
            options.rate.to_string(),
        ];
        match options.selection {
            PortSelection::Top(n) => {
                args.push("-top-ports".to_owned());
                args.push(n.to_string());
            }
            PortSelection::FullRange => {
                args.push("-p".to_owned());
                args.push("-".to_owned());
            }
        }
        Self::run("naabu", &args, Some(hosts.join("\n")), timeout).await
    }

    async fn crawl(
        &self,
        targets: &[String],
        options: &CrawlOptions,
        timeout: Duration,
    ) -> Result<String, ToolFailure> {
        let mut args = vec![
            "-silent".to_owned(),
            "-jsonl".to_owned(),
            "-depth".to_owned(),
            options.depth.to_string(),
        ];
        if options.javascript {
            args.push("-jc".to_owned());
        }
        if options.form_interaction {
            args.push("-aff".to_owned());
        }
        for (name, value) in &options.headers {
            args.push("-H".to_owned());
            args.push(format!("{name}: {value}"));
        }
        Self::run("katana", &args, Some(targets.join("\n")), timeout).await
    }

    async fn whois(&self, domain: &str, timeout: Duration) -> Result<String, ToolFailure> {
        let args = vec![domain.to_owned()];
        Self::run("whois", &args, None, timeout).await
    }
}
