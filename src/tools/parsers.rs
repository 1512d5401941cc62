//! Parsers for raw tool output.
//!
//! Each parser takes the whole stdout of one invocation. Output is line
//! oriented (plain lines or JSONL); a malformed individual line is logged
//! and skipped, never fatal, so one garbled record cannot void a scan.

use crate::model::{DnsRecords, SecurityHeaders, Service, Technology, WhoisData};
use chrono::Utc;
use log::{debug, warn};
use serde_derive::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

/// Parses subdomain enumeration output into a sorted, deduplicated list of
/// lowercased hostnames. Comment lines, schemes, paths and ports are
/// stripped.
pub fn parse_subdomains(output: &str) -> Vec<String> {
    let mut names = BTreeSet::new();
    for line in output.lines() {
        let mut entry = line.trim();
        if entry.is_empty() || entry.starts_with('#') || entry.starts_with(';') {
            continue;
        }
        if let Some((_, rest)) = entry.split_once("://") {
            entry = rest;
        }
        if let Some((host, _)) = entry.split_once('/') {
            entry = host;
        }
        // A single colon is a port; more than one means IPv6, keep as is.
        if entry.matches(':').count() == 1 {
            entry = entry.split(':').next().unwrap_or(entry);
        }
        if !entry.is_empty() {
            names.insert(entry.to_ascii_lowercase());
        }
    }
    names.into_iter().collect()
}

#[derive(Deserialize)]
struct DnsxRecord {
    host: String,
    #[serde(default)]
    a: Vec<String>,
    #[serde(default)]
    aaaa: Vec<String>,
    #[serde(default)]
    cname: Vec<String>,
    #[serde(default)]
    mx: Vec<String>,
    #[serde(default)]
    txt: Vec<String>,
    #[serde(default)]
    ns: Vec<String>,
}

/// Parses dnsx JSONL into records keyed by lowercased hostname. Multiple
/// lines for the same host merge into one record.
pub fn parse_dns(output: &str) -> BTreeMap<String, DnsRecords> {
    let mut records: BTreeMap<String, DnsRecords> = BTreeMap::new();

    for line in jsonl_lines(output) {
        let parsed: DnsxRecord = match serde_json::from_str(line) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("skipping malformed dnsx line: {err}");
                continue;
            }
        };

        let entry = records.entry(parsed.host.to_ascii_lowercase()).or_default();
        entry.a.extend(parsed.a);
        entry.aaaa.extend(parsed.aaaa);
        if entry.cname.is_none() {
            entry.cname = parsed.cname.into_iter().next();
        }
        extend_optional(&mut entry.mx, parsed.mx);
        extend_optional(&mut entry.txt, parsed.txt);
        extend_optional(&mut entry.ns, parsed.ns);
    }

    debug!("parsed DNS records for {} hosts", records.len());
    records
}

fn extend_optional(target: &mut Option<Vec<String>>, values: Vec<String>) {
    if values.is_empty() {
        return;
    }
    target.get_or_insert_with(Vec::new).extend(values);
}

#[derive(Deserialize)]
struct HttpxRecord {
    #[serde(default)]
    url: String,
    #[serde(default)]
    status_code: Option<u16>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    webserver: Option<String>,
    #[serde(default)]
    content_length: Option<u64>,
    #[serde(default)]
    tech: Vec<String>,
    #[serde(default)]
    header: BTreeMap<String, String>,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    final_url: Option<String>,
}

/// Parses httpx JSONL into [`Service`] records.
pub fn parse_http_services(output: &str) -> Vec<Service> {
    let mut services = Vec::new();

    for line in jsonl_lines(output) {
        let parsed: HttpxRecord = match serde_json::from_str(line) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("skipping malformed httpx line: {err}");
                continue;
            }
        };
        if parsed.url.is_empty() {
            warn!("skipping httpx record without a url");
            continue;
        }

        let technologies = parsed
            .tech
            .into_iter()
            .map(|name| Technology {
                name,
                version: None,
                category: None,
            })
            .collect();

        let header = |name: &str| parsed.header.get(name).cloned();
        let security_headers = SecurityHeaders {
            strict_transport_security: header("strict-transport-security"),
            content_security_policy: header("content-security-policy"),
            x_frame_options: header("x-frame-options"),
            x_content_type_options: header("x-content-type-options"),
            x_xss_protection: header("x-xss-protection"),
            referrer_policy: header("referrer-policy"),
            permissions_policy: header("permissions-policy"),
        };

        services.push(Service {
            url: parsed.url,
            status_code: parsed.status_code,
            title: parsed.title,
            server: parsed.webserver,
            content_length: parsed.content_length,
            technologies,
            security_headers,
            tls_info: None,
            response_time_ms: parsed.time.as_deref().and_then(parse_response_time),
            redirects_to: parsed.final_url,
            discovered_at: Utc::now(),
        });
    }

    debug!("parsed {} services from httpx", services.len());
    services
}

/// Normalizes an httpx duration string to milliseconds. Accepts `"250ms"`,
/// `"1.5s"`, or a bare number (taken as milliseconds).
pub fn parse_response_time(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if let Some(value) = raw.strip_suffix("ms") {
        return value.trim().parse().ok();
    }
    if let Some(value) = raw.strip_suffix('s') {
        return value.trim().parse::<f64>().ok().map(|secs| secs * 1000.0);
    }
    raw.parse().ok()
}

#[derive(Deserialize)]
struct NaabuRecord {
    #[serde(default)]
    ip: String,
    #[serde(default)]
    port: Option<u16>,
}

/// Parses naabu JSONL into `(ip, port)` pairs. Only open ports are ever
/// reported.
pub fn parse_open_ports(output: &str) -> Vec<(String, u16)> {
    let mut ports = Vec::new();

    for line in jsonl_lines(output) {
        let parsed: NaabuRecord = match serde_json::from_str(line) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("skipping malformed naabu line: {err}");
                continue;
            }
        };
        match (parsed.ip.is_empty(), parsed.port) {
            (false, Some(port)) => ports.push((parsed.ip, port)),
            _ => warn!("skipping naabu record without ip and port"),
        }
    }

    ports
}

/// A single crawler hit before grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlRecord {
    /// The URL the crawler requested.
    pub url: String,
    /// Request method, uppercased.
    pub method: String,
    /// How the crawler found the URL.
    pub source: String,
}

#[derive(Deserialize)]
struct KatanaRecord {
    #[serde(default)]
    request: KatanaRequest,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Deserialize, Default)]
struct KatanaRequest {
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    endpoint: Option<String>,
}

/// Parses katana JSONL into crawl records, deduplicated by URL in first-seen
/// order.
pub fn parse_crawl(output: &str) -> Vec<CrawlRecord> {
    let mut seen = BTreeSet::new();
    let mut records = Vec::new();

    for line in jsonl_lines(output) {
        let parsed: KatanaRecord = match serde_json::from_str(line) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("skipping malformed katana line: {err}");
                continue;
            }
        };
        let Some(url) = parsed.request.endpoint else {
            warn!("skipping katana record without an endpoint");
            continue;
        };
        if !seen.insert(url.clone()) {
            continue;
        }
        records.push(CrawlRecord {
            url,
            method: parsed
                .request
                .method
                .unwrap_or_else(|| "GET".to_owned())
                .to_ascii_uppercase(),
            source: parsed.source.unwrap_or_else(|| "crawl".to_owned()),
        });
    }

    records
}

/// Parses plain-text WHOIS output into the fields the report keeps. Returns
/// `None` when nothing recognizable was present.
pub fn parse_whois(output: &str) -> Option<WhoisData> {
    let mut data = WhoisData::default();
    let mut found = false;

    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        match key.as_str() {
            "registrar" if data.registrar.is_none() => {
                data.registrar = Some(value.to_owned());
                found = true;
            }
            "creation date" | "created" if data.creation_date.is_none() => {
                data.creation_date = Some(value.to_owned());
                found = true;
            }
            "registry expiry date" | "expiry date" | "expires"
                if data.expiration_date.is_none() =>
            {
                data.expiration_date = Some(value.to_owned());
                found = true;
            }
            "name server" | "nserver" => {
                data.name_servers.push(value.to_ascii_lowercase());
                found = true;
            }
            _ => {}
        }
    }

    found.then(|| {
        data.name_servers.sort();
        data.name_servers.dedup();
        data
    })
}

fn jsonl_lines(output: &str) -> impl Iterator<Item = &str> {
    output.lines().map(str::trim).filter(|line| !line.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{
        parse_crawl, parse_dns, parse_http_services, parse_open_ports, parse_response_time,
        parse_subdomains, parse_whois,
    };
    use parameterized::parameterized;

    #[test]
    fn subdomains_are_normalized_and_sorted() {
        let output = "\
# enumeration results
https://API.Example.com/path
www.example.com:8080
api.example.com

mail.example.com";
        assert_eq!(
            parse_subdomains(output),
            vec!["api.example.com", "mail.example.com", "www.example.com"]
        );
    }

    #[test]
    fn dns_lines_for_one_host_merge() {
        let output = r#"{"host":"a.example.com","a":["1.2.3.4"]}
{"host":"A.EXAMPLE.COM","aaaa":["::1"],"cname":["edge.example.net"]}"#;
        let records = parse_dns(output);
        let record = &records["a.example.com"];
        assert_eq!(record.a, vec!["1.2.3.4"]);
        assert_eq!(record.aaaa, vec!["::1"]);
        assert_eq!(record.cname.as_deref(), Some("edge.example.net"));
        assert!(record.mx.is_none());
    }

    #[test]
    fn malformed_lines_are_skipped_not_fatal() {
        let output = r#"{"host":"a.example.com","a":["1.2.3.4"]}
this is not json
{"host":"b.example.com","a":["5.6.7.8"]}"#;
        assert_eq!(parse_dns(output).len(), 2);
    }

    #[test]
    fn httpx_records_become_services() {
        let output = r#"{"url":"https://api.example.com","status_code":200,"title":"API","webserver":"nginx","tech":["Nginx","React"],"header":{"strict-transport-security":"max-age=63072000"},"time":"250ms","content_length":1234}"#;
        let services = parse_http_services(output);
        assert_eq!(services.len(), 1);
        let svc = &services[0];
        assert_eq!(svc.status_code, Some(200));
        assert_eq!(svc.technologies.len(), 2);
        assert_eq!(
            svc.security_headers.strict_transport_security.as_deref(),
            Some("max-age=63072000")
        );
        assert_eq!(svc.response_time_ms, Some(250.0));
    }

    #[parameterized(raw = { "250ms", "1.5s", "42", "abc", "" }, expected = {
        Some(250.0),
        Some(1500.0),
        Some(42.0),
        None,
        None,
    })]
    fn response_time_strings(raw: &str, expected: Option<f64>) {
        assert_eq!(parse_response_time(raw), expected);
    }

    #[test]
    fn naabu_pairs_need_ip_and_port() {
        let output = r#"{"ip":"1.2.3.4","port":443}
{"ip":"1.2.3.4"}
{"ip":"5.6.7.8","port":22}"#;
        assert_eq!(
            parse_open_ports(output),
            vec![("1.2.3.4".to_owned(), 443), ("5.6.7.8".to_owned(), 22)]
        );
    }

    #[test]
    fn crawl_records_dedup_by_url() {
        let output = r#"{"request":{"method":"get","endpoint":"https://example.com/a"}}
{"request":{"method":"GET","endpoint":"https://example.com/a"},"source":"javascript"}
{"request":{"endpoint":"https://example.com/b"},"source":"javascript"}"#;
        let records = parse_crawl(output);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].method, "GET");
        assert_eq!(records[0].source, "crawl");
        assert_eq!(records[1].source, "javascript");
    }

    #[test]
    fn whois_fields_are_captured() {
        let output = "\
Domain Name: EXAMPLE.COM
Registrar: Example Registrar, Inc.
Creation Date: 1995-08-14T04:00:00Z
Registry Expiry Date: 2026-08-13T04:00:00Z
Name Server: A.IANA-SERVERS.NET
Name Server: B.IANA-SERVERS.NET";
        let data = parse_whois(output).unwrap();
        assert_eq!(data.registrar.as_deref(), Some("Example Registrar, Inc."));
        assert_eq!(data.name_servers.len(), 2);
        assert!(data.creation_date.is_some());
    }

    #[test]
    fn unrecognizable_whois_output_is_none() {
        assert!(parse_whois("connection refused\n").is_none());
    }
}
