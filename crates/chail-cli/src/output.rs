//! Terminal output: per-level lines and the verbose exchange trace

use std::io::Write;

use chail_engine::{
    ExchangeObserver, Gradient, LevelReport, ProbeResult, RequestDescriptor, ResponseDescriptor,
    Severity, SweepHistory, SweepReporter,
};
use colored::Colorize;
use reqwest::Url;

// ============================================================================
// SWEEP REPORT
// ============================================================================

/// Prints one line per concurrency level to stdout
#[derive(Debug, Default)]
pub struct TerminalReporter {
    first_critical: Option<usize>,
}

impl SweepReporter for TerminalReporter {
    fn on_target(&mut self, url: &Url) {
        self.first_critical = None;
        println!("{}", format!("Connecting to {}...", url).cyan());
    }

    fn on_level(&mut self, report: &LevelReport) {
        if self.first_critical.is_none()
            && report.step.map(|g| g.severity) == Some(Severity::Critical)
        {
            self.first_critical = Some(report.result.client_count);
        }
        println!("{}", format_level(report));
    }

    fn on_complete(&mut self, _url: &Url, history: &SweepHistory) {
        if let Some(line) = format_summary(history, self.first_critical) {
            println!("{}", line);
        }
    }
}

/// `N: avg=X ms, ttfb=Y ms, err=E%` followed by optional percentiles, codes and gradients
pub fn format_level(report: &LevelReport) -> String {
    let result = &report.result;
    let mut line = format!(
        "{}: avg={} ms, ttfb={} ms, err={:.1}%",
        result.client_count,
        format_ms(result.avg_time_total_ms),
        format_ms(result.avg_time_to_first_byte_ms),
        result.error_rate * 100.0
    );

    if let Some(latency) = &result.latency {
        line.push_str(&format!(", p99={:.2} ms", latency.p99_ms));
    }
    if let Some(codes) = format_failure_codes(result) {
        line.push_str(&format!(", codes=[{}]", codes));
    }
    for gradient in [&report.step, &report.decade].into_iter().flatten() {
        line.push_str(&format_gradient(gradient));
    }
    line
}

/// `, grad(-d)=R.RR`, colored by severity
pub fn format_gradient(gradient: &Gradient) -> String {
    let value = format!("{:.2}", gradient.ratio);
    let value = match gradient.severity {
        Severity::Critical => value.red().bold(),
        Severity::Severe => value.red(),
        Severity::Moderate => value.yellow(),
        Severity::Improving => value.green(),
        Severity::Normal => value.normal(),
    };
    format!(", grad(-{})={}", gradient.distance, value)
}

/// Names the first level whose step to the previous one was critical
fn format_summary(history: &SweepHistory, first_critical: Option<usize>) -> Option<String> {
    let level = first_critical?;
    let current = history.level(level)?;
    let previous = history.level(level - 1)?;
    Some(
        format!(
            "Saturation at {} clients: {:.2} ms -> {:.2} ms",
            level, previous.avg_time_total_ms, current.avg_time_total_ms
        )
        .magenta()
        .to_string(),
    )
}

fn format_ms(value: f64) -> String {
    if value.is_finite() {
        format!("{:.2}", value)
    } else {
        "n/a".to_string()
    }
}

fn format_failure_codes(result: &ProbeResult) -> Option<String> {
    let codes: Vec<String> = result
        .response_codes
        .iter()
        .filter(|(code, _)| !(200..300).contains(*code))
        .map(|(code, count)| format!("{}:{}", code, count))
        .collect();
    (!codes.is_empty()).then(|| codes.join(" "))
}

// ============================================================================
// VERBOSE TRACE
// ============================================================================

/// Prints every exchange in gray, curl style
#[derive(Debug, Default)]
pub struct VerbosePrinter;

impl ExchangeObserver for VerbosePrinter {
    fn on_request(&self, request: &RequestDescriptor<'_>) {
        print_block(&request_lines(request));
    }

    fn on_response(&self, response: &ResponseDescriptor<'_>) {
        print_block(&response_lines(response));
    }
}

fn print_block(lines: &[String]) {
    let mut out = std::io::stdout().lock();
    for line in lines {
        // Tracing output must never fail a request
        let _ = writeln!(out, "{}", line.bright_black());
    }
}

pub fn request_lines(request: &RequestDescriptor<'_>) -> Vec<String> {
    let mut target = request.url.path().to_string();
    if let Some(query) = request.url.query() {
        target.push('?');
        target.push_str(query);
    }
    let host = match (request.url.host_str(), request.url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    };

    let mut lines = vec![
        format!("> {} {} {:?}", request.method, target, request.version),
        format!("> Host: {}", host),
    ];
    lines.extend(header_lines("> ", request.headers));
    lines.push(">".to_string());
    lines
}

pub fn response_lines(response: &ResponseDescriptor<'_>) -> Vec<String> {
    let mut lines = vec![format!("< {:?} {}", response.version, response.status)];
    lines.extend(header_lines("< ", response.headers));
    lines.push("<".to_string());
    lines.push(String::from_utf8_lossy(response.body).into_owned());
    lines
}

fn header_lines(prefix: &str, headers: &reqwest::header::HeaderMap) -> Vec<String> {
    headers
        .keys()
        .map(|name| {
            let values: Vec<String> = headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect();
            format!("{}{}: {}", prefix, name, values.join(" "))
        })
        .collect()
}
