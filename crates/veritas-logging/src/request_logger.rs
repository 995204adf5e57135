use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::safe_truncate;

const MAX_CONSOLE_BODY_CHARS: usize = 5000;

/// Log an outbound backend request (console output)
pub fn log_request<T: Serialize + ?Sized>(url: &str, request: &T, verbose: bool) {
    if !verbose {
        return;
    }

    println!("\n{}", "═".repeat(80).bright_cyan());
    println!("{}", "🔍 BACKEND REQUEST".bright_cyan().bold());
    println!("{}", "═".repeat(80).bright_cyan());

    print_url(url);

    println!("\n{}", "Request Body:".bright_yellow());
    match serde_json::to_string_pretty(request) {
        Ok(json) => print_body(&json),
        Err(e) => println!("{}", format!("Error serializing request: {}", e).red()),
    }

    println!("{}", "═".repeat(80).bright_cyan());
    println!();
}

/// Log a backend response (console output)
pub fn log_response(status: &reqwest::StatusCode, body: &str, verbose: bool) {
    if !verbose {
        return;
    }

    println!("\n{}", "═".repeat(80).bright_green());
    println!("{}", "📥 BACKEND RESPONSE".bright_green().bold());
    println!("{}", "═".repeat(80).bright_green());

    println!(
        "{}: {} {}",
        "Status".bright_yellow(),
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown")
    );

    println!("\n{}", "Response Body:".bright_yellow());
    print_body(&pretty_or_raw(body));

    println!("{}", "═".repeat(80).bright_green());
    println!();
}

/// Write an outbound request to `<logs_dir>/req-<timestamp>.txt`
///
/// Returns the timestamp used in the file name so the matching response
/// log can share it.
pub fn log_request_to_file<T: Serialize + ?Sized>(logs_dir: &Path, url: &str, request: &T) -> Result<i64> {
    let timestamp = chrono::Utc::now().timestamp_millis();

    let filename = format!("req-{}.txt", timestamp);
    let file_path = logs_dir.join(&filename);

    let mut log_content = String::new();
    log_content.push_str("BACKEND REQUEST LOG\n");
    log_content.push_str("===================\n\n");
    log_content.push_str(&format!("Timestamp: {}\n", timestamp));
    log_content.push_str(&format!("URL: {}\n", url));
    let body = serde_json::to_value(request);
    if let Some(model) = body.as_ref().ok().and_then(|b| b.get("model")).and_then(|m| m.as_str()) {
        log_content.push_str(&format!("Model: {}\n", model));
    }
    log_content.push_str("\nRequest Body:\n");
    match body.and_then(|b| serde_json::to_string_pretty(&b)) {
        Ok(json) => {
            log_content.push_str(&json);
            log_content.push('\n');
        }
        Err(e) => log_content.push_str(&format!("Error serializing request: {}\n", e)),
    }

    fs::write(&file_path, log_content)
        .with_context(|| format!("Failed to write request log to {}", file_path.display()))?;

    tracing::debug!("request logged to {}", filename);

    Ok(timestamp)
}

/// Write a backend response next to its request log
pub fn log_response_to_file(
    logs_dir: &Path,
    status: &reqwest::StatusCode,
    headers: &reqwest::header::HeaderMap,
    body: &str,
    request_timestamp: i64,
) -> Result<()> {
    let filename = format!("resp-{}.txt", request_timestamp);
    let file_path = logs_dir.join(&filename);

    let mut log_content = String::new();
    log_content.push_str("BACKEND RESPONSE LOG\n");
    log_content.push_str("====================\n\n");
    log_content.push_str(&format!("Timestamp: {}\n", request_timestamp));
    log_content.push_str(&format!(
        "Status: {} {}\n\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown")
    ));

    log_content.push_str("Headers:\n");
    for (name, value) in headers.iter() {
        if let Ok(val_str) = value.to_str() {
            log_content.push_str(&format!("  {}: {}\n", name.as_str(), val_str));
        }
    }

    log_content.push_str("\nResponse Body:\n");
    log_content.push_str(&pretty_or_raw(body));
    log_content.push('\n');

    log_content.push_str("\n---\n");
    log_content.push_str(&format!("Response Size: {} bytes\n", body.len()));

    fs::write(&file_path, log_content)
        .with_context(|| format!("Failed to write response log to {}", file_path.display()))?;

    tracing::debug!("response logged to {}", filename);

    Ok(())
}

fn print_url(url: &str) {
    println!("{}: {}", "URL".bright_yellow(), url);
    if let Ok(parsed_url) = reqwest::Url::parse(url) {
        println!("{}: {}", "Host".bright_yellow(), parsed_url.host_str().unwrap_or("unknown"));
        let port = parsed_url
            .port_or_known_default()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!("{}: {}", "Port".bright_yellow(), port);
    }
}

fn print_body(body: &str) {
    if body.chars().count() > MAX_CONSOLE_BODY_CHARS {
        println!("{}", safe_truncate(body, MAX_CONSOLE_BODY_CHARS));
        println!("\n{}", format!("... (truncated, total {} bytes)", body.len()).bright_black());
    } else {
        println!("{}", body);
    }
}

/// Pretty-print JSON bodies, pass anything else through untouched
fn pretty_or_raw(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or_else(|| body.to_string())
}
