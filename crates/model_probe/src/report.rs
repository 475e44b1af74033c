//! Console rendering for a probe run
//!
//! Everything here returns strings; `main` decides when to print them.
//! Colors follow `colored`'s global switch, so output is plain when
//! `NO_COLOR` is set or stdout is not a terminal.

use crate::config::ProbeConfig;
use crate::probe::{ProbeResult, ProbeStatus};
use crate::summary::{Category, RunSummary, Verdict};
use crate::transport::ACCESS_KEY_HEADER;
use colored::Colorize;
use serde::Serialize;

pub const RULE_WIDTH: usize = 70;
pub const PREVIEW_CHARS: usize = 50;
pub const PERMISSION_URL: &str = "https://bohrium.dp.tech/settings/user";
pub const CONFIG_KEY: &str = "SYSTEM_MODELS";

/// One entry of the suggested `SYSTEM_MODELS` value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelEntry {
    pub id: String,
    pub label: String,
    pub description: String,
    pub is_streaming: bool,
}

impl ModelEntry {
    pub fn for_model(model: &str) -> Self {
        Self {
            id: model.to_string(),
            label: model.to_string(),
            description: format!("{} model", model),
            is_streaming: true,
        }
    }
}

pub fn header(title: &str) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    format!("\n{}\n  {}\n{}\n", rule, title.bright_cyan().bold(), rule)
}

pub fn section(title: &str) -> String {
    format!("\n--- {} ---\n", title.bold())
}

pub fn intro(config: &ProbeConfig) -> String {
    [
        header("DP Tech API Model Access Probe"),
        format!("Access key: {}", config.masked_access_key()),
        format!("Base URL:   {}", config.base_url),
        format!("Auth mode:  {} header", ACCESS_KEY_HEADER),
        format!("Timeout:    {}s per model", config.timeout.as_secs()),
        section(&format!("Probing {} models", config.models.len())),
    ]
    .join("\n")
}

/// Printed before the request goes out, completed by [`progress_marker`]
pub fn progress_prefix(index: usize, total: usize, model: &str) -> String {
    format!("[{}/{}] Testing {:<25} ... ", index + 1, total, model)
}

pub fn progress_marker(result: &ProbeResult) -> String {
    if result.is_success() {
        return format!("✅ {}", "available".bright_green());
    }

    let message = result.error_message();
    let or = |fallback: &str| message.clone().unwrap_or_else(|| fallback.to_string());

    let (symbol, text) = match result.status() {
        ProbeStatus::Http(403) => ("⚠️ ", format!("403 - {}", or("Forbidden"))),
        ProbeStatus::Http(401) => ("🔒", format!("401 - {}", or("Unauthorized"))),
        ProbeStatus::Http(404) => ("❓", "404 - model not found".to_string()),
        ProbeStatus::Http(400) => ("❌", format!("400 - {}", or("Bad Request"))),
        ProbeStatus::Http(code) => ("❌", format!("{} - unknown error", code)),
        ProbeStatus::TransportError => ("🔌", format!("network error - {}", or("Unknown"))),
    };
    format!("{} {}", symbol, text.bright_red())
}

pub fn model_entries(summary: &RunSummary) -> Vec<ModelEntry> {
    summary
        .available
        .iter()
        .map(|r| ModelEntry::for_model(&r.model))
        .collect()
}

/// `SYSTEM_MODELS='[...]'`, ready to paste into `.env`
pub fn config_snippet(entries: &[ModelEntry]) -> serde_json::Result<String> {
    Ok(format!("{}='{}'", CONFIG_KEY, serde_json::to_string(entries)?))
}

fn bullet(model: &str, detail: &str) -> String {
    format!("  • {:<30} - {}", model, detail)
}

fn render_available(summary: &RunSummary, out: &mut Vec<String>) -> serde_json::Result<()> {
    if summary.available.is_empty() {
        out.push(section("❌ No available models"));
        return Ok(());
    }

    out.push(section("✅ Available models (access granted)"));
    for result in &summary.available {
        out.push(format!("  • {}", result.model.bright_green()));
        if let Some(preview) = result.reply_preview(PREVIEW_CHARS) {
            out.push(format!("    Reply: {}...", preview));
        }
    }
    out.push(format!("\n{} model(s) available", summary.available.len()));

    let rule = "-".repeat(RULE_WIDTH);
    out.push("\nSuggested configuration (.env):".bright_yellow().to_string());
    out.push(rule.clone());
    out.push(config_snippet(&model_entries(summary))?);
    out.push(rule);
    Ok(())
}

fn render_needs_permission(summary: &RunSummary, out: &mut Vec<String>) {
    out.push(section("⚠️  Models requiring an access grant (403)"));
    for result in &summary.needs_permission {
        out.push(bullet(
            &result.model,
            &result.error_message().unwrap_or_default(),
        ));
    }
    out.push(format!(
        "\n{} model(s) need an access grant",
        summary.needs_permission.len()
    ));
    out.push("\nRequest model access at:".bright_yellow().to_string());
    out.push(format!("  {}", PERMISSION_URL));
}

fn render_auth_failed(summary: &RunSummary, out: &mut Vec<String>) {
    out.push(section("❌ Authentication failed (401)"));
    for result in &summary.auth_failed {
        out.push(bullet(
            &result.model,
            &result.error_message().unwrap_or_default(),
        ));
    }
    out.push(format!(
        "\n{}",
        "⚠️  Warning: authentication failures detected!".bright_red()
    ));
    out.push("  Possible causes:".to_string());
    out.push("  1. The access key is invalid or expired".to_string());
    out.push("  2. The access key is malformed".to_string());
    out.push(format!(
        "  3. The credential header is wrong (expected `{}`)",
        ACCESS_KEY_HEADER
    ));
}

fn render_not_found(summary: &RunSummary, out: &mut Vec<String>) {
    out.push(section("❓ Unknown models (404)"));
    for result in &summary.not_found {
        out.push(format!("  • {}", result.model));
    }
    out.push(format!(
        "\n{} model(s) do not exist",
        summary.not_found.len()
    ));
}

fn render_other(summary: &RunSummary, out: &mut Vec<String>) {
    out.push(section("⚠️  Other errors"));
    for result in &summary.other {
        let message = result
            .error_message()
            .unwrap_or_else(|| "Unknown".to_string());
        out.push(bullet(
            &result.model,
            &format!("[{}] {}", result.status(), message),
        ));
    }
}

/// Grouped sections, one per non-empty category
pub fn render_summary(summary: &RunSummary) -> serde_json::Result<String> {
    let mut out = vec![header("Probe results")];

    render_available(summary, &mut out)?;
    if !summary.needs_permission.is_empty() {
        render_needs_permission(summary, &mut out);
    }
    if !summary.auth_failed.is_empty() {
        render_auth_failed(summary, &mut out);
    }
    if !summary.not_found.is_empty() {
        render_not_found(summary, &mut out);
    }
    if !summary.other.is_empty() {
        render_other(summary, &mut out);
    }

    Ok(out.join("\n"))
}

pub fn render_totals(summary: &RunSummary) -> String {
    let count = |category| summary.bucket(category).len();
    [
        header("Probe complete"),
        format!("Total probed: {} model(s)", summary.total()),
        format!("  ✅ Available:        {}", count(Category::Available)),
        format!("  ⚠️  Needs permission: {}", count(Category::NeedsPermission)),
        format!("  ❌ Auth failed:      {}", count(Category::AuthFailed)),
        format!("  ❓ Not found:        {}", count(Category::NotFound)),
        format!("  ⚠️  Other errors:     {}", count(Category::Other)),
    ]
    .join("\n")
}

/// Status line and advice line for a verdict
pub fn verdict_lines(verdict: Verdict) -> (String, String) {
    match verdict {
        Verdict::Invalid => (
            format!("⚠️  Access key status: {}", "invalid or expired".bright_red()),
            "   Advice: check the access key, or regenerate it on the platform".to_string(),
        ),
        Verdict::Ready => (
            format!("✅ Access key status: {}", "valid".bright_green()),
            "   Models are accessible and ready to use".to_string(),
        ),
        Verdict::Restricted => (
            format!("✅ Access key status: {}", "valid".bright_green()),
            format!(
                "⚠️  {}",
                "But model access must be requested before use".bright_yellow()
            ),
        ),
        Verdict::Unknown => (
            format!("❓ Access key status: {}", "unknown".bright_yellow()),
            "   Unable to determine whether the access key is valid".to_string(),
        ),
    }
}

pub fn render_verdict(verdict: Verdict) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let (status, advice) = verdict_lines(verdict);
    format!("\n{}\n{}\n{}\n{}", rule, status, advice, rule)
}
