//! Markdown documentation for a single decider or experiment.
//!
//! Record fields come from an external system, so every piece of free text is
//! escaped here before it lands in the (trusted) output.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use url::Url;

use crate::error::{Error, Result};
use crate::model::{Decider, Detail, Experiment, RampGroup, RecordRef};
use crate::provider::RampSource;

pub const RAMP_UNAVAILABLE: &str = "Ramp: (Could not fetch data)";

const WHO_URL: &str = "https://who.pinadmin.com/";
const PROFILE_URL: &str = "https://pinterest.com/";
const ADMINAPP_USER_URL: &str = "https://adminapp.pinterest.com/220calave/user/";

/// Sections of a hover card that span several lines use markdown hard breaks.
const LINE_BREAK: &str = "  \n";

pub struct DetailFormatter {
    ramp: Arc<dyn RampSource + Send + Sync>,
    ramp_timeout: Duration,
}

impl DetailFormatter {
    pub fn new(ramp: Arc<dyn RampSource + Send + Sync>, ramp_timeout: Duration) -> Self {
        Self { ramp, ramp_timeout }
    }

    /// Full card for `record`. Never fails; missing data renders placeholders.
    pub async fn format(&self, record: RecordRef<'_>) -> Detail {
        let description = match record {
            RecordRef::Decider(d) => description(d.description.as_deref()),
            RecordRef::Experiment(e) => description(e.description.as_deref()),
        };

        let mut sections = vec![description, self.ramp_info(record).await];
        sections.extend(owner_info(record));
        sections.extend(link(record));
        sections.push(date_info(record));

        Detail {
            summary: summary(record),
            documentation: sections.join("\n\n"),
            trusted: true,
        }
    }

    async fn ramp_info(&self, record: RecordRef<'_>) -> String {
        let experiment = match record {
            RecordRef::Decider(d) => return format!("Ramp: {}%", d.current_value),
            RecordRef::Experiment(e) => e,
        };

        match self.lookup_ramp(&experiment.key).await {
            Ok(groups) if groups.is_empty() => "Ramp: (no groups)".to_string(),
            Ok(groups) => ramp_table(&groups),
            Err(e) => {
                tracing::warn!("Ramp lookup failed: {}", e);
                RAMP_UNAVAILABLE.to_string()
            }
        }
    }

    /// Dropping the timed-out future aborts the request.
    async fn lookup_ramp(&self, key: &str) -> Result<Vec<RampGroup>> {
        match tokio::time::timeout(self.ramp_timeout, self.ramp.fetch_ramp(key)).await {
            Ok(result) => result,
            Err(_) => Err(Error::RampLookupTimeout {
                key: key.to_string(),
                timeout_ms: self.ramp_timeout.as_millis() as u64,
            }),
        }
    }
}

/// One-line label shown next to a completion entry.
pub fn summary(record: RecordRef<'_>) -> String {
    match record {
        RecordRef::Decider(d) => format!("Ramp: {}% (decider)", d.current_value),
        RecordRef::Experiment(e) => match e.parsed_status {
            Some(status) if status != crate::model::ExperimentStatus::Unknown => {
                format!("(experiment, {})", status.as_str())
            }
            _ => "(experiment)".to_string(),
        },
    }
}

fn description(input: Option<&str>) -> String {
    let text = input.map(str::trim).filter(|s| !s.is_empty());
    let Some(text) = text else {
        return "Description: (empty)".to_string();
    };

    let flattened = text
        .replace("\\n", " ")
        .replace("\\r", " ")
        .replace(['\n', '\r'], " ");
    format!("Description: {}", render_wiki_links(&flattened))
}

/// Escape `text`, turning `[[url|label]]` into markdown links where `url` is http(s).
fn render_wiki_links(text: &str) -> String {
    fn wiki_link_re() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"\[\[([^|\]]+)\|([^\]]+)\]\]").unwrap())
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in wiki_link_re().captures_iter(text) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        let target = caps.get(1).map_or("", |m| m.as_str());
        let label = caps.get(2).map_or("", |m| m.as_str());

        out.push_str(&escape_markdown(&text[last..whole.start]));
        match link_target(target.trim()) {
            Some(href) => out.push_str(&format!("[{}]({})", escape_markdown(label), href)),
            None => out.push_str(&escape_markdown(&text[whole.clone()])),
        }
        last = whole.end;
    }
    out.push_str(&escape_markdown(&text[last..]));
    out
}

/// Backslash-escape characters with markdown or inline-HTML meaning.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(
            c,
            '\\' | '`' | '*' | '_' | '{' | '}' | '[' | ']' | '(' | ')' | '#' | '+' | '-' | '.'
                | '!' | '|' | '<' | '>' | '~'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// A link target safe to embed in `[...](...)`, if `raw` is an http(s) URL.
fn link_target(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    href(&url)
}

fn href(url: &Url) -> Option<String> {
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    Some(url.as_str().replace('(', "%28").replace(')', "%29"))
}

/// `https://who.pinadmin.com/#<identity>`
fn who_link(identity: &str) -> Option<String> {
    let mut url = Url::parse(WHO_URL).ok()?;
    url.set_fragment(Some(identity));
    href(&url)
}

/// `<base><segment>/`
fn user_link(base: &str, segment: &str) -> Option<String> {
    let mut url = Url::parse(base).ok()?;
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .push(segment)
        .push("");
    href(&url)
}

fn linked(label: &str, target: Option<String>) -> String {
    match target {
        Some(href) => format!("[{}]({})", escape_markdown(label), href),
        None => escape_markdown(label),
    }
}

fn owner_info(record: RecordRef<'_>) -> Option<String> {
    match record {
        RecordRef::Experiment(e) => experiment_owners(e),
        RecordRef::Decider(d) => decider_owner(d),
    }
}

fn experiment_owners(e: &Experiment) -> Option<String> {
    let mut lines = Vec::new();

    let owners: Vec<&str> = e
        .owner
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .collect();
    if !owners.is_empty() {
        let label = if owners.len() > 1 { "Owners" } else { "Owner" };
        let links: Vec<String> = owners
            .iter()
            .map(|o| linked(&format!("@{o}"), who_link(o)))
            .collect();
        lines.push(format!("{label}: {}", links.join(" / ")));
    }

    if let Some(team) = e.team.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        lines.push(format!("Team: {}", escape_markdown(team)));
    }

    (!lines.is_empty()).then(|| lines.join(LINE_BREAK))
}

/// Resolved directory name, then resolved account, then the bare handle.
fn decider_owner(d: &Decider) -> Option<String> {
    let owner = d.owner.as_deref().map(str::trim).filter(|o| !o.is_empty());

    if let Some(info) = d.ldap_info.as_ref().filter(|i| !i.name.trim().is_empty()) {
        let target = d.ldap.as_deref().and_then(who_link);
        return Some(format!("Owner: {}", linked(&info.name, target)));
    }

    if let Some(info) = &d.owner_info {
        let profile = linked(&info.full_name, user_link(PROFILE_URL, &info.username));
        let admin = owner
            .and_then(|o| user_link(ADMINAPP_USER_URL, o))
            .map(|href| format!(" ([AdminApp]({href}))"))
            .unwrap_or_default();
        return Some(format!("Owner: {profile}{admin}"));
    }

    owner.map(|o| {
        format!(
            "Owner: {} (Suspended / deactivated account)",
            linked(o, user_link(ADMINAPP_USER_URL, o))
        )
    })
}

fn link(record: RecordRef<'_>) -> Option<String> {
    let (label, url) = match record {
        RecordRef::Decider(d) => ("Adminapp", &d.url),
        RecordRef::Experiment(e) => ("Helium", &e.url),
    };
    link_target(url).map(|href| format!("Link: [{label}]({href})"))
}

fn date_info(record: RecordRef<'_>) -> String {
    let (created, updated) = match record {
        RecordRef::Decider(d) => (d.created_at.as_deref(), d.last_updated.as_str()),
        RecordRef::Experiment(e) => (e.created_at.as_deref(), e.last_updated.as_str()),
    };

    let mut lines = Vec::new();
    if let Some(created) = created.filter(|c| !c.trim().is_empty()) {
        lines.push(format!("Created: {}", format_timestamp(created)));
    }
    lines.push(format!("Last Updated: {}", format_timestamp(updated)));
    lines.join(LINE_BREAK)
}

/// Human-readable UTC time; zone-less timestamps are taken as UTC.
fn format_timestamp(raw: &str) -> String {
    match parse_timestamp(raw.trim()) {
        Some(dt) => dt.format("%b %-d, %Y at %H:%M:%S UTC").to_string(),
        None => escape_markdown(raw),
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(&format!("{raw}Z")) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn ramp_table(groups: &[RampGroup]) -> String {
    let mut rows = vec![
        "| **Group** | **Percent** |".to_string(),
        "| :--- | ---: |".to_string(),
    ];
    for group in groups {
        let percent = (group.fraction * 1000.0).round() / 10.0;
        rows.push(format!(
            "| {} | `{}%` |",
            escape_markdown(&group.name),
            percent
        ));
    }
    rows.join("\n")
}
