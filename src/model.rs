use serde::{Deserialize, Deserializer, Serialize};

/// `currentValue` of a decider that has not launched yet
pub const NOT_LAUNCHED: i64 = -1;

/// A feature flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decider {
    pub key: String,
    /// Rollout percentage; absent or null on the wire decodes as `NOT_LAUNCHED`
    #[serde(default = "not_launched", deserialize_with = "value_or_not_launched")]
    pub current_value: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ldap: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ldap_info: Option<LdapInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_info: Option<OwnerInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    pub last_updated: String,
    #[serde(default)]
    pub url: String,
}

impl Decider {
    pub fn is_launched(&self) -> bool {
        self.current_value != NOT_LAUNCHED
    }
}

fn not_launched() -> i64 {
    NOT_LAUNCHED
}

fn value_or_not_launched<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(Option::<i64>::deserialize(deserializer)?.unwrap_or(NOT_LAUNCHED))
}

/// Directory identity resolved from a decider's `ldap` handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LdapInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Account resolved from a decider's `owner` handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerInfo {
    pub full_name: String,
    pub username: String,
}

/// An A/B test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    pub key: String,
    /// Comma-separated identities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    pub last_updated: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipped_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed_status: Option<ExperimentStatus>,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_decision: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExperimentStatus {
    Running,
    Debug,
    Disabled,
    Complete,
    Deleted,
    #[serde(other)]
    Unknown,
}

impl ExperimentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentStatus::Running => "Running",
            ExperimentStatus::Debug => "Debug",
            ExperimentStatus::Disabled => "Disabled",
            ExperimentStatus::Complete => "Complete",
            ExperimentStatus::Deleted => "Deleted",
            ExperimentStatus::Unknown => "Unknown",
        }
    }
}

/// Which of the two record lists a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Decider,
    Experiment,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Decider => "decider",
            RecordKind::Experiment => "experiment",
        }
    }
}

impl std::str::FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "decider" => Ok(RecordKind::Decider),
            "experiment" => Ok(RecordKind::Experiment),
            other => Err(format!("unknown record kind: {other}")),
        }
    }
}

/// Borrowed view of one record inside a snapshot.
#[derive(Debug, Clone, Copy)]
pub enum RecordRef<'a> {
    Decider(&'a Decider),
    Experiment(&'a Experiment),
}

impl<'a> RecordRef<'a> {
    pub fn key(&self) -> &'a str {
        match self {
            RecordRef::Decider(d) => &d.key,
            RecordRef::Experiment(e) => &e.key,
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            RecordRef::Decider(_) => RecordKind::Decider,
            RecordRef::Experiment(_) => RecordKind::Experiment,
        }
    }
}

/// The cached unit: both record lists plus when they were fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub deciders: Vec<Decider>,
    pub experiments: Vec<Experiment>,
    /// Epoch milliseconds
    pub last_updated: i64,
}

impl Snapshot {
    /// Records of one kind, or both (deciders first) when `kind` is `None`.
    pub fn records(&self, kind: Option<RecordKind>) -> Vec<RecordRef<'_>> {
        let deciders = self.deciders.iter().map(RecordRef::Decider);
        let experiments = self.experiments.iter().map(RecordRef::Experiment);
        match kind {
            Some(RecordKind::Decider) => deciders.collect(),
            Some(RecordKind::Experiment) => experiments.collect(),
            None => deciders.chain(experiments).collect(),
        }
    }

    /// Exact key lookup; deciders are checked before experiments.
    pub fn find(&self, key: &str) -> Option<RecordRef<'_>> {
        self.deciders
            .iter()
            .find(|d| d.key == key)
            .map(RecordRef::Decider)
            .or_else(|| {
                self.experiments
                    .iter()
                    .find(|e| e.key == key)
                    .map(RecordRef::Experiment)
            })
    }

    pub fn find_kind(&self, kind: RecordKind, key: &str) -> Option<RecordRef<'_>> {
        match kind {
            RecordKind::Decider => self
                .deciders
                .iter()
                .find(|d| d.key == key)
                .map(RecordRef::Decider),
            RecordKind::Experiment => self
                .experiments
                .iter()
                .find(|e| e.key == key)
                .map(RecordRef::Experiment),
        }
    }
}

/// One group of an experiment's current ramp.
#[derive(Debug, Clone, PartialEq)]
pub struct RampGroup {
    pub name: String,
    /// Fraction of traffic, 0.0..=1.0
    pub fraction: f64,
}

/// Cursor position: zero-based line, `character` in UTF-16 code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub character: usize,
}

/// Half-open span on a single line, same units as `Position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub line: usize,
    pub start: usize,
    pub end: usize,
}

/// A lightweight completion entry; details are resolved lazily.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionCandidate {
    pub key: String,
    pub kind: RecordKind,
}

/// Handle passed back by the host to resolve one candidate's detail.
pub type CandidateRef = CompletionCandidate;

/// Formatted documentation for one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detail {
    /// One-line label, e.g. `Ramp: 50% (decider)`
    pub summary: String,
    /// Markdown
    pub documentation: String,
    /// Links in `documentation` may be rendered as clickable
    pub trusted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoverResult {
    pub key: String,
    pub kind: RecordKind,
    pub documentation: String,
    pub range: Span,
}

/// What a refresh stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub deciders: usize,
    pub experiments: usize,
    pub last_updated: i64,
}

/// JSON output for the status command
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub populated: bool,
    pub deciders: usize,
    pub experiments: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

/// JSON output for the search command
#[derive(Debug, Serialize)]
pub struct SearchResult {
    pub query: String,
    pub results: Vec<SearchEntry>,
}

#[derive(Debug, Serialize)]
pub struct SearchEntry {
    pub key: String,
    pub kind: RecordKind,
    pub distance: f64,
}
