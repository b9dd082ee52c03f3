use regex::Regex;
use std::sync::LazyLock;

static LOG_GROUP_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[.\-_/#A-Za-z0-9]+$").expect("valid log group regex"));
static LOG_STREAM_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^:*]+$").expect("valid log stream regex"));
static STREAM_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_.\-]+$").expect("valid stream regex"));
static TOPIC_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-]+$").expect("valid topic regex"));

/// Naming rule for a remote resource: length bounds plus an allowed character set.
///
/// Destinations use these in [`Destination::validate`](super::Destination::validate)
/// so bad names are rejected before any network call.
#[derive(Debug, Clone, Copy)]
pub struct NameRule {
    kind: &'static str,
    max_len: usize,
    allowed: &'static LazyLock<Regex>,
}

impl NameRule {
    pub fn log_group() -> Self {
        Self {
            kind: "log group",
            max_len: 512,
            allowed: &LOG_GROUP_CHARS,
        }
    }

    pub fn log_stream() -> Self {
        Self {
            kind: "log stream",
            max_len: 512,
            allowed: &LOG_STREAM_CHARS,
        }
    }

    pub fn stream() -> Self {
        Self {
            kind: "stream",
            max_len: 128,
            allowed: &STREAM_CHARS,
        }
    }

    pub fn topic() -> Self {
        Self {
            kind: "topic",
            max_len: 256,
            allowed: &TOPIC_CHARS,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn check(&self, name: &str) -> Result<(), String> {
        if name.is_empty() {
            return Err(format!("{} name must not be empty", self.kind));
        }
        if name.len() > self.max_len {
            return Err(format!(
                "{} name is {} bytes, maximum is {}",
                self.kind,
                name.len(),
                self.max_len
            ));
        }
        if !self.allowed.is_match(name) {
            return Err(format!(
                "{} name '{}' contains invalid characters",
                self.kind, name
            ));
        }
        Ok(())
    }

    /// Appends the problem, if any, to `problems`.
    pub fn check_into(&self, name: &str, problems: &mut Vec<String>) {
        if let Err(problem) = self.check(name) {
            problems.push(problem);
        }
    }
}
