use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

use crate::utils::ConfigError;

const TOPICS_FILE: &str = "topics.json";

/// The static topic layout shared by every node.
///
/// `broadcast` carries status and update traffic for everyone; each tester
/// gets its own command topic under `tester_topic_prefix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicTree {
    pub root: String,
    pub broadcast: String,
    pub tester_topic_prefix: String,
    pub subtopics: BTreeSet<String>,
}

#[derive(Debug, Deserialize)]
struct TopicsFile {
    #[serde(rename = "TOPICS")]
    topics: Option<RawTopics>,
}

#[derive(Debug, Deserialize)]
struct RawTopics {
    root: Option<String>,
    broadcast: Option<String>,
    tester_topic: Option<String>,
    #[serde(default)]
    subtopics: Vec<String>,
}

impl TopicTree {
    /// Reads and validates `topics.json`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: TopicsFile =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_raw(file)
    }

    /// Same as [`TopicTree::load`] for an in-memory document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let file: TopicsFile = serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: TOPICS_FILE.into(),
            source,
        })?;
        Self::from_raw(file)
    }

    /// Builds a tree directly, applying the same validation as `load`.
    pub fn new(
        root: impl Into<String>,
        broadcast: impl Into<String>,
        tester_topic_prefix: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let tree = Self {
            root: root.into(),
            broadcast: broadcast.into(),
            tester_topic_prefix: tester_topic_prefix.into().trim_end_matches('/').to_string(),
            subtopics: BTreeSet::new(),
        };
        tree.validate()?;
        Ok(tree)
    }

    fn from_raw(file: TopicsFile) -> Result<Self, ConfigError> {
        let raw = file.topics.ok_or(ConfigError::MissingKey {
            file: TOPICS_FILE,
            key: "TOPICS",
        })?;
        let missing = |key| ConfigError::MissingKey {
            file: TOPICS_FILE,
            key,
        };

        let mut tree = Self::new(
            raw.root.ok_or_else(|| missing("root"))?,
            raw.broadcast.ok_or_else(|| missing("broadcast"))?,
            raw.tester_topic.ok_or_else(|| missing("tester_topic"))?,
        )?;
        tree.subtopics = raw.subtopics.into_iter().collect();
        Ok(tree)
    }

    /// Command topic for exactly one tester.
    pub fn tester_topic(&self, tester: &str) -> String {
        format!("{}/{}", self.tester_topic_prefix, tester)
    }

    /// Filter matching every tester's command topic.
    pub fn tester_wildcard(&self) -> String {
        format!("{}/#", self.tester_topic_prefix)
    }

    /// True when `topic` sits under the per-tester prefix.
    pub fn is_tester_topic(&self, topic: &str) -> bool {
        topic
            .strip_prefix(self.tester_topic_prefix.as_str())
            .is_some_and(|rest| rest.starts_with('/') && rest.len() > 1)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("root", &self.root),
            ("broadcast", &self.broadcast),
            ("tester_topic", &self.tester_topic_prefix),
        ] {
            validate_topic_name(key, value)?;
        }

        if overlaps(&self.broadcast, &self.tester_topic_prefix) {
            return Err(ConfigError::InvalidTopics(format!(
                "broadcast `{}` overlaps tester prefix `{}`",
                self.broadcast, self.tester_topic_prefix
            )));
        }
        Ok(())
    }
}

fn validate_topic_name(key: &str, topic: &str) -> Result<(), ConfigError> {
    if topic.is_empty() {
        return Err(ConfigError::InvalidTopics(format!("`{key}` is empty")));
    }
    if topic.contains(['+', '#']) {
        return Err(ConfigError::InvalidTopics(format!(
            "`{key}` = `{topic}` contains a wildcard"
        )));
    }
    if topic.contains("//") {
        return Err(ConfigError::InvalidTopics(format!(
            "`{key}` = `{topic}` has an empty segment"
        )));
    }
    Ok(())
}

/// Two namespaces overlap when one equals, or is a level-prefix of, the other.
fn overlaps(a: &str, b: &str) -> bool {
    let under = |outer: &str, inner: &str| {
        inner
            .strip_prefix(outer)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    };
    under(a, b) || under(b, a)
}
