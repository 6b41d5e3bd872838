use serde::{Deserialize, Serialize};

const ANY_TOPIC: &str = "*";

/// Topics a remote may touch on the shared bus. `"*"` matches every topic.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct TopicPermissions {
    pub emit: Vec<String>,
    pub listen: Vec<String>,
}

impl TopicPermissions {
    pub fn new(emit: &[&str], listen: &[&str]) -> Self {
        Self {
            emit: emit.iter().map(|t| t.to_string()).collect(),
            listen: listen.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn unrestricted() -> Self {
        Self::new(&[ANY_TOPIC], &[ANY_TOPIC])
    }

    pub fn allows_emit(&self, topic: &str) -> bool {
        grants(&self.emit, topic)
    }

    pub fn allows_listen(&self, topic: &str) -> bool {
        grants(&self.listen, topic)
    }
}

fn grants(list: &[String], topic: &str) -> bool {
    list.iter().any(|t| t == ANY_TOPIC || t == topic)
}
