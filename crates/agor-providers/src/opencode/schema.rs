use serde::Deserialize;

// Wire shapes of `opencode run --print-logs`. The opencode JSON surface is
// still settling; only the stable subset is decoded and everything else
// falls through to Unknown.

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpencodeRecord {
    SessionStart {
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    Text {
        text: String,
    },
    Reasoning {
        text: String,
    },
    ToolStart {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    ToolEnd {
        id: String,
        #[serde(default)]
        output: serde_json::Value,
    },
    Done {
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(other)]
    Unknown,
}
