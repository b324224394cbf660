use serde::{Deserialize, Serialize};

// Wire shapes of `codex exec --json`. Every line is an envelope with a
// submission id and a typed `msg`; unknown msg types fall through to
// Unknown and are dropped by the decoder.

#[derive(Debug, Clone, Deserialize)]
pub struct CodexEnvelope {
    #[serde(default)]
    pub id: Option<String>,
    pub msg: CodexMsg,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CodexMsg {
    SessionConfigured {
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    TaskStarted {},
    AgentMessageDelta {
        delta: String,
    },
    AgentMessage {
        message: String,
    },
    AgentReasoningDelta {
        delta: String,
    },
    AgentReasoning {
        #[serde(default)]
        text: Option<String>,
    },
    ExecCommandBegin {
        call_id: String,
        #[serde(default)]
        command: serde_json::Value,
        #[serde(default)]
        cwd: Option<String>,
    },
    ExecCommandEnd {
        call_id: String,
        #[serde(default)]
        stdout: Option<String>,
        #[serde(default)]
        stderr: Option<String>,
        #[serde(default)]
        exit_code: Option<i32>,
    },
    McpToolCallBegin {
        call_id: String,
        #[serde(default)]
        server: Option<String>,
        #[serde(default)]
        tool: Option<String>,
        #[serde(default)]
        arguments: serde_json::Value,
    },
    McpToolCallEnd {
        call_id: String,
        #[serde(default)]
        result: serde_json::Value,
    },
    TokenCount {
        #[serde(default)]
        info: Option<CodexTokenInfo>,
    },
    TaskComplete {
        #[serde(default)]
        last_agent_message: Option<String>,
    },
    Error {
        message: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodexTokenInfo {
    /// Cumulative totals for the whole vendor session, not per-turn
    #[serde(default)]
    pub total_token_usage: Option<CodexTokenUsage>,
    #[serde(default)]
    pub last_token_usage: Option<CodexTokenUsage>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CodexTokenUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub cached_input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub reasoning_output_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// Synthesized final result persisted as `raw_sdk_response`. Codex has no
/// single result event, so the driver assembles one from the last
/// `token_count` plus the session banner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodexResult {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Cumulative usage at turn end
    #[serde(default)]
    pub total_token_usage: Option<CodexTokenUsage>,
    #[serde(default)]
    pub last_agent_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_roundtrip() {
        let json = r#"{"id":"1","msg":{"type":"agent_message_delta","delta":"hi"}}"#;
        let envelope: CodexEnvelope = serde_json::from_str(json).unwrap();
        assert!(matches!(
            envelope.msg,
            CodexMsg::AgentMessageDelta { ref delta } if delta == "hi"
        ));
    }

    #[test]
    fn test_unknown_msg_tolerated() {
        let json = r#"{"id":"1","msg":{"type":"plan_update","items":[]}}"#;
        let envelope: CodexEnvelope = serde_json::from_str(json).unwrap();
        assert!(matches!(envelope.msg, CodexMsg::Unknown));
    }
}
