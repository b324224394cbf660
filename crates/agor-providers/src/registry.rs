use crate::claude::{ClaudeDriver, ClaudeNormalizer};
use crate::codex::{CodexDriver, CodexNormalizer};
use crate::gemini::{GeminiDriver, GeminiNormalizer};
use crate::opencode::OpencodeDriver;
use crate::traits::{NormalizeContext, PromptDriver, SdkNormalizer};
use agor_types::{AgenticTool, NormalizedSdkData};

#[derive(Debug, Clone)]
pub struct ToolMetadata {
    pub tool: AgenticTool,
    pub description: &'static str,
    /// Binary the driver shells out to; empty for HTTP-backed tools
    pub command: &'static str,
}

const TOOLS: &[ToolMetadata] = &[
    ToolMetadata {
        tool: AgenticTool::ClaudeCode,
        description: "Claude Code CLI",
        command: "claude",
    },
    ToolMetadata {
        tool: AgenticTool::Codex,
        description: "Codex CLI",
        command: "codex",
    },
    ToolMetadata {
        tool: AgenticTool::Gemini,
        description: "Gemini API with host-side tools",
        command: "",
    },
    ToolMetadata {
        tool: AgenticTool::Opencode,
        description: "opencode CLI",
        command: "opencode",
    },
];

pub fn get_all_tools() -> &'static [ToolMetadata] {
    TOOLS
}

pub fn get_tool_metadata(tool: AgenticTool) -> Option<&'static ToolMetadata> {
    TOOLS.iter().find(|meta| meta.tool == tool)
}

/// Normalizer for tools without a token-accounting surface
struct NoopNormalizer;

impl SdkNormalizer for NoopNormalizer {
    fn normalize(
        &self,
        _raw: &serde_json::Value,
        _ctx: &NormalizeContext<'_>,
    ) -> Option<NormalizedSdkData> {
        None
    }
}

/// Adapter bundling a tool's normalizer and prompt driver.
///
/// The bundle keeps vendor knowledge in one place: the executor resolves an
/// adapter by tool name and never branches on the vendor again.
pub struct ToolAdapter {
    pub tool: AgenticTool,
    pub normalizer: Box<dyn SdkNormalizer>,
    pub driver: Box<dyn PromptDriver>,
}

impl ToolAdapter {
    pub fn for_tool(tool: AgenticTool) -> Self {
        match tool {
            AgenticTool::ClaudeCode => Self {
                tool,
                normalizer: Box::new(ClaudeNormalizer),
                driver: Box::new(ClaudeDriver),
            },
            AgenticTool::Codex => Self {
                tool,
                normalizer: Box::new(CodexNormalizer),
                driver: Box::new(CodexDriver),
            },
            AgenticTool::Gemini => Self {
                tool,
                normalizer: Box::new(GeminiNormalizer),
                driver: Box::new(GeminiDriver),
            },
            AgenticTool::Opencode => Self {
                tool,
                normalizer: Box::new(NoopNormalizer),
                driver: Box::new(OpencodeDriver),
            },
        }
    }
}
