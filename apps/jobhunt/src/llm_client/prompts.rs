// Shared prompt fragments. Each component that calls the LLM keeps its own
// prompts.rs next to it; only cross-cutting instructions live here.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a careful research assistant for a job seeker. \
    Reply with one valid JSON object and nothing else: \
    no prose before or after it, no markdown code fences, no apologies.";

/// System prompt for calls whose answer is plain text.
pub const PLAIN_TEXT_SYSTEM: &str = "You are a concise assistant helping a candidate \
    with job applications in Germany. Answer with the requested text only, \
    without preamble, numbering or markdown.";
