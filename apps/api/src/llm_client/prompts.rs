// Shared prompt fragments. Extraction and scoring keep their own prompts.rs alongside them.

/// Sent as the system message (OpenAI) or prepended to the prompt (Gemini).
pub const JSON_ONLY_SYSTEM: &str = "You are a helpful assistant that extracts structured \
    information from web pages. Always return valid JSON only.";

/// Closing instruction appended to every prompt that expects a JSON reply.
pub const JSON_ONLY_FOOTER: &str =
    "Return ONLY valid JSON, no additional text or markdown formatting.";
