//! Prompt templates for the text-generation endpoint.

/// Token budget for a conversational interviewer reply (about 150 words).
pub const RESPONSE_MAX_TOKENS: u32 = 250;
/// Token budget for rewriting pre-written text.
pub const ENHANCE_MAX_TOKENS: u32 = 400;

/// Spoken when a conversational reply cannot be generated.
pub const FALLBACK_RESPONSE: &str =
    "I am sorry, I had trouble processing that. Could you please repeat your answer?";

pub fn response_prompt(user_input: &str, conversation_context: &str) -> String {
    let context = if conversation_context.trim().is_empty() {
        "(this is the start of the interview)"
    } else {
        conversation_context.trim()
    };
    let input = user_input.trim();
    format!(
        r#"You are an experienced, friendly interviewer running a spoken mock interview.

Conversation so far:
{context}

The candidate just said: "{input}"

Reply the way you would say it out loud: warm, natural, using contractions, at most 150 words. Acknowledge what they said, then ask one follow-up question or move the interview forward. Output ONLY the words to speak, with no stage directions, markdown or lists."#
    )
}

pub fn enhance_prompt(text: &str, context: Option<&str>) -> String {
    let context = match context.map(str::trim) {
        Some(c) if !c.is_empty() => format!("\nContext: {c}\n"),
        _ => String::new(),
    };
    let text = text.trim();
    format!(
        r#"Rewrite the following text so it sounds natural when read aloud by a speech synthesizer. Keep the meaning and every fact. Use contractions and conversational phrasing, short sentences, and no markdown, lists or emoji.
{context}
Text: {text}

Output ONLY the rewritten text:"#
    )
}
