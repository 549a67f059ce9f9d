//! Solver prompts.

use grading::Clue;

use crate::client::ChatMessage;

pub const SOLVER_SYSTEM_PROMPT: &str =
    "You are an expert cryptic crossword solver. Provide concise JSON only.";

/// User prompt asking for a minimal JSON answer object.
pub fn solver_prompt(clue: &Clue) -> String {
    format!(
        "You are an expert cryptic crossword solver.\n\n\
         Clue: {}\n\n\
         Respond with a minimal JSON object exactly like this: \
         {{\"answer\":\"<one-word-or-phrase>\",\"reasoning\":\"<brief reasoning>\"}}. \
         Return JSON only.",
        clue.clue
    )
}

/// System + user messages for one clue.
pub fn solver_messages(clue: &Clue) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SOLVER_SYSTEM_PROMPT),
        ChatMessage::user(solver_prompt(clue)),
    ]
}
