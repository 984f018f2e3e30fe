use std::fmt::Write;

use crate::models::SearchHit;

/// Chat-template control tokens that must never reach the model from
/// document text.
const CONTROL_TOKENS: [&str; 3] = ["<|im_start|>", "<|im_end|>", "<|endoftext|>"];

/// Strip chat-template control tokens from untrusted text.
pub fn sanitize_for_prompt(text: &str) -> String {
    CONTROL_TOKENS
        .iter()
        .fold(text.to_string(), |acc, token| acc.replace(token, ""))
}

/// Render the summarization prompt for a query and its hits.
pub fn build_summary_prompt(query: &str, hits: &[SearchHit]) -> String {
    let mut prompt = String::from(
        "You are an assistant that summarizes advisory documents for a search interface.\n\
         Below are the raw search results for the user's query. Summarize each relevant \
         document.\n\n\
         Respond with ONLY a JSON array. Do not write any text before or after the array.\n\
         Each element must be an object with exactly these keys:\n\
         - \"type\": \"conversation\" or \"product\"\n\
         - \"id\": the document identifier\n\
         - \"date\": the document date (YYYY-MM-DD)\n\
         - \"advisor\": {\"id\": string, \"name\": string}\n\
         - \"client\": {\"id\": string, \"name\": string}\n\
         - \"product\": {\"id\": string, \"name\": string, \"type\": string}\n\
         - \"summary\": a short summary of the document\n\
         - \"topics\": array of strings\n\
         - \"actions\": array of strings\n\
         - \"rawText\": optional excerpt of the original text\n\
         Use empty strings or empty objects for unknown values.\n\n",
    );

    writeln!(prompt, "Query: {}\n", sanitize_for_prompt(query)).unwrap();
    prompt.push_str("Search results:\n");

    for (i, hit) in hits.iter().enumerate() {
        let rendered = serde_json::to_string_pretty(&hit.0).unwrap_or_else(|_| hit.0.to_string());
        write!(
            prompt,
            "--- result {} ---\n{}\n\n",
            i + 1,
            sanitize_for_prompt(&rendered)
        )
        .unwrap();
    }

    prompt.push_str("JSON array:");
    prompt
}
