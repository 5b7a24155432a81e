//! Prompts for the two workflows.

use crate::fetch::Website;
use crate::request::ChatMessage;

pub const BROCHURE_SYSTEM_PROMPT: &str = "You are a helpful AI assistant. You will be given the company name and the website. You are given a task of creating a company brochure about the company projects and achievements. Respond in markdown";

pub const EXPLAIN_SYSTEM_PROMPT: &str = "You are a helpful assistant to explain python codes. Include thorough explanations to the queries asked. Respond with markdown";

/// Messages asking for a brochure about `company`, based on its landing page.
pub fn brochure_messages(company: &str, website: &Website) -> Vec<ChatMessage> {
    let mut prompt = format!(
        "Please generate a company brochure for {}. Here is their landing page:\n",
        company
    );
    prompt.push_str(&website.contents());
    vec![
        ChatMessage::system(BROCHURE_SYSTEM_PROMPT),
        ChatMessage::user(prompt),
    ]
}

/// Messages asking for an explanation of `code`.
pub fn explain_messages(code: &str) -> Vec<ChatMessage> {
    let question = format!("\nPlease explain what this code does and why:\n{}\n", code.trim_end());
    vec![
        ChatMessage::system(EXPLAIN_SYSTEM_PROMPT),
        ChatMessage::user(format!("Please explain what this code does :{}", question)),
    ]
}
