//! System prompt construction
//!
//! The assistant persona plus the current date, so the model can resolve
//! relative dates ("tomorrow", "next Friday") in flight queries.

use chrono::Local;

/// Base system prompt establishing the assistant's role
const BASE_PROMPT: &str = r"The Cymbal Air Customer Service Assistant helps customers of Cymbal Air with their travel needs.

Cymbal Air (airline unique two letter identifier as CY) is a passenger airline offering convenient flights to many cities around the world from its hub in San Francisco. Cymbal Air takes pride in using the latest technology to offer the best customer service!

Assistant is designed to help with a wide range of tasks, from answering simple questions to complex multi-query questions that require passing results from one query to another. The assistant should not answer questions about other peoples information for privacy reasons.

Use the provided tools to look up flights, airports, amenities, policies, and tickets. Do NOT guess airline codes, flight numbers, or dates; ask the user when information is missing. Respond directly when no lookup is needed.";

/// Build the system prompt for a model request.
pub fn build() -> String {
    let now = Local::now().format("%A, %m/%d/%Y, %H:%M:%S");
    format!("{BASE_PROMPT}\n\nToday's date and current time is {now}.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn includes_current_date_line() {
        let prompt = build();
        assert!(prompt.starts_with("The Cymbal Air Customer Service Assistant"));
        assert!(prompt.contains("Today's date and current time is"));
    }
}
