//! Tool gating policy
//!
//! Two process-wide, immutable tool-name sets: tools that mutate on behalf
//! of the user and need an explicit confirmation before running, and tools
//! that touch the signed-in user's data and need an identity at all.

/// Tools that must not run until the user explicitly approves the action.
const CONFIRMATION_TOOLS: &[&str] = &["insert_ticket"];

/// Tools that operate on the signed-in user's tickets.
const AUTH_TOOLS: &[&str] = &["insert_ticket", "list_tickets"];

/// Whether executing `tool_name` requires explicit human confirmation.
/// Unknown tool names never do.
pub fn requires_confirmation(tool_name: &str) -> bool {
    CONFIRMATION_TOOLS.contains(&tool_name)
}

/// Whether `tool_name` requires a signed-in user.
pub fn requires_auth(tool_name: &str) -> bool {
    AUTH_TOOLS.contains(&tool_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_requires_confirmation() {
        assert!(requires_confirmation("insert_ticket"));
        assert!(!requires_confirmation("search_flights_by_number"));
        assert!(!requires_confirmation("list_tickets"));
    }

    #[test]
    fn unknown_tools_never_require_confirmation() {
        assert!(!requires_confirmation("teleport"));
        assert!(!requires_confirmation(""));
    }

    #[test]
    fn ticket_tools_require_auth() {
        assert!(requires_auth("insert_ticket"));
        assert!(requires_auth("list_tickets"));
        assert!(!requires_auth("search_airports"));
    }
}
