//! Conversation state types
//!
//! The per-session record the engine operates on: the message history, the
//! pending booking awaiting confirmation, and the signed-in user (if any).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Tool Argument Types - Strongly typed arguments for each tool
// ============================================================================

/// Arguments for the `search_airports` tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AirportSearchArgs {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Arguments for the `search_flights_by_number` tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightNumberArgs {
    pub airline: String,
    pub flight_number: String,
}

/// Arguments for the `list_flights` tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFlightsArgs {
    #[serde(default)]
    pub departure_airport: Option<String>,
    #[serde(default)]
    pub arrival_airport: Option<String>,
    pub date: String,
}

/// Arguments for the `search_amenities` tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmenitySearchArgs {
    pub query: String,
    #[serde(default)]
    pub open_time: Option<String>,
    #[serde(default)]
    pub open_day: Option<String>,
}

/// Arguments for the `search_policies` tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySearchArgs {
    pub query: String,
}

/// Arguments for `insert_ticket` and `validate_ticket`.
///
/// All fields optional: the model may propose a partial ticket, which
/// validation resolves to a fully-specified one before the user confirms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TicketArgs {
    #[serde(default)]
    pub airline: Option<String>,
    #[serde(default)]
    pub flight_number: Option<String>,
    #[serde(default)]
    pub departure_airport: Option<String>,
    #[serde(default)]
    pub arrival_airport: Option<String>,
    #[serde(default)]
    pub departure_time: Option<String>,
    #[serde(default)]
    pub arrival_time: Option<String>,
}

impl TicketArgs {
    /// True once every field a booking insert needs is present.
    pub fn is_complete(&self) -> bool {
        self.airline.is_some()
            && self.flight_number.is_some()
            && self.departure_airport.is_some()
            && self.arrival_airport.is_some()
            && self.departure_time.is_some()
            && self.arrival_time.is_some()
    }
}

/// Strongly typed tool argument enum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_tool", rename_all = "snake_case")]
pub enum ToolArgs {
    SearchAirports(AirportSearchArgs),
    SearchFlightsByNumber(FlightNumberArgs),
    ListFlights(ListFlightsArgs),
    SearchAmenities(AmenitySearchArgs),
    SearchPolicies(PolicySearchArgs),
    ListTickets,
    InsertTicket(TicketArgs),
    ValidateTicket(TicketArgs),
    /// Fallback for unknown tools or parsing failures
    Unknown {
        name: String,
        input: Value,
    },
}

impl ToolArgs {
    /// Get the tool name
    pub fn tool_name(&self) -> &str {
        match self {
            ToolArgs::SearchAirports(_) => "search_airports",
            ToolArgs::SearchFlightsByNumber(_) => "search_flights_by_number",
            ToolArgs::ListFlights(_) => "list_flights",
            ToolArgs::SearchAmenities(_) => "search_amenities",
            ToolArgs::SearchPolicies(_) => "search_policies",
            ToolArgs::ListTickets => "list_tickets",
            ToolArgs::InsertTicket(_) => "insert_ticket",
            ToolArgs::ValidateTicket(_) => "validate_ticket",
            ToolArgs::Unknown { name, .. } => name,
        }
    }

    /// Convert to a JSON value for the wire / trace output
    pub fn to_value(&self) -> Value {
        match self {
            ToolArgs::SearchAirports(args) => serde_json::to_value(args).unwrap_or(Value::Null),
            ToolArgs::SearchFlightsByNumber(args) => {
                serde_json::to_value(args).unwrap_or(Value::Null)
            }
            ToolArgs::ListFlights(args) => serde_json::to_value(args).unwrap_or(Value::Null),
            ToolArgs::SearchAmenities(args) => serde_json::to_value(args).unwrap_or(Value::Null),
            ToolArgs::SearchPolicies(args) => serde_json::to_value(args).unwrap_or(Value::Null),
            ToolArgs::ListTickets => Value::Object(serde_json::Map::new()),
            ToolArgs::InsertTicket(args) | ToolArgs::ValidateTicket(args) => {
                serde_json::to_value(args).unwrap_or(Value::Null)
            }
            ToolArgs::Unknown { input, .. } => input.clone(),
        }
    }

    /// Parse from tool name and JSON value
    pub fn from_name_and_value(name: &str, value: Value) -> Self {
        fn typed<T, F>(name: &str, value: Value, wrap: F) -> ToolArgs
        where
            T: DeserializeOwned,
            F: FnOnce(T) -> ToolArgs,
        {
            serde_json::from_value(value.clone()).map_or_else(
                |_| ToolArgs::Unknown {
                    name: name.to_string(),
                    input: value,
                },
                wrap,
            )
        }

        match name {
            "search_airports" => typed(name, value, ToolArgs::SearchAirports),
            "search_flights_by_number" => typed(name, value, ToolArgs::SearchFlightsByNumber),
            "list_flights" => typed(name, value, ToolArgs::ListFlights),
            "search_amenities" => typed(name, value, ToolArgs::SearchAmenities),
            "search_policies" => typed(name, value, ToolArgs::SearchPolicies),
            "list_tickets" => ToolArgs::ListTickets,
            "insert_ticket" => typed(name, value, ToolArgs::InsertTicket),
            "validate_ticket" => typed(name, value, ToolArgs::ValidateTicket),
            _ => ToolArgs::Unknown {
                name: name.to_string(),
                input: value,
            },
        }
    }
}

// ============================================================================
// Tool Call - A tool invocation with ID and typed arguments
// ============================================================================

/// A tool call requested by the model, with typed arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub args: ToolArgs,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, args: ToolArgs) -> Self {
        Self {
            id: id.into(),
            args,
        }
    }

    /// Get the tool name
    pub fn name(&self) -> &str {
        self.args.tool_name()
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Role of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// One turn of dialog.
///
/// A `Tool` message's `tool_call_id` always references a call emitted by the
/// nearest preceding assistant message (or the pending booking call), so the
/// history stays 1:1 between requested calls and recorded results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            tool_calls: vec![],
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            tool_calls: vec![],
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn assistant_with_calls(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            tool_calls,
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn tool(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Tool,
            text: text.into(),
            tool_calls: vec![],
            tool_call_id: Some(tool_call_id.into()),
            tool_name: Some(tool_name.into()),
        }
    }
}

// ============================================================================
// Conversation State
// ============================================================================

/// A booking deferred until the user explicitly approves it.
///
/// Holds the validation-resolved call, so confirmation applies to the real
/// flight rather than whatever the model proposed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    pub call: ToolCall,
}

/// Authenticated user attached to a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub token: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// The persisted record for one user session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub session_id: String,
    pub history: Vec<Message>,
    #[serde(default)]
    pub pending_action: Option<PendingAction>,
    #[serde(default)]
    pub user: Option<UserIdentity>,
}

impl ConversationState {
    /// Fresh session state starting from the greeting.
    pub fn new(session_id: impl Into<String>) -> Self {
        let mut state = Self {
            session_id: session_id.into(),
            history: vec![],
            pending_action: None,
            user: None,
        };
        state.history.push(Message::assistant(state.greeting()));
        state
    }

    /// The greeting for this session, personalized when a user is signed in.
    pub fn greeting(&self) -> String {
        match self.user.as_ref().and_then(|u| u.name.as_deref()) {
            Some(name) => format!("Welcome to Cymbal Air, {name}! How may I assist you?"),
            None => "Welcome to Cymbal Air! How may I assist you?".to_string(),
        }
    }

    /// Truncate history to a fresh greeting and abandon any pending booking.
    pub fn reset(&mut self) {
        self.pending_action = None;
        self.history.clear();
        let greeting = self.greeting();
        self.history.push(Message::assistant(greeting));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn parses_known_tool_args() {
        let args = ToolArgs::from_name_and_value(
            "search_flights_by_number",
            json!({"airline": "CY", "flight_number": "888"}),
        );
        assert_eq!(
            args,
            ToolArgs::SearchFlightsByNumber(FlightNumberArgs {
                airline: "CY".to_string(),
                flight_number: "888".to_string(),
            })
        );
        assert_eq!(args.tool_name(), "search_flights_by_number");
    }

    #[test]
    fn malformed_args_fall_back_to_unknown() {
        let args =
            ToolArgs::from_name_and_value("search_flights_by_number", json!({"airline": "CY"}));
        assert!(matches!(args, ToolArgs::Unknown { ref name, .. } if name == "search_flights_by_number"));
    }

    #[test]
    fn unknown_tool_name_preserved() {
        let args = ToolArgs::from_name_and_value("teleport", json!({"to": "SFO"}));
        assert_eq!(args.tool_name(), "teleport");
        assert_eq!(args.to_value(), json!({"to": "SFO"}));
    }

    #[test]
    fn partial_ticket_is_incomplete() {
        let args = TicketArgs {
            airline: Some("CY".to_string()),
            flight_number: Some("888".to_string()),
            ..TicketArgs::default()
        };
        assert!(!args.is_complete());
    }

    #[test]
    fn reset_keeps_personalized_greeting() {
        let mut state = ConversationState::new("s-1");
        state.user = Some(UserIdentity {
            token: "tok".to_string(),
            name: Some("Alice".to_string()),
        });
        state.history.push(Message::user("book me a flight"));
        state.pending_action = Some(PendingAction {
            call: ToolCall::new("c1", ToolArgs::InsertTicket(TicketArgs::default())),
        });

        state.reset();

        assert_eq!(state.history.len(), 1);
        assert!(state.history[0].text.contains("Alice"));
        assert!(state.pending_action.is_none());
    }

    proptest! {
        // Parsing is total: any name/value pair yields args that keep the name.
        #[test]
        fn parse_never_panics(name in "[a-z_]{1,24}", n in any::<i64>()) {
            let args = ToolArgs::from_name_and_value(&name, json!({"n": n}));
            prop_assert_eq!(args.tool_name(), name.as_str());
        }
    }
}
