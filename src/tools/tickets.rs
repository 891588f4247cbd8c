//! Ticket tools: listing, booking validation, and insertion
//!
//! `validate_ticket` is hidden from the model; the engine runs it before any
//! booking reaches the user for confirmation, so the user approves the
//! resolved flight rather than whatever the model proposed.

use super::{RetrievalClient, Tool, ToolError, ToolOutcome};
use crate::engine::state::{TicketArgs, ToolArgs, UserIdentity};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

pub struct ListTicketsTool {
    retrieval: Arc<RetrievalClient>,
}

impl ListTicketsTool {
    pub fn new(retrieval: Arc<RetrievalClient>) -> Self {
        Self { retrieval }
    }
}

#[async_trait]
impl Tool for ListTicketsTool {
    fn name(&self) -> &str {
        "list_tickets"
    }

    fn description(&self) -> String {
        "Use this tool to list the signed-in user's flight tickets. \
         Takes no input and returns the user's current tickets."
            .to_string()
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn run(
        &self,
        args: &ToolArgs,
        user: Option<&UserIdentity>,
    ) -> Result<ToolOutcome, ToolError> {
        if !matches!(args, ToolArgs::ListTickets) {
            return Err(ToolError::Failed("invalid arguments for list_tickets".to_string()));
        }

        let payload = self.retrieval.get("/tickets/list", &[], user).await?;
        Ok(ToolOutcome::text(payload.result.to_string()).with_query(payload.trace))
    }
}

/// Envelope produced by `validate_ticket`: either the resolved flight or a
/// sentence the model can relay to the user.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ValidationReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flight_info: Option<TicketArgs>,
}

impl ValidationReport {
    fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            flight_info: None,
        }
    }

    fn to_output(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

pub struct ValidateTicketTool {
    retrieval: Arc<RetrievalClient>,
}

impl ValidateTicketTool {
    pub fn new(retrieval: Arc<RetrievalClient>) -> Self {
        Self { retrieval }
    }
}

#[async_trait]
impl Tool for ValidateTicketTool {
    fn name(&self) -> &str {
        "validate_ticket"
    }

    fn description(&self) -> String {
        "Resolve a proposed booking to a fully-specified flight.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "airline": {"type": "string"},
                "flight_number": {"type": "string"},
                "departure_airport": {"type": "string"},
                "departure_time": {"type": "string"}
            }
        })
    }

    fn hidden(&self) -> bool {
        true
    }

    async fn run(
        &self,
        args: &ToolArgs,
        user: Option<&UserIdentity>,
    ) -> Result<ToolOutcome, ToolError> {
        let ToolArgs::ValidateTicket(ticket) = args else {
            return Err(ToolError::Failed("invalid arguments for validate_ticket".to_string()));
        };

        // Request more information before hitting the backend.
        let (Some(airline), Some(flight_number)) =
            (ticket.airline.as_deref(), ticket.flight_number.as_deref())
        else {
            let report = ValidationReport::error(
                "Ask the user what flight they are interested in booking. \
                 We need to know the airline and flight number.",
            );
            return Ok(ToolOutcome::text(report.to_output()));
        };
        let Some(departure_airport) = ticket.departure_airport.as_deref() else {
            let report = ValidationReport::error(
                "Ask the user where they are flying from. We need to know the departure airport.",
            );
            return Ok(ToolOutcome::text(report.to_output()));
        };
        let Some(departure_time) = ticket.departure_time.as_deref() else {
            let report = ValidationReport::error(
                "Ask the user what date the flight is. We need to know the departure date.",
            );
            return Ok(ToolOutcome::text(report.to_output()));
        };

        let Some(departure_date) = parse_departure_date(departure_time) else {
            let report = ValidationReport::error(
                "departure_time is in an invalid format. \
                 Make sure it's in the format '%Y-%m-%d %H:%M:%S'",
            );
            return Ok(ToolOutcome::text(report.to_output()));
        };

        let payload = self
            .retrieval
            .get(
                "/tickets/validate",
                &[
                    ("airline", Some(airline.to_string())),
                    ("flight_number", Some(flight_number.to_string())),
                    ("departure_airport", Some(departure_airport.to_string())),
                    ("departure_time", Some(format!("{departure_date} 00:00:00"))),
                ],
                user,
            )
            .await?;

        let report = match serde_json::from_value::<TicketArgs>(payload.result.clone()) {
            Ok(flight) if flight.is_complete() => ValidationReport {
                error: None,
                flight_info: Some(flight),
            },
            _ => ValidationReport::error(format!(
                "There seems to be no flight {airline}{flight_number} on {departure_date} \
                 from {departure_airport}. Ask the user to check the flight information."
            )),
        };

        Ok(ToolOutcome::text(report.to_output()).with_query(payload.trace))
    }
}

pub struct InsertTicketTool {
    retrieval: Arc<RetrievalClient>,
}

impl InsertTicketTool {
    pub fn new(retrieval: Arc<RetrievalClient>) -> Self {
        Self { retrieval }
    }
}

#[async_trait]
impl Tool for InsertTicketTool {
    fn name(&self) -> &str {
        "insert_ticket"
    }

    fn description(&self) -> String {
        "Use this tool to book a flight ticket for the user. Requires the airline, \
         flight number, departure and arrival airports, and departure and arrival \
         times (YYYY-MM-DD HH:MM:SS)."
            .to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "airline": {"type": "string", "description": "Airline unique 2 letter identifier"},
                "flight_number": {"type": "string", "description": "1 to 4 digit number"},
                "departure_airport": {"type": "string", "description": "Departure airport 3-letter code"},
                "arrival_airport": {"type": "string", "description": "Arrival airport 3-letter code"},
                "departure_time": {"type": "string", "description": "Flight departure datetime"},
                "arrival_time": {"type": "string", "description": "Flight arrival datetime"}
            },
            "required": ["airline", "flight_number"]
        })
    }

    async fn run(
        &self,
        args: &ToolArgs,
        user: Option<&UserIdentity>,
    ) -> Result<ToolOutcome, ToolError> {
        let ToolArgs::InsertTicket(ticket) = args else {
            return Err(ToolError::Failed("invalid arguments for insert_ticket".to_string()));
        };
        if !ticket.is_complete() {
            return Err(ToolError::Failed(
                "booking arguments are incomplete; validate the flight first".to_string(),
            ));
        }

        let normalize = |t: &Option<String>| t.as_ref().map(|t| t.replace('T', " "));

        let payload = self
            .retrieval
            .post(
                "/tickets/insert",
                &[
                    ("airline", ticket.airline.clone()),
                    ("flight_number", ticket.flight_number.clone()),
                    ("departure_airport", ticket.departure_airport.clone()),
                    ("arrival_airport", ticket.arrival_airport.clone()),
                    ("departure_time", normalize(&ticket.departure_time)),
                    ("arrival_time", normalize(&ticket.arrival_time)),
                ],
                user,
            )
            .await?;

        let output = if payload.result.is_null() {
            "Your flight has been successfully booked.".to_string()
        } else {
            payload.result.to_string()
        };
        Ok(ToolOutcome::text(output).with_query(payload.trace))
    }
}

/// Normalize the departure time the model proposed into a plain date.
///
/// Accepted inputs: "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d".
fn parse_departure_date(departure_time: &str) -> Option<String> {
    let date_part = departure_time
        .split_once([' ', 'T'])
        .map_or(departure_time, |(date, _)| date);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_departure_date_formats() {
        assert_eq!(
            parse_departure_date("2024-01-01 06:00:00").as_deref(),
            Some("2024-01-01")
        );
        assert_eq!(
            parse_departure_date("2024-01-01T06:00:00").as_deref(),
            Some("2024-01-01")
        );
        assert_eq!(
            parse_departure_date("2024-01-01").as_deref(),
            Some("2024-01-01")
        );
        assert_eq!(parse_departure_date("January 1st"), None);
    }

    #[test]
    fn validation_report_round_trips() {
        let report = ValidationReport {
            error: None,
            flight_info: Some(TicketArgs {
                airline: Some("CY".to_string()),
                flight_number: Some("888".to_string()),
                departure_airport: Some("SFO".to_string()),
                arrival_airport: Some("SEA".to_string()),
                departure_time: Some("2024-01-01 06:00:00".to_string()),
                arrival_time: Some("2024-01-01 08:15:00".to_string()),
            }),
        };
        let parsed: ValidationReport = serde_json::from_str(&report.to_output()).unwrap();
        assert!(parsed.error.is_none());
        assert!(parsed.flight_info.unwrap().is_complete());
    }
}
