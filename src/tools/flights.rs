//! Airport and flight lookup tools

use super::{summarize_rows, RetrievalClient, Tool, ToolError, ToolOutcome};
use crate::engine::state::{ToolArgs, UserIdentity};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// Large airport/flight listings are cut to this many rows plus a count.
const LIST_LIMIT: usize = 2;

pub struct SearchAirportsTool {
    retrieval: Arc<RetrievalClient>,
}

impl SearchAirportsTool {
    pub fn new(retrieval: Arc<RetrievalClient>) -> Self {
        Self { retrieval }
    }
}

#[async_trait]
impl Tool for SearchAirportsTool {
    fn name(&self) -> &str {
        "search_airports"
    }

    fn description(&self) -> String {
        "Use this tool to list all airports matching search criteria. \
         Takes at least one of country, city, name, or all and returns all matching airports. \
         The assistant can decide to return the results directly to the user."
            .to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "country": {"type": "string", "description": "Country"},
                "city": {"type": "string", "description": "City"},
                "name": {"type": "string", "description": "Airport name"}
            }
        })
    }

    async fn run(
        &self,
        args: &ToolArgs,
        user: Option<&UserIdentity>,
    ) -> Result<ToolOutcome, ToolError> {
        let ToolArgs::SearchAirports(args) = args else {
            return Err(ToolError::Failed("invalid arguments for search_airports".to_string()));
        };

        let payload = self
            .retrieval
            .get(
                "/airports/search",
                &[
                    ("country", args.country.clone()),
                    ("city", args.city.clone()),
                    ("name", args.name.clone()),
                ],
                user,
            )
            .await?;

        let output = summarize_rows(
            &payload.result,
            LIST_LIMIT,
            "There are no airports matching that query. Let the user know there are no results.",
        );
        Ok(ToolOutcome::text(output).with_query(payload.trace))
    }
}

pub struct SearchFlightsByNumberTool {
    retrieval: Arc<RetrievalClient>,
}

impl SearchFlightsByNumberTool {
    pub fn new(retrieval: Arc<RetrievalClient>) -> Self {
        Self { retrieval }
    }
}

#[async_trait]
impl Tool for SearchFlightsByNumberTool {
    fn name(&self) -> &str {
        "search_flights_by_number"
    }

    fn description(&self) -> String {
        "Use this tool to get information for a specific flight. \
         Takes an airline code and flight number and returns info on the flight. \
         Do NOT guess an airline code or flight number. \
         An airline code is a two-character airline designator followed by a 1 to 4 digit \
         flight number; for CY 888 the airline is \"CY\" and flight_number is \"888\". \
         If the tool returns more than one option choose the date closest to today."
            .to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "airline": {"type": "string", "description": "Airline unique 2 letter identifier"},
                "flight_number": {"type": "string", "description": "1 to 4 digit number"}
            },
            "required": ["airline", "flight_number"]
        })
    }

    async fn run(
        &self,
        args: &ToolArgs,
        user: Option<&UserIdentity>,
    ) -> Result<ToolOutcome, ToolError> {
        let ToolArgs::SearchFlightsByNumber(args) = args else {
            return Err(ToolError::Failed(
                "invalid arguments for search_flights_by_number".to_string(),
            ));
        };

        let payload = self
            .retrieval
            .get(
                "/flights/search",
                &[
                    ("airline", Some(args.airline.clone())),
                    ("flight_number", Some(args.flight_number.clone())),
                ],
                user,
            )
            .await?;

        Ok(ToolOutcome::text(payload.result.to_string()).with_query(payload.trace))
    }
}

pub struct ListFlightsTool {
    retrieval: Arc<RetrievalClient>,
}

impl ListFlightsTool {
    pub fn new(retrieval: Arc<RetrievalClient>) -> Self {
        Self { retrieval }
    }
}

#[async_trait]
impl Tool for ListFlightsTool {
    fn name(&self) -> &str {
        "list_flights"
    }

    fn description(&self) -> String {
        "Use this tool to list flight information matching search criteria. \
         Takes an arrival airport, a departure airport, or both, filters by date and \
         returns all matching flights. Airports are 3-letter IATA codes; use \
         search_airports first when only a city is known. \
         Do NOT guess a date; ask the user when it is missing. Date format: YYYY-MM-DD."
            .to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "departure_airport": {"type": "string", "description": "Departure airport 3-letter code"},
                "arrival_airport": {"type": "string", "description": "Arrival airport 3-letter code"},
                "date": {"type": "string", "description": "Date of flight departure (YYYY-MM-DD)"}
            },
            "required": ["date"]
        })
    }

    async fn run(
        &self,
        args: &ToolArgs,
        user: Option<&UserIdentity>,
    ) -> Result<ToolOutcome, ToolError> {
        let ToolArgs::ListFlights(args) = args else {
            return Err(ToolError::Failed("invalid arguments for list_flights".to_string()));
        };

        let payload = self
            .retrieval
            .get(
                "/flights/search",
                &[
                    ("departure_airport", args.departure_airport.clone()),
                    ("arrival_airport", args.arrival_airport.clone()),
                    ("date", Some(args.date.clone())),
                ],
                user,
            )
            .await?;

        let output = summarize_rows(
            &payload.result,
            LIST_LIMIT,
            "There are no flights matching that query. Let the user know there are no results.",
        );
        Ok(ToolOutcome::text(output).with_query(payload.trace))
    }
}
