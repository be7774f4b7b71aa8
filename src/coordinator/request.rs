use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Errors surfaced by [`super::AnalysisCoordinator::start_analysis`].
///
/// All are shown to the user as a notice; the graph is never rolled back.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
	/// The ticker was blank.
	#[error("ticker must not be empty")]
	EmptyTicker,

	/// A date field was not `YYYY-MM-DD`.
	#[error("{field} {value:?} is not a YYYY-MM-DD date")]
	InvalidDate {
		/// Which form field.
		field: &'static str,
		/// What was entered.
		value: String,
	},

	/// The range ends before it starts.
	#[error("start date {start} is after end date {end}")]
	InvertedRange {
		/// Entered start date.
		start: NaiveDate,
		/// Entered end date.
		end: NaiveDate,
	},

	/// The request body could not be built.
	#[error("failed to build request: {0}")]
	Build(String),

	/// The backend could not be reached.
	#[error("network error: {0}")]
	Network(String),

	/// The backend answered with a non-2xx status.
	#[error("backend returned HTTP {status}: {body}")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Response body, possibly empty.
		body: String,
	},

	/// The backend accepted the call but reported a failure.
	#[error("analysis failed: {0}")]
	Rejected(String),

	/// A newer analysis replaced this one before it was sent.
	#[error("superseded by a newer analysis")]
	Superseded,
}

/// Validated `POST /analyze` body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AnalysisRequest {
	/// Upper-cased ticker symbol.
	pub ticker: String,
	/// First day of the range.
	pub start_date: NaiveDate,
	/// Last day of the range, inclusive.
	pub end_date: NaiveDate,
}

impl AnalysisRequest {
	/// Validate raw form input.
	pub fn parse(ticker: &str, start_date: &str, end_date: &str) -> Result<Self, RequestError> {
		let ticker = ticker.trim();
		if ticker.is_empty() {
			return Err(RequestError::EmptyTicker);
		}
		let start_date = parse_date("start date", start_date)?;
		let end_date = parse_date("end date", end_date)?;
		if start_date > end_date {
			return Err(RequestError::InvertedRange {
				start: start_date,
				end: end_date,
			});
		}
		Ok(Self {
			ticker: ticker.to_uppercase(),
			start_date,
			end_date,
		})
	}
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, RequestError> {
	let trimmed = value.trim();
	// chrono accepts unpadded fields; the wire format does not
	if trimmed.len() != 10 {
		return Err(RequestError::InvalidDate {
			field,
			value: value.to_owned(),
		});
	}
	NaiveDate::parse_from_str(trimmed, DATE_FORMAT).map_err(|_| RequestError::InvalidDate {
		field,
		value: value.to_owned(),
	})
}

/// Result of a successful analysis, when the backend returns one.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AnalysisReport {
	/// Ticker the report is about.
	pub ticker: String,
	/// Named summary statistics.
	#[serde(default)]
	pub summary: BTreeMap<String, f64>,
	/// Free-text commentary, when the backend produced one.
	#[serde(default)]
	pub ai_analysis: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum AnalysisReply {
	Success(AnalysisReport),
	Error {
		#[serde(default)]
		message: String,
	},
}

/// Interpret a 2xx response body.
///
/// The trigger is fire-and-forget, so a missing or unrecognised body is
/// accepted. Only an explicit `"status": "error"` is a failure.
pub fn interpret_reply(body: &str) -> Result<Option<AnalysisReport>, RequestError> {
	if body.trim().is_empty() {
		return Ok(None);
	}
	match serde_json::from_str::<AnalysisReply>(body) {
		Ok(AnalysisReply::Success(report)) => Ok(Some(report)),
		Ok(AnalysisReply::Error { message }) => Err(RequestError::Rejected(message)),
		Err(_) => Ok(None),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_valid_form() {
		let req = AnalysisRequest::parse(" aapl ", "2025-01-01", "2025-01-10").unwrap();
		assert_eq!(req.ticker, "AAPL");
		assert_eq!(req.start_date, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
		assert_eq!(req.end_date, NaiveDate::from_ymd_opt(2025, 1, 10).unwrap());
	}

	#[test]
	fn same_day_range_is_valid() {
		assert!(AnalysisRequest::parse("MSFT", "2025-03-03", "2025-03-03").is_ok());
	}

	#[test]
	fn rejects_bad_input() {
		assert_eq!(
			AnalysisRequest::parse("  ", "2025-01-01", "2025-01-10"),
			Err(RequestError::EmptyTicker)
		);
		assert!(matches!(
			AnalysisRequest::parse("AAPL", "2025-1-1", "2025-01-10"),
			Err(RequestError::InvalidDate { field: "start date", .. })
		));
		assert!(matches!(
			AnalysisRequest::parse("AAPL", "2025-01-01", "2025-02-30"),
			Err(RequestError::InvalidDate { field: "end date", .. })
		));
		assert!(matches!(
			AnalysisRequest::parse("AAPL", "2025-01-10", "2025-01-01"),
			Err(RequestError::InvertedRange { .. })
		));
	}

	#[test]
	fn serializes_wire_body() {
		let req = AnalysisRequest::parse("AAPL", "2025-01-01", "2025-01-10").unwrap();
		let json = serde_json::to_value(&req).unwrap();
		assert_eq!(
			json,
			serde_json::json!({
				"ticker": "AAPL",
				"start_date": "2025-01-01",
				"end_date": "2025-01-10",
			})
		);
	}

	#[test]
	fn reply_success_is_reported() {
		let body = r#"{"status":"success","ticker":"AAPL","summary":{"High":250.1},"ai_analysis":"Up."}"#;
		let report = interpret_reply(body).unwrap().unwrap();
		assert_eq!(report.ticker, "AAPL");
		assert_eq!(report.summary.get("High"), Some(&250.1));
		assert_eq!(report.ai_analysis.as_deref(), Some("Up."));
	}

	#[test]
	fn reply_error_is_rejected() {
		let body = r#"{"status":"error","message":"No data found"}"#;
		assert_eq!(
			interpret_reply(body),
			Err(RequestError::Rejected("No data found".into()))
		);
	}

	#[test]
	fn unknown_or_empty_reply_is_accepted() {
		assert_eq!(interpret_reply(""), Ok(None));
		assert_eq!(interpret_reply("ok"), Ok(None));
		assert_eq!(interpret_reply(r#"{"queued":true}"#), Ok(None));
	}
}
