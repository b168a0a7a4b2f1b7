//! Google Meet links for approved consultations
//!
//! With a calendar access token an event with a Meet conference is created
//! through the Google Calendar API. Without one, or when the API call fails,
//! a placeholder link derived from the appointment id is returned so approval
//! never blocks on the external service.

use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::models::Appointment;

const CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";

/// Accepts `dd/mm/yyyy` and `yyyy-mm-dd`
pub fn parse_appointment_date(date: &str) -> Option<NaiveDate> {
    let date = date.trim();
    NaiveDate::parse_from_str(date, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(date, "%Y-%m-%d"))
        .ok()
}

/// Accepts `10:30 AM` and `14:30`
pub fn parse_appointment_time(time: &str) -> Option<NaiveTime> {
    let time = time.trim();
    NaiveTime::parse_from_str(&time.to_uppercase(), "%I:%M %p")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M"))
        .ok()
}

#[derive(Debug, thiserror::Error)]
pub enum MeetError {
    #[error("invalid appointment date: {0}")]
    InvalidDate(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("calendar API returned {0}")]
    Server(u16),
    #[error("unexpected response: {0}")]
    Parse(String),
    #[error("event has no conference link")]
    MissingLink,
}

// Calendar API request/response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRequest {
    pub summary: String,
    pub description: String,
    pub start: EventTime,
    pub end: EventTime,
    pub attendees: Vec<Attendee>,
    pub conference_data: ConferenceRequest,
    pub reminders: Reminders,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: String,
    pub time_zone: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Attendee {
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceRequest {
    pub create_request: CreateRequest,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    pub request_id: String,
    pub conference_solution_key: SolutionKey,
}

#[derive(Debug, Serialize)]
pub struct SolutionKey {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminders {
    pub use_default: bool,
    pub overrides: Vec<Reminder>,
}

#[derive(Debug, Serialize)]
pub struct Reminder {
    pub method: &'static str,
    pub minutes: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventResponse {
    conference_data: Option<ConferenceData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConferenceData {
    #[serde(default)]
    entry_points: Vec<EntryPoint>,
}

#[derive(Debug, Deserialize)]
struct EntryPoint {
    uri: Option<String>,
}

impl EventRequest {
    /// One-hour event at the booked time, 10:00 UTC when no time was given
    pub fn for_appointment(appointment: &Appointment) -> Result<Self, MeetError> {
        let date = parse_appointment_date(&appointment.date)
            .ok_or_else(|| MeetError::InvalidDate(appointment.date.clone()))?;

        let time = appointment
            .time
            .as_deref()
            .and_then(parse_appointment_time)
            .or_else(|| NaiveTime::from_hms_opt(10, 0, 0))
            .unwrap_or_default();

        let start = NaiveDateTime::new(date, time);
        let end = start + chrono::Duration::hours(1);

        Ok(Self {
            summary: format!("LeafSense Consultation - {}", appointment.name),
            description: format!("Consultation for: {}", appointment.reason),
            start: EventTime {
                date_time: start.format("%Y-%m-%dT%H:%M:%S").to_string(),
                time_zone: "UTC",
            },
            end: EventTime {
                date_time: end.format("%Y-%m-%dT%H:%M:%S").to_string(),
                time_zone: "UTC",
            },
            attendees: vec![Attendee { email: appointment.email.clone() }],
            conference_data: ConferenceRequest {
                create_request: CreateRequest {
                    request_id: format!("leafsense-{}", appointment.id),
                    conference_solution_key: SolutionKey { kind: "hangoutsMeet" },
                },
            },
            reminders: Reminders {
                use_default: false,
                overrides: vec![
                    Reminder { method: "email", minutes: 24 * 60 },
                    Reminder { method: "popup", minutes: 30 },
                ],
            },
        })
    }
}

/// Creates Meet links for appointments
pub struct MeetScheduler {
    token: Option<String>,
    calendar_id: String,
    api_base: String,
    http_client: reqwest::Client,
}

impl MeetScheduler {
    pub fn new(token: Option<String>, calendar_id: String) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();

        Self {
            token,
            calendar_id,
            api_base: CALENDAR_API.to_string(),
            http_client,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let scheduler = Self::new(config.calendar_token.clone(), config.calendar_id.clone());
        if scheduler.token.is_none() {
            tracing::info!("GOOGLE_CALENDAR_TOKEN not set, approved appointments get mock Meet links");
        }
        scheduler
    }

    #[cfg(test)]
    fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.to_string();
        self
    }

    /// Meet link for an approved appointment; never fails
    pub async fn link_for(&self, appointment: &Appointment) -> String {
        if self.token.is_none() {
            return format!("https://meet.google.com/mock-{}", appointment.id);
        }

        match self.create_event(appointment).await {
            Ok(link) => {
                tracing::info!("Created Meet event for appointment {}", appointment.id);
                link
            }
            Err(e) => {
                tracing::warn!("Failed to create Meet event for appointment {}: {}", appointment.id, e);
                format!("https://meet.google.com/fallback-{}", appointment.id)
            }
        }
    }

    async fn create_event(&self, appointment: &Appointment) -> Result<String, MeetError> {
        let token = self.token.as_deref().unwrap_or_default();
        let event = EventRequest::for_appointment(appointment)?;
        let url = format!(
            "{}/calendars/{}/events?conferenceDataVersion=1",
            self.api_base, self.calendar_id
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .json(&event)
            .send()
            .await
            .map_err(|e| MeetError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MeetError::Server(response.status().as_u16()));
        }

        let created: EventResponse = response
            .json()
            .await
            .map_err(|e| MeetError::Parse(e.to_string()))?;

        created
            .conference_data
            .and_then(|data| data.entry_points.into_iter().next())
            .and_then(|entry| entry.uri)
            .filter(|uri| !uri.is_empty())
            .ok_or(MeetError::MissingLink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus;

    fn appointment(date: &str, time: Option<&str>) -> Appointment {
        Appointment {
            id: 42,
            user_id: "user-1".to_string(),
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            date: date.to_string(),
            time: time.map(str::to_string),
            doctor: None,
            reason: "Skin rash".to_string(),
            status: AppointmentStatus::Pending,
            meet_link: None,
            hidden_from_user: 0,
            timestamp: "2024-01-01T00:00:00.000000Z".to_string(),
        }
    }

    #[test]
    fn parses_both_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 12, 15);
        assert_eq!(parse_appointment_date("15/12/2024"), expected);
        assert_eq!(parse_appointment_date("2024-12-15"), expected);
        assert_eq!(parse_appointment_date("12/15/2024"), None);
        assert_eq!(parse_appointment_date(""), None);
    }

    #[test]
    fn parses_times() {
        assert_eq!(parse_appointment_time("2:30 pm"), NaiveTime::from_hms_opt(14, 30, 0));
        assert_eq!(parse_appointment_time("09:15"), NaiveTime::from_hms_opt(9, 15, 0));
        assert_eq!(parse_appointment_time("soon"), None);
    }

    #[test]
    fn event_defaults_to_ten_utc_for_one_hour() {
        let event = EventRequest::for_appointment(&appointment("15/12/2024", None)).unwrap();
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["summary"], "LeafSense Consultation - Asha");
        assert_eq!(json["description"], "Consultation for: Skin rash");
        assert_eq!(json["start"]["dateTime"], "2024-12-15T10:00:00");
        assert_eq!(json["end"]["dateTime"], "2024-12-15T11:00:00");
        assert_eq!(json["start"]["timeZone"], "UTC");
        assert_eq!(json["attendees"][0]["email"], "asha@example.com");
        assert_eq!(json["conferenceData"]["createRequest"]["requestId"], "leafsense-42");
        assert_eq!(
            json["conferenceData"]["createRequest"]["conferenceSolutionKey"]["type"],
            "hangoutsMeet"
        );
        assert_eq!(json["reminders"]["useDefault"], false);
        assert_eq!(json["reminders"]["overrides"][0]["minutes"], 1440);
        assert_eq!(json["reminders"]["overrides"][1]["method"], "popup");
    }

    #[test]
    fn event_uses_booked_time() {
        let event = EventRequest::for_appointment(&appointment("2024-12-15", Some("3:00 PM"))).unwrap();
        assert_eq!(event.start.date_time, "2024-12-15T15:00:00");
        assert_eq!(event.end.date_time, "2024-12-15T16:00:00");
    }

    #[test]
    fn extracts_first_entry_point() {
        let body = r#"{"conferenceData":{"entryPoints":[{"uri":"https://meet.google.com/abc-defg-hij"},{"uri":"tel:+1"}]}}"#;
        let parsed: EventResponse = serde_json::from_str(body).unwrap();
        let uri = parsed.conference_data.unwrap().entry_points.into_iter().next().unwrap().uri;
        assert_eq!(uri.as_deref(), Some("https://meet.google.com/abc-defg-hij"));
    }

    #[tokio::test]
    async fn mock_link_without_token() {
        let scheduler = MeetScheduler::new(None, "primary".to_string());
        assert_eq!(
            scheduler.link_for(&appointment("15/12/2024", None)).await,
            "https://meet.google.com/mock-42"
        );
    }

    #[tokio::test]
    async fn fallback_link_when_api_unreachable() {
        let scheduler = MeetScheduler::new(Some("token".to_string()), "primary".to_string())
            .with_api_base("http://127.0.0.1:9");
        assert_eq!(
            scheduler.link_for(&appointment("15/12/2024", None)).await,
            "https://meet.google.com/fallback-42"
        );
    }

    #[tokio::test]
    async fn fallback_link_for_unparseable_date() {
        let scheduler = MeetScheduler::new(Some("token".to_string()), "primary".to_string());
        assert_eq!(
            scheduler.link_for(&appointment("someday", None)).await,
            "https://meet.google.com/fallback-42"
        );
    }
}
