//! Google Calendar v3 client.

use std::sync::Arc;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::auth::CredentialCache;
use crate::calendar::{BoxFuture, CalendarApi};
use crate::error::{ProviderError, ProviderResult};
use crate::event::{CalendarEvent, CreatedEvent, NewEvent};

use super::config::GoogleConfig;

const PROVIDER: &str = "google";

/// [`CalendarApi`] backed by the Google Calendar REST API.
///
/// Every request carries a bearer token from the shared [`CredentialCache`].
/// A 401 drops the cached token so the next request acquires a new one.
#[derive(Debug)]
pub struct GoogleCalendar {
    config: GoogleConfig,
    credentials: Arc<CredentialCache>,
    http_client: reqwest::Client,
}

impl GoogleCalendar {
    pub fn new(config: GoogleConfig, credentials: Arc<CredentialCache>) -> ProviderResult<Self> {
        config
            .validate()
            .map_err(|e| ProviderError::configuration(e).with_provider(PROVIDER))?;

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ProviderError::configuration(format!("HTTP client: {e}")).with_source(e))?;

        Ok(Self {
            config,
            credentials,
            http_client,
        })
    }

    pub fn config(&self) -> &GoogleConfig {
        &self.config
    }

    /// Sends a request with a bearer token and maps non-2xx statuses to errors.
    async fn send(&self, request: RequestBuilder) -> ProviderResult<Response> {
        let token = self
            .credentials
            .access_token()
            .await
            .map_err(|e| e.with_provider(PROVIDER))?;

        let response = request
            .bearer_auth(token.secret())
            .send()
            .await
            .map_err(|e| ProviderError::from(e).with_provider(PROVIDER))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            self.credentials.invalidate().await;
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.text().await.unwrap_or_default();

        let mut error = ProviderError::from_status(status.as_u16(), body.trim());
        if let Some(secs) = retry_after {
            error = ProviderError::new(
                error.code(),
                format!("{}, retry after {secs} seconds", error.message()),
            )
            .with_status(status.as_u16());
        }
        Err(error.with_provider(PROVIDER))
    }

    async fn list(&self) -> ProviderResult<Vec<CalendarEvent>> {
        let request = self
            .http_client
            .get(self.config.events_url())
            .query(&[("maxResults", self.config.max_results.to_string())]);

        let response = self.send(request).await?;
        let page: EventListResponse = response.json().await.map_err(|e| {
            ProviderError::invalid_response(format!("invalid event list: {e}"))
                .with_provider(PROVIDER)
                .with_source(e)
        })?;

        if page.next_page_token.is_some() {
            warn!(
                calendar = %self.config.calendar_id,
                "calendar has more events than one page, later pages are not checked"
            );
        }

        let events: Vec<CalendarEvent> = page
            .items
            .into_iter()
            .filter(|event| !event.is_cancelled())
            .collect();
        debug!(
            calendar = %self.config.calendar_id,
            count = events.len(),
            "listed events"
        );
        Ok(events)
    }

    async fn create(&self, event: &NewEvent) -> ProviderResult<CreatedEvent> {
        let request = self.http_client.post(self.config.events_url()).json(event);
        let response = self.send(request).await?;

        let body = response.text().await.unwrap_or_default();
        debug!(summary = %event.summary, response = %body, "event created");

        let created = serde_json::from_str::<CreatedEvent>(&body).unwrap_or_else(|e| {
            warn!(error = %e, "could not read created event, id unknown");
            CreatedEvent::default()
        });
        Ok(created)
    }

    async fn delete(&self, event_id: &str) -> ProviderResult<()> {
        let request = self.http_client.delete(self.config.event_url(event_id));
        self.send(request).await?;
        debug!(event_id, "event deleted");
        Ok(())
    }
}

impl CalendarApi for GoogleCalendar {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn list_events(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarEvent>>> {
        Box::pin(self.list())
    }

    fn create_event<'a>(
        &'a self,
        event: &'a NewEvent,
    ) -> BoxFuture<'a, ProviderResult<CreatedEvent>> {
        Box::pin(self.create(event))
    }

    fn delete_event<'a>(&'a self, event_id: &'a str) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(self.delete(event_id))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<CalendarEvent>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProviderErrorCode;
    use crate::auth::StaticTokenSource;
    use tutorsync_core::{SessionRecord, SessionTime};
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const EVENTS_PATH: &str = "/calendars/primary/events";

    fn calendar(server: &MockServer) -> (GoogleCalendar, Arc<CredentialCache>) {
        let credentials = Arc::new(CredentialCache::new(Arc::new(StaticTokenSource::new(
            "test-token",
        ))));
        let config = GoogleConfig::new().with_api_base(&server.uri()).unwrap();
        (
            GoogleCalendar::new(config, credentials.clone()).unwrap(),
            credentials,
        )
    }

    fn new_event() -> NewEvent {
        let record = SessionRecord::new("Jan 5, 2025 3:00 PM", "Alice", "Calculus");
        let time = SessionTime::parse(&record.date, &chrono_tz::America::Chicago).unwrap();
        NewEvent::for_session(&record, &time)
    }

    #[tokio::test]
    async fn list_events_sends_bearer_and_parses_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(EVENTS_PATH))
            .and(header("Authorization", "Bearer test-token"))
            .and(query_param("maxResults", "2500"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    {
                        "id": "evt-1",
                        "summary": "Tutoring Session with Alice",
                        "start": {"dateTime": "2025-01-05T15:00:00-06:00"},
                        "end": {"dateTime": "2025-01-05T16:00:00-06:00"}
                    },
                    {"id": "evt-2", "status": "cancelled"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (calendar, _) = calendar(&server);
        let events = calendar.list_events().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "evt-1");
        assert!(events[0].start_instant().is_some());
    }

    #[tokio::test]
    async fn list_events_ignores_further_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(EVENTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"id": "evt-1", "summary": "x"}],
                "nextPageToken": "page-2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (calendar, _) = calendar(&server);
        assert_eq!(calendar.list_events().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_event_posts_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(EVENTS_PATH))
            .and(header("Authorization", "Bearer test-token"))
            .and(body_partial_json(serde_json::json!({
                "summary": "Tutoring Session with Alice",
                "description": "Course: Calculus",
                "start": {"dateTime": "2025-01-05T15:00:00-06:00", "timeZone": "America/Chicago"},
                "end": {"dateTime": "2025-01-05T16:00:00-06:00", "timeZone": "America/Chicago"}
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "new-1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (calendar, _) = calendar(&server);
        let created = calendar.create_event(&new_event()).await.unwrap();
        assert_eq!(created.id.as_deref(), Some("new-1"));
    }

    #[tokio::test]
    async fn create_event_with_unreadable_body_still_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(EVENTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let (calendar, _) = calendar(&server);
        let created = calendar.create_event(&new_event()).await.unwrap();
        assert!(created.id.is_none());
    }

    #[tokio::test]
    async fn unauthorized_invalidates_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(EVENTS_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
            .mount(&server)
            .await;

        let (calendar, credentials) = calendar(&server);
        let err = calendar.list_events().await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert_eq!(err.provider(), Some("google"));
        assert!(!credentials.is_cached().await);
    }

    #[tokio::test]
    async fn delete_event_maps_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(format!("{EVENTS_PATH}/evt-ok")))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!("{EVENTS_PATH}/evt-gone")))
            .respond_with(ResponseTemplate::new(410))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!("{EVENTS_PATH}/evt-busy")))
            .respond_with(ResponseTemplate::new(503).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;

        let (calendar, _) = calendar(&server);
        calendar.delete_event("evt-ok").await.unwrap();

        let gone = calendar.delete_event("evt-gone").await.unwrap_err();
        assert!(gone.is_not_found());

        let busy = calendar.delete_event("evt-busy").await.unwrap_err();
        assert!(busy.is_retryable());
        assert_eq!(busy.status(), Some(503));
        assert!(busy.message().contains("retry after 7 seconds"));
    }

    #[tokio::test]
    async fn missing_token_fails_before_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let credentials = Arc::new(CredentialCache::new(Arc::new(StaticTokenSource::new(""))));
        let config = GoogleConfig::new().with_api_base(&server.uri()).unwrap();
        let calendar = GoogleCalendar::new(config, credentials).unwrap();

        let err = calendar.list_events().await.unwrap_err();
        assert!(err.is_authentication());
    }
}
