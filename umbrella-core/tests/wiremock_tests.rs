//! HTTP behaviour of the forecast provider, the LINE notifier and the full
//! pipeline, against WireMock stand-ins for both APIs.

use std::{collections::HashMap, net::TcpListener, sync::Mutex};

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use reqwest::StatusCode;
use umbrella_core::{
    ConfigError, Credentials, ForecastProvider, LineNotifier, LocationSpec, Notifier,
    OpenWeatherProvider, Outcome, RainCheck, Reporter, Settings, UmbrellaError, rain::jst,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path, query_param},
};

// =============================================================================
// Test Helpers
// =============================================================================

const FORECAST_PATH: &str = "/data/2.5/forecast";
const PUSH_PATH: &str = "/v2/bot/message/push";

fn now() -> DateTime<FixedOffset> {
    jst().with_ymd_and_hms(2024, 6, 1, 7, 0, 0).unwrap()
}

fn settings_for(forecast: &MockServer, push: &MockServer) -> Settings {
    let mut settings = Settings::default();
    settings.endpoints.forecast_url = format!("{}{FORECAST_PATH}", forecast.uri());
    settings.endpoints.push_url = format!("{}{PUSH_PATH}", push.uri());
    settings.http.timeout_secs = 5;
    settings
}

fn forecast_settings(server: &MockServer) -> Settings {
    let mut settings = Settings::default();
    settings.endpoints.forecast_url = format!("{}{FORECAST_PATH}", server.uri());
    settings
}

fn push_settings(server: &MockServer) -> Settings {
    let mut settings = Settings::default();
    settings.endpoints.push_url = format!("{}{PUSH_PATH}", server.uri());
    settings
}

/// Base URL of a local port with nothing listening on it.
fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

fn tokyo() -> LocationSpec {
    LocationSpec::Coordinates {
        lat: 35.6895,
        lon: 139.6917,
    }
}

/// OpenWeather-shaped body with one entry per `(hours after now, main, description)`.
fn forecast_body(slots: &[(i64, &str, &str)]) -> serde_json::Value {
    let list: Vec<_> = slots
        .iter()
        .map(|(hours, main, description)| {
            let dt = (now().with_timezone(&Utc) + Duration::hours(*hours)).timestamp();
            serde_json::json!({
                "dt": dt,
                "main": {"temp": 19.3, "feels_like": 19.0, "humidity": 88},
                "weather": [{"id": 500, "main": main, "description": description, "icon": "10d"}],
                "wind": {"speed": 3.1}
            })
        })
        .collect();

    serde_json::json!({
        "cod": "200",
        "cnt": list.len(),
        "list": list,
        "city": {"id": 1850147, "name": "東京都", "country": "JP"}
    })
}

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name: &str| map.get(name).cloned()
}

#[derive(Default)]
struct RecordingReporter(Mutex<Vec<String>>);

impl Reporter for RecordingReporter {
    fn status(&self, line: &str) {
        self.0.lock().unwrap().push(line.to_string());
    }
}

// =============================================================================
// Forecast Provider Tests
// =============================================================================

mod forecast_tests {
    use super::*;

    #[tokio::test]
    async fn fetch_sends_location_key_language_and_units() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(FORECAST_PATH))
            .and(query_param("lat", "35.6895"))
            .and(query_param("lon", "139.6917"))
            .and(query_param("appid", "OW_KEY"))
            .and(query_param("lang", "ja"))
            .and(query_param("units", "metric"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(forecast_body(&[(3, "Rain", "小雨"), (6, "Clouds", "曇り")])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenWeatherProvider::new("OW_KEY".into(), &forecast_settings(&server)).unwrap();
        let forecast = provider.fetch_forecast(&tokyo()).await.unwrap();

        assert_eq!(forecast.location_name, "東京都");
        assert_eq!(forecast.entries.len(), 2);
        assert_eq!(forecast.entries[0].conditions[0].description, "小雨");
        assert_eq!(forecast.entries[1].humidity_pct, 88);
    }

    #[tokio::test]
    async fn city_mode_uses_q_parameter() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(FORECAST_PATH))
            .and(query_param("q", "Tokyo"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(forecast_body(&[(3, "Clear", "晴天")])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenWeatherProvider::new("OW_KEY".into(), &forecast_settings(&server)).unwrap();
        let forecast = provider
            .fetch_forecast(&LocationSpec::City("Tokyo".into()))
            .await
            .unwrap();

        assert_eq!(forecast.entries.len(), 1);
    }

    #[tokio::test]
    async fn non_success_status_is_a_provider_error_with_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(FORECAST_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_string(
                r#"{"cod":401, "message": "Invalid API key. Please see https://openweathermap.org/faq#error401 for more info."}"#,
            ))
            .mount(&server)
            .await;

        let provider = OpenWeatherProvider::new("BAD".into(), &forecast_settings(&server)).unwrap();
        let err = provider.fetch_forecast(&tokyo()).await.unwrap_err();

        match err {
            UmbrellaError::Provider { status, body, .. } => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert!(body.contains("Invalid API key"));
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_list_is_an_empty_forecast_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(FORECAST_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body(&[])))
            .mount(&server)
            .await;

        let provider = OpenWeatherProvider::new("OW_KEY".into(), &forecast_settings(&server)).unwrap();
        let err = provider.fetch_forecast(&tokyo()).await.unwrap_err();

        assert!(matches!(err, UmbrellaError::EmptyForecast { .. }));
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(FORECAST_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"list": [{"dt": "soon"}]}"#))
            .mount(&server)
            .await;

        let provider = OpenWeatherProvider::new("OW_KEY".into(), &forecast_settings(&server)).unwrap();
        let err = provider.fetch_forecast(&tokyo()).await.unwrap_err();

        assert!(matches!(err, UmbrellaError::Decode { .. }));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        let mut settings = Settings::default();
        settings.endpoints.forecast_url = format!("{}{FORECAST_PATH}", closed_port_url());

        let provider = OpenWeatherProvider::new("OW_KEY".into(), &settings).unwrap();
        let err = provider.fetch_forecast(&tokyo()).await.unwrap_err();

        assert!(matches!(err, UmbrellaError::Transport { .. }));
    }
}

// =============================================================================
// LINE Notifier Tests
// =============================================================================

mod notifier_tests {
    use super::*;

    #[tokio::test]
    async fn push_sends_bearer_token_and_single_text_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(PUSH_PATH))
            .and(header("authorization", "Bearer LINE_TOKEN"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({
                "to": "U1234567890",
                "messages": [{"type": "text", "text": "傘を持って行ってください"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = LineNotifier::new("LINE_TOKEN".into(), &push_settings(&server)).unwrap();

        notifier
            .send_text("U1234567890", "傘を持って行ってください")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unauthorized_is_a_provider_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(PUSH_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "message": "Authentication failed. Confirm that the access token in the authorization header is valid."
            })))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = LineNotifier::new("EXPIRED".into(), &push_settings(&server)).unwrap();
        let err = notifier.send_text("U1", "hello").await.unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert!(err.to_string().contains("401 Unauthorized"));
    }

    #[tokio::test]
    async fn non_200_success_is_still_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(PUSH_PATH))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;

        let notifier = LineNotifier::new("TOKEN".into(), &push_settings(&server)).unwrap();
        let err = notifier.send_text("U1", "hello").await.unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::ACCEPTED));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        let mut settings = Settings::default();
        settings.endpoints.push_url = format!("{}{PUSH_PATH}", closed_port_url());

        let notifier = LineNotifier::new("TOKEN".into(), &settings).unwrap();
        let err = notifier.send_text("U1", "hello").await.unwrap_err();

        assert!(matches!(err, UmbrellaError::Transport { service: "LINE", .. }));
    }
}

// =============================================================================
// Pipeline Tests
// =============================================================================

mod pipeline_tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials::from_lookup(env(&[
            ("OPENWEATHER_API_KEY", "OW_KEY"),
            ("WEATHER_LAT", "35.6895"),
            ("WEATHER_LON", "139.6917"),
            ("LINE_CHANNEL_ACCESS_TOKEN", "LINE_TOKEN"),
            ("MY_USER_ID", "U-me"),
        ]))
        .unwrap()
    }

    async fn mount_forecast(server: &MockServer, slots: &[(i64, &str, &str)]) {
        Mock::given(method("GET"))
            .and(path(FORECAST_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body(slots)))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn rain_in_three_hours_is_pushed() {
        let weather = MockServer::start().await;
        let line = MockServer::start().await;
        mount_forecast(&weather, &[(3, "Rain", "適度な雨"), (30, "Rain", "雨")]).await;

        Mock::given(method("POST"))
            .and(path(PUSH_PATH))
            .and(body_json(serde_json::json!({
                "to": "U-me",
                "messages": [{
                    "type": "text",
                    "text": "本日(2024-06-01)は以下の時間帯で雨の予報があります: [06/01 10:00]"
                }]
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&line)
            .await;

        let reporter = RecordingReporter::default();
        let outcome = RainCheck::from_config(&credentials(), &settings_for(&weather, &line))
            .unwrap()
            .run(now(), &reporter)
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::RainNotified { .. }));
        assert_eq!(
            *reporter.0.lock().unwrap(),
            vec![umbrella_core::pipeline::RAIN_SENT.to_string()]
        );
    }

    #[tokio::test]
    async fn clear_day_sends_nothing() {
        let weather = MockServer::start().await;
        let line = MockServer::start().await;
        mount_forecast(&weather, &[(3, "Clear", "晴天"), (6, "Clear", "晴天")]).await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&line)
            .await;

        let reporter = RecordingReporter::default();
        let outcome = RainCheck::from_config(&credentials(), &settings_for(&weather, &line))
            .unwrap()
            .run(now(), &reporter)
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::NotNeeded);
    }

    #[tokio::test]
    async fn rejected_push_is_an_error_and_reports_nothing() {
        let weather = MockServer::start().await;
        let line = MockServer::start().await;
        mount_forecast(&weather, &[(3, "Rain", "強い雨")]).await;

        Mock::given(method("POST"))
            .and(path(PUSH_PATH))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&line)
            .await;

        let reporter = RecordingReporter::default();
        let err = RainCheck::from_config(&credentials(), &settings_for(&weather, &line))
            .unwrap()
            .run(now(), &reporter)
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert!(reporter.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_request() {
        let weather = MockServer::start().await;
        let line = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&weather)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&line)
            .await;

        let result = RainCheck::from_lookup(
            env(&[
                ("WEATHER_LAT", "35.6895"),
                ("WEATHER_LON", "139.6917"),
                ("LINE_CHANNEL_ACCESS_TOKEN", "LINE_TOKEN"),
                ("MY_USER_ID", "U-me"),
            ]),
            &settings_for(&weather, &line),
        );

        assert!(matches!(
            result,
            Err(UmbrellaError::Config(ConfigError::MissingVar {
                var: "OPENWEATHER_API_KEY"
            }))
        ));
        weather.verify().await;
        line.verify().await;
    }

    #[tokio::test]
    async fn zero_timeout_is_rejected_before_any_request() {
        let weather = MockServer::start().await;
        let line = MockServer::start().await;
        let mut settings = settings_for(&weather, &line);
        settings.http.timeout_secs = 0;

        let result = RainCheck::from_config(&credentials(), &settings);

        assert!(matches!(
            result,
            Err(UmbrellaError::Config(ConfigError::InvalidSetting { .. }))
        ));
        assert!(weather.received_requests().await.unwrap_or_default().is_empty());
    }
}
