//! End-to-end aggregation over both HTTP providers, backed by wiremock servers.

use weather_core::{
    AggregateError, Aggregator, Config, Location, ProviderError, ProviderId, WeatherReport,
    providers_from_config,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn openweather_server(status: u16, body: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(&server)
        .await;
    server
}

async fn weatherapi_server(status: u16, body: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/current.json"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(&server)
        .await;
    server
}

fn config_for(openweather: &MockServer, weatherapi: &MockServer) -> Config {
    let mut cfg = Config::default();
    cfg.upsert_provider_api_key(ProviderId::OpenWeather, "OW_KEY".into());
    cfg.set_provider_base_url(ProviderId::OpenWeather, openweather.uri()).unwrap();
    cfg.upsert_provider_api_key(ProviderId::WeatherApi, "WA_KEY".into());
    cfg.set_provider_base_url(ProviderId::WeatherApi, weatherapi.uri()).unwrap();
    cfg
}

#[tokio::test]
async fn averages_kelvin_and_celsius_sources() {
    let ow = openweather_server(
        200,
        serde_json::json!({ "name": "Amsterdam", "main": { "temp": 288.0 } }),
    )
    .await;
    let wa = weatherapi_server(
        200,
        serde_json::json!({
            "location": { "name": "Amsterdam" },
            "current": { "temp_c": 16.85 }
        }),
    )
    .await;

    let providers = providers_from_config(&config_for(&ow, &wa)).unwrap();
    let aggregator = Aggregator::new(providers);
    let location = Location::new("nl", "Amsterdam");

    let result = aggregator.query(&location).await.unwrap();

    assert_eq!(result.contributors, 2);
    assert!((result.temperature.value() - 289.0).abs() < 0.01, "got {}", result.temperature);

    let report = WeatherReport::new(&location, &result, true);
    assert_eq!(report.city, "Amsterdam");
    assert!((report.temp_c.unwrap() - 15.85).abs() < 0.01);
}

#[tokio::test]
async fn one_upstream_failure_fails_the_aggregate() {
    let ow = openweather_server(
        404,
        serde_json::json!({ "cod": "404", "message": "city not found" }),
    )
    .await;
    let wa = weatherapi_server(
        200,
        serde_json::json!({
            "location": { "name": "Atlantis" },
            "current": { "temp_c": 20.0 }
        }),
    )
    .await;

    let providers = providers_from_config(&config_for(&ow, &wa)).unwrap();
    let err = Aggregator::new(providers).query(&Location::new("gr", "Atlantis")).await.unwrap_err();

    match err {
        AggregateError::Provider(ProviderError::Upstream { provider, message, .. }) => {
            assert_eq!(provider, "openweather");
            assert_eq!(message, "city not found");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn unconfigured_aggregator_reports_configuration_error() {
    let providers = providers_from_config(&Config::default()).unwrap();
    let err = Aggregator::new(providers).query(&Location::new("nl", "Amsterdam")).await.unwrap_err();

    assert!(matches!(err, AggregateError::NoProviders));
}
