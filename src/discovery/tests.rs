use super::*;
use std::time::Duration;

fn san_jose() -> LocationQuery {
    LocationQuery::new("95123", "San Jose", "CA")
}

fn parse(json: serde_json::Value) -> OverpassResponse {
    serde_json::from_value(json).expect("valid overpass payload")
}

#[test]
fn test_build_query_scopes_postcode_and_city() {
    let query = build_query(&san_jose());

    assert!(query.starts_with("[out:json][timeout:25];"));
    assert!(query.contains(r#"["building"="house"]"#));
    assert!(query.contains(r#"["addr:postcode"="95123"]"#));
    assert!(query.contains(r#"["addr:city"="San Jose"]"#));
    assert!(query.trim_end().ends_with("out geom;"));
}

#[test]
fn test_build_query_escapes_quotes() {
    let query = build_query(&LocationQuery::new("1\"2", "O\\Town", "ST"));

    assert!(query.contains(r#"["addr:postcode"="1\"2"]"#));
    assert!(query.contains(r#"["addr:city"="O\\Town"]"#));
}

#[test]
fn test_addresses_from_elements() {
    let payload = parse(serde_json::json!({
        "elements": [
            {"type": "way", "tags": {"addr:housenumber": "101", "addr:street": "Blossom Hill Road", "building": "house"}},
            {"type": "way", "tags": {"addr:housenumber": "7", "addr:street": "Cottle Road"}}
        ]
    }));

    let addresses = addresses_from_elements(&san_jose(), &payload.elements);

    assert_eq!(
        addresses,
        vec![
            "101 Blossom Hill Road San Jose CA".to_string(),
            "7 Cottle Road San Jose CA".to_string(),
        ]
    );
}

#[test]
fn test_addresses_skip_incomplete_elements() {
    let payload = parse(serde_json::json!({
        "elements": [
            {"type": "way", "tags": {"addr:street": "No Number Lane"}},
            {"type": "node"},
            {"type": "way", "tags": {"addr:housenumber": "9", "addr:street": "Kept Street"}}
        ]
    }));

    let addresses = addresses_from_elements(&san_jose(), &payload.elements);

    assert_eq!(addresses, vec!["9 Kept Street San Jose CA".to_string()]);
}

#[test]
fn test_empty_elements_yield_empty_vec() {
    let payload = parse(serde_json::json!({ "elements": [] }));
    assert!(addresses_from_elements(&san_jose(), &payload.elements).is_empty());

    let payload = parse(serde_json::json!({}));
    assert!(payload.elements.is_empty());
}

#[test]
fn test_duplicates_are_preserved_at_discovery() {
    let payload = parse(serde_json::json!({
        "elements": [
            {"tags": {"addr:housenumber": "1", "addr:street": "A St"}},
            {"tags": {"addr:housenumber": "1", "addr:street": "A St"}}
        ]
    }));

    assert_eq!(addresses_from_elements(&san_jose(), &payload.elements).len(), 2);
}

#[tokio::test]
async fn test_unreachable_source_is_upstream_error() {
    let source =
        OverpassSource::new("http://127.0.0.1:9/interpreter", Duration::from_millis(500)).unwrap();

    let err = source.discover(&san_jose()).await.unwrap_err();

    assert_eq!(err.service(), "overpass");
    assert!(matches!(err, crate::upstream::UpstreamError::Unreachable { .. }));
}

#[tokio::test]
async fn test_mock_source_counts_calls() {
    let source = MockAddressSource::with_addresses(["1 A St San Jose CA"]);

    let first = source.discover(&san_jose()).await.unwrap();
    let _ = source.discover(&san_jose()).await.unwrap();

    assert_eq!(first, vec!["1 A St San Jose CA".to_string()]);
    assert_eq!(source.calls(), 2);

    let failing = MockAddressSource::unavailable();
    assert!(failing.discover(&san_jose()).await.is_err());
}
