//! Request rewriting and header handling on the way to the origin.

mod common;

use serde_json::json;

use common::{client, configure, start_echo_origin, start_origin_with_headers, start_server, unreachable_addr};

/// Header names (lowercased) and values of an echoed request head.
fn echoed_headers(echo: &str) -> Vec<(String, String)> {
    echo.split("\r\n\r\n")
        .next()
        .unwrap()
        .lines()
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_string()))
        .collect()
}

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
}

#[tokio::test]
async fn test_path_and_query_rewrite() {
    let origin = start_echo_origin().await;
    let (server, _shutdown) = start_server().await;
    let client = client();

    configure(&client, server, "/~danger/api", "noop", json!({ "target": format!("http://{}/base?key=1", origin) })).await;

    let echo = client
        .get(format!("http://{}/api/items/7?q=2", server))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(echo.starts_with("GET /base/items/7?key=1&q=2 HTTP/1.1\r\n"), "{}", echo);

    let headers = echoed_headers(&echo);
    assert_eq!(header(&headers, "host"), Some(origin.to_string().as_str()));
}

#[tokio::test]
async fn test_mount_root_maps_to_target_path() {
    let origin = start_echo_origin().await;
    let (server, _shutdown) = start_server().await;
    let client = client();

    configure(&client, server, "/~danger/", "noop", json!({ "target": format!("http://{}/base/", origin) })).await;

    let echo = client.get(format!("http://{}/proxy", server)).send().await.unwrap().text().await.unwrap();
    assert!(echo.starts_with("GET /base/ HTTP/1.1\r\n"), "{}", echo);
}

#[tokio::test]
async fn test_hop_headers_stripped_and_forwarded_for_appended() {
    let origin = start_echo_origin().await;
    let (server, _shutdown) = start_server().await;
    let client = client();

    configure(&client, server, "/~danger/", "noop", json!({ "target": format!("http://{}/", origin) })).await;

    let res = client
        .get(format!("http://{}/proxy/hop", server))
        .header("proxy-authorization", "Basic c2VjcmV0")
        .header("proxy-authenticate", "Basic")
        .header("keep-alive", "timeout=5")
        .header("trailers", "x-checksum")
        .header("te", "trailers")
        .header("x-forwarded-for", "10.0.0.1")
        .header("x-kept", "yes")
        .send()
        .await
        .unwrap();
    let request_id = res.headers()["x-request-id"].to_str().unwrap().to_string();
    let echo = res.text().await.unwrap();
    let headers = echoed_headers(&echo);

    for hop in ["proxy-authorization", "proxy-authenticate", "keep-alive", "trailers", "te", "upgrade"] {
        assert_eq!(header(&headers, hop), None, "{} forwarded", hop);
    }
    assert_eq!(header(&headers, "x-kept"), Some("yes"));
    assert_eq!(header(&headers, "x-forwarded-for"), Some("10.0.0.1, 127.0.0.1"));
    assert_eq!(header(&headers, "x-request-id"), Some(request_id.as_str()));
}

#[tokio::test]
async fn test_response_hop_headers_stripped() {
    let origin = start_origin_with_headers(
        &[
            ("Keep-Alive", "timeout=5"),
            ("Upgrade", "h2c"),
            ("Trailers", "x-checksum"),
            ("X-Kept", "yes"),
        ],
        "origin",
    )
    .await;
    let (server, _shutdown) = start_server().await;
    let client = client();

    configure(&client, server, "/~danger/", "noop", json!({ "target": format!("http://{}/", origin) })).await;

    let res = client.get(format!("http://{}/proxy", server)).send().await.unwrap();
    assert_eq!(res.status(), 200);
    for hop in ["keep-alive", "upgrade", "trailers"] {
        assert!(res.headers().get(hop).is_none(), "{} returned to client", hop);
    }
    assert_eq!(res.headers()["x-kept"], "yes");
    assert_eq!(res.text().await.unwrap(), "origin");
}

#[tokio::test]
async fn test_request_body_streamed_to_origin() {
    let origin = start_echo_origin().await;
    let (server, _shutdown) = start_server().await;
    let client = client();

    configure(&client, server, "/~danger/", "noop", json!({ "target": format!("http://{}/", origin) })).await;

    let echo = client
        .post(format!("http://{}/proxy/upload", server))
        .body("payload")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(echo.starts_with("POST /upload HTTP/1.1\r\n"), "{}", echo);
    assert!(echo.ends_with("\r\n\r\npayload"), "{}", echo);
}

#[tokio::test]
async fn test_unreachable_origin_is_500() {
    let dead = unreachable_addr().await;
    let (server, _shutdown) = start_server().await;
    let client = client();

    configure(&client, server, "/~danger/", "noop", json!({ "target": format!("http://{}/", dead) })).await;

    let res = client.get(format!("http://{}/proxy", server)).send().await.unwrap();
    assert_eq!(res.status(), 500);
    let body = res.text().await.unwrap();
    assert!(body.starts_with("proxy error:"), "{}", body);
    assert!(body.ends_with('\n'));
}
