//! Header manipulation.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Append the caller to X-Forwarded-For

use hyper::header::{self, HeaderMap, HeaderName, HeaderValue};
use std::net::IpAddr;

pub static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Headers meaningful only to a single connection. Never forwarded.
pub static HOP_HEADERS: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    HeaderName::from_static("trailers"),
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove every value of every hop-by-hop header.
pub fn remove_hop_headers(headers: &mut HeaderMap) {
    for name in HOP_HEADERS.iter() {
        headers.remove(name);
    }
}

/// Append `client` to X-Forwarded-For, folding prior values into one header.
pub fn append_forwarded_for(headers: &mut HeaderMap, client: IpAddr) {
    let mut chain: Vec<String> = headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect();
    chain.push(client.to_string());

    match HeaderValue::from_str(&chain.join(", ")) {
        Ok(value) => {
            headers.insert(X_FORWARDED_FOR.clone(), value);
        }
        Err(e) => tracing::warn!(error = %e, "Dropping unrepresentable X-Forwarded-For"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_all_hop_headers() {
        let mut headers = HeaderMap::new();
        for name in HOP_HEADERS.iter() {
            headers.append(name.clone(), HeaderValue::from_static("a"));
            headers.append(name.clone(), HeaderValue::from_static("b"));
        }
        headers.insert("x-kept", HeaderValue::from_static("yes"));

        remove_hop_headers(&mut headers);

        for name in HOP_HEADERS.iter() {
            assert!(headers.get(name).is_none(), "{} survived", name);
        }
        assert_eq!(headers.get("x-kept").unwrap(), "yes");
    }

    #[test]
    fn test_static_names_are_canonical() {
        let names: Vec<&str> = HOP_HEADERS.iter().map(HeaderName::as_str).collect();
        assert_eq!(
            names,
            vec![
                "connection",
                "keep-alive",
                "proxy-authenticate",
                "proxy-authorization",
                "te",
                "trailers",
                "transfer-encoding",
                "upgrade"
            ]
        );
    }

    #[test]
    fn test_forwarded_for_fresh() {
        let mut headers = HeaderMap::new();
        append_forwarded_for(&mut headers, "10.0.0.1".parse().unwrap());
        assert_eq!(headers.get(&X_FORWARDED_FOR).unwrap(), "10.0.0.1");
    }

    #[test]
    fn test_forwarded_for_appends_and_folds() {
        let mut headers = HeaderMap::new();
        headers.append(&X_FORWARDED_FOR, HeaderValue::from_static("1.1.1.1"));
        headers.append(&X_FORWARDED_FOR, HeaderValue::from_static("2.2.2.2, 3.3.3.3"));

        append_forwarded_for(&mut headers, "::1".parse().unwrap());

        let values: Vec<_> = headers.get_all(&X_FORWARDED_FOR).iter().collect();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0], "1.1.1.1, 2.2.2.2, 3.3.3.3, ::1");
    }
}
