//! Resource-type registry.
//!
//! # Responsibilities
//! - Map a resource-type name (the `<name>` in
//!   `application/vnd.danger-room.<name>+json`) to a factory
//! - Decode a configuration document into a target and a ready harness
//!
//! # Design Decisions
//! - Built once at startup and shared read-only afterwards, so no locking
//! - Registering a name twice replaces the earlier factory
//! - Tests build their own registries; there is no process-wide instance

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{HeaderHarness, Harness, LimitingHarness, NoopHarness};

/// A decoded configuration document.
#[derive(Debug, Clone)]
pub struct HarnessResource {
    /// Name the document was registered under.
    pub resource_type: String,
    /// Origin URL, not yet parsed.
    pub target: String,
    /// Harness built from the embedded configuration.
    pub harness: Arc<dyn Harness>,
}

/// Wire shape shared by every resource type.
#[derive(Debug, Deserialize)]
struct ResourceDocument<H> {
    target: String,
    #[serde(default)]
    harness: H,
}

type DecodeFn = dyn Fn(&[u8]) -> Result<(String, Arc<dyn Harness>), serde_json::Error> + Send + Sync;

/// Produces harness resources from JSON configuration bodies.
#[derive(Clone)]
pub struct HarnessFactory {
    decode: Arc<DecodeFn>,
}

impl HarnessFactory {
    /// Factory for a harness type that is its own configuration.
    pub fn of<H>() -> Self
    where
        H: Harness + DeserializeOwned + Default + 'static,
    {
        Self::from_fn(|body| {
            let document: ResourceDocument<H> = serde_json::from_slice(body)?;
            Ok((document.target, Arc::new(document.harness) as Arc<dyn Harness>))
        })
    }

    /// Factory backed by an arbitrary decode function.
    pub fn from_fn<F>(decode: F) -> Self
    where
        F: Fn(&[u8]) -> Result<(String, Arc<dyn Harness>), serde_json::Error> + Send + Sync + 'static,
    {
        Self { decode: Arc::new(decode) }
    }

    /// Decode a configuration body registered under `resource_type`.
    pub fn decode(&self, resource_type: &str, body: &[u8]) -> Result<HarnessResource, serde_json::Error> {
        let (target, harness) = (self.decode)(body)?;
        Ok(HarnessResource {
            resource_type: resource_type.to_string(),
            target,
            harness,
        })
    }
}

impl fmt::Debug for HarnessFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarnessFactory").finish_non_exhaustive()
    }
}

/// Name → factory table consulted by the control server.
#[derive(Debug, Clone, Default)]
pub struct HarnessRegistry {
    factories: HashMap<String, HarnessFactory>,
}

impl HarnessRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the harnesses shipped in this crate:
    /// `noop`, `limit` and `headers`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register::<NoopHarness>("noop")
            .register::<LimitingHarness>("limit")
            .register::<HeaderHarness>("headers");
        registry
    }

    /// Register a harness type under `name`.
    pub fn register<H>(&mut self, name: impl Into<String>) -> &mut Self
    where
        H: Harness + DeserializeOwned + Default + 'static,
    {
        self.register_factory(name, HarnessFactory::of::<H>());
        self
    }

    /// Register a factory, returning the one it replaced.
    pub fn register_factory(&mut self, name: impl Into<String>, factory: HarnessFactory) -> Option<HarnessFactory> {
        let name = name.into();
        let previous = self.factories.insert(name.clone(), factory);
        if previous.is_some() {
            tracing::debug!(resource_type = %name, "Replaced harness factory");
        }
        previous
    }

    /// Find the factory registered under `name`.
    pub fn lookup(&self, name: &str) -> Option<&HarnessFactory> {
        self.factories.get(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::{HeaderMap, StatusCode};

    #[test]
    fn test_builtins_registered() {
        let registry = HarnessRegistry::with_builtins();
        assert_eq!(registry.names(), vec!["headers", "limit", "noop"]);
        assert!(registry.lookup("limit").is_some());
        assert!(registry.lookup("missing").is_none());
    }

    #[test]
    fn test_decode_resource() {
        let registry = HarnessRegistry::with_builtins();
        let factory = registry.lookup("limit").unwrap();
        let resource = factory
            .decode("limit", br#"{"target": "http://127.0.0.1:9000/base", "harness": {"response_size_limit": 1}}"#)
            .unwrap();

        assert_eq!(resource.resource_type, "limit");
        assert_eq!(resource.target, "http://127.0.0.1:9000/base");
        assert!(format!("{:?}", resource.harness).contains("response_size_limit: 1"));
    }

    #[test]
    fn test_harness_section_is_optional() {
        let registry = HarnessRegistry::with_builtins();
        let resource = registry
            .lookup("noop")
            .unwrap()
            .decode("noop", br#"{"target": "http://example.com"}"#)
            .unwrap();
        assert_eq!(resource.target, "http://example.com");
    }

    #[test]
    fn test_decode_errors() {
        let registry = HarnessRegistry::with_builtins();
        let factory = registry.lookup("limit").unwrap();

        assert!(factory.decode("limit", b"{not json").is_err());
        assert!(factory.decode("limit", br#"{"harness": {}}"#).is_err());
        assert!(factory
            .decode("limit", br#"{"target": "http://x", "harness": {"response_size_limit": "many"}}"#)
            .is_err());
    }

    #[test]
    fn test_last_registration_wins() {
        #[derive(Debug, Default, serde::Deserialize)]
        struct Teapot {}

        #[async_trait::async_trait]
        impl Harness for Teapot {
            fn write_header(&self, _status: StatusCode, _headers: &mut HeaderMap) -> StatusCode {
                StatusCode::IM_A_TEAPOT
            }

            async fn write_body(
                &self,
                _dst: &mut crate::harness::BodyWriter,
                _src: &mut crate::harness::BodyReader,
            ) -> std::io::Result<crate::harness::BodyTransfer> {
                Ok(crate::harness::BodyTransfer::Declined)
            }
        }

        let mut registry = HarnessRegistry::with_builtins();
        let previous = registry.register_factory("noop", HarnessFactory::of::<Teapot>());
        assert!(previous.is_some());

        let resource = registry
            .lookup("noop")
            .unwrap()
            .decode("noop", br#"{"target": "http://x"}"#)
            .unwrap();
        let status = resource.harness.write_header(StatusCode::OK, &mut HeaderMap::new());
        assert_eq!(status, StatusCode::IM_A_TEAPOT);
    }
}
