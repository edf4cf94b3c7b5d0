//! Runtime descriptor codec.
//!
//! A project's runtime descriptor is a compose-style YAML document. This
//! module decodes the service describing the project into a
//! [`RuntimeDescriptor`] and encodes it back. Keys the orchestrator does not
//! understand are kept as-is so a decode/modify/encode cycle only touches the
//! fields that were changed.

use crate::{Error, Result};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

/// Decoded compose service for a project
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeDescriptor {
    /// Key of the service inside `services`
    pub service_name: String,
    /// Container name, defaults to the service name
    pub container_name: String,
    /// Image the service runs
    pub image: String,
    /// Host port to container port
    pub ports_map: BTreeMap<u16, u16>,
    /// Full source document, re-used as the base when encoding
    document: Mapping,
}

impl RuntimeDescriptor {
    /// Host port mapped to the given container port
    pub fn host_port_for(&self, container_port: u16) -> Option<u16> {
        self.ports_map
            .iter()
            .find(|(_, target)| **target == container_port)
            .map(|(host, _)| *host)
    }
}

/// Converts runtime descriptor text to and from [`RuntimeDescriptor`]
pub trait DescriptorCodec: Send + Sync {
    /// Decode the service for `project_id` from descriptor text
    fn decode(&self, text: &str, project_id: &str) -> Result<RuntimeDescriptor>;

    /// Encode a descriptor back to text
    fn encode(&self, descriptor: &RuntimeDescriptor) -> Result<String>;
}

/// Compose YAML codec
#[derive(Debug, Clone, Copy, Default)]
pub struct ComposeCodec;

fn key(name: &str) -> Value {
    Value::String(name.to_string())
}

/// Parse one compose port entry into `(host, container)`
///
/// Accepted forms: `8080`, `"8080"`, `"8081:8080"`, `"127.0.0.1:8081:8080"`,
/// each optionally suffixed with `/tcp` or `/udp`.
fn parse_port(entry: &Value) -> Option<(u16, u16)> {
    let text = match entry {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => return None,
    };
    let text = text.split('/').next()?;
    let parts: Vec<&str> = text.split(':').collect();

    let container = parts.last()?.trim().parse().ok()?;
    let host = match parts.len() {
        1 => container,
        n => parts[n - 2].trim().parse().ok()?,
    };
    Some((host, container))
}

impl DescriptorCodec for ComposeCodec {
    fn decode(&self, text: &str, project_id: &str) -> Result<RuntimeDescriptor> {
        let document: Mapping = serde_yaml::from_str(text)
            .map_err(|e| Error::Descriptor(format!("invalid descriptor of {project_id}: {e}")))?;

        let services = document
            .get(key("services"))
            .and_then(Value::as_mapping)
            .ok_or_else(|| {
                Error::Descriptor(format!("descriptor of {project_id} has no services"))
            })?;

        // Prefer the service named after the project, fall back to the first one
        let (service_name, service) = services
            .get(key(project_id))
            .map(|service| (project_id.to_string(), service))
            .or_else(|| {
                services
                    .iter()
                    .next()
                    .and_then(|(k, v)| k.as_str().map(|k| (k.to_string(), v)))
            })
            .ok_or_else(|| {
                Error::Descriptor(format!("descriptor of {project_id} declares no service"))
            })?;

        let field = |name: &str| {
            service
                .get(key(name))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        let ports_map = service
            .get(key("ports"))
            .and_then(Value::as_sequence)
            .map(|ports| ports.iter().filter_map(parse_port).collect())
            .unwrap_or_default();

        Ok(RuntimeDescriptor {
            container_name: field("container_name").unwrap_or_else(|| service_name.clone()),
            image: field("image").unwrap_or_else(|| project_id.to_string()),
            ports_map,
            service_name,
            document,
        })
    }

    fn encode(&self, descriptor: &RuntimeDescriptor) -> Result<String> {
        let mut document = descriptor.document.clone();

        let mut services = document
            .get(key("services"))
            .and_then(Value::as_mapping)
            .cloned()
            .unwrap_or_default();
        let mut service = services
            .get(key(&descriptor.service_name))
            .and_then(Value::as_mapping)
            .cloned()
            .unwrap_or_default();

        service.insert(key("container_name"), key(&descriptor.container_name));
        service.insert(key("image"), key(&descriptor.image));
        if !descriptor.ports_map.is_empty() || service.contains_key(key("ports")) {
            let ports = descriptor
                .ports_map
                .iter()
                .map(|(host, container)| Value::String(format!("{host}:{container}")))
                .collect();
            service.insert(key("ports"), Value::Sequence(ports));
        }

        services.insert(key(&descriptor.service_name), Value::Mapping(service));
        document.insert(key("services"), Value::Mapping(services));

        Ok(serde_yaml::to_string(&document)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPOSE: &str = r#"
services:
  orders:
    container_name: orders
    image: registry:5000/projects/orders:2024-01-01T10-00-00
    restart: always
    ports:
      - "8081:8080"
      - 9000
    environment:
      MODE: dev
networks:
  default:
    name: projects
"#;

    #[test]
    fn test_decode_compose_service() {
        let descriptor = ComposeCodec.decode(COMPOSE, "orders").unwrap();

        assert_eq!(descriptor.service_name, "orders");
        assert_eq!(descriptor.container_name, "orders");
        assert_eq!(
            descriptor.image,
            "registry:5000/projects/orders:2024-01-01T10-00-00"
        );
        assert_eq!(descriptor.ports_map.get(&8081), Some(&8080));
        assert_eq!(descriptor.ports_map.get(&9000), Some(&9000));
        assert_eq!(descriptor.host_port_for(8080), Some(8081));
        assert_eq!(descriptor.host_port_for(7000), None);
    }

    #[test]
    fn test_set_image_keeps_unknown_keys() {
        let mut descriptor = ComposeCodec.decode(COMPOSE, "orders").unwrap();
        descriptor.image = "registry:5000/projects/orders:next".to_string();

        let text = ComposeCodec.encode(&descriptor).unwrap();
        let value: Value = serde_yaml::from_str(&text).unwrap();

        let service = &value["services"]["orders"];
        assert_eq!(service["image"], "registry:5000/projects/orders:next");
        assert_eq!(service["restart"], "always");
        assert_eq!(service["environment"]["MODE"], "dev");
        assert_eq!(value["networks"]["default"]["name"], "projects");

        let again = ComposeCodec.decode(&text, "orders").unwrap();
        assert_eq!(again.ports_map, descriptor.ports_map);
    }

    #[test]
    fn test_decode_falls_back_to_first_service() {
        let text = "services:\n  app:\n    image: nginx\n";
        let descriptor = ComposeCodec.decode(text, "orders").unwrap();
        assert_eq!(descriptor.service_name, "app");
        assert_eq!(descriptor.image, "nginx");
    }

    #[test]
    fn test_decode_defaults_image_to_project_id() {
        let text = "services:\n  orders:\n    ports: ['127.0.0.1:8082:8080/tcp']\n";
        let descriptor = ComposeCodec.decode(text, "orders").unwrap();
        assert_eq!(descriptor.image, "orders");
        assert_eq!(descriptor.host_port_for(8080), Some(8082));
    }

    #[test]
    fn test_decode_rejects_document_without_services() {
        assert!(matches!(
            ComposeCodec.decode("version: '3'\n", "orders"),
            Err(Error::Descriptor(_))
        ));
        assert!(ComposeCodec.decode(": not yaml :", "orders").is_err());
    }
}
