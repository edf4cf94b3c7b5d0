//! Image registry coordinates for builds.

use crate::config::RegistrySettings;

/// Supplies the registry part of a build environment
pub trait RegistryInfo: Send + Sync {
    /// Ordered `KEY=VALUE` entries
    fn env_for_build(&self) -> Vec<String>;
}

/// Registry coordinates taken from configuration
#[derive(Debug, Clone, Default)]
pub struct ConfiguredRegistry {
    settings: RegistrySettings,
}

impl ConfiguredRegistry {
    /// Wrap registry settings
    pub fn new(settings: RegistrySettings) -> Self {
        Self { settings }
    }
}

impl RegistryInfo for ConfiguredRegistry {
    fn env_for_build(&self) -> Vec<String> {
        let RegistrySettings {
            url,
            group,
            username,
            password,
        } = &self.settings;

        let mut env = vec![
            format!("IMAGE_REGISTRY={url}"),
            format!("IMAGE_GROUP={group}"),
        ];
        // Anonymous registries get no credential entries
        if !username.is_empty() {
            env.push(format!("IMAGE_REGISTRY_USERNAME={username}"));
            env.push(format!("IMAGE_REGISTRY_PASSWORD={password}"));
        }
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_for_build() {
        let anonymous = ConfiguredRegistry::new(RegistrySettings {
            url: "registry:5000".to_string(),
            group: "projects".to_string(),
            ..Default::default()
        });
        assert_eq!(
            anonymous.env_for_build(),
            vec!["IMAGE_REGISTRY=registry:5000", "IMAGE_GROUP=projects"]
        );

        let authenticated = ConfiguredRegistry::new(RegistrySettings {
            url: "ghcr.io".to_string(),
            group: "acme".to_string(),
            username: "bot".to_string(),
            password: "pw".to_string(),
        });
        assert_eq!(authenticated.env_for_build().len(), 4);
        assert_eq!(
            authenticated.env_for_build()[3],
            "IMAGE_REGISTRY_PASSWORD=pw"
        );
    }
}
