//! Static template and service files.

use crate::descriptor::{ComposeCodec, DescriptorCodec};
use crate::properties::{APPLICATION_PROPERTIES_FILENAME, ProjectProperties};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::StreamExt;
use project_store::Project;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Source of template, service and build-script text
#[async_trait]
pub trait TemplateProvider: Send + Sync {
    /// Build script for a runtime, `None` if there is none
    async fn builder_script(&self, runtime: &str) -> Result<Option<String>>;

    /// Files seeded into the `templates` project
    async fn template_files(&self) -> Result<BTreeMap<String, String>>;

    /// Files seeded into the `services` project
    async fn service_files(&self) -> Result<BTreeMap<String, String>>;

    /// Initial `application.properties` for a project
    async fn application_properties(&self, project: &Project) -> Result<String>;

    /// Initial runtime descriptor for a project
    async fn project_compose(&self, project: &Project) -> Result<String>;
}

/// File name of the build script for a runtime
pub(crate) fn builder_script_name(runtime: &str) -> String {
    format!("{runtime}-builder-script-docker.sh")
}

const PROJECT_COMPOSE_TEMPLATE: &str = include_str!("../templates/docker-compose.yaml");

const TEMPLATES: &[(&str, &str)] = &[
    (
        APPLICATION_PROPERTIES_FILENAME,
        include_str!("../templates/application.properties"),
    ),
    (
        "camel-main-builder-script-docker.sh",
        include_str!("../templates/camel-main-builder-script-docker.sh"),
    ),
    (
        "quarkus-builder-script-docker.sh",
        include_str!("../templates/quarkus-builder-script-docker.sh"),
    ),
    (
        "spring-boot-builder-script-docker.sh",
        include_str!("../templates/spring-boot-builder-script-docker.sh"),
    ),
];

const SERVICES: &[(&str, &str)] = &[(
    "devservices.docker-compose.yaml",
    include_str!("../templates/devservices.docker-compose.yaml"),
)];

/// Templates compiled into the binary
///
/// An optional override directory may shadow any compiled-in file by name
/// and add new ones. Files under `<dir>/services/` override service files.
#[derive(Debug, Clone, Default)]
pub struct BuiltinTemplates {
    override_dir: Option<PathBuf>,
}

impl BuiltinTemplates {
    /// Compiled-in templates only
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiled-in templates shadowed by files in `dir`
    pub fn with_override_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            override_dir: Some(dir.into()),
        }
    }

    async fn collect(
        &self,
        builtin: &[(&str, &str)],
        subdir: Option<&str>,
    ) -> Result<BTreeMap<String, String>> {
        let mut files: BTreeMap<String, String> = builtin
            .iter()
            .map(|(name, code)| (name.to_string(), code.to_string()))
            .collect();

        let Some(dir) = &self.override_dir else {
            return Ok(files);
        };
        let dir = match subdir {
            Some(subdir) => dir.join(subdir),
            None => dir.clone(),
        };
        if !dir.is_dir() {
            return Ok(files);
        }

        let mut entries = async_fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next().await {
            let entry = entry?;
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                warn!("Skipping template with non UTF-8 name in {:?}", dir);
                continue;
            };
            debug!("Template {} overridden from {:?}", name, dir);
            files.insert(name, async_fs::read_to_string(entry.path()).await?);
        }
        Ok(files)
    }
}

#[async_trait]
impl TemplateProvider for BuiltinTemplates {
    async fn builder_script(&self, runtime: &str) -> Result<Option<String>> {
        let name = builder_script_name(runtime);
        Ok(self.template_files().await?.remove(&name))
    }

    async fn template_files(&self) -> Result<BTreeMap<String, String>> {
        self.collect(TEMPLATES, None).await
    }

    async fn service_files(&self) -> Result<BTreeMap<String, String>> {
        self.collect(SERVICES, Some("services")).await
    }

    async fn application_properties(&self, project: &Project) -> Result<String> {
        let template = self
            .template_files()
            .await?
            .remove(APPLICATION_PROPERTIES_FILENAME)
            .ok_or_else(|| Error::TemplateNotFound(APPLICATION_PROPERTIES_FILENAME.to_string()))?;
        Ok(ProjectProperties::from_project(project).apply(&template))
    }

    async fn project_compose(&self, project: &Project) -> Result<String> {
        let text = PROJECT_COMPOSE_TEMPLATE.replace("{{PROJECT_ID}}", &project.id);
        // Validate the substituted template before handing it out
        ComposeCodec.decode(&text, &project.id)?;
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[smol_potat::test]
    async fn test_builtin_builder_scripts() {
        let templates = BuiltinTemplates::new();

        for runtime in ["camel-main", "quarkus", "spring-boot"] {
            let script = templates.builder_script(runtime).await.unwrap();
            assert!(script.unwrap().starts_with("#!/usr/bin/env bash"));
        }
        assert!(templates.builder_script("micronaut").await.unwrap().is_none());
    }

    #[smol_potat::test]
    async fn test_project_compose_names_the_project() {
        let project = Project::new("orders", "Orders", "", "quarkus");
        let text = BuiltinTemplates::new().project_compose(&project).await.unwrap();

        let descriptor = ComposeCodec.decode(&text, "orders").unwrap();
        assert_eq!(descriptor.service_name, "orders");
        assert_eq!(descriptor.image, "orders");
        assert_eq!(descriptor.host_port_for(8080), Some(8080));
    }

    #[smol_potat::test]
    async fn test_application_properties_carry_project_keys() {
        let project = Project::new("orders", "Orders", "Order intake", "quarkus");
        let text = BuiltinTemplates::new()
            .application_properties(&project)
            .await
            .unwrap();

        assert_eq!(
            ProjectProperties::parse(&text),
            ProjectProperties::from_project(&project)
        );
        assert!(text.contains("camel.health.enabled=true"));
    }

    #[smol_potat::test]
    async fn test_override_dir_shadows_and_adds() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("quarkus-builder-script-docker.sh"),
            "echo custom\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("extra.txt"), "extra").unwrap();
        std::fs::create_dir(dir.path().join("services")).unwrap();
        std::fs::write(dir.path().join("services").join("redis.yaml"), "r").unwrap();

        let templates = BuiltinTemplates::with_override_dir(dir.path());

        assert_eq!(
            templates.builder_script("quarkus").await.unwrap().as_deref(),
            Some("echo custom\n")
        );
        let files = templates.template_files().await.unwrap();
        assert_eq!(files.get("extra.txt").map(String::as_str), Some("extra"));
        assert!(!files.contains_key("services"));

        let services = templates.service_files().await.unwrap();
        assert!(services.contains_key("redis.yaml"));
        assert!(services.contains_key("devservices.docker-compose.yaml"));
    }
}
