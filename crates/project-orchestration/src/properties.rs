//! `application.properties` handling.

use project_store::Project;

/// Name of the properties file every project carries
pub const APPLICATION_PROPERTIES_FILENAME: &str = "application.properties";

const NAME_KEY: &str = "project.name";
const DESCRIPTION_KEY: &str = "project.description";
const RUNTIME_KEY: &str = "project.runtime";

/// Project metadata held in `application.properties`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectProperties {
    /// Display name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Runtime tag, e.g. `quarkus`
    pub runtime: String,
}

/// Split one properties line into key and value
///
/// Comments (`#`, `!`) and blank lines yield `None`. Both `=` and `:` are
/// accepted as separators.
fn split_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_start();
    if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
        return None;
    }
    let at = line.find(['=', ':'])?;
    Some((line[..at].trim(), line[at + 1..].trim()))
}

impl ProjectProperties {
    /// Extract the project keys from properties text; missing keys are empty
    pub fn parse(text: &str) -> Self {
        let mut properties = Self::default();
        for (key, value) in text.lines().filter_map(split_line) {
            match key {
                NAME_KEY => properties.name = value.to_string(),
                DESCRIPTION_KEY => properties.description = value.to_string(),
                RUNTIME_KEY => properties.runtime = value.to_string(),
                _ => {}
            }
        }
        properties
    }

    /// Properties of an existing project
    pub fn from_project(project: &Project) -> Self {
        Self {
            name: project.name.clone(),
            description: project.description.clone(),
            runtime: project.runtime.clone(),
        }
    }

    /// Write the project keys into `template`
    ///
    /// Existing project keys are replaced in place, missing ones are
    /// prepended. Every other line is kept as-is.
    pub fn apply(&self, template: &str) -> String {
        let mut seen = [false; 3];
        let mut lines: Vec<String> = template
            .lines()
            .map(|line| match split_line(line).map(|(key, _)| key) {
                Some(NAME_KEY) => {
                    seen[0] = true;
                    format!("{NAME_KEY}={}", self.name)
                }
                Some(DESCRIPTION_KEY) => {
                    seen[1] = true;
                    format!("{DESCRIPTION_KEY}={}", self.description)
                }
                Some(RUNTIME_KEY) => {
                    seen[2] = true;
                    format!("{RUNTIME_KEY}={}", self.runtime)
                }
                _ => line.to_string(),
            })
            .collect();

        let missing = [
            (seen[0], NAME_KEY, &self.name),
            (seen[1], DESCRIPTION_KEY, &self.description),
            (seen[2], RUNTIME_KEY, &self.runtime),
        ];
        let header: Vec<String> = missing
            .iter()
            .filter(|(seen, _, _)| !seen)
            .map(|(_, key, value)| format!("{key}={value}"))
            .collect();
        lines.splice(0..0, header);

        let mut text = lines.join("\n");
        text.push('\n');
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_project_keys() {
        let text = "# generated\nproject.name = Orders\nproject.description: Order intake\n\
                    project.runtime=quarkus\ncamel.main.name=orders\n";
        let properties = ProjectProperties::parse(text);

        assert_eq!(properties.name, "Orders");
        assert_eq!(properties.description, "Order intake");
        assert_eq!(properties.runtime, "quarkus");
    }

    #[test]
    fn test_parse_missing_keys_are_empty() {
        let properties = ProjectProperties::parse("! comment only\n\n");
        assert_eq!(properties, ProjectProperties::default());
    }

    #[test]
    fn test_apply_replaces_and_prepends() {
        let project = Project::new("orders", "Orders", "Order intake", "camel-main");
        let rendered = ProjectProperties::from_project(&project)
            .apply("project.name=\ncamel.health.enabled=true\n");

        assert_eq!(
            rendered,
            "project.description=Order intake\nproject.runtime=camel-main\n\
             project.name=Orders\ncamel.health.enabled=true\n"
        );
        assert_eq!(
            ProjectProperties::parse(&rendered),
            ProjectProperties::from_project(&project)
        );
    }
}
