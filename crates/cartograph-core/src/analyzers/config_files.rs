//! Configuration-file analysis: flattened settings and dependency
//! manifests.
//!
//! Settings become `ConfigSetting` nodes keyed `path.key` and hang off
//! their File node. Manifests additionally contribute the dependency
//! table the resolver consults when classifying external imports.

use std::collections::BTreeMap;

use crate::graph::{NodeLabel, NodeRef, NodeRow, RelRow, RelType};

/// Formats the analyzer understands, decided by basename/extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
    Ini,
    Properties,
    Dockerfile,
    Makefile,
}

impl ConfigFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Toml => "toml",
            Self::Json => "json",
            Self::Ini => "ini",
            Self::Properties => "properties",
            Self::Dockerfile => "dockerfile",
            Self::Makefile => "makefile",
        }
    }

    /// Classify a file by basename, then extension.
    pub fn detect(relative_path: &str) -> Option<Self> {
        let basename = relative_path.rsplit('/').next().unwrap_or(relative_path);
        match basename {
            "Dockerfile" => return Some(Self::Dockerfile),
            "Makefile" | "makefile" | "GNUmakefile" => return Some(Self::Makefile),
            "Kconfig" => return Some(Self::Ini),
            _ => {}
        }
        match basename.rsplit_once('.').map(|(_, ext)| ext) {
            Some("toml") => Some(Self::Toml),
            Some("json") => Some(Self::Json),
            Some("ini" | "cfg" | "conf") => Some(Self::Ini),
            Some("properties" | "env") => Some(Self::Properties),
            _ => None,
        }
    }
}

/// Emission for one config file.
#[derive(Default)]
pub struct ConfigEmission {
    pub nodes: Vec<NodeRow>,
    pub edges: Vec<RelRow>,
}

/// Flatten a config file into `ConfigSetting` nodes.
pub fn analyze_config_file(relative_path: &str, content: &str) -> ConfigEmission {
    let Some(format) = ConfigFormat::detect(relative_path) else {
        return ConfigEmission::default();
    };

    let mut settings: Vec<(String, String)> = Vec::new();
    match format {
        ConfigFormat::Toml => {
            if let Ok(value) = content.parse::<toml::Value>() {
                flatten_toml(&value, "", &mut settings);
            }
        }
        ConfigFormat::Json => {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(content) {
                flatten_json(&value, "", &mut settings);
            }
        }
        ConfigFormat::Ini | ConfigFormat::Properties => flatten_ini(content, &mut settings),
        ConfigFormat::Dockerfile => flatten_dockerfile(content, &mut settings),
        ConfigFormat::Makefile => flatten_makefile(content, &mut settings),
    }

    let mut emission = ConfigEmission::default();
    let file_ref = NodeRef::new(NodeLabel::File, relative_path.to_string());
    for (key, value) in settings {
        let qn = format!("{relative_path}.{key}");
        emission.nodes.push(
            NodeRow::new(NodeLabel::ConfigSetting, qn.clone())
                .prop("key", key)
                .prop("value", truncate(&value, 500))
                .prop("format", format.as_str()),
        );
        emission.edges.push(RelRow::new(
            file_ref.clone(),
            RelType::Defines,
            NodeRef::new(NodeLabel::ConfigSetting, qn),
        ));
    }
    emission
}

fn flatten_toml(value: &toml::Value, prefix: &str, out: &mut Vec<(String, String)>) {
    match value {
        toml::Value::Table(table) => {
            for (key, inner) in table {
                let path = join_key(prefix, key);
                flatten_toml(inner, &path, out);
            }
        }
        toml::Value::Array(items) => {
            out.push((prefix.to_string(), format!("[{} items]", items.len())));
        }
        other => {
            if !prefix.is_empty() {
                out.push((prefix.to_string(), scalar_to_string(other)));
            }
        }
    }
}

fn scalar_to_string(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn flatten_json(value: &serde_json::Value, prefix: &str, out: &mut Vec<(String, String)>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, inner) in map {
                let path = join_key(prefix, key);
                flatten_json(inner, &path, out);
            }
        }
        serde_json::Value::Array(items) => {
            out.push((prefix.to_string(), format!("[{} items]", items.len())));
        }
        serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
        other => {
            if !prefix.is_empty() {
                out.push((prefix.to_string(), other.to_string()));
            }
        }
    }
}

fn flatten_ini(content: &str, out: &mut Vec<(String, String)>) {
    let mut section = String::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(['#', ';']) {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section = name.trim().to_string();
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = join_key(&section, key.trim());
            out.push((key, value.trim().to_string()));
        }
    }
}

fn flatten_dockerfile(content: &str, out: &mut Vec<(String, String)>) {
    for line in content.lines() {
        let line = line.trim();
        for directive in ["ENV ", "ARG ", "LABEL "] {
            if let Some(rest) = line.strip_prefix(directive) {
                let rest = rest.trim();
                if let Some((key, value)) = rest.split_once('=').or_else(|| rest.split_once(' ')) {
                    out.push((
                        format!("{}.{}", directive.trim().to_lowercase(), key.trim()),
                        value.trim().trim_matches('"').to_string(),
                    ));
                }
            }
        }
        if let Some(image) = line.strip_prefix("FROM ") {
            out.push(("from".to_string(), image.trim().to_string()));
        }
    }
}

fn flatten_makefile(content: &str, out: &mut Vec<(String, String)>) {
    for line in content.lines() {
        let line = line.trim_end();
        if line.starts_with('\t') || line.starts_with('#') {
            continue;
        }
        // variable assignments only; rules have a colon before any '='
        if let Some((key, value)) = line.split_once(":=").or_else(|| line.split_once('=')) {
            if key.contains(':') || key.contains(' ') && key.trim().contains(' ') {
                continue;
            }
            let key = key.trim().trim_end_matches(['?', '+']).trim();
            if !key.is_empty() && key.chars().all(|c| c.is_alphanumeric() || c == '_') {
                out.push((key.to_string(), value.trim().to_string()));
            }
        }
    }
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn truncate(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

// =============================================================================
// DEPENDENCY MANIFESTS
// =============================================================================

/// Manifest basenames worth parsing for dependency tables.
pub const MANIFEST_BASENAMES: &[&str] =
    &["pyproject.toml", "package.json", "Cargo.toml", "go.mod", "requirements.txt"];

/// Extract declared dependencies (name -> version spec) from a manifest.
pub fn parse_manifest(relative_path: &str, content: &str) -> BTreeMap<String, String> {
    let basename = relative_path.rsplit('/').next().unwrap_or(relative_path);
    match basename {
        "pyproject.toml" => parse_pyproject(content),
        "package.json" => parse_package_json(content),
        "Cargo.toml" => parse_cargo_toml(content),
        "go.mod" => parse_go_mod(content),
        "requirements.txt" => parse_requirements(content),
        _ => BTreeMap::new(),
    }
}

fn parse_pyproject(content: &str) -> BTreeMap<String, String> {
    let mut deps = BTreeMap::new();
    let Ok(value) = content.parse::<toml::Value>() else {
        return deps;
    };

    // PEP 621 list form
    if let Some(list) = value
        .get("project")
        .and_then(|p| p.get("dependencies"))
        .and_then(|d| d.as_array())
    {
        for dep in list.iter().filter_map(|d| d.as_str()) {
            let name: String = dep
                .chars()
                .take_while(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
                .collect();
            if !name.is_empty() {
                deps.insert(name, dep.to_string());
            }
        }
    }
    // poetry table form
    if let Some(table) = value
        .get("tool")
        .and_then(|t| t.get("poetry"))
        .and_then(|p| p.get("dependencies"))
        .and_then(|d| d.as_table())
    {
        for (name, spec) in table {
            if name.eq_ignore_ascii_case("python") {
                continue;
            }
            deps.insert(name.clone(), scalar_to_string(spec));
        }
    }
    deps
}

fn parse_package_json(content: &str) -> BTreeMap<String, String> {
    let mut deps = BTreeMap::new();
    let Ok(value) = serde_json::from_str::<serde_json::Value>(content) else {
        return deps;
    };
    for section in ["dependencies", "devDependencies"] {
        if let Some(map) = value.get(section).and_then(|d| d.as_object()) {
            for (name, spec) in map {
                deps.insert(name.clone(), spec.as_str().unwrap_or_default().to_string());
            }
        }
    }
    deps
}

fn parse_cargo_toml(content: &str) -> BTreeMap<String, String> {
    let mut deps = BTreeMap::new();
    let Ok(value) = content.parse::<toml::Value>() else {
        return deps;
    };
    for section in ["dependencies", "dev-dependencies", "build-dependencies"] {
        if let Some(table) = value.get(section).and_then(|d| d.as_table()) {
            for (name, spec) in table {
                let version = match spec {
                    toml::Value::String(s) => s.clone(),
                    toml::Value::Table(t) => t
                        .get("version")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    _ => String::new(),
                };
                deps.insert(name.clone(), version);
            }
        }
    }
    deps
}

fn parse_go_mod(content: &str) -> BTreeMap<String, String> {
    let mut deps = BTreeMap::new();
    let mut in_require = false;
    for line in content.lines() {
        let line = line.trim();
        if line.starts_with("require (") {
            in_require = true;
            continue;
        }
        if in_require && line == ")" {
            in_require = false;
            continue;
        }
        if in_require || line.starts_with("require ") {
            let entry = line.strip_prefix("require ").unwrap_or(line);
            let mut parts = entry.split_whitespace();
            if let (Some(module), Some(version)) = (parts.next(), parts.next()) {
                // imports reference the path root
                let root = module.split('/').next().unwrap_or(module);
                deps.insert(module.to_string(), version.to_string());
                deps.entry(root.to_string()).or_insert_with(|| version.to_string());
            }
        }
    }
    deps
}

fn parse_requirements(content: &str) -> BTreeMap<String, String> {
    let mut deps = BTreeMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
            continue;
        }
        let name: String = line
            .chars()
            .take_while(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
            .collect();
        if !name.is_empty() {
            deps.insert(name, line.to_string());
        }
    }
    deps
}

#[cfg(test)]
mod unit {
    use super::*;

    #[test]
    fn toml_settings_flatten_to_dotted_keys() {
        let emission = analyze_config_file("app/config.toml", "[server]\nhost = \"0.0.0.0\"\nport = 8080\n");
        let keys: Vec<&str> = emission
            .nodes
            .iter()
            .filter_map(|n| match n.props.get("key") {
                Some(crate::graph::PropValue::Str(s)) => Some(s.as_str()),
                _ => None,
            })
            .collect();
        assert!(keys.contains(&"server.host"));
        assert!(keys.contains(&"server.port"));
    }

    #[test]
    fn pyproject_dependencies_are_extracted() {
        let deps = parse_manifest(
            "pyproject.toml",
            "[project]\nname = \"x\"\ndependencies = [\"requests>=2.0\", \"loguru\"]\n",
        );
        assert_eq!(deps.get("requests").map(String::as_str), Some("requests>=2.0"));
        assert!(deps.contains_key("loguru"));
    }

    #[test]
    fn package_json_dependencies_are_extracted() {
        let deps = parse_manifest("web/package.json", r#"{"dependencies": {"react": "^18.0.0"}}"#);
        assert_eq!(deps.get("react").map(String::as_str), Some("^18.0.0"));
    }
}
