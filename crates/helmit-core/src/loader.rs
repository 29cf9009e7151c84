//! Chart loading from directories, archives and in-memory files

use std::path::Path;

use walkdir::WalkDir;

use crate::archive::read_archive;
use crate::chart::{API_VERSION_V1, Chart, ChartFile, ChartMetadata};
use crate::error::{CoreError, Result};
use crate::lint::lint_chart;
use crate::values::Values;

const CHART_FILE: &str = "Chart.yaml";
const VALUES_FILE: &str = "values.yaml";
const SCHEMA_FILE: &str = "values.schema.json";
const TEMPLATES_PREFIX: &str = "templates/";

/// Load, validate and lint a chart from a directory or archive path
///
/// Filesystem failures surface as [`CoreError::Io`], decoding problems as one of
/// the decode variants, and only a structurally sound chart reaches the lint
/// rules.
pub fn load_chart(path: impl AsRef<Path>) -> Result<Chart> {
    let path = path.as_ref();
    let chart = load(path)?;
    chart.validate()?;
    lint_chart(&chart)?;

    tracing::debug!(path = %path.display(), chart = chart.name(), "chart loaded");
    Ok(chart)
}

/// Decode a chart from a path without validating it
///
/// Directories are walked; anything else is read as a `.tgz` archive.
pub fn load(path: impl AsRef<Path>) -> Result<Chart> {
    let path = path.as_ref();
    let meta = std::fs::metadata(path).map_err(|e| CoreError::io(path, e))?;

    if meta.is_dir() {
        load_dir(path)
    } else {
        let data = std::fs::read(path).map_err(|e| CoreError::io(path, e))?;
        load_archive(&data)
    }
}

/// Decode a chart directory
///
/// Symlinks are followed, so linked files are read like regular ones.
pub fn load_dir(root: impl AsRef<Path>) -> Result<Chart> {
    let root = root.as_ref();
    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let at = e.path().unwrap_or(root).to_path_buf();
            CoreError::io(at, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let data = std::fs::read(entry.path()).map_err(|e| CoreError::io(entry.path(), e))?;
        files.push(ChartFile::new(rel, data));
    }

    tracing::debug!(root = %root.display(), files = files.len(), "read chart directory");
    load_files(files)
}

/// Decode a chart held as `.tgz` bytes
pub fn load_archive(data: &[u8]) -> Result<Chart> {
    load_files(read_archive(data)?)
}

/// Decode a bare `Chart.yaml` descriptor into a chart with no templates
pub fn load_descriptor(data: &[u8]) -> Result<Chart> {
    load_files(vec![ChartFile::new(CHART_FILE, data)])
}

/// Assemble a chart from named files
///
/// Names are relative to the chart root and use `/` separators.
pub fn load_files(files: impl IntoIterator<Item = ChartFile>) -> Result<Chart> {
    let mut chart = Chart {
        values: Values::new(),
        ..Default::default()
    };

    for file in files {
        match file.name.as_str() {
            CHART_FILE => {
                let mut meta: ChartMetadata = serde_yaml::from_slice(&file.data).map_err(|e| {
                    CoreError::Decode {
                        file: file.name.clone(),
                        message: e.to_string(),
                    }
                })?;
                if meta.api_version.is_empty() {
                    meta.api_version = API_VERSION_V1.to_string();
                }
                chart.metadata = Some(meta);
            }
            VALUES_FILE => {
                chart.values = Values::from_file_bytes(&file.name, &file.data)?;
            }
            SCHEMA_FILE => {
                chart.schema = Some(file.data);
            }
            _ => {
                let template = file
                    .name
                    .strip_prefix(TEMPLATES_PREFIX)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string);
                match template {
                    Some(template) => chart.templates.push(ChartFile::new(template, file.data)),
                    None => chart.files.push(file),
                }
            }
        }
    }

    if chart.metadata.is_none() {
        return Err(CoreError::MissingChartFile);
    }

    Ok(chart)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lint::LintError;
    use std::fs;
    use tempfile::TempDir;

    fn write_chart(dir: &Path, chart_yaml: &str, templates: &[(&str, &str)]) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("Chart.yaml"), chart_yaml).unwrap();
        if !templates.is_empty() {
            fs::create_dir_all(dir.join("templates")).unwrap();
        }
        for (name, body) in templates {
            fs::write(dir.join("templates").join(name), body).unwrap();
        }
    }

    #[test]
    fn test_load_chart_directory() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("mychart");
        write_chart(
            &root,
            "apiVersion: v2\nname: mychart\nversion: 1.0.0\n",
            &[("mytemplate.yaml", "content")],
        );

        let chart = load_chart(&root).unwrap();
        let meta = chart.metadata.as_ref().unwrap();
        assert_eq!(meta.name, "mychart");
        assert_eq!(meta.version, "1.0.0");
        assert_eq!(chart.templates.len(), 1);
        assert_eq!(chart.templates[0].name, "mytemplate.yaml");
        assert_eq!(chart.templates[0].data, b"content");
    }

    #[test]
    fn test_load_dir_sorts_and_classifies() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write_chart(
            root,
            "name: web\nversion: 0.1.0\ndescription: demo\n",
            &[("service.yaml", "kind: Service"), ("_helpers.tpl", "")],
        );
        fs::write(root.join("values.yaml"), "replicas: 2\n").unwrap();
        fs::write(root.join("values.schema.json"), "{}").unwrap();
        fs::write(root.join("README.md"), "# web").unwrap();
        fs::create_dir_all(root.join("templates/tests")).unwrap();
        fs::write(root.join("templates/tests/conn.yaml"), "kind: Pod").unwrap();

        let chart = load_dir(root).unwrap();
        let names: Vec<_> = chart.templates.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["_helpers.tpl", "service.yaml", "tests/conn.yaml"]);
        assert_eq!(chart.values.get("replicas"), Some(&serde_json::json!(2)));
        assert_eq!(chart.schema.as_deref(), Some(&b"{}"[..]));
        assert_eq!(chart.files.len(), 1);
        assert_eq!(chart.files[0].name, "README.md");
        // apiVersion defaults when omitted
        assert_eq!(chart.metadata.unwrap().api_version, "v1");
    }

    #[cfg(unix)]
    #[test]
    fn test_load_dir_follows_symlinks() {
        let temp = TempDir::new().unwrap();
        let shared = temp.path().join("shared");
        fs::create_dir_all(&shared).unwrap();
        fs::write(shared.join("cm.yaml"), "kind: ConfigMap").unwrap();

        let root = temp.path().join("linked");
        write_chart(&root, "name: linked\nversion: 1.0.0\n", &[]);
        fs::create_dir_all(root.join("templates")).unwrap();
        std::os::unix::fs::symlink(shared.join("cm.yaml"), root.join("templates/cm.yaml")).unwrap();

        let chart = load_chart(&root).unwrap();
        assert_eq!(chart.templates.len(), 1);
        assert_eq!(chart.templates[0].name, "cm.yaml");
        assert_eq!(chart.templates[0].data, b"kind: ConfigMap");
    }

    #[test]
    fn test_missing_path_is_io_error() {
        let err = load_chart("non-existent-chart").unwrap_err();
        assert!(err.is_io());
        assert!(!err.is_decode());
        assert!(err.to_string().to_lowercase().contains("no such file or directory"));
    }

    #[test]
    fn test_garbage_file_is_decode_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("chart.tgz");
        fs::write(&path, b"\x00\x01garbage").unwrap();

        let err = load_chart(&path).unwrap_err();
        assert!(err.is_decode());
        assert!(!matches!(err, CoreError::Lint(_)));
    }

    #[test]
    fn test_empty_directory() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("empty/sub")).unwrap();

        let err = load_chart(temp.path().join("empty")).unwrap_err();
        assert!(matches!(err, CoreError::MissingChartFile));
        assert_eq!(err.to_string(), "Chart.yaml file is missing");
    }

    #[test]
    fn test_no_templates_is_lint_error() {
        let temp = TempDir::new().unwrap();
        write_chart(temp.path(), "name: web\nversion: 1.0.0\n", &[]);

        let err = load_chart(temp.path()).unwrap_err();
        assert!(matches!(err, CoreError::Lint(LintError::NoTemplates)));
        assert_eq!(err.to_string(), "chart has no templates");
    }

    #[test]
    fn test_validate_runs_before_lint() {
        let temp = TempDir::new().unwrap();
        write_chart(temp.path(), "name: web\n", &[]);

        let err = load_chart(temp.path()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidChart { .. }));
    }

    #[test]
    fn test_malformed_chart_yaml() {
        let err = load_descriptor(b"name: [oops").unwrap_err();
        assert!(err.to_string().starts_with("cannot load Chart.yaml"));
    }

    #[test]
    fn test_load_descriptor() {
        let chart = load_descriptor(b"name: solo\nversion: 2.0.0\n").unwrap();
        assert_eq!(chart.name(), "solo");
        assert!(chart.templates.is_empty());
    }

    #[test]
    fn test_load_archive_file() {
        use flate2::Compression;
        use flate2::write::GzEncoder;

        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, body) in [
            ("mychart/Chart.yaml", "name: mychart\nversion: 1.0.0\n"),
            ("mychart/templates/cm.yaml", "kind: ConfigMap"),
        ] {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, body.as_bytes()).unwrap();
        }
        let bytes = builder.into_inner().unwrap().finish().unwrap();

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("mychart-1.0.0.tgz");
        fs::write(&path, bytes).unwrap();

        let chart = load_chart(&path).unwrap();
        assert_eq!(chart.name(), "mychart");
        assert_eq!(chart.templates[0].name, "cm.yaml");
    }
}
