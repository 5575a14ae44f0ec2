use super::{HEADER_ENTRY, MODEL_DIR, POSTDEPLOY_ENTRY, PREDEPLOY_ENTRY};
use crate::artifact::ArtifactReference;
use crate::error::{DeployError, Result};
use crate::metadata::PackageHeader;
use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    PreDeploy,
    Model,
    PostDeploy,
}

/// One SQL script carried by a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub name: String,
    pub kind: ScriptKind,
    pub sql: String,
}

/// A package decoded fully into memory.
///
/// Owned by the deployment step that loaded it; dropped when that step ends.
#[derive(Debug)]
pub struct LoadedPackage {
    path: PathBuf,
    checksum: String,
    header: PackageHeader,
    predeploy: Option<Script>,
    scripts: Vec<Script>,
    postdeploy: Option<Script>,
}

impl LoadedPackage {
    pub fn from_bytes(path: &Path, data: &[u8]) -> Result<Self> {
        let checksum = compute_checksum(data);

        let decoder = GzDecoder::new(data);
        let mut archive = Archive::new(decoder);

        let mut header: Option<PackageHeader> = None;
        let mut predeploy = None;
        let mut postdeploy = None;
        let mut scripts = Vec::new();
        let mut seen = HashSet::new();

        let entries = archive
            .entries()
            .map_err(|e| DeployError::load(path, format!("Failed to read archive entries: {}", e)))?;

        for entry in entries {
            let mut entry = entry
                .map_err(|e| DeployError::load(path, format!("Failed to read entry: {}", e)))?;

            if !entry.header().entry_type().is_file() {
                continue;
            }

            let entry_path = entry
                .path()
                .map_err(|e| DeployError::load(path, format!("Failed to get entry path: {}", e)))?
                .to_string_lossy()
                .to_string();
            let entry_name = entry_path.trim_start_matches("./").to_string();

            let kind = if entry_name == HEADER_ENTRY {
                None
            } else if entry_name == PREDEPLOY_ENTRY {
                Some(ScriptKind::PreDeploy)
            } else if entry_name == POSTDEPLOY_ENTRY {
                Some(ScriptKind::PostDeploy)
            } else if entry_name.starts_with(MODEL_DIR) && entry_name.ends_with(".sql") {
                Some(ScriptKind::Model)
            } else {
                debug!("Ignoring unknown package entry {} in {:?}", entry_name, path);
                continue;
            };

            if !seen.insert(entry_name.clone()) {
                return Err(DeployError::load(
                    path,
                    format!("Duplicate package entry {}", entry_name),
                ));
            }

            let mut content = String::new();
            entry.read_to_string(&mut content).map_err(|e| {
                DeployError::load(path, format!("Failed to read {}: {}", entry_name, e))
            })?;

            match kind {
                None => {
                    let parsed: PackageHeader = serde_json::from_str(&content).map_err(|e| {
                        DeployError::load(path, format!("Invalid {}: {}", HEADER_ENTRY, e))
                    })?;
                    header = Some(parsed);
                }
                Some(ScriptKind::PreDeploy) => {
                    predeploy = Some(Script {
                        name: entry_name,
                        kind: ScriptKind::PreDeploy,
                        sql: content,
                    });
                }
                Some(ScriptKind::PostDeploy) => {
                    postdeploy = Some(Script {
                        name: entry_name,
                        kind: ScriptKind::PostDeploy,
                        sql: content,
                    });
                }
                Some(ScriptKind::Model) => {
                    scripts.push(Script {
                        name: entry_name[MODEL_DIR.len()..].to_string(),
                        kind: ScriptKind::Model,
                        sql: content,
                    });
                }
            }
        }

        let header = header.ok_or_else(|| {
            DeployError::load(path, format!("Package does not contain {}", HEADER_ENTRY))
        })?;

        header
            .validate()
            .map_err(|cause| DeployError::load(path, format!("Invalid header: {}", cause)))?;

        // Model scripts apply in file name order
        scripts.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Self {
            path: path.to_path_buf(),
            checksum,
            header,
            predeploy,
            scripts,
            postdeploy,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &PackageHeader {
        &self.header
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn predeploy(&self) -> Option<&Script> {
        self.predeploy.as_ref()
    }

    pub fn scripts(&self) -> &[Script] {
        &self.scripts
    }

    pub fn postdeploy(&self) -> Option<&Script> {
        self.postdeploy.as_ref()
    }

    /// Scripts in execution order: predeploy, model, postdeploy
    pub fn deployment_plan(&self, include_predeploy: bool, include_postdeploy: bool) -> Vec<&Script> {
        let mut plan = Vec::with_capacity(self.scripts.len() + 2);

        if include_predeploy {
            plan.extend(self.predeploy.as_ref());
        }
        plan.extend(self.scripts.iter());
        if include_postdeploy {
            plan.extend(self.postdeploy.as_ref());
        }

        plan
    }
}

impl Drop for LoadedPackage {
    fn drop(&mut self) {
        debug!("Released package {:?}", self.path);
    }
}

pub struct PackageLoader;

impl PackageLoader {
    pub fn new() -> Self {
        Self
    }

    pub fn load(&self, reference: &ArtifactReference) -> Result<LoadedPackage> {
        self.load_path(&reference.artifact_path)
    }

    pub fn load_path(&self, path: &Path) -> Result<LoadedPackage> {
        let data = fs::read(path)
            .map_err(|e| DeployError::load(path, format!("Failed to read file: {}", e)))?;

        let package = LoadedPackage::from_bytes(path, &data)?;

        info!(
            "Loaded package {} {} from {:?} ({} scripts, checksum: {})",
            package.header.name,
            package.header.version,
            path,
            package.scripts.len(),
            package.checksum
        );

        Ok(package)
    }
}

impl Default for PackageLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageWriter;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tar::Builder;
    use tempfile::TempDir;

    fn create_test_package() -> Vec<u8> {
        let mut header = PackageHeader::new("Catalog", "1.2.0");
        header
            .custom_data_mut("Reference", "Schema")
            .add_metadata("Version", "2.0");

        PackageWriter::new(header)
            .predeploy("CREATE SCHEMA IF NOT EXISTS catalog;")
            .script("002_indexes.sql", "CREATE INDEX idx_products_name ON catalog.products(name);")
            .script("001_tables.sql", "CREATE TABLE catalog.products (id INT, name TEXT);")
            .postdeploy("INSERT INTO catalog.products VALUES (1, 'seed');")
            .to_bytes()
            .unwrap()
    }

    #[test]
    fn test_load_package_from_bytes() {
        let data = create_test_package();
        let package = LoadedPackage::from_bytes(Path::new("Catalog.dacpac"), &data).unwrap();

        assert_eq!(package.name(), "Catalog");
        assert_eq!(package.header().version, "1.2.0");
        assert_eq!(
            package
                .header()
                .custom_data("Reference", "Schema")
                .and_then(|d| d.get("Version")),
            Some("2.0")
        );

        let names: Vec<&str> = package.scripts().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["001_tables.sql", "002_indexes.sql"]);

        let plan: Vec<ScriptKind> = package
            .deployment_plan(true, true)
            .iter()
            .map(|s| s.kind)
            .collect();
        assert_eq!(
            plan,
            vec![
                ScriptKind::PreDeploy,
                ScriptKind::Model,
                ScriptKind::Model,
                ScriptKind::PostDeploy
            ]
        );
        assert_eq!(package.deployment_plan(false, false).len(), 2);
    }

    #[test]
    fn test_checksum_is_stable() {
        let data = create_test_package();
        let first = LoadedPackage::from_bytes(Path::new("a.dacpac"), &data).unwrap();
        let second = LoadedPackage::from_bytes(Path::new("b.dacpac"), &data).unwrap();

        assert_eq!(first.checksum().len(), 64);
        assert_eq!(first.checksum(), second.checksum());
    }

    #[test]
    fn test_garbage_is_load_error() {
        let err = LoadedPackage::from_bytes(Path::new("bad.dacpac"), b"not a package").unwrap_err();
        match err {
            DeployError::Load { path, .. } => assert_eq!(path, PathBuf::from("bad.dacpac")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    /// Archive with exactly the given entries, in order
    fn raw_archive(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut archive_data = Vec::new();
        {
            let encoder = GzEncoder::new(&mut archive_data, Compression::default());
            let mut builder = Builder::new(encoder);

            for (name, content) in entries {
                let mut header = tar::Header::new_gnu();
                header.set_path(name).unwrap();
                header.set_size(content.len() as u64);
                header.set_mode(0o644);
                header.set_cksum();
                builder.append(&header, content.as_bytes()).unwrap();
            }

            builder.into_inner().unwrap().finish().unwrap();
        }
        archive_data
    }

    #[test]
    fn test_missing_header_is_load_error() {
        let archive_data = raw_archive(&[("model/001_test.sql", "CREATE TABLE test (id INT);")]);

        let err = LoadedPackage::from_bytes(Path::new("x.dacpac"), &archive_data).unwrap_err();
        assert!(err.to_string().contains("header.json"));
    }

    #[test]
    fn test_duplicate_entries_are_load_errors() {
        let header = serde_json::to_string(&PackageHeader::new("Catalog", "1.0.0")).unwrap();
        let other = serde_json::to_string(&PackageHeader::new("Impostor", "9.9.9")).unwrap();

        let duplicates = [
            vec![("header.json", header.as_str()), ("header.json", other.as_str())],
            vec![
                ("header.json", header.as_str()),
                ("predeploy.sql", "SELECT 1;"),
                ("predeploy.sql", "DROP SCHEMA catalog;"),
            ],
            vec![
                ("header.json", header.as_str()),
                ("postdeploy.sql", "SELECT 1;"),
                ("./postdeploy.sql", "SELECT 2;"),
            ],
            vec![
                ("header.json", header.as_str()),
                ("model/001_tables.sql", "CREATE TABLE a (id INT);"),
                ("model/001_tables.sql", "CREATE TABLE b (id INT);"),
            ],
        ];

        for entries in &duplicates {
            let err = LoadedPackage::from_bytes(Path::new("dup.dacpac"), &raw_archive(entries))
                .unwrap_err();
            assert_eq!(err.code(), "load_failed");
            assert!(err.to_string().contains("Duplicate package entry"), "{}", err);
        }

        let single = raw_archive(&[("header.json", header.as_str()), ("predeploy.sql", "SELECT 1;")]);
        let package = LoadedPackage::from_bytes(Path::new("ok.dacpac"), &single).unwrap();
        assert_eq!(package.name(), "Catalog");
        assert!(package.predeploy().is_some());
    }

    #[test]
    fn test_loader_reads_from_reference() {
        let temp_dir = TempDir::new().unwrap();
        let artifact_path = temp_dir.path().join("Catalog.dacpac");
        fs::write(&artifact_path, create_test_package()).unwrap();

        let reference = ArtifactReference {
            project_path: temp_dir.path().join("Catalog.sqlproj"),
            project_directory: temp_dir.path().to_path_buf(),
            project_name: "Catalog".to_string(),
            artifact_path: artifact_path.clone(),
        };

        let package = PackageLoader::new().load(&reference).unwrap();
        assert_eq!(package.path(), artifact_path.as_path());
    }

    #[test]
    fn test_unreadable_file_is_load_error() {
        let err = PackageLoader::new()
            .load_path(Path::new("/nonexistent/Catalog.dacpac"))
            .unwrap_err();
        assert_eq!(err.code(), "load_failed");
    }
}
