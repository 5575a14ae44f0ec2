use super::{HEADER_ENTRY, MODEL_DIR, POSTDEPLOY_ENTRY, PREDEPLOY_ENTRY};
use crate::error::{DeployError, Result};
use crate::metadata::PackageHeader;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::path::Path;
use tar::Builder;
use tracing::info;

/// Builds package archives in the layout [`super::PackageLoader`] reads
pub struct PackageWriter {
    header: PackageHeader,
    predeploy: Option<String>,
    scripts: Vec<(String, String)>,
    postdeploy: Option<String>,
}

impl PackageWriter {
    pub fn new(header: PackageHeader) -> Self {
        Self {
            header,
            predeploy: None,
            scripts: Vec::new(),
            postdeploy: None,
        }
    }

    pub fn header_mut(&mut self) -> &mut PackageHeader {
        &mut self.header
    }

    pub fn predeploy(mut self, sql: impl Into<String>) -> Self {
        self.predeploy = Some(sql.into());
        self
    }

    /// Add a model script; `name` is relative to `model/`
    pub fn script(mut self, name: impl Into<String>, sql: impl Into<String>) -> Self {
        self.scripts.push((name.into(), sql.into()));
        self
    }

    pub fn postdeploy(mut self, sql: impl Into<String>) -> Self {
        self.postdeploy = Some(sql.into());
        self
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.header
            .validate()
            .map_err(|cause| DeployError::Internal(format!("Invalid package header: {}", cause)))?;

        let header_json = serde_json::to_vec_pretty(&self.header)?;

        let mut archive_data = Vec::new();
        {
            let encoder = GzEncoder::new(&mut archive_data, Compression::default());
            let mut builder = Builder::new(encoder);

            append_entry(&mut builder, HEADER_ENTRY, &header_json)?;

            if let Some(sql) = &self.predeploy {
                append_entry(&mut builder, PREDEPLOY_ENTRY, sql.as_bytes())?;
            }

            for (name, sql) in &self.scripts {
                let entry = format!("{}{}", MODEL_DIR, name);
                append_entry(&mut builder, &entry, sql.as_bytes())?;
            }

            if let Some(sql) = &self.postdeploy {
                append_entry(&mut builder, POSTDEPLOY_ENTRY, sql.as_bytes())?;
            }

            builder.into_inner()?.finish()?;
        }

        Ok(archive_data)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let data = self.to_bytes()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &data)?;

        info!(
            "Wrote package {} {} to {:?} ({} bytes)",
            self.header.name,
            self.header.version,
            path,
            data.len()
        );

        Ok(())
    }
}

fn append_entry<W: std::io::Write>(builder: &mut Builder<W>, path: &str, content: &[u8]) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_path(path)?;
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append(&header, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_header_is_rejected() {
        let writer = PackageWriter::new(PackageHeader::new("", "1.0.0"));
        assert!(writer.to_bytes().is_err());
    }

    #[test]
    fn test_write_creates_parent_directories() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir
            .path()
            .join("bin")
            .join("Debug")
            .join("netstandard2.0")
            .join("Catalog.dacpac");

        PackageWriter::new(PackageHeader::new("Catalog", "1.0.0"))
            .script("001_tables.sql", "CREATE TABLE products (id INT);")
            .write_to(&path)
            .unwrap();

        assert!(path.is_file());
    }
}
