//! The NDVI computation tool contract.
//!
//! The tool is an external program invoked per tile as
//! `tool <scratch_dir> <band_prefix> <boundary_prefix>`. It reads
//! `satData_band04.tif`, `satData_band08.tif`, optionally
//! `satData_bandSCL.tif`, plus one `boundary_geometry_<id>.json` per
//! boundary, and writes `raster_image_<id>.png` and `raster_meta_<id>.json`
//! for each boundary it could process. Stdout and stderr are captured for
//! logs only; the exit code decides success.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use veld_core::error::{Error, Result};
use veld_core::paths::{RASTER_IMAGE_FILE_PREFIX, RASTER_META_FILE_PREFIX};
use veld_store::RasterMeta;

/// The map-generation tool the build task shells out to.
#[async_trait]
pub trait NdviTool: Send + Sync {
    /// Runs the tool over a prepared scratch directory.
    async fn build(
        &self,
        scratch_dir: &Path,
        band_prefix: &str,
        boundary_prefix: &str,
    ) -> Result<()>;
}

/// Production implementation shelling out to the configured program.
#[derive(Debug, Clone)]
pub struct SubprocessNdviTool {
    program: PathBuf,
    leading_args: Vec<String>,
}

impl SubprocessNdviTool {
    /// Creates a tool invocation for the given program.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Prepends an argument before the contract arguments; lets an
    /// interpreter plus script act as the tool.
    #[must_use]
    pub fn with_leading_arg(mut self, arg: impl Into<String>) -> Self {
        self.leading_args.push(arg.into());
        self
    }
}

#[async_trait]
impl NdviTool for SubprocessNdviTool {
    async fn build(
        &self,
        scratch_dir: &Path,
        band_prefix: &str,
        boundary_prefix: &str,
    ) -> Result<()> {
        let output = tokio::process::Command::new(&self.program)
            .args(&self.leading_args)
            .arg(scratch_dir)
            .arg(band_prefix)
            .arg(boundary_prefix)
            .output()
            .await
            .map_err(|err| {
                Error::subprocess(format!(
                    "failed to launch {}: {err}",
                    self.program.display()
                ))
            })?;

        tracing::debug!(
            stdout = %String::from_utf8_lossy(&output.stdout),
            stderr = %String::from_utf8_lossy(&output.stderr),
            "ndvi tool finished"
        );

        if !output.status.success() {
            return Err(Error::subprocess(format!(
                "ndvi tool exited with {}",
                output.status
            )));
        }
        Ok(())
    }
}

/// Test double that emits one fixed PNG and metadata file per boundary
/// input it finds in the scratch directory.
#[derive(Debug, Clone)]
pub struct StaticNdviTool {
    meta: RasterMeta,
}

impl StaticNdviTool {
    /// Creates a tool emitting the given metadata for every boundary.
    #[must_use]
    pub fn new(meta: RasterMeta) -> Self {
        Self { meta }
    }

    /// Creates a tool with plausible mid-season statistics.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RasterMeta {
            image_bounds: vec![vec![33.6, -84.5], vec![33.7, -84.4]],
            raster_min: -0.05,
            raster_max: 0.91,
            raster_median: 0.48,
            raster_mean: 0.45,
            raster_percent_covered_by_clouds: 0.02,
        })
    }
}

#[async_trait]
impl NdviTool for StaticNdviTool {
    async fn build(
        &self,
        scratch_dir: &Path,
        _band_prefix: &str,
        boundary_prefix: &str,
    ) -> Result<()> {
        let mut entries = tokio::fs::read_dir(scratch_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(rest) = name.strip_prefix(boundary_prefix) else {
                continue;
            };
            let Some(id) = rest.strip_suffix(".json") else { continue };

            let image = scratch_dir.join(format!("{RASTER_IMAGE_FILE_PREFIX}{id}.png"));
            let meta = scratch_dir.join(format!("{RASTER_META_FILE_PREFIX}{id}.json"));
            tokio::fs::write(&image, b"\x89PNG\r\n\x1a\n").await?;
            tokio::fs::write(&meta, serde_json::to_vec(&self.meta)?).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veld_core::paths::BOUNDARY_FILE_PREFIX;

    #[tokio::test]
    async fn test_static_tool_emits_artifacts_per_boundary() {
        let dir = tempfile::tempdir().expect("tempdir");
        let id = "0123456789abcdef01234567";
        tokio::fs::write(
            dir.path().join(format!("{BOUNDARY_FILE_PREFIX}{id}.json")),
            b"{}",
        )
        .await
        .expect("write");

        StaticNdviTool::with_defaults()
            .build(dir.path(), "satData_band", BOUNDARY_FILE_PREFIX)
            .await
            .expect("build");

        assert!(dir
            .path()
            .join(format!("{RASTER_IMAGE_FILE_PREFIX}{id}.png"))
            .exists());
        let meta_bytes =
            std::fs::read(dir.path().join(format!("{RASTER_META_FILE_PREFIX}{id}.json")))
                .expect("meta");
        let meta: RasterMeta = serde_json::from_slice(&meta_bytes).expect("parse");
        assert!((meta.raster_mean - 0.45).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_subprocess_tool_reports_launch_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tool = SubprocessNdviTool::new("/definitely/not/a/real/program");
        let err = tool
            .build(dir.path(), "satData_band", BOUNDARY_FILE_PREFIX)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to launch"));
    }
}
