use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use bubble_common::{BubbleRecord, utils};
use image::RgbImage;
use tracing::info;

use crate::{
    error::{PipelineError, Result},
    pipeline::PipelineResult,
};

/// Files written for one image
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtifactPaths {
    pub cleaned: Option<PathBuf>,
    pub records: Option<PathBuf>,
    pub transcript: Option<PathBuf>,
    pub final_image: Option<PathBuf>,
}

impl ArtifactPaths {
    pub fn all(&self) -> Vec<&Path> {
        [&self.cleaned, &self.records, &self.transcript, &self.final_image]
            .into_iter()
            .flatten()
            .map(PathBuf::as_path)
            .collect()
    }
}

/// Writes pipeline outputs under an output root:
///
/// ```text
/// <root>/cleaned/cleaned_<file name>
/// <root>/translations/<stem>.json
/// <root>/translations/<stem>.txt
/// <root>/final/<stem>_translated.png
/// ```
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    root: PathBuf,
}

impl ArtifactWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cleaned_path(&self, source: &Path) -> PathBuf {
        let name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.png".to_string());
        self.root.join("cleaned").join(format!("cleaned_{}", name))
    }

    pub fn records_path(&self, source: &Path) -> PathBuf {
        self.root
            .join("translations")
            .join(format!("{}.json", utils::file_stem(source)))
    }

    pub fn transcript_path(&self, source: &Path) -> PathBuf {
        self.root
            .join("translations")
            .join(format!("{}.txt", utils::file_stem(source)))
    }

    pub fn final_path(&self, source: &Path) -> PathBuf {
        self.root
            .join("final")
            .join(format!("{}_translated.png", utils::file_stem(source)))
    }

    /// Persist every artifact the result's mode produces. Only completed
    /// results are written.
    pub fn persist(&self, result: &PipelineResult) -> Result<ArtifactPaths> {
        if !result.is_success() {
            return Err(PipelineError::Incomplete);
        }
        let mut paths = ArtifactPaths::default();

        if let Some(cleaned) = &result.cleaned {
            let path = self.cleaned_path(&result.source);
            save_image(cleaned, &path)?;
            paths.cleaned = Some(path);
        }

        if result.mode.runs_extraction() {
            let records_path = self.records_path(&result.source);
            save_records(&records_path, &result.records)?;
            paths.records = Some(records_path);

            let transcript_path = self.transcript_path(&result.source);
            std::fs::write(&transcript_path, render_transcript(&result.records))?;
            paths.transcript = Some(transcript_path);
        }

        if let Some(final_image) = &result.final_image {
            let path = self.final_path(&result.source);
            save_image(final_image, &path)?;
            paths.final_image = Some(path);
        }

        info!(
            "Saved {} artifacts for {}",
            paths.all().len(),
            result.source.display()
        );
        Ok(paths)
    }
}

fn save_image(image: &RgbImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        utils::ensure_output_dir(parent)?;
    }
    image.save(path).map_err(|source| PipelineError::Encode {
        path: path.to_path_buf(),
        source,
    })
}

/// Human-readable transcript: one block per record
pub fn render_transcript(records: &[BubbleRecord]) -> String {
    let mut out = String::new();
    for record in records {
        let _ = writeln!(
            out,
            "[{}] {} ({:.1}%)",
            record.index,
            record.class,
            record.confidence * 100.0
        );
        let _ = writeln!(out, "Source      : {}", record.source_text);
        let _ = writeln!(out, "Translation : {}", record.translated_text);
        out.push('\n');
    }
    out
}

/// Write records as pretty JSON, creating the parent directory
pub fn save_records(path: &Path, records: &[BubbleRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        utils::ensure_output_dir(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(records)?)?;
    Ok(())
}

/// Load records previously written by [`ArtifactWriter::persist`]
pub fn load_records(path: &Path) -> Result<Vec<BubbleRecord>> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}
