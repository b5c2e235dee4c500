//! Durable output for a completed content bundle.
//!
//! Writes one JSON file per page plus a `manifest.json` carrying SHA-256
//! checksums, run metadata and per-stage diagnostics. Every file is written
//! to a temp file first and renamed into place.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use contentgen_core::{ContentBundle, StageDiagnostic};
use contentgen_shared::{ContentGenError, Result};

/// Current manifest format.
pub const MANIFEST_VERSION: u32 = 1;

pub const FAQ_FILE: &str = "faq.json";
pub const PRODUCT_PAGE_FILE: &str = "product_page.json";
pub const COMPARISON_PAGE_FILE: &str = "comparison_page.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Metadata for a single written file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMeta {
    pub filename: String,
    pub sha256: String,
    pub size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleManifest {
    pub schema_version: u32,
    pub tool_version: String,
    pub product_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compared_with: Option<String>,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub degraded: bool,
    pub artifacts: Vec<ArtifactMeta>,
    pub diagnostics: Vec<StageDiagnostic>,
}

/// Write every page of `bundle` into `out_dir`, then the manifest.
///
/// The comparison page is written only when the bundle has one. Re-running
/// into the same directory overwrites the previous output.
#[instrument(skip_all, fields(out_dir = %out_dir.display(), product = %bundle.product_page.product_name))]
pub fn write_bundle(out_dir: &Path, bundle: &ContentBundle) -> Result<BundleManifest> {
    std::fs::create_dir_all(out_dir).map_err(|e| ContentGenError::io(out_dir, e))?;

    let mut artifacts = vec![
        write_artifact(out_dir, FAQ_FILE, &bundle.faq)?,
        write_artifact(out_dir, PRODUCT_PAGE_FILE, &bundle.product_page)?,
    ];
    match &bundle.comparison_page {
        Some(page) => artifacts.push(write_artifact(out_dir, COMPARISON_PAGE_FILE, page)?),
        None => remove_stale(&out_dir.join(COMPARISON_PAGE_FILE))?,
    }

    let manifest = BundleManifest {
        schema_version: MANIFEST_VERSION,
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        product_name: bundle.product_page.product_name.clone(),
        compared_with: bundle
            .comparison_page
            .as_ref()
            .map(|c| c.product_b.name.clone()),
        provider: bundle.meta.provider.clone(),
        model: bundle.meta.model.clone(),
        generated_at: bundle.meta.started_at,
        degraded: bundle.is_degraded(),
        artifacts,
        diagnostics: bundle.diagnostics.clone(),
    };
    write_atomic(&out_dir.join(MANIFEST_FILE), &to_json(&manifest)?)?;

    info!(
        count = manifest.artifacts.len(),
        degraded = manifest.degraded,
        "bundle written"
    );
    Ok(manifest)
}

/// Read `manifest.json` from `dir`.
pub fn read_manifest(dir: &Path) -> Result<BundleManifest> {
    let path = dir.join(MANIFEST_FILE);
    let content = std::fs::read_to_string(&path).map_err(|e| ContentGenError::io(&path, e))?;
    let manifest: BundleManifest = serde_json::from_str(&content)
        .map_err(|e| ContentGenError::validation(format!("invalid {MANIFEST_FILE}: {e}")))?;

    if manifest.schema_version != MANIFEST_VERSION {
        return Err(ContentGenError::validation(format!(
            "unsupported schemaVersion: {} (expected {MANIFEST_VERSION})",
            manifest.schema_version
        )));
    }
    Ok(manifest)
}

/// Check that every file listed in the manifest exists with a matching checksum.
pub fn verify_bundle(dir: &Path) -> Result<BundleManifest> {
    let manifest = read_manifest(dir)?;
    for artifact in &manifest.artifacts {
        let path = dir.join(&artifact.filename);
        let content = std::fs::read(&path).map_err(|e| ContentGenError::io(&path, e))?;
        let actual = sha256_hex(&content);
        if actual != artifact.sha256 {
            return Err(ContentGenError::validation(format!(
                "{} checksum mismatch: manifest has {}, file has {actual}",
                artifact.filename, artifact.sha256
            )));
        }
    }
    debug!(dir = %dir.display(), files = manifest.artifacts.len(), "bundle verified");
    Ok(manifest)
}

/// Directory-safe name for a product: lower-case ASCII words joined by `-`.
pub fn product_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "product".to_string()
    } else {
        slug.to_string()
    }
}

/// Output directory for one bundle under `root`.
pub fn bundle_dir(root: &Path, bundle: &ContentBundle) -> PathBuf {
    root.join(product_slug(&bundle.product_page.product_name))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn write_artifact<T: Serialize>(dir: &Path, filename: &str, data: &T) -> Result<ArtifactMeta> {
    let content = to_json(data)?;
    write_atomic(&dir.join(filename), &content)?;
    debug!(file = %filename, size = content.len(), "wrote artifact");
    Ok(ArtifactMeta {
        filename: filename.to_string(),
        sha256: sha256_hex(content.as_bytes()),
        size_bytes: content.len(),
    })
}

fn to_json<T: Serialize>(data: &T) -> Result<String> {
    serde_json::to_string_pretty(data)
        .map_err(|e| ContentGenError::validation(format!("JSON serialization failed: {e}")))
}

/// Write to `.{name}.tmp` beside `target`, then rename over it.
fn write_atomic(target: &Path, content: &str) -> Result<()> {
    let name = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ContentGenError::validation("artifact path has no file name"))?;
    let temp = target.with_file_name(format!(".{name}.tmp"));
    std::fs::write(&temp, content).map_err(|e| ContentGenError::io(&temp, e))?;
    std::fs::rename(&temp, target).map_err(|e| ContentGenError::io(target, e))?;
    Ok(())
}

fn remove_stale(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed stale artifact");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ContentGenError::io(path, e)),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use contentgen_core::{CancellationToken, Pipeline, RunRequest, SilentProgress};
    use contentgen_generation::ClientRegistry;
    use contentgen_shared::{AppConfig, Currency, PipelineConfig, Price, ProductModel};

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "contentgen-artifacts-test-{}",
            uuid::Uuid::now_v7()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn product(name: &str, price: f64) -> ProductModel {
        ProductModel {
            product_name: name.into(),
            concentration: "10% Vitamin C".into(),
            skin_type: vec!["Oily".into()],
            key_ingredients: vec!["Vitamin C".into(), "Hyaluronic Acid".into()],
            benefits: vec!["Brightening".into(), "Fades dark spots".into()],
            how_to_use: "Apply 2 drops in the morning".into(),
            side_effects: "Mild tingling".into(),
            price: Price::new(price, Currency::Inr),
        }
    }

    async fn bundle(compare: bool) -> ContentBundle {
        let registry = Arc::new(ClientRegistry::from_config(&AppConfig::default()));
        let pipeline = Pipeline::new(PipelineConfig::default(), registry);
        let mut request = RunRequest::new(product("GlowBoost Vitamin C Serum", 699.0));
        if compare {
            request = request.compare_with(product("Other Serum", 799.0));
        }
        pipeline
            .run(&request, &SilentProgress, &CancellationToken::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn writes_pages_and_manifest() {
        let tmp = temp_dir();
        let manifest = write_bundle(&tmp, &bundle(true).await).unwrap();

        let names: Vec<&str> = manifest.artifacts.iter().map(|a| a.filename.as_str()).collect();
        assert_eq!(names, vec![FAQ_FILE, PRODUCT_PAGE_FILE, COMPARISON_PAGE_FILE]);
        assert!(tmp.join(MANIFEST_FILE).exists());
        assert!(!tmp.join(".faq.json.tmp").exists());
        assert_eq!(manifest.compared_with.as_deref(), Some("Other Serum"));
        assert!(!manifest.degraded);

        let faq: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(tmp.join(FAQ_FILE)).unwrap()).unwrap();
        assert_eq!(faq["productName"], "GlowBoost Vitamin C Serum");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn manifest_round_trips_and_verifies() {
        let tmp = temp_dir();
        let written = write_bundle(&tmp, &bundle(false).await).unwrap();
        let read = verify_bundle(&tmp).unwrap();
        assert_eq!(read.artifacts, written.artifacts);
        assert_eq!(read.diagnostics.len(), written.diagnostics.len());
        assert_eq!(read.provider, "rules");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn tampered_file_fails_verification() {
        let tmp = temp_dir();
        write_bundle(&tmp, &bundle(false).await).unwrap();
        std::fs::write(tmp.join(PRODUCT_PAGE_FILE), "{}").unwrap();

        let err = verify_bundle(&tmp).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn rewrite_without_comparison_removes_stale_page() {
        let tmp = temp_dir();
        write_bundle(&tmp, &bundle(true).await).unwrap();
        assert!(tmp.join(COMPARISON_PAGE_FILE).exists());

        let manifest = write_bundle(&tmp, &bundle(false).await).unwrap();
        assert!(!tmp.join(COMPARISON_PAGE_FILE).exists());
        assert_eq!(manifest.artifacts.len(), 2);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_manifest_is_an_io_error() {
        let tmp = temp_dir();
        let err = read_manifest(&tmp).unwrap_err();
        assert!(matches!(err, ContentGenError::Io { .. }));
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn slugs_are_directory_safe() {
        assert_eq!(product_slug("GlowBoost Vitamin C Serum"), "glowboost-vitamin-c-serum");
        assert_eq!(product_slug("  10% Niacinamide!! "), "10-niacinamide");
        assert_eq!(product_slug("***"), "product");
    }
}
