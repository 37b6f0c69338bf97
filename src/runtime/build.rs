// ABOUTME: Image build pipeline for the Backend (spec.md §4.1).
// ABOUTME: Materializes the embedded runtime template, tars the scratch dir, builds the image.

use bytes::Bytes;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::runtime::traits::ImageOps;

/// The embedded language runtime template. In a real deployment this would
/// ship one such template per supported language; aube bundles a single
/// Python-based one, materialized at `<scratch>/Dockerfile` and
/// `<scratch>/entrypoint.py` ahead of the function's own source tree.
const DOCKERFILE_TEMPLATE: &str = r#"FROM python:3.12-slim
WORKDIR /srv
COPY entrypoint.py /srv/entrypoint.py
COPY fn/ /srv/fn/
RUN pip install --no-cache-dir websockets
RUN if [ -f /srv/fn/requirements.txt ]; then pip install --no-cache-dir -r /srv/fn/requirements.txt; fi
EXPOSE 8080 8000
CMD ["python3", "/srv/entrypoint.py"]
"#;

const ENTRYPOINT_TEMPLATE: &str = include_str!("entrypoint_template.py");

/// A materialized, tarred build context ready to hand to [`ImageOps::build_image`].
pub struct BuildContext {
    pub scratch_dir: PathBuf,
    pub tar: Bytes,
}

/// Materialize the runtime template into a fresh scratch directory under
/// `tmp_root`, copy `source_dir` into the `fn/` subpath, and tar the result.
///
/// The scratch directory is left on disk for the caller to remove after a
/// successful build (spec.md §6: "deleted after successful deploy").
pub fn prepare(tmp_root: &Path, unique_id: &str, source_dir: &Path) -> Result<BuildContext> {
    let scratch_dir = tmp_root.join(unique_id);
    std::fs::create_dir_all(&scratch_dir).map_err(|e| Error::transient(e.to_string()))?;

    std::fs::write(scratch_dir.join("Dockerfile"), DOCKERFILE_TEMPLATE)
        .map_err(|e| Error::transient(e.to_string()))?;
    std::fs::write(scratch_dir.join("entrypoint.py"), ENTRYPOINT_TEMPLATE)
        .map_err(|e| Error::transient(e.to_string()))?;

    let fn_dir = scratch_dir.join("fn");
    copy_dir_recursive(source_dir, &fn_dir)?;

    let tar = tar_directory(&scratch_dir)?;

    Ok(BuildContext { scratch_dir, tar })
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst).map_err(|e| Error::transient(e.to_string()))?;
    for entry in std::fs::read_dir(src).map_err(|e| Error::transient(e.to_string()))? {
        let entry = entry.map_err(|e| Error::transient(e.to_string()))?;
        let path = entry.path();
        let target = dst.join(entry.file_name());
        if path.is_dir() {
            copy_dir_recursive(&path, &target)?;
        } else {
            std::fs::copy(&path, &target).map_err(|e| Error::transient(e.to_string()))?;
        }
    }
    Ok(())
}

fn tar_directory(dir: &Path) -> Result<Bytes> {
    let mut builder = tar::Builder::new(Vec::new());
    builder
        .append_dir_all(".", dir)
        .map_err(|e| Error::transient(e.to_string()))?;
    let bytes = builder
        .into_inner()
        .map_err(|e| Error::transient(e.to_string()))?;
    Ok(Bytes::from(bytes))
}

/// Remove a scratch directory, logging (not failing) on error, per the
/// best-effort cleanup policy of spec.md §4.1.
pub fn cleanup(scratch_dir: &Path) {
    if let Err(e) = std::fs::remove_dir_all(scratch_dir) {
        tracing::warn!("failed to remove scratch dir {}: {}", scratch_dir.display(), e);
    }
}

/// Drive the build pipeline end to end against an engine client: prepare the
/// build context, build the tagged image, and always clean up the scratch
/// directory.
pub async fn build_and_tag(
    engine: &dyn ImageOps,
    tmp_root: &Path,
    unique_id: &str,
    source_dir: &Path,
) -> Result<()> {
    let ctx = prepare(tmp_root, unique_id, source_dir)?;
    let result = engine
        .build_image(unique_id, ctx.tar)
        .await
        .map_err(|e| Error::engine_failure(e.to_string()));
    cleanup(&ctx.scratch_dir);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_materializes_template_and_source() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("main.py"), "print('hi')").unwrap();

        let ctx = prepare(tmp.path(), "fn-abc123", source.path()).unwrap();

        assert!(ctx.scratch_dir.join("Dockerfile").is_file());
        assert!(ctx.scratch_dir.join("entrypoint.py").is_file());
        assert!(ctx.scratch_dir.join("fn").join("main.py").is_file());
        assert!(!ctx.tar.is_empty());
    }

    #[test]
    fn cleanup_removes_scratch_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tempfile::tempdir().unwrap();
        let ctx = prepare(tmp.path(), "fn-cleanup", source.path()).unwrap();
        assert!(ctx.scratch_dir.exists());
        cleanup(&ctx.scratch_dir);
        assert!(!ctx.scratch_dir.exists());
    }
}
