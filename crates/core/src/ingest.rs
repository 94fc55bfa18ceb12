use crate::IngestError;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub(crate) fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Resolves an upload target: a single PDF, or every PDF below a folder.
pub fn discover_pdf_files(target: &Path) -> Result<Vec<PathBuf>, IngestError> {
    if target.is_file() {
        if !has_pdf_extension(target) {
            return Err(IngestError::InvalidArgument(format!(
                "only PDF files are supported: {}",
                target.display()
            )));
        }
        return Ok(vec![target.to_path_buf()]);
    }

    let mut files = WalkDir::new(target)
        .into_iter()
        .filter_map(|item| item.ok())
        .filter(|entry| entry.file_type().is_file() && has_pdf_extension(entry.path()))
        .map(|entry| entry.path().to_path_buf())
        .collect::<Vec<_>>();

    if files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no pdf files found in {}",
            target.display()
        )));
    }

    files.sort_unstable();
    Ok(files)
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// `(doc_id, title)`: the file stem and the full file name.
pub fn document_identity(path: &Path) -> Result<(String, String), IngestError> {
    let missing = || IngestError::MissingFileName(path.display().to_string());
    let title = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(missing)?;
    let doc_id = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(missing)?;
    Ok((doc_id.to_string(), title.to_string()))
}

/// Copies the upload into `storage_dir`, returning where it was saved.
pub async fn store_upload(path: &Path, storage_dir: &Path) -> Result<PathBuf, IngestError> {
    let (_, title) = document_identity(path)?;
    tokio::fs::create_dir_all(storage_dir).await?;
    let destination = storage_dir.join(&title);

    // Copying a file onto itself truncates it, so compare resolved paths.
    let source = tokio::fs::canonicalize(path).await?;
    let resolved = tokio::fs::canonicalize(storage_dir).await?.join(&title);
    let same_file = match tokio::fs::canonicalize(&resolved).await {
        Ok(existing) => existing == source,
        Err(_) => false,
    };
    if !same_file {
        tokio::fs::copy(&source, &resolved).await?;
    }
    Ok(destination)
}
