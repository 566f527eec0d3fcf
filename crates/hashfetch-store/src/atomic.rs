use std::path::Path;

use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};

/// Write `content` to a sibling temp file, then rename it over `path`.
///
/// Callers must serialize concurrent writes to the same path; the temp name
/// is derived from the target name.
pub async fn atomic_write(path: impl AsRef<Path>, content: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let parent = path.parent().unwrap_or(Path::new(""));
    let file_name = path.file_name().unwrap_or_default().to_string_lossy();
    let tmp_path = parent.join(format!(".{file_name}.tmp"));

    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .map_err(Error::io("create", &tmp_path))?;
    file.write_all(content)
        .await
        .map_err(Error::io("write", &tmp_path))?;
    file.sync_all().await.map_err(Error::io("sync", &tmp_path))?;
    drop(file);

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(Error::Io {
            op:     "rename",
            path:   path.to_path_buf(),
            source: e,
        });
    }

    Ok(())
}
