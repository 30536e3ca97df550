//! Result bundle creation
//!
//! Once the download loop ends, captured captions are aggregated into a
//! companion index (machine-readable JSON plus a human-readable text
//! rendition) and everything in the task's videos directory is packed
//! into a single deflate zip.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Separator banner used in the human-readable caption index
const CAPTION_BANNER: &str = "============================================================";

/// Write the caption index files into the videos directory
///
/// Produces `captions.json` (filename → full caption) and
/// `captions.txt`; both end up inside the result bundle.
pub(crate) async fn write_caption_index(
    videos_dir: &Path,
    captions: &BTreeMap<String, String>,
) -> Result<()> {
    let json = serde_json::to_vec_pretty(captions)?;
    tokio::fs::write(videos_dir.join("captions.json"), json).await?;

    let mut text = String::new();
    for (file_name, caption) in captions {
        text.push_str(CAPTION_BANNER);
        text.push('\n');
        text.push_str(file_name);
        text.push('\n');
        text.push_str(CAPTION_BANNER);
        text.push('\n');
        text.push_str(caption);
        text.push_str("\n\n");
    }
    tokio::fs::write(videos_dir.join("captions.txt"), text).await?;

    Ok(())
}

/// Pack every regular file in `src_dir` into a deflate zip at `archive_path`
///
/// Entry names are the bare filenames. Runs on the blocking pool; the
/// zip writer is synchronous. Returns the archive size in bytes.
pub(crate) async fn pack_directory(src_dir: PathBuf, archive_path: PathBuf) -> Result<u64> {
    tokio::task::spawn_blocking(move || pack_blocking(&src_dir, &archive_path))
        .await
        .map_err(|e| Error::Archive(format!("packing task panicked: {e}")))?
}

fn pack_blocking(src_dir: &Path, archive_path: &Path) -> Result<u64> {
    let file = std::fs::File::create(archive_path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    let mut entries: Vec<_> = std::fs::read_dir(src_dir)?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        zip.start_file(name, options)?;
        let mut source = std::fs::File::open(&path)?;
        std::io::copy(&mut source, &mut zip)?;
    }

    let mut file = zip.finish()?;
    file.flush()?;

    Ok(std::fs::metadata(archive_path)?.len())
}
