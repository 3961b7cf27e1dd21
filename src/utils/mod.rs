use std::path::Path;
use std::time::Duration;

/// Used when neither the caller nor the storage key provide a usable name
pub const DEFAULT_FILENAME: &str = "recording.webm";

/// Last path segment of a storage key, if any
pub fn filename_from_key(key: &str) -> Option<&str> {
    key.rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

/// Explicit filename, else the key's basename, else [`DEFAULT_FILENAME`]
pub fn effective_filename(explicit: Option<&str>, key: &str) -> String {
    explicit
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .or_else(|| filename_from_key(key))
        .unwrap_or(DEFAULT_FILENAME)
        .to_string()
}

/// Extension including the leading dot, e.g. `.webm`
pub fn dotted_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext))
}

/// Swap the extension of `filename` for `extension` (given without the dot)
pub fn replace_extension(filename: &str, extension: &str) -> String {
    let stem = match filename.rfind('.') {
        Some(dot) if dot > 0 && !filename[dot..].contains(['/', '\\']) => &filename[..dot],
        _ => filename,
    };
    format!("{}.{}", stem, extension)
}

/// Compact elapsed time for progress messages
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let (minutes, secs) = (total / 60, total % 60);

    if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Human readable byte count for upload logging
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

/// Report external tools that the workflow may need but are not installed
pub fn check_dependencies(ffmpeg_path: &str) -> Vec<String> {
    let mut missing = Vec::new();

    if which::which(ffmpeg_path).is_err() {
        missing.push(format!(
            "{} - required to transcode WebM recordings before upload",
            ffmpeg_path
        ));
    }

    missing
}
