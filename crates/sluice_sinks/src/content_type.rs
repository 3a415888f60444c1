//! Minimal content-type heuristic keyed on the file extension.

use std::path::Path;

/// Best-effort content type for a delivered file; extend as needed.
pub fn detect_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        // Text and structured data formats
        "csv" => "text/csv",
        "json" => "application/json",
        "log" | "md" | "txt" => "text/plain; charset=utf-8",
        "xml" => "application/xml",

        // Image formats (common in scanning workflows)
        "bmp" => "image/bmp",
        "gif" => "image/gif",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "svg" => "image/svg+xml",
        "tif" | "tiff" => "image/tiff",
        "webp" => "image/webp",

        // Document formats
        "pdf" => "application/pdf",

        // Archive formats
        "7z" => "application/x-7z-compressed",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "zip" => "application/zip",

        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_common_extensions() {
        assert_eq!(detect_content_type(Path::new("a.csv")), "text/csv");
        assert_eq!(detect_content_type(Path::new("a.JSON")), "application/json");
        assert_eq!(detect_content_type(Path::new("scan.TIF")), "image/tiff");
        assert_eq!(
            detect_content_type(Path::new("no_extension")),
            "application/octet-stream"
        );
    }
}
