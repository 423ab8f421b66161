//! Built-in extension table.
//!
//! Values follow the `mime-db` registry as the common `mime-types` lookup
//! reports them: a bare media type with no `charset` parameter.
//!
//! The table covers web assets, media, fonts, office documents and common
//! archives, not the whole registry. Anything else resolves to `None` and is
//! left alone unless the user supplies an override.

/// Look up an already-lowercased extension.
pub(crate) fn lookup(ext: &str) -> Option<&'static str> {
    let content_type = match ext {
        // Text & web
        "html" | "htm" | "shtml" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "txt" | "text" | "log" | "conf" | "ini" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "yaml" | "yml" => "text/yaml",
        "ics" => "text/calendar",
        "vtt" => "text/vtt",
        "jsx" => "text/jsx",
        "less" => "text/less",
        "scss" => "text/x-scss",
        "sass" => "text/x-sass",
        "mdx" => "text/mdx",
        "appcache" | "manifest" => "text/cache-manifest",
        "js" | "mjs" => "application/javascript",
        "json" | "map" => "application/json",
        "jsonld" => "application/ld+json",
        "webmanifest" => "application/manifest+json",
        "xml" | "xsl" => "application/xml",
        "xhtml" => "application/xhtml+xml",
        "rss" => "application/rss+xml",
        "atom" => "application/atom+xml",
        "toml" => "application/toml",
        "wasm" => "application/wasm",
        "m3u8" => "application/vnd.apple.mpegurl",
        "gltf" => "model/gltf+json",
        "glb" => "model/gltf-binary",
        // Images
        "png" => "image/png",
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "gif" => "image/gif",
        "apng" => "image/apng",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "svg" | "svgz" => "image/svg+xml",
        "ico" => "image/vnd.microsoft.icon",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "heic" => "image/heic",
        "psd" => "image/vnd.adobe.photoshop",
        // Audio
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/x-flac",
        "m4a" => "audio/mp4",
        "aac" => "audio/x-aac",
        "opus" => "audio/ogg",
        "weba" => "audio/webm",
        "mid" | "midi" => "audio/midi",
        // Video
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "mpeg" | "mpg" => "video/mpeg",
        "ogv" => "video/ogg",
        "3gp" => "video/3gpp",
        "ts" => "video/mp2t",
        // Fonts
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        // Documents
        "pdf" => "application/pdf",
        "rtf" => "application/rtf",
        "epub" => "application/epub+zip",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "odt" => "application/vnd.oasis.opendocument.text",
        "ods" => "application/vnd.oasis.opendocument.spreadsheet",
        // Archives & binaries
        "zip" => "application/zip",
        "gz" | "tgz" => "application/gzip",
        "bz2" => "application/x-bzip2",
        "xz" => "application/x-xz",
        "tar" => "application/x-tar",
        "7z" => "application/x-7z-compressed",
        "rar" => "application/vnd.rar",
        "jar" => "application/java-archive",
        "apk" => "application/vnd.android.package-archive",
        "dmg" => "application/x-apple-diskimage",
        "iso" => "application/x-iso9660-image",
        "exe" | "dll" => "application/x-msdownload",
        "sh" => "application/x-sh",
        "bin" => "application/octet-stream",
        _ => return None,
    };
    Some(content_type)
}
