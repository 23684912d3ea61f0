//! Sidecar detection.
//!
//! A sidecar is a small auxiliary file (XMP edits, Canon THM thumbnails,
//! Apple AAE edits, JSON/XML metadata) whose base name matches a sibling
//! image or video. The counterpart set is wider than the image set used for
//! date statistics: THM pairs with MOV, GoPro writes JSON beside MP4. The
//! flag is informational; sidecars keep their target assignment so they
//! travel with their counterpart.

/// Minimal view of a sibling file for sidecar matching.
#[derive(Debug, Clone)]
pub struct SiblingFile {
    pub filename_base: String,
    pub extension: Option<String>,
}

pub fn detect_sidecar(
    filename_base: &str,
    extension: Option<&str>,
    siblings: &[SiblingFile],
    sidecar_extensions: &[String],
    media_extensions: &[String],
) -> bool {
    let Some(ext) = extension else {
        return false;
    };
    if !sidecar_extensions.iter().any(|e| e == ext) {
        return false;
    }

    siblings.iter().any(|other| {
        if other.filename_base != filename_base {
            return false;
        }
        match other.extension.as_deref() {
            // The file itself is not its own counterpart.
            Some(other_ext) if other_ext == ext => false,
            Some(other_ext) => media_extensions.iter().any(|e| e == other_ext),
            None => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sibling(base: &str, ext: Option<&str>) -> SiblingFile {
        SiblingFile {
            filename_base: base.to_string(),
            extension: ext.map(|e| e.to_string()),
        }
    }

    fn sidecar_exts() -> Vec<String> {
        ["xmp", "json", "xml", "thm", "aae"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn media_exts() -> Vec<String> {
        ["arw", "jpg", "jpeg", "png", "mov", "mp4"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn xmp_beside_matching_raw_is_a_sidecar() {
        let siblings = [sibling("IMG_001", Some("arw")), sibling("IMG_001", Some("xmp"))];
        assert!(detect_sidecar(
            "IMG_001",
            Some("xmp"),
            &siblings,
            &sidecar_exts(),
            &media_exts()
        ));
    }

    #[test]
    fn thm_beside_matching_video_is_a_sidecar() {
        let siblings = [sibling("MVI_0042", Some("mov")), sibling("MVI_0042", Some("thm"))];
        assert!(detect_sidecar(
            "MVI_0042",
            Some("thm"),
            &siblings,
            &sidecar_exts(),
            &media_exts()
        ));
    }

    #[test]
    fn xmp_without_matching_counterpart_is_not() {
        let siblings = [sibling("OTHER", Some("arw")), sibling("IMG_001", Some("xmp"))];
        assert!(!detect_sidecar(
            "IMG_001",
            Some("xmp"),
            &siblings,
            &sidecar_exts(),
            &media_exts()
        ));
    }

    #[test]
    fn media_extension_is_never_a_sidecar() {
        let siblings = [sibling("IMG_001", Some("arw")), sibling("IMG_001", Some("jpg"))];
        assert!(!detect_sidecar(
            "IMG_001",
            Some("jpg"),
            &siblings,
            &sidecar_exts(),
            &media_exts()
        ));
    }

    #[test]
    fn matching_base_with_non_media_extension_does_not_qualify() {
        let siblings = [sibling("IMG_001", Some("txt")), sibling("IMG_001", Some("xmp"))];
        assert!(!detect_sidecar(
            "IMG_001",
            Some("xmp"),
            &siblings,
            &sidecar_exts(),
            &media_exts()
        ));
    }

    #[test]
    fn extensionless_files_are_ignored() {
        let siblings = [sibling("IMG_001", None)];
        assert!(!detect_sidecar(
            "IMG_001",
            None,
            &siblings,
            &sidecar_exts(),
            &media_exts()
        ));
    }
}
