//! Helpers for interpreting client-declared upload file names.

/// Extensions the generator accepts for depth maps and patterns.
pub const SUPPORTED_IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpeg", "bmp", "eps", "gif", "jpg", "im", "msp", "pcx", "ppm", "spider", "tiff", "webp",
    "xbm",
];

/// Last path component of a declared name, treating both `/` and `\` as separators.
pub fn base_name(declared: &str) -> &str {
    declared
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(declared)
        .trim()
}

/// Lowercased extension of the declared base name, if it is purely alphanumeric.
pub fn extension(declared: &str) -> Option<String> {
    let base = base_name(declared);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Base name without its extension.
pub fn stem(declared: &str) -> &str {
    let base = base_name(declared);
    match (base.rsplit_once('.'), extension(declared)) {
        (Some((stem, _)), Some(_)) => stem,
        _ => base,
    }
}

pub fn is_supported_image(declared: &str) -> bool {
    extension(declared)
        .is_some_and(|ext| SUPPORTED_IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_name_drops_directories_of_either_flavour() {
        assert_eq!(base_name("../../etc/passwd"), "passwd");
        assert_eq!(base_name("C:\\Users\\me\\shark.png"), "shark.png");
        assert_eq!(base_name("shark.png"), "shark.png");
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(extension("Shark.PNG").as_deref(), Some("png"));
        assert_eq!(extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(extension(".hidden"), None);
        assert_eq!(extension("noext"), None);
        assert_eq!(extension("weird.p g"), None);
    }

    #[test]
    fn stem_keeps_everything_before_the_extension() {
        assert_eq!(stem("dir/my.shark.png"), "my.shark");
        assert_eq!(stem("noext"), "noext");
    }

    #[test]
    fn supported_images_are_case_insensitive() {
        assert!(is_supported_image("depth.JPG"));
        assert!(is_supported_image("pattern.webp"));
        assert!(!is_supported_image("script.sh"));
        assert!(!is_supported_image("png"));
    }
}
