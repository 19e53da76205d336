pub mod encoding;
pub mod image_processor;

use std::path::Path;

/// Reduce a client supplied filename to its last path component.
///
/// Multipart filenames are attacker controlled; anything that could walk out
/// of the storage area (`..`, absolute paths, backslash separators) is dropped.
pub fn sanitize_file_name(name: &str) -> String {
    let last = name.rsplit(&['/', '\\'][..]).next().unwrap_or_default();
    let cleaned = Path::new(last)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .trim();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "unnamed".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::sanitize_file_name;

    #[test]
    fn strips_directories() {
        assert_eq!(sanitize_file_name("cat.jpg"), "cat.jpg");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\photos\\dog.png"), "dog.png");
        assert_eq!(sanitize_file_name("/abs/path/x.webp"), "x.webp");
    }

    #[test]
    fn degenerate_names_get_a_placeholder() {
        assert_eq!(sanitize_file_name(""), "unnamed");
        assert_eq!(sanitize_file_name(".."), "unnamed");
        assert_eq!(sanitize_file_name("dir/"), "unnamed");
    }
}
