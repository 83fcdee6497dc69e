//! Tests for identity generation and path sanitization.

use attache_storage::{
    MAX_BASE_LEN, generate_identity, sanitize_base, sanitize_extension, sanitize_relative_path,
};
use std::collections::HashSet;

#[test]
fn test_ten_thousand_identities_are_distinct() {
    let ids: HashSet<String> = (0..10_000).map(|_| generate_identity("photo.png")).collect();
    assert_eq!(ids.len(), 10_000);
}

#[test]
fn test_identity_shape() {
    let id = generate_identity("photo.png");
    let stem = id.strip_suffix(".png").unwrap();
    let parts: Vec<&str> = stem.rsplitn(3, '_').collect();

    assert_eq!(parts.len(), 3);
    assert_eq!(parts[2], "photo");
    assert!(parts[1].parse::<i64>().is_ok());
    assert_eq!(parts[0].len(), 32);
    assert!(parts[0].chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_identity_without_extension() {
    let id = generate_identity("README");
    assert!(id.starts_with("README_"));
    assert!(!id.contains('.'));
}

#[test]
fn test_sanitize_base() {
    assert_eq!(sanitize_base("photo.png"), "photo");
    assert_eq!(sanitize_base("my vacation pic!!.jpeg"), "my_vacation_pic");
    assert_eq!(sanitize_base("C:\\Users\\me\\résumé final.pdf"), "r_sum_final");
    assert_eq!(sanitize_base("../../etc/passwd"), "passwd");
    assert_eq!(sanitize_base(".bashrc"), "bashrc");
    assert_eq!(sanitize_base("???.png"), "file");
    assert_eq!(sanitize_base(""), "file");
}

#[test]
fn test_sanitize_base_is_bounded() {
    let long = format!("{}.txt", "a".repeat(500));
    assert_eq!(sanitize_base(&long).len(), MAX_BASE_LEN);
}

#[test]
fn test_sanitize_extension() {
    assert_eq!(sanitize_extension("photo.PNG").as_deref(), Some("png"));
    assert_eq!(sanitize_extension("archive.tar.gz").as_deref(), Some("gz"));
    assert_eq!(sanitize_extension("noext"), None);
    assert_eq!(sanitize_extension(".hidden"), None);
    assert_eq!(sanitize_extension("weird.p$g"), None);
    assert_eq!(sanitize_extension("long.abcdefghijk"), None);
}

#[test]
fn test_sanitize_relative_path() {
    assert_eq!(sanitize_relative_path("").unwrap(), "");
    assert_eq!(sanitize_relative_path("issues/42").unwrap(), "issues/42");
    assert_eq!(sanitize_relative_path("./issues//42/").unwrap(), "issues/42");
    assert_eq!(sanitize_relative_path("issues\\42").unwrap(), "issues/42");

    assert!(sanitize_relative_path("/etc").is_err());
    assert!(sanitize_relative_path("a/../../b").is_err());
    assert!(sanitize_relative_path("a/.git").is_err());
    assert!(sanitize_relative_path("a b").is_err());
    assert!(sanitize_relative_path("C:stuff").is_err());
}
