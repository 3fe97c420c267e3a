use proptest::prelude::*;

use remotewatch::observe::normalize_path;

#[test]
fn leading_slash_is_added_and_trailing_slash_removed() {
    assert_eq!(normalize_path("foo/bar/"), "/foo/bar");
    assert_eq!(normalize_path("/foo/bar"), "/foo/bar");
    assert_eq!(normalize_path("foo"), "/foo");
    assert_eq!(normalize_path("/foo/"), "/foo");
}

#[test]
fn root_normalizes_to_empty_string() {
    assert_eq!(normalize_path("/"), "");
    assert_eq!(normalize_path(""), "");
}

#[test]
fn only_one_trailing_slash_is_stripped() {
    assert_eq!(normalize_path("/foo//"), "/foo/");
}

#[test]
fn interior_characters_are_untouched() {
    assert_eq!(normalize_path("Camera Uploads/2024"), "/Camera Uploads/2024");
    assert_eq!(normalize_path("/a//b"), "/a//b");
}

proptest! {
    #[test]
    fn spellings_with_and_without_slashes_agree(segment in "[A-Za-z0-9 _.-]{1,12}(/[A-Za-z0-9 _.-]{1,12}){0,3}") {
        let expected = format!("/{segment}");
        prop_assert_eq!(normalize_path(&segment), expected.clone());
        prop_assert_eq!(normalize_path(&format!("/{segment}")), expected.clone());
        prop_assert_eq!(normalize_path(&format!("{segment}/")), expected.clone());
        prop_assert_eq!(normalize_path(&format!("/{segment}/")), expected);
    }

    #[test]
    fn normalizing_twice_is_stable_for_single_trailing_slash(segment in "[a-z]{1,8}(/[a-z]{1,8}){0,3}/?") {
        let once = normalize_path(&segment);
        prop_assert_eq!(normalize_path(&once), once.clone());
    }
}
