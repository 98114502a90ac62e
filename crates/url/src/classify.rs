//! Copy-shape classification (spec.md §4.1).
//!
//! Pure, I/O-free decision logic: given what a prior `Stat` already told
//! the caller about the source(s) and target, decide which of shapes
//! A/B/C/D applies, or reject the tuple outright. The actual directory
//! walk for shape C (producing one `Shape::A` pair per discovered file)
//! is the planner's job in `haul-transfer`, which owns the backend
//! handles needed to enumerate; this module only decides the letter and
//! provides the two pure helpers (`target_for_shape_b`,
//! `recursive_target`) that the planner uses once it has a directory
//! listing in hand.

use crate::Url;
use crate::error::{ErrorKind, Result};

/// What a `Stat` call told us about an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Regular,
    Directory,
}

/// A source address plus what the classifier needs to know about it.
#[derive(Debug, Clone)]
pub struct SourceSpec {
    pub url: Url,
    /// Set if the user suffixed the raw address with `...`, or passed
    /// `--recursive`.
    pub recursive: bool,
    pub kind: Kind,
}

/// The single target address plus what `Stat` told us (`None` if it does
/// not exist yet).
#[derive(Debug, Clone)]
pub struct TargetSpec {
    pub url: Url,
    pub kind: Option<Kind>,
}

/// The copy shape a `(sources, target)` tuple reduces to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// One source, source is regular, target not a directory: `copy(f, f)`.
    A,
    /// One source, source is regular, target is an existing directory:
    /// `copy(f, d/basename(f))`, which itself reduces to A.
    B,
    /// One source, recursive flag set or source is a directory, target is
    /// a directory: every regular file under source reduces to A.
    C,
    /// Multiple sources, target is a directory: each source reduces to B
    /// or C.
    D,
}

/// Classify a `(sources, target)` tuple. Total and stable: every valid
/// tuple yields a `Shape`, every invalid tuple yields a typed
/// [`ErrorKind`], and equal inputs always yield equal outputs.
pub fn classify(sources: &[SourceSpec], target: &TargetSpec) -> Result<Shape> {
    if sources.is_empty() {
        exn::bail!(ErrorKind::SourceListEmpty);
    }
    if target.url.path.is_empty() && target.url.host.is_empty() {
        exn::bail!(ErrorKind::InvalidTarget(target.url.to_display_string()));
    }
    for source in sources {
        if source.url == target.url {
            exn::bail!(ErrorKind::SourceTargetSame);
        }
    }

    if sources.len() > 1 {
        return match target.kind {
            Some(Kind::Directory) => Ok(Shape::D),
            Some(Kind::Regular) => exn::bail!(ErrorKind::TargetIsNotDir),
            None => exn::bail!(ErrorKind::TargetNotFound),
        };
    }

    let source = &sources[0];
    match (source.kind, source.recursive, target.kind) {
        (Kind::Directory, _, Some(Kind::Directory)) => Ok(Shape::C),
        (Kind::Directory, _, Some(Kind::Regular)) => exn::bail!(ErrorKind::SourceIsDir),
        (Kind::Directory, _, None) => exn::bail!(ErrorKind::TargetNotFound),
        (Kind::Regular, true, Some(Kind::Directory)) => Ok(Shape::C),
        (Kind::Regular, _, Some(Kind::Directory)) => Ok(Shape::B),
        (Kind::Regular, _, Some(Kind::Regular)) => Ok(Shape::A),
        (Kind::Regular, _, None) => Ok(Shape::A),
    }
}

/// Shape B expansion: `copy(f, d/basename(f))`, reducing to shape A.
pub fn target_for_shape_b(source: &Url, target_dir: &Url) -> Result<Url> {
    target_dir.join(source.basename())
}

/// Shape C expansion for a single discovered file.
///
/// Given source root `S/` and target root `T/`, and a path `relative`
/// discovered under `S` (already stripped of the `S/` prefix), the
/// planned target is exactly `T/relative` — the source root's own
/// basename is never re-inserted under the target. Applying this twice
/// with the same `relative` is idempotent (it always recomputes the same
/// `Url`, it does not accumulate path segments).
pub fn recursive_target(target_root: &Url, relative: &str) -> Result<Url> {
    target_root.join(relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn file(path: &str) -> Url {
        Url::parse_file(path).unwrap()
    }

    #[rstest]
    // Shape A: single regular source, non-directory target.
    #[case(vec![(("/a.bin"), false, Kind::Regular)], "/b.bin", Some(Kind::Regular), Ok(Shape::A))]
    #[case(vec![(("/a.bin"), false, Kind::Regular)], "/new.bin", None, Ok(Shape::A))]
    // Shape B: single regular source, existing directory target.
    #[case(vec![(("/a.bin"), false, Kind::Regular)], "/dir/", Some(Kind::Directory), Ok(Shape::B))]
    // Shape C: directory source (or recursive flag), directory target.
    #[case(vec![(("/src"), false, Kind::Directory)], "/dst/", Some(Kind::Directory), Ok(Shape::C))]
    #[case(vec![(("/a.bin"), true, Kind::Regular)], "/dst/", Some(Kind::Directory), Ok(Shape::C))]
    fn single_source_shapes(
        #[case] sources: Vec<(&str, bool, Kind)>,
        #[case] target: &str,
        #[case] target_kind: Option<Kind>,
        #[case] expected: Result<Shape>,
    ) {
        let sources: Vec<SourceSpec> =
            sources.into_iter().map(|(p, r, k)| SourceSpec { url: file(p), recursive: r, kind: k }).collect();
        let target = TargetSpec { url: file(target), kind: target_kind };
        let result = classify(&sources, &target);
        match expected {
            Ok(shape) => assert_eq!(result.unwrap(), shape),
            Err(_) => assert!(result.is_err()),
        }
    }

    #[test]
    fn shape_d_requires_directory_target() {
        let sources = vec![
            SourceSpec { url: file("/a.bin"), recursive: false, kind: Kind::Regular },
            SourceSpec { url: file("/b.bin"), recursive: false, kind: Kind::Regular },
        ];
        let target = TargetSpec { url: file("/dst/"), kind: Some(Kind::Directory) };
        assert_eq!(classify(&sources, &target).unwrap(), Shape::D);

        let bad_target = TargetSpec { url: file("/dst.bin"), kind: Some(Kind::Regular) };
        assert!(classify(&sources, &bad_target).is_err());
    }

    #[test]
    fn copy_directory_to_file_is_invalid() {
        let sources = vec![SourceSpec { url: file("/src"), recursive: false, kind: Kind::Directory }];
        let target = TargetSpec { url: file("/dst.bin"), kind: Some(Kind::Regular) };
        assert!(classify(&sources, &target).is_err());
    }

    #[test]
    fn empty_source_list_is_invalid() {
        let target = TargetSpec { url: file("/dst/"), kind: Some(Kind::Directory) };
        assert!(classify(&[], &target).is_err());
    }

    #[test]
    fn recursive_target_preserves_subpath_verbatim() {
        let target_root = Url::parse_http("https://s3.amazonaws.com/bucket/T").unwrap();
        let planned = recursive_target(&target_root, "a/b").unwrap();
        assert_eq!(planned.path, "/bucket/T/a/b");
        // idempotent: recomputing from the same inputs always yields the same URL.
        let planned_again = recursive_target(&target_root, "a/b").unwrap();
        assert_eq!(planned, planned_again);
    }

    #[test]
    fn target_for_shape_b_uses_source_basename() {
        let source = file("/tmp/src/file.txt");
        let target_dir = file("/tmp/dst/");
        let planned = target_for_shape_b(&source, &target_dir).unwrap();
        assert_eq!(planned.path, "/tmp/dst/file.txt");
    }
}
