//! Command-surface path handling: input validation and output derivation.
//!
//! Kept in the library (rather than the binary) so the rules are unit
//! testable without spawning a process: existence before extension, and
//! collision-avoidance numbering for the default output name.

use crate::error::PdfmarkError;
use std::path::{Path, PathBuf};

/// Validate the input path: must exist and carry a `.pdf` extension
/// (case-insensitive). Relative paths resolve against the current
/// directory; the returned path is absolute.
pub fn validate_input(path: &Path) -> Result<PathBuf, PdfmarkError> {
    let path = absolutize(path)?;

    if !path.exists() {
        return Err(PdfmarkError::FileNotFound { path });
    }

    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if !is_pdf {
        return Err(PdfmarkError::NotAPdf { path });
    }

    Ok(path)
}

/// Derive the output path.
///
/// An explicit override wins as-is (resolved against the current
/// directory when relative). Otherwise the default is the input's
/// directory and stem with a `.md` extension; if that file already
/// exists, `stem-1.md`, `stem-2.md`, … are tried until a free name is
/// found, so a second run never overwrites the first.
pub fn resolve_output(input: &Path, explicit: Option<&Path>) -> Result<PathBuf, PdfmarkError> {
    if let Some(p) = explicit {
        return absolutize(p);
    }

    let base = input.with_extension("md");
    if !base.exists() {
        return Ok(base);
    }

    let dir = input.parent().unwrap_or(Path::new("."));
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());

    let free = (1u32..)
        .map(|n| dir.join(format!("{stem}-{n}.md")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(base);
    Ok(free)
}

fn absolutize(path: &Path) -> Result<PathBuf, PdfmarkError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir()
        .map_err(|e| PdfmarkError::Internal(format!("current dir: {e}")))?;
    Ok(cwd.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let err = validate_input(Path::new("/no/such/file.pdf")).unwrap_err();
        assert!(matches!(err, PdfmarkError::FileNotFound { .. }));
        assert!(err.to_string().contains("File not found"));
    }

    #[test]
    fn wrong_extension_is_not_a_pdf() {
        let dir = tempfile::tempdir().expect("tempdir");
        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, "plain text").expect("write");

        let err = validate_input(&txt).unwrap_err();
        assert!(matches!(err, PdfmarkError::NotAPdf { .. }));
        assert!(err.to_string().contains("Not a PDF"));
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        let dir = tempfile::tempdir().expect("tempdir");
        let upper = dir.path().join("REPORT.PDF");
        std::fs::write(&upper, "%PDF-1.4").expect("write");
        assert!(validate_input(&upper).is_ok());
    }

    #[test]
    fn default_output_swaps_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("report.pdf");
        let out = resolve_output(&input, None).expect("resolve");
        assert_eq!(out, dir.path().join("report.md"));
    }

    #[test]
    fn collision_appends_counter() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("report.pdf");

        std::fs::write(dir.path().join("report.md"), "first run").expect("write");
        let second = resolve_output(&input, None).expect("resolve");
        assert_eq!(second, dir.path().join("report-1.md"));

        std::fs::write(&second, "second run").expect("write");
        let third = resolve_output(&input, None).expect("resolve");
        assert_eq!(third, dir.path().join("report-2.md"));
    }

    #[test]
    fn explicit_override_wins_even_when_it_exists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("report.pdf");
        let target = dir.path().join("custom.md");
        std::fs::write(&target, "existing").expect("write");

        let out = resolve_output(&input, Some(&target)).expect("resolve");
        assert_eq!(out, target);
    }
}
