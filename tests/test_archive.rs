// tests/test_archive.rs
//
// Archive building: entry naming, exclusion, size accounting and failure modes.

mod common;

use std::fs::File;

use anyhow::Result;
use s3manager::Error;
use s3manager::archive::create_archive;
use tempfile::TempDir;

fn entry_names(path: &std::path::Path) -> Result<Vec<String>> {
    let zip = zip::ZipArchive::new(File::open(path)?)?;
    let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
    names.sort();
    Ok(names)
}

#[test]
fn directory_entries_keep_top_level_name() -> Result<()> {
    let tree = common::Tree::new();
    let out = TempDir::new()?;
    let archive = out.path().join("a.zip");

    let none: [&str; 0] = [];
    let info = create_archive(&[tree.project(), tree.notes()], &archive, &none)?;

    assert_eq!(
        entry_names(&archive)?,
        vec![
            "notes.txt",
            "project/README.md",
            "project/src/main.rs",
            "project/target/app.bin",
        ]
    );
    assert_eq!(info.entries, 4);
    assert_eq!(info.original_size, 5 + 12 + 1000 + 2);
    assert_eq!(info.compressed_size, std::fs::metadata(&archive)?.len());
    assert!(info.compression_ratio > 0.0);
    assert_eq!(info.original_paths.len(), 2);
    Ok(())
}

#[test]
fn exclusions_skip_files_and_whole_directories() -> Result<()> {
    let tree = common::Tree::new();
    let out = TempDir::new()?;
    let archive = out.path().join("b.zip");

    let info = create_archive(&[tree.project()], &archive, &["target", "*.md"])?;

    assert_eq!(entry_names(&archive)?, vec!["project/src/main.rs"]);
    assert_eq!(info.original_size, 12);
    Ok(())
}

#[test]
fn contents_survive_the_round_trip() -> Result<()> {
    let tree = common::Tree::new();
    let out = TempDir::new()?;
    let archive = out.path().join("c.zip");
    create_archive(&[tree.project()], &archive, &["target"])?;

    let mut zip = zip::ZipArchive::new(File::open(&archive)?)?;
    let mut body = String::new();
    std::io::Read::read_to_string(&mut zip.by_name("project/src/main.rs")?, &mut body)?;
    assert_eq!(body, "fn main() {}");
    Ok(())
}

#[test]
fn empty_selection_has_zero_ratio() -> Result<()> {
    let tree = common::Tree::new();
    let out = TempDir::new()?;
    let archive = out.path().join("d.zip");

    let info = create_archive(&[tree.project()], &archive, &["project"])?;
    assert_eq!(info.entries, 0);
    assert_eq!(info.original_size, 0);
    assert_eq!(info.compression_ratio, 0.0);
    Ok(())
}

#[test]
fn missing_source_and_bad_pattern_fail() -> Result<()> {
    let tree = common::Tree::new();
    let out = TempDir::new()?;
    let archive = out.path().join("e.zip");

    let none: [&str; 0] = [];
    let err = create_archive(&[tree.dir.path().join("missing")], &archive, &none).unwrap_err();
    assert!(matches!(err, Error::ArchiveCreationFailed { .. }), "{err:?}");
    assert!(err.to_string().contains("missing"), "{err}");

    let err = create_archive(&[tree.project()], &archive, &["[unclosed"]).unwrap_err();
    assert!(matches!(err, Error::ArchiveCreationFailed { .. }), "{err:?}");
    Ok(())
}
