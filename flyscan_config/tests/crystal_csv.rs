use std::fs::File;
use std::io::Write;

use flyscan_config::{Crystal, CrystalRow, load_crystal_csv};
use rstest::rstest;
use tempfile::tempdir;

fn write_csv(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("crystals.csv");
    let mut f = File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    (dir, path)
}

#[rstest]
fn loads_rows_in_order() {
    let (_dir, path) = write_csv("crystal,d_spacing_angstrom\nSi(111),3.13555\nGe(111),3.26627\n");
    let rows = load_crystal_csv(&path).unwrap();
    assert_eq!(
        rows,
        vec![
            CrystalRow {
                crystal: "Si(111)".into(),
                d_spacing_angstrom: 3.13555
            },
            CrystalRow {
                crystal: "Ge(111)".into(),
                d_spacing_angstrom: 3.26627
            },
        ]
    );
}

#[rstest]
#[case("name,d\nSi(111),3.1\n", "must have headers")]
#[case("crystal,d_spacing_angstrom\nSi(111),abc\n", "invalid CSV row 2")]
#[case("crystal,d_spacing_angstrom\nSi(111),-3.1\n", "must be > 0")]
#[case("crystal,d_spacing_angstrom\nSi(111),3.1\nsi111,3.2\n", "duplicate crystal")]
#[case("crystal,d_spacing_angstrom\n", "has no rows")]
fn rejects_malformed_tables(#[case] contents: &str, #[case] needle: &str) {
    let (_dir, path) = write_csv(contents);
    let err = load_crystal_csv(&path).expect_err("should fail");
    assert!(
        format!("{err}").contains(needle),
        "error '{err}' should mention '{needle}'"
    );
}

#[rstest]
fn missing_file_is_an_error() {
    let dir = tempdir().unwrap();
    let err = load_crystal_csv(&dir.path().join("nope.csv")).unwrap_err();
    assert!(format!("{err}").contains("open crystal CSV"));
}

#[rstest]
fn crystal_resolves_through_table_before_presets() {
    let (_dir, path) = write_csv("crystal,d_spacing_angstrom\nSi(111),3.0\nGe(111),3.26627\n");
    let table = Some(path.to_string_lossy().into_owned());
    let si = Crystal {
        name: Some("Si(111)".into()),
        d_spacing_angstrom: None,
        table: table.clone(),
    };
    assert_eq!(si.d_spacing().unwrap(), 3.0);
    let si311 = Crystal {
        name: Some("Si(311)".into()),
        d_spacing_angstrom: None,
        table,
    };
    assert_eq!(si311.d_spacing().unwrap(), 1.635);
}
