//! Integration tests for command dispatch and exit codes.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use rstest::rstest;
use tempfile::TempDir;

use subclone_seeker::cli::commands::execute_command;
use subclone_seeker::cli::Cli;
use subclone_seeker::exitcode;
use subclone_seeker::util::testing::init_test_setup;

const PRIMARY: &str = r#"
name = "primary"

[root]
label = "founder"
events = [{ kind = "snv", chrom = "17", start = 7579472, end = 7579472 }]

[[root.children]]
label = "gain8"
events = [{ kind = "cnv", chrom = "8", start = 1000, end = 9000000 }]
"#;

const RELAPSE: &str = r#"
[root]
label = "r"
events = [{ kind = "snv", chrom = "17", start = 7579472, end = 7579472 }]

[[root.children]]
label = "r1"
events = [{ kind = "cnv", chrom = "8", start = 1000, end = 9000000 }]
"#;

const FOREIGN: &str = r#"
[root]
label = "x"
events = [{ kind = "sv", chrom = "9", start = 130000000, end = 130000000 }]
"#;

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("write tree document");
    path
}

fn run(args: &[&str]) -> Result<i32, i32> {
    let cli = Cli::try_parse_from(args).expect("valid command line");
    execute_command(&cli).map_err(|e| e.exit_code())
}

#[rstest]
#[case("relapse.toml", Ok(exitcode::OK))]
#[case("foreign.toml", Ok(exitcode::INCOMPATIBLE))]
#[case("missing.toml", Err(exitcode::NOINPUT))]
fn given_tree_pair_when_checking_then_exit_code(
    #[case] q_name: &str,
    #[case] expected: Result<i32, i32>,
) {
    init_test_setup();
    let dir = TempDir::new().unwrap();
    let p = write(dir.path(), "primary.toml", PRIMARY);
    write(dir.path(), "relapse.toml", RELAPSE);
    write(dir.path(), "foreign.toml", FOREIGN);
    let q = dir.path().join(q_name);

    let code = run(&[
        "treemerge",
        "-r",
        "1000",
        "check",
        p.to_str().unwrap(),
        q.to_str().unwrap(),
    ]);
    assert_eq!(code, expected);
}

#[test]
fn given_explain_flag_when_checking_incompatible_pair_then_still_incompatible() {
    init_test_setup();
    let dir = TempDir::new().unwrap();
    let p = write(dir.path(), "primary.toml", PRIMARY);
    let q = write(dir.path(), "foreign.toml", FOREIGN);

    let code = run(&[
        "treemerge",
        "check",
        "--explain",
        p.to_str().unwrap(),
        q.to_str().unwrap(),
    ]);
    assert_eq!(code, Ok(exitcode::INCOMPATIBLE));
}

#[test]
fn given_mistyped_database_when_listing_then_no_input_and_nothing_created() {
    init_test_setup();
    let dir = TempDir::new().unwrap();
    let typo = dir.path().join("typo.db");

    let code = run(&["treemerge", "list", "--db", typo.to_str().unwrap()]);
    assert_eq!(code, Err(exitcode::NOINPUT));
    assert!(!typo.exists());
}

#[test]
fn given_imported_documents_when_listing_then_ok() {
    init_test_setup();
    let dir = TempDir::new().unwrap();
    let p = write(dir.path(), "primary.toml", PRIMARY);
    let db = dir.path().join("trees.db");

    let imported = run(&[
        "treemerge",
        "import",
        p.to_str().unwrap(),
        "--db",
        db.to_str().unwrap(),
    ]);
    assert_eq!(imported, Ok(exitcode::OK));
    assert_eq!(
        run(&["treemerge", "list", "--db", db.to_str().unwrap()]),
        Ok(exitcode::OK)
    );
}
