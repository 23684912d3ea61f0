//! End-to-end pipeline laws over a real temp tree and catalog: scan, derive
//! path dates, plan, and check the resulting placements. The metadata stage
//! needs the external tool and keeps to its own unit tests; the selective
//! pipeline is complete without it.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use photark::config::{PlannerConfig, ScannerConfig};
use photark::db::Database;
use photark::pathdate::PathDateExtractor;
use photark::planner::{path_builder, Planner};
use photark::scanner::{ScanOutcome, Scanner};

fn write_file(path: &Path, bytes: usize) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut f = File::create(path).unwrap();
    f.write_all(&vec![0u8; bytes]).unwrap();
}

fn build_archive(root: &Path) {
    write_file(&root.join("photos/2023_05_14_a7iv/IMG_001.arw"), 2048);
    write_file(&root.join("photos/2023_05_14_a7iv/IMG_001.xmp"), 64);
    write_file(&root.join("photos/2023_05_14_a7iv/raws/IMG_002.arw"), 2048);
    write_file(&root.join("dump/IMG_20230101.jpg"), 512);
    write_file(&root.join("dump/IMG_20230601.jpg"), 512);
    write_file(&root.join("docs/readme.txt"), 16);
    write_file(&root.join("x/20230514/IMG.jpg"), 512);
    write_file(&root.join("y/20230514/IMG.jpg"), 512);
}

fn scan(db: &Database, root: &Path) -> i64 {
    let scanner = Scanner::new(db, ScannerConfig::default(), Arc::new(AtomicBool::new(false)));
    match scanner.scan(root, "itest-uuid", false).unwrap() {
        ScanOutcome::Completed(_) => {}
        other => panic!("scan did not complete: {other:?}"),
    }
    db.find_latest_session().unwrap().unwrap().id
}

fn inventory(db: &Database, session: i64) -> Vec<(String, i64)> {
    let mut stmt = db
        .conn
        .prepare(
            "SELECT source_path, size FROM files WHERE scan_session_id = ?
             ORDER BY source_path",
        )
        .unwrap();
    stmt.query_map([session], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
}

fn target_of(db: &Database, source_path: &str) -> String {
    db.conn
        .query_row(
            "SELECT target_path FROM file_plan WHERE source_path = ?",
            [source_path],
            |row| row.get(0),
        )
        .unwrap()
}

#[test]
fn full_pipeline_places_every_file() {
    let dir = tempfile::tempdir().unwrap();
    build_archive(dir.path());
    let db_file = tempfile::NamedTempFile::new().unwrap();
    let db = Database::open(db_file.path()).unwrap();

    let session = scan(&db, dir.path());
    assert_eq!(inventory(&db, session).len(), 8);

    PathDateExtractor::new(&db, 1000).extract_all(false).unwrap();

    // The dated folder name feeds all three of its files.
    let folder_dates: Vec<Option<i64>> = {
        let mut stmt = db
            .conn
            .prepare(
                "SELECT date_path_folder FROM files
                 WHERE source_path LIKE 'photos/2023_05_14_a7iv/%'
                 ORDER BY source_path",
            )
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    };
    assert_eq!(folder_dates, vec![Some(20230514); 3]);

    let stats = Planner::new(
        &db,
        PlannerConfig::default(),
        Arc::new(AtomicBool::new(false)),
    )
    .plan(session)
    .unwrap();
    assert_eq!(stats.files_planned, 8);
    assert_eq!(stats.sidecars, 1);
    assert_eq!(stats.potential_duplicates, 1);

    // Annotated canonical target from the folder-name date.
    assert_eq!(
        target_of(&db, "photos/2023_05_14_a7iv/IMG_001.arw"),
        "2023/2023_05/20230514-a7iv/IMG_001.arw"
    );
    // The raws subfolder carries the same folder-name date (it is on its
    // path too), so it resolves by path date and merges into the same
    // target; the distinct filename survives unrenamed.
    assert_eq!(
        target_of(&db, "photos/2023_05_14_a7iv/raws/IMG_002.arw"),
        "2023/2023_05/20230514-a7iv/IMG_002.arw"
    );
    // Wide date spread goes to the bucket with structure preserved.
    assert_eq!(
        target_of(&db, "dump/IMG_20230101.jpg"),
        "_mixed_dates/dump/IMG_20230101.jpg"
    );
    // No images at all goes to _non_media.
    assert_eq!(
        target_of(&db, "docs/readme.txt"),
        "_non_media/docs/readme.txt"
    );
    // Cross-folder collision on one target: first keeps its name, the
    // second is renamed with its source folder's hash.
    assert_eq!(
        target_of(&db, "x/20230514/IMG.jpg"),
        "2023/2023_05/20230514/IMG.jpg"
    );
    let hash = path_builder::short_hash("y/20230514", 6);
    assert_eq!(
        target_of(&db, "y/20230514/IMG.jpg"),
        format!("2023/2023_05/20230514/pot_dupe_{hash}_IMG.jpg")
    );
}

#[test]
fn rescanning_an_unchanged_tree_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    build_archive(dir.path());
    let db_file = tempfile::NamedTempFile::new().unwrap();
    let db = Database::open(db_file.path()).unwrap();

    let first_session = scan(&db, dir.path());
    let first = inventory(&db, first_session);

    let second_session = scan(&db, dir.path());
    let second = inventory(&db, second_session);

    assert_ne!(first_session, second_session);
    assert_eq!(first, second);
}

#[test]
fn path_date_round_trip_through_the_catalog() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("2023/05/14/photo.jpg"), 128);
    let db_file = tempfile::NamedTempFile::new().unwrap();
    let db = Database::open(db_file.path()).unwrap();

    scan(&db, dir.path());
    PathDateExtractor::new(&db, 1000).extract_all(false).unwrap();

    let (date, source): (Option<i64>, Option<String>) = db
        .conn
        .query_row(
            "SELECT date_path_hierarchy, date_path_hierarchy_source FROM files
             WHERE source_path = '2023/05/14/photo.jpg'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(date, Some(20230514));
    assert_eq!(source.as_deref(), Some("2023/05/14"));
}

#[test]
fn replanning_with_same_inputs_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    build_archive(dir.path());
    let db_file = tempfile::NamedTempFile::new().unwrap();
    let db = Database::open(db_file.path()).unwrap();

    let session = scan(&db, dir.path());
    PathDateExtractor::new(&db, 1000).extract_all(false).unwrap();

    let snapshot = |db: &Database| -> Vec<(String, String, bool, bool)> {
        let mut stmt = db
            .conn
            .prepare(
                "SELECT source_path, target_path, is_potential_duplicate, is_sidecar
                 FROM file_plan ORDER BY source_path",
            )
            .unwrap();
        stmt.query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
    };

    let planner = || {
        Planner::new(
            &db,
            PlannerConfig::default(),
            Arc::new(AtomicBool::new(false)),
        )
    };
    planner().plan(session).unwrap();
    let first = snapshot(&db);
    planner().plan(session).unwrap();
    let second = snapshot(&db);

    assert_eq!(first, second);
    assert_eq!(first.len(), 8);
}
