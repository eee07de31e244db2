mod common;

use camino::Utf8PathBuf;

use niche_harvest::batch::{BatchOrchestrator, NoopProgress};
use niche_harvest::cancel::CancelToken;
use niche_harvest::catalog::Catalog;
use niche_harvest::config::HarvestConfig;
use niche_harvest::domain::CategoryId;
use niche_harvest::store::Store;

#[test]
fn snapshot_round_trips_report() {
    let client = common::MockNiches::new()
        .page(1, 0, Ok(common::sample_page("a", 2)))
        .always_failing(2);
    let config = HarvestConfig {
        max_retries: 0,
        ..HarvestConfig::default()
    };
    let orchestrator = BatchOrchestrator::new(&client, &config).unwrap();
    let report = orchestrator
        .run(
            &[CategoryId::new(1), CategoryId::new(2)],
            &CancelToken::new(),
            &NoopProgress,
        )
        .unwrap();

    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().join("out")).unwrap();
    let store = Store::new_with_root(root);
    let catalog = Catalog::from_records(&report.records);
    let paths = store.write_snapshot(&report, &catalog).unwrap();

    let restored = Store::read_report(&Utf8PathBuf::from(paths.report)).unwrap();
    assert_eq!(restored.records, report.records);
    assert_eq!(restored.failures, report.failures);
    assert_eq!(restored.record_counts, report.record_counts);
    assert!(std::path::Path::new(&paths.catalog).exists());
    // Sample rows lack the export's columns, so every record is skipped.
    assert_eq!(catalog.skipped.len(), 2);
}
