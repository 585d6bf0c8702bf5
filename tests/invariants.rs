use std::collections::HashSet;
use std::fs;
use std::path::Path;

use eegsplit::catalog::{hour_bucket, segment_number};
use eegsplit::manifest::read_manifest;
use eegsplit::{
    DataRoots, HourBucket, Indexer, IndexerConfig, ManifestRow, PolicyConfig, RepeatScale,
    SetName,
};
use tempfile::tempdir;

const ELECTRODES: [u32; 2] = [0, 5];

/// Subject 1 with 48 negative and 24 positive segments; every fifth negative is unsafe.
fn write_subject(base: &Path) {
    let train = base.join("train_1");
    fs::create_dir_all(&train).unwrap();
    let mut registry = String::from("image,class,safe\n");
    let segments = (1..=48u32).map(|seg| (seg, 0)).chain((1..=24u32).map(|seg| (seg, 1)));
    for (seg, label) in segments {
        for electrode in ELECTRODES {
            fs::write(train.join(format!("1_{seg}_{label}.{electrode}.wav")), b"pcm").unwrap();
        }
        let safe = if label == 0 && seg % 5 == 0 { 0 } else { 1 };
        registry.push_str(&format!("1_{seg}_{label}.mat,{label},{safe}\n"));
    }
    fs::write(base.join("train_and_test_data_labels_safe.csv"), registry).unwrap();
}

fn config(base: &Path) -> IndexerConfig {
    IndexerConfig::new(DataRoots::from_train_root(base.join("train_1")), 1).with_seed(17)
}

fn hours(rows: &[ManifestRow]) -> HashSet<HourBucket> {
    rows.iter()
        .map(|row| hour_bucket(segment_number(&row.file_name).unwrap()))
        .collect()
}

fn distinct(rows: &[ManifestRow]) -> HashSet<&str> {
    rows.iter().map(|row| row.file_name.as_str()).collect()
}

#[test]
fn same_seed_yields_identical_manifests_across_runs() {
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    write_subject(first.path());
    write_subject(second.path());

    let first_path = Indexer::new(config(first.path())).unwrap().index_for(0).unwrap();
    let second_path = Indexer::new(config(second.path())).unwrap().index_for(0).unwrap();
    assert_eq!(
        fs::read(first_path).unwrap(),
        fs::read(second_path).unwrap()
    );
}

#[test]
fn uniform_split_never_shares_an_hour_and_covers_every_safe_file() {
    let temp = tempdir().unwrap();
    write_subject(temp.path());
    let indexer = Indexer::new(config(temp.path())).unwrap();

    for electrode in ELECTRODES {
        let train = indexer.manifest_rows(electrode, SetName::Tain).unwrap();
        let eval = indexer.manifest_rows(electrode, SetName::Eval).unwrap();
        assert!(hours(&train).is_disjoint(&hours(&eval)));

        let train_files = distinct(&train);
        let eval_files = distinct(&eval);
        assert!(train_files.is_disjoint(&eval_files));
        // 72 segments minus 9 unsafe negatives
        assert_eq!(train_files.len() + eval_files.len(), 63);
        assert_eq!(train.len(), train_files.len(), "uniform split never repeats");
    }
}

#[test]
fn hour_assignment_agrees_across_electrodes() {
    let temp = tempdir().unwrap();
    write_subject(temp.path());
    let indexer = Indexer::new(config(temp.path())).unwrap();
    let left = hours(&indexer.manifest_rows(0, SetName::Tain).unwrap());
    let right = hours(&indexer.manifest_rows(5, SetName::Tain).unwrap());
    assert_eq!(left, right);
}

#[test]
fn unsafe_segments_are_absent_from_every_set() {
    let temp = tempdir().unwrap();
    write_subject(temp.path());
    let indexer = Indexer::new(config(temp.path())).unwrap();
    for set in [SetName::Tain, SetName::Eval, SetName::Full] {
        let rows = indexer.manifest_rows(0, set).unwrap();
        assert!(
            rows.iter().all(|row| {
                let seg = segment_number(&row.file_name).unwrap();
                !(row.label == 0 && seg % 5 == 0)
            }),
            "{set} leaked an unsafe recording"
        );
    }
}

#[test]
fn oversampling_validation_sets_hold_each_file_once() {
    let temp = tempdir().unwrap();
    write_subject(temp.path());
    let indexer = Indexer::new(config(temp.path()).with_policy(
        PolicyConfig::ClassBalancedOversample {
            repeat_scale: RepeatScale::Uniform(3.0),
        },
    ))
    .unwrap();

    let train = indexer.manifest_rows(0, SetName::Tain).unwrap();
    let eval = indexer.manifest_rows(0, SetName::Eval).unwrap();
    assert_eq!(eval.len(), distinct(&eval).len());
    assert!(distinct(&train).is_disjoint(&distinct(&eval)));
    assert!(train.len() > distinct(&train).len());

    let path = indexer.index_for(0).unwrap();
    assert_eq!(read_manifest(&path).unwrap(), train);
}
