//! End-to-end uploads from on-disk datasets.

use dbhandler_core::{Backend, OpenMode, RecordStore, StoreError};
use dbhandler_testkit::{lossless_options, DatasetFixture};
use dbhandler_upload::{discover_pairs, DataPair, IndexBase, UploadConfig, Uploader};
use std::path::PathBuf;

fn quiet() -> UploadConfig {
    UploadConfig::default().max_workers(4).show_progress(false)
}

fn output(dataset: &DatasetFixture, backend: Backend) -> PathBuf {
    match backend {
        Backend::MappedKv => dataset.root().join("out.db"),
        Backend::Columnar => dataset.root().join("out.h5col"),
    }
}

fn pairs(dataset: &DatasetFixture) -> Vec<DataPair> {
    dataset
        .pair_paths()
        .into_iter()
        .map(|(image, label)| DataPair::new(image, label))
        .collect()
}

#[test]
fn every_pair_lands_at_a_unique_index() {
    for backend in [Backend::MappedKv, Backend::Columnar] {
        let dataset = DatasetFixture::new(24);
        let path = output(&dataset, backend);
        let report = Uploader::new(quiet())
            .upload_to(backend, &path, lossless_options(), &pairs(&dataset))
            .unwrap();

        assert_eq!(report.pairs_seen, 24);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.final_len, 24);
        assert_eq!(report.committed, (0..24).collect::<Vec<u64>>());

        // Completion order is arbitrary, so match records back by label
        let store = RecordStore::open(backend, &path, OpenMode::Read, lossless_options()).unwrap();
        let mut seen = vec![false; 24];
        for index in 0..store.len().unwrap() {
            let record = store.get_data(index).unwrap();
            let source = record.annotation["index"].as_u64().unwrap() as usize;
            assert!(!seen[source], "pair {source} stored twice");
            seen[source] = true;
            assert_eq!(record.annotation, dataset.expected_annotation(source));
            assert_eq!(record.image.unwrap(), dataset.expected_image(source));
        }
        assert!(seen.iter().all(|s| *s));
    }
}

#[test]
fn bad_pairs_are_skipped_without_holes() {
    for backend in [Backend::MappedKv, Backend::Columnar] {
        let dataset = DatasetFixture::new(10);
        dataset.corrupt_image(2);
        dataset.corrupt_label(5);
        std::fs::remove_file(dataset.label_path(7)).unwrap();

        let path = output(&dataset, backend);
        let report = Uploader::new(quiet())
            .upload_to(backend, &path, lossless_options(), &pairs(&dataset))
            .unwrap();

        assert_eq!(report.skipped, 3);
        assert_eq!(report.final_len, 7);
        assert_eq!(report.committed, (0..7).collect::<Vec<u64>>());

        let store = RecordStore::open(backend, &path, OpenMode::Read, lossless_options()).unwrap();
        for index in 0..7 {
            assert!(!store.get_data(index).unwrap().is_placeholder());
        }
    }
}

#[test]
fn one_based_indices_leave_placeholders() {
    let dataset = DatasetFixture::new(3);
    let path = output(&dataset, Backend::MappedKv);
    let config = quiet().max_workers(1).index_base(IndexBase::One);
    let report = Uploader::new(config)
        .upload_to(Backend::MappedKv, &path, lossless_options(), &pairs(&dataset))
        .unwrap();

    assert_eq!(report.committed, vec![1, 3, 5]);
    assert_eq!(report.final_len, 6);

    let store =
        RecordStore::open(Backend::MappedKv, &path, OpenMode::Read, lossless_options()).unwrap();
    assert!(store.get_data(0).unwrap().is_placeholder());
    assert!(!store.get_data(1).unwrap().is_placeholder());
}

#[test]
fn existing_output_needs_force() {
    let dataset = DatasetFixture::new(2);
    let path = output(&dataset, Backend::Columnar);
    let uploader = Uploader::new(quiet());
    uploader
        .upload_to(Backend::Columnar, &path, lossless_options(), &pairs(&dataset))
        .unwrap();

    let again = uploader.upload_to(Backend::Columnar, &path, lossless_options(), &pairs(&dataset));
    assert!(matches!(
        again,
        Err(dbhandler_upload::UploadError::Store(StoreError::AlreadyExists { .. }))
    ));

    let report = Uploader::new(quiet().force(true))
        .upload_to(Backend::Columnar, &path, lossless_options(), &pairs(&dataset)[..1])
        .unwrap();
    assert_eq!(report.final_len, 1);
}

#[test]
fn append_continues_after_existing_records() {
    let dataset = DatasetFixture::new(6);
    let all = pairs(&dataset);
    let path = output(&dataset, Backend::MappedKv);

    Uploader::new(quiet())
        .upload_to(Backend::MappedKv, &path, lossless_options(), &all[..4])
        .unwrap();
    let report = Uploader::new(quiet().append(true))
        .upload_to(Backend::MappedKv, &path, lossless_options(), &all[4..])
        .unwrap();

    assert_eq!(report.committed, vec![4, 5]);
    assert_eq!(report.final_len, 6);
}

#[test]
fn discovered_pairs_upload_in_name_order() {
    let dataset = DatasetFixture::new(5);
    let discovered = discover_pairs(&dataset.images_dir(), &dataset.labels_dir()).unwrap();
    assert_eq!(discovered, pairs(&dataset));

    let path = output(&dataset, Backend::Columnar);
    let report = Uploader::new(quiet().max_workers(1))
        .upload_to(Backend::Columnar, &path, lossless_options(), &discovered)
        .unwrap();
    assert_eq!(report.final_len, 5);

    // A single worker commits in input order
    let store =
        RecordStore::open(Backend::Columnar, &path, OpenMode::Read, lossless_options()).unwrap();
    for index in 0..5 {
        let record = store.get_data(index).unwrap();
        assert_eq!(record.annotation, dataset.expected_annotation(index as usize));
    }
}
