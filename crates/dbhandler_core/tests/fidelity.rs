//! Property tests: whatever goes in comes back out.

use dbhandler_core::{Backend, OpenMode};
use dbhandler_testkit::prelude::*;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn put_then_get_is_lossless(
        image in image_strategy(),
        annotation in annotation_strategy(),
        index in index_strategy(),
    ) {
        for backend in [Backend::MappedKv, Backend::Columnar] {
            let mut store = TestStore::new(backend);
            store.put_data(&image, &annotation, index).unwrap();

            prop_assert_eq!(store.len().unwrap(), index + 1);
            let record = store.get_data(index).unwrap();
            prop_assert_eq!(record.image.as_ref(), Some(&image));
            prop_assert_eq!(&record.annotation, &annotation);

            for below in 0..index {
                prop_assert!(store.get_data(below).unwrap().is_placeholder());
            }
        }
    }

    #[test]
    fn sequential_puts_count_exactly(count in 1usize..12) {
        for backend in [Backend::MappedKv, Backend::Columnar] {
            let mut store = TestStore::new(backend);
            for i in 0..count {
                store.put_data(&sample_image(i as u32, 4, 4), &sample_annotation(i), i as u64).unwrap();
            }
            prop_assert_eq!(store.len().unwrap(), count as u64);

            store.reopen(OpenMode::Read);
            prop_assert_eq!(store.len().unwrap(), count as u64);
            for i in 0..count {
                prop_assert_eq!(store.get_data(i as u64).unwrap().annotation, sample_annotation(i));
            }
        }
    }

    #[test]
    fn overwrites_never_change_length(
        writes in prop::collection::vec((index_strategy(), annotation_strategy()), 1..16),
    ) {
        for backend in [Backend::MappedKv, Backend::Columnar] {
            let mut store = TestStore::new(backend);
            let mut expected_len = 0u64;
            for (index, annotation) in &writes {
                store.put_data(&sample_image(1, 2, 2), annotation, *index).unwrap();
                expected_len = expected_len.max(index + 1);
                prop_assert_eq!(store.len().unwrap(), expected_len);
                prop_assert_eq!(&store.get_data(*index).unwrap().annotation, annotation);
            }
        }
    }
}
