//! Property-based test generators using proptest.
//!
//! Provides strategies for records that survive a store round trip
//! unchanged.

use dbhandler_core::{RgbImage, Value};
use proptest::prelude::*;
use serde_json::{Map, Number};

/// Strategy for small RGB images with arbitrary pixels.
pub fn image_strategy() -> impl Strategy<Value = RgbImage> {
    (1u32..24, 1u32..24).prop_flat_map(|(width, height)| {
        prop::collection::vec(any::<u8>(), (width * height * 3) as usize).prop_map(move |raw| {
            RgbImage::from_raw(width, height, raw).expect("Buffer sized for dimensions")
        })
    })
}

/// Strategy for JSON scalars.
///
/// Floats are left out: they are not guaranteed to survive a text round
/// trip bit for bit.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(Number::from(n))),
        "\\PC{0,16}".prop_map(Value::String),
    ]
}

/// Strategy for nested annotations up to a few levels deep.
pub fn annotation_strategy() -> impl Strategy<Value = Value> {
    scalar_strategy().prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..6)
                .prop_map(|entries| Value::Object(entries.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// Strategy for a record index within a small store.
pub fn index_strategy() -> impl Strategy<Value = u64> {
    0u64..32
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn images_have_matching_buffers(image in image_strategy()) {
            let (width, height) = image.dimensions();
            prop_assert_eq!(image.as_raw().len(), (width * height * 3) as usize);
        }

        #[test]
        fn annotations_round_trip_as_text(annotation in annotation_strategy()) {
            let text = serde_json::to_string(&annotation).unwrap();
            let parsed: Value = serde_json::from_str(&text).unwrap();
            prop_assert_eq!(parsed, annotation);
        }
    }
}
