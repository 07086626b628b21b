#![allow(dead_code)]

use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(32);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 256;
    config
}

/// One generated image: unique stem, eval flag and annotated size.
#[derive(Clone, Debug, PartialEq)]
pub struct GenImage {
    pub file_name: String,
    pub is_eval: bool,
    pub width: u32,
    pub height: u32,
}

pub fn arb_dim() -> BoxedStrategy<u32> {
    prop_oneof![1u32..100, 100u32..=1024, 1025u32..4000].boxed()
}

/// Up to `max` images with distinct names; eval images are named `*bot<n>.png`.
pub fn arb_images(max: usize) -> BoxedStrategy<Vec<GenImage>> {
    prop::collection::vec((any::<bool>(), arb_dim(), arb_dim()), 0..=max)
        .prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(idx, (is_eval, width, height))| GenImage {
                    file_name: if is_eval {
                        format!("img{idx:03}_bot{idx}.png")
                    } else {
                        format!("img{idx:03}.png")
                    },
                    is_eval,
                    width,
                    height,
                })
                .collect()
        })
        .boxed()
}

pub fn in_bounds(image: &GenImage, min_dim: u32, max_dim: u32) -> bool {
    (min_dim..=max_dim).contains(&image.width) && (min_dim..=max_dim).contains(&image.height)
}
