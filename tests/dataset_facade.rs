use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use bagseg::catalog::BAG_CLASSES;
use bagseg::dataset::BagsDataset;
use bagseg::ids::{ClassId, ImageId};
use bagseg::index::{IndexOptions, Split};
use bagseg::mask::{BinaryMask, BoxMaskSynthesizer, MaskSynthesizer};
use bagseg::BagsegError;

mod common;
use common::BagsFixture;

fn load(fixture: &BagsFixture, split: Split, synthesizer: Arc<dyn MaskSynthesizer>) -> BagsDataset {
    let options = IndexOptions::new(fixture.layout.clone(), split, 100, 1024);
    BagsDataset::load(&options, BAG_CLASSES, synthesizer).expect("load dataset")
}

fn box_fixture() -> BagsFixture {
    let fixture = BagsFixture::new();
    fixture
        .add_with_objects(
            "bag001.png",
            300,
            200,
            &[
                ("white_bag", [10.0, 10.0, 20.0, 30.0]),
                ("black_backpack", [0.0, 0.0, 300.0, 200.0]),
            ],
        )
        .add_with_objects("bag002.png", 300, 300, &[("green_tote", [0.0, 0.0, 5.0, 5.0])])
        .add_with_objects("bot01.png", 300, 300, &[("nine_west_bag", [1.0, 1.0, 2.0, 2.0])]);
    fixture
}

#[test]
fn load_registers_catalog_and_split() {
    let fixture = box_fixture();
    let synth = Arc::new(BoxMaskSynthesizer::new(fixture.layout.annotations_dir.clone()));
    let train = load(&fixture, Split::Train, synth.clone());
    let eval = load(&fixture, Split::Eval, synth);

    assert_eq!(train.size(), 2);
    assert_eq!(eval.size(), 1);
    assert_eq!(train.num_classes(), 13);
    assert_eq!(train.catalog().get("black_backpack"), Some(ClassId(1)));
    assert_eq!(train.image_ids(), vec![ImageId(1), ImageId(2)]);
    assert_eq!(
        eval.reference(ImageId(1)).unwrap(),
        fixture.image_path("bot01.png").display().to_string()
    );
}

#[test]
fn masks_are_resolved_through_catalog() {
    let fixture = box_fixture();
    let synth = Arc::new(BoxMaskSynthesizer::new(fixture.layout.annotations_dir.clone()));
    let train = load(&fixture, Split::Train, synth);

    let masks = train.masks_for(ImageId(1)).unwrap();
    assert_eq!(masks.class_ids, vec![ClassId(12), ClassId(1)]);
    assert_eq!(masks.masks[0].width(), 300);
    assert_eq!(masks.masks[0].height(), 200);
    assert_eq!(masks.masks[0].area(), 10 * 20);
    assert_eq!(masks.masks[1].area(), 300 * 200);
}

#[test]
fn unknown_class_from_synthesizer_is_an_error() {
    let fixture = box_fixture();
    let synth = Arc::new(BoxMaskSynthesizer::new(fixture.layout.annotations_dir.clone()));
    let train = load(&fixture, Split::Train, synth);

    let err = train.masks_for(ImageId(2)).unwrap_err();
    match err {
        BagsegError::UnknownClass { name, image } => {
            assert_eq!(name, "green_tote");
            assert_eq!(image, fixture.image_path("bag002.png"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn record_access_is_range_checked() {
    let fixture = box_fixture();
    let synth = Arc::new(BoxMaskSynthesizer::new(fixture.layout.annotations_dir.clone()));
    let eval = load(&fixture, Split::Eval, synth);

    assert_eq!(eval.record_at(0).unwrap().file_name(), "bot01.png");
    assert!(matches!(
        eval.record_at(1),
        Err(BagsegError::IndexOutOfRange { index: 1, len: 1 })
    ));
    assert!(matches!(
        eval.masks_for(ImageId(5)),
        Err(BagsegError::UnknownImageId(ImageId(5)))
    ));
}

/// Returns random-looking pixels but fixed class names.
struct NoisySynthesizer {
    calls: AtomicUsize,
}

impl MaskSynthesizer for NoisySynthesizer {
    fn synthesize(&self, _: &Path) -> Result<Vec<(BinaryMask, String)>, BagsegError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let mut mask = BinaryMask::new(4, 4);
        mask.set((call % 4) as u32, 0, true);
        Ok(vec![
            (mask.clone(), "wine_red_handbag".to_string()),
            (mask, "white_bag".to_string()),
        ])
    }
}

#[test]
fn class_resolution_is_idempotent_across_calls() {
    let fixture = box_fixture();
    let synth = Arc::new(NoisySynthesizer {
        calls: AtomicUsize::new(0),
    });
    let train = load(&fixture, Split::Train, synth.clone());

    let first = train.masks_for(ImageId(1)).unwrap();
    let second = train.masks_for(ImageId(1)).unwrap();
    assert_eq!(first.class_ids, second.class_ids);
    assert_ne!(first.masks, second.masks);
    assert_eq!(synth.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn prepared_dataset_serves_concurrent_readers() {
    let fixture = box_fixture();
    let synth = Arc::new(BoxMaskSynthesizer::new(fixture.layout.annotations_dir.clone()));
    let train = Arc::new(load(&fixture, Split::Train, synth));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let dataset = Arc::clone(&train);
            thread::spawn(move || {
                let record = dataset.record_at(0).unwrap().clone();
                let masks = dataset.masks_for(record.id).unwrap();
                masks.class_ids
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), vec![ClassId(12), ClassId(1)]);
    }
}
