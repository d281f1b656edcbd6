use mask_geometry::{
    AlignmentPolicy, Axes, BatchItem, BboxMode, BlendMode, BoundingBox, CropExtend, EdgeExpansion,
    MaskCommand, MaskError, MaskManager, Pinned, Pipeline, Region, StrokePlacement, StrokeSpec,
    StructuringShape, align, apply_stroke, blend, combine, make_stroke,
};

fn rect(width: u32, height: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> Region {
    Region::with_rect(width, height, BoundingBox::new(x0, y0, x1, y1).unwrap())
}

#[test]
fn external_and_internal_bands_do_not_overlap() {
    let square = rect(64, 64, 20, 20, 39, 39);
    let external = make_stroke(&square, &StrokeSpec::new(3, StrokePlacement::External)).unwrap();
    let internal = make_stroke(&square, &StrokeSpec::new(3, StrokePlacement::Internal)).unwrap();

    assert_eq!(external.area(), 26 * 26 - 20 * 20);
    assert_eq!(internal.area(), 20 * 20 - 14 * 14);
    assert!(combine(&external, &internal, BlendMode::Intersect).unwrap().is_blank());

    let outlined = apply_stroke(&square, &StrokeSpec::new(3, StrokePlacement::External)).unwrap();
    assert_eq!(outlined.bounding_box(), BoundingBox::new(17, 17, 42, 42));
    assert_eq!(outlined.area(), 26 * 26);
}

#[test]
fn square_longer_centers_on_the_short_axis() {
    let wide = rect(64, 64, 10, 20, 29, 29);
    let out = blend(
        Some(&wide),
        None,
        BlendMode::Union,
        BboxMode::SquareLonger,
        AlignmentPolicy::Center,
    )
    .unwrap();
    assert_eq!((out.width, out.height), (20, 20));
    assert_eq!(out.mask.bounding_box(), BoundingBox::new(10, 15, 29, 34));
}

#[test]
fn blend_without_inputs_is_an_empty_default_canvas() {
    let out = blend(None, None, BlendMode::Union, BboxMode::Off, AlignmentPolicy::Center).unwrap();
    assert_eq!(out.mask.dimensions(), (1024, 1024));
    assert!(out.mask.is_blank());
    assert_eq!((out.width, out.height), (0, 0));
}

#[test]
fn aligning_onto_a_reference_matches_its_box() {
    let subject = rect(64, 64, 0, 0, 9, 9);
    let reference = rect(64, 64, 40, 40, 49, 49);
    let aligned = align(&subject, Some(&reference), Axes::BOTH).unwrap();
    assert_eq!(aligned.bounding_box(), reference.bounding_box());

    let again = align(&aligned, Some(&reference), Axes::BOTH).unwrap();
    assert_eq!(again, aligned);
}

#[test]
fn opposite_edge_shrinks_share_the_budget() {
    let region = rect(100, 100, 10, 10, 49, 49);
    let command = MaskCommand::Analyze(EdgeExpansion {
        top: -60,
        bottom: -60,
        left: 0,
        right: 0,
    });
    let out = MaskManager::new().execute(&command, Some(&region), None).unwrap();
    // -60/-60 is scaled down to -45/-45 of a 40px extent
    assert_eq!(out.mask.bounding_box(), BoundingBox::new(10, 28, 49, 31));
    assert_eq!((out.width, out.height), (40, 4));
}

#[test]
fn crop_past_the_canvas_pads_and_flags() {
    let region = rect(32, 32, 2, 2, 11, 11);
    let command = MaskCommand::Crop(CropExtend {
        left: 5,
        ..Default::default()
    });
    let out = MaskManager::new().execute(&command, Some(&region), None).unwrap();
    assert_eq!(out.mask.dimensions(), (15, 10));
    assert_eq!(out.flag, Some(true));
    assert_eq!(out.secondary_mask.unwrap().area(), 3 * 10);
}

#[test]
fn pinned_output_ignores_new_inputs_until_released() {
    let manager = MaskManager::new();
    let command = MaskCommand::Dilate {
        iterations: 1,
        shape: StructuringShape::Rectangle,
    };
    let small = rect(32, 32, 10, 10, 11, 11);
    let large = rect(32, 32, 5, 5, 20, 20);
    let mut cache = Pinned::new();

    let first = manager
        .execute_pinned(&mut cache, true, &command, Some(&small), None)
        .unwrap();
    assert_eq!(first.width, 4);

    let held = manager
        .execute_pinned(&mut cache, true, &command, Some(&large), None)
        .unwrap();
    assert_eq!(held, first);

    let fresh = manager
        .execute_pinned(&mut cache, false, &command, Some(&large), None)
        .unwrap();
    assert_eq!(fresh.width, 18);
    assert_eq!(cache.last(), Some(&fresh));
}

#[test]
fn batch_stops_on_the_first_failing_item() {
    let manager = MaskManager::new();
    let command = MaskCommand::AlignCenter;
    let items = vec![
        BatchItem {
            primary: Some(rect(32, 32, 0, 0, 9, 9)),
            secondary: Some(rect(32, 32, 20, 0, 29, 9)),
        },
        BatchItem {
            primary: Some(rect(32, 32, 0, 0, 9, 9)),
            secondary: None,
        },
    ];
    assert!(matches!(
        manager.execute_batch(&command, &items),
        Err(MaskError::InvalidParameter(_))
    ));
    assert_eq!(manager.execute_batch(&command, &items[..1]).unwrap().len(), 1);
}

#[test]
fn commands_read_from_json_keep_their_defaults() {
    let command: MaskCommand =
        serde_json::from_str(r#"{"type":"stroke","params":{"width":4,"placement":"internal"}}"#)
            .unwrap();
    assert_eq!(command, MaskCommand::Stroke(StrokeSpec::new(4, StrokePlacement::Internal)));

    let detect: MaskCommand =
        serde_json::from_str(r#"{"type":"detect","params":{}}"#).unwrap();
    assert_eq!(detect, MaskCommand::Detect { min_area_percent: 3.0 });

    let json = serde_json::to_string(&command).unwrap();
    assert_eq!(serde_json::from_str::<MaskCommand>(&json).unwrap(), command);
}

#[test]
fn manager_pipeline_prepares_the_primary_mask() {
    let pipeline = Pipeline::builder()
        .grow(2, StructuringShape::Rectangle)
        .build();
    let manager = MaskManager::with_pipeline(pipeline);
    let out = manager
        .execute(
            &MaskCommand::Detect { min_area_percent: 0.0 },
            Some(&rect(32, 32, 10, 10, 11, 11)),
            None,
        )
        .unwrap();
    assert_eq!(out.flag, Some(true));
    assert_eq!((out.width, out.height), (6, 6));
}
