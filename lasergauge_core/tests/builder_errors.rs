use lasergauge_core::SharedRig;
use lasergauge_core::error::BuildError;
use lasergauge_core::mocks::{NoopLaser, RecordingPositioner, StaticFrames};
use rstest::rstest;

#[rstest]
fn builder_missing_frame_source_yields_typed_build_error() {
    let err = SharedRig::builder()
        .with_laser(NoopLaser::default())
        .with_positioner(RecordingPositioner::default())
        .try_build()
        .expect_err("should fail with MissingFrameSource");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingFrameSource) => {}
        other => panic!("expected MissingFrameSource, got: {other:?}"),
    }
}

#[rstest]
fn builder_missing_laser_yields_typed_build_error() {
    let err = SharedRig::builder()
        .with_frame_source(StaticFrames::empty())
        .with_positioner(RecordingPositioner::default())
        .try_build()
        .expect_err("should fail with MissingLaser");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingLaser)
    ));
}

#[rstest]
fn builder_missing_positioner_yields_typed_build_error() {
    let err = SharedRig::builder()
        .with_frame_source(StaticFrames::empty())
        .with_laser(NoopLaser::default())
        .try_build()
        .expect_err("should fail with MissingPositioner");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingPositioner)
    ));
}

#[rstest]
fn complete_builder_builds() {
    let rig = SharedRig::builder()
        .with_frame_source(StaticFrames::empty())
        .with_laser(NoopLaser::default())
        .with_positioner(RecordingPositioner::default())
        .build();
    assert!(rig.is_ok());
}
