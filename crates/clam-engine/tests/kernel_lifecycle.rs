mod support;

use std::sync::Arc;
use std::thread;

use clam_engine::kernel::{CompiledKernel, KernelError, OptionSnapshot, Tiling};
use clam_engine::params::NamedParameters;

use support::{RecordingBackend, RecordingStatus};

const ITERS_KERNEL: &str = "\
#ifndef ITERS
#define ITERS 256u
#endif
@compute @workgroup_size(LOCAL_X, LOCAL_Y)
fn Main() {}
";

const TWO_OPTIONS: &str = "\
#ifndef QUALITY
#define QUALITY 2
#endif
#ifndef SHADOWS
#endif
";

fn create(
    backend: &Arc<RecordingBackend>,
    status: &Arc<RecordingStatus>,
    sources: &[&str],
) -> Result<CompiledKernel<RecordingBackend>, KernelError> {
    CompiledKernel::create(
        Arc::clone(backend),
        sources.iter().map(|s| s.to_string()).collect(),
        status.clone(),
    )
}

fn setup(
    sources: &[&str],
) -> (Arc<RecordingBackend>, Arc<RecordingStatus>, CompiledKernel<RecordingBackend>) {
    let backend = Arc::new(RecordingBackend::new());
    let status = Arc::new(RecordingStatus::new());
    let kernel = create(&backend, &status, sources).unwrap();
    (backend, status, kernel)
}

#[test]
fn override_reaches_compiler_only_after_rebuild() {
    let (backend, _status, kernel) = setup(&[ITERS_KERNEL]);

    let iters = kernel.option("ITERS").unwrap();
    assert_eq!(iters.value, "");
    assert_eq!(iters.default, "256u");
    assert_eq!(backend.log().compiles, vec![String::new()]);

    kernel.set_option("ITERS", "128").unwrap();
    assert_eq!(backend.log().compiles.len(), 1);

    kernel.rebuild().unwrap();
    assert_eq!(backend.log().compiles, vec![String::new(), "-D ITERS=128".to_string()]);

    kernel.reset_option("ITERS").unwrap();
    kernel.rebuild().unwrap();
    assert_eq!(backend.log().compiles[2], "");
}

#[test]
fn whitespace_is_rejected_without_compiling() {
    let (backend, status, kernel) = setup(&[ITERS_KERNEL]);

    kernel.set_option("ITERS", "1 28").unwrap();
    let err = kernel.rebuild().unwrap_err();

    assert!(matches!(
        err,
        KernelError::InvalidOptionSyntax { ref key, ref value } if key == "ITERS" && value == "1 28"
    ));
    assert_eq!(backend.log().compiles.len(), 1);
    assert_eq!(status.alerts().len(), 1);
    assert!(!kernel.is_built());
}

#[test]
fn multiple_devices_are_refused() {
    let backend = Arc::new(RecordingBackend::new().with_devices(2));
    let status = Arc::new(RecordingStatus::new());

    let err = create(&backend, &status, &[ITERS_KERNEL]).err().unwrap();
    assert!(matches!(err, KernelError::MultiDeviceAmbiguity { devices: 2 }));
    assert!(backend.log().compiles.is_empty());
}

#[test]
fn build_failure_alerts_log() {
    let backend = Arc::new(RecordingBackend::new());
    let status = Arc::new(RecordingStatus::new());

    let err = create(&backend, &status, &["#error broken\n"]).err().unwrap();
    assert!(matches!(err, KernelError::BuildFailure { ref log } if log.contains("rejected")));
    assert_eq!(status.alerts(), vec!["error: kernel rejected".to_string()]);
}

#[test]
fn failed_rebuild_empties_slot_until_next_success() {
    let (backend, _status, kernel) = setup(&[ITERS_KERNEL]);
    let queue = support::MockQueue;
    let buffer = support::MockBuffer { texels: 16 };

    kernel.set_option("ITERS", "fail").unwrap();
    assert!(kernel.rebuild().is_err());
    assert!(!kernel.is_built());

    kernel
        .dispatch(&buffer, &queue, &(), [4, 4], Tiling::FULL)
        .unwrap();
    assert!(backend.log().dispatches.is_empty());

    kernel.set_option("ITERS", "64").unwrap();
    kernel.rebuild().unwrap();
    kernel
        .dispatch(&buffer, &queue, &(), [4, 4], Tiling::FULL)
        .unwrap();
    assert_eq!(backend.log().dispatches[0].options, "-D ITERS=64");
}

#[test]
fn build_warning_is_not_fatal() {
    let (_backend, status, kernel) = setup(&["#warning\n", ITERS_KERNEL]);

    assert!(kernel.is_built());
    assert_eq!(status.warnings(), vec!["warning: unused variable".to_string()]);
    assert!(status.alerts().is_empty());
}

#[test]
fn unknown_option_is_rejected() {
    let (_backend, _status, kernel) = setup(&[ITERS_KERNEL]);
    let err = kernel.set_option("ITER", "3").unwrap_err();
    assert!(matches!(err, KernelError::UnknownOption(ref key) if key == "ITER"));
}

#[test]
fn restore_skips_unknown_keys_with_warning() {
    let (_backend, status, kernel) = setup(&[TWO_OPTIONS]);

    let mut snapshot = OptionSnapshot::new();
    snapshot.push("QUALITY", "4");
    snapshot.push("FOG", "1");
    snapshot.push("SHADOWS", "1");

    let report = kernel.restore(&snapshot);
    assert_eq!(report.applied, 2);
    assert_eq!(report.unknown, vec!["FOG".to_string()]);
    assert!(report.had_warnings());

    assert_eq!(kernel.option("QUALITY").unwrap().value, "4");
    assert_eq!(kernel.option("SHADOWS").unwrap().value, "1");
    let warnings = status.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("option FOG was invalid"));
}

#[test]
fn restoring_own_snapshot_changes_nothing() {
    let (_backend, status, kernel) = setup(&[TWO_OPTIONS]);
    kernel.set_option("SHADOWS", "1").unwrap();
    let before = kernel.options();

    let json = kernel.serialize().to_json_pretty().unwrap();
    let snapshot = OptionSnapshot::from_json(&json).unwrap();
    let report = kernel.restore(&snapshot);

    assert!(!report.had_warnings());
    assert_eq!(kernel.options(), before);
    assert!(status.warnings().is_empty());
}

#[test]
fn group_size_is_cached_per_program() {
    let (backend, _status, kernel) = setup(&[ITERS_KERNEL]);
    let queue = support::MockQueue;
    let buffer = support::MockBuffer { texels: 64 };

    assert_eq!(kernel.cached_local_size(), None);
    kernel.dispatch(&buffer, &queue, &(), [8, 8], Tiling::FULL).unwrap();
    kernel.dispatch(&buffer, &queue, &(), [8, 8], Tiling::FULL).unwrap();
    assert_eq!(kernel.cached_local_size(), Some([16, 16]));
    assert_eq!(backend.log().group_queries, 1);

    kernel.rebuild().unwrap();
    assert_eq!(kernel.cached_local_size(), None);
    kernel.dispatch(&buffer, &queue, &(), [8, 8], Tiling::FULL).unwrap();
    assert_eq!(backend.log().group_queries, 2);
}

#[test]
fn dispatch_binds_window_and_parameters() {
    let (backend, _status, kernel) = setup(&[ITERS_KERNEL]);
    let queue = support::MockQueue;
    let buffer = support::MockBuffer { texels: 5000 };
    let params = NamedParameters::new().with("zoom", 2.0).with("center_x", -0.5);

    kernel
        .dispatch(&buffer, &queue, &params, [100, 50], Tiling::new(3, [2, 1]))
        .unwrap();

    let log = backend.log();
    let dispatch = &log.dispatches[0];
    assert_eq!(dispatch.words, vec![100, 50, 2.0f32.to_bits(), (-0.5f32).to_bits()]);
    assert_eq!(dispatch.offset, [68, 17]);
    assert_eq!(dispatch.local, [16, 16]);
    assert_eq!(dispatch.global, [48, 32]);
}

#[test]
fn dispose_turns_dispatch_into_noop() {
    let (backend, _status, kernel) = setup(&[ITERS_KERNEL]);
    let queue = support::MockQueue;
    let buffer = support::MockBuffer { texels: 16 };

    kernel.dispose();
    assert!(!kernel.is_built());
    kernel.dispatch(&buffer, &queue, &(), [4, 4], Tiling::FULL).unwrap();
    assert!(backend.log().dispatches.is_empty());

    kernel.rebuild().unwrap();
    assert!(kernel.is_built());
}

#[test]
fn stale_rebuild_does_not_replace_newer_program() {
    let (backend, _status, kernel) = setup(&[ITERS_KERNEL]);
    let queue = support::MockQueue;
    let buffer = support::MockBuffer { texels: 16 };

    kernel.set_option("ITERS", "1").unwrap();
    let (entered, release) = backend.block_compile("-D ITERS=1");

    thread::scope(|s| {
        let slow = s.spawn(|| kernel.rebuild());
        entered.recv().unwrap();

        kernel.set_option("ITERS", "2").unwrap();
        kernel.rebuild().unwrap();

        release.send(()).unwrap();
        slow.join().unwrap().unwrap();
    });

    kernel.dispatch(&buffer, &queue, &(), [4, 4], Tiling::FULL).unwrap();
    assert_eq!(backend.log().dispatches[0].options, "-D ITERS=2");
}

#[test]
fn dispatch_and_rebuild_can_interleave() {
    let (backend, _status, kernel) = setup(&[ITERS_KERNEL]);
    let queue = support::MockQueue;
    let buffer = support::MockBuffer { texels: 64 };

    thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..200 {
                kernel.dispatch(&buffer, &queue, &(), [8, 8], Tiling::FULL).unwrap();
            }
        });
        s.spawn(|| {
            for i in 0..50 {
                kernel.set_option("ITERS", &format!("{}", 64 + i)).unwrap();
                kernel.rebuild().unwrap();
            }
        });
    });

    assert!(kernel.is_built());
    assert_eq!(backend.log().dispatches.len(), 200);
    assert_eq!(kernel.option("ITERS").unwrap().value, "113");
}
