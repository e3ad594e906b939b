//! End-to-end flow for one target: layered config, session open, probe
//! emission, command execution, and summary on close.

use std::path::Path;

use crossforge::probe::write_probe_source;
use crossforge::{build_dir, BuildSession, Config, Runner};

#[test]
fn full_target_lifecycle() {
    let tmp = tempfile::TempDir::new().unwrap();
    let root = tmp.path();

    // Layered target configuration: the base layer is expanded before the
    // target layer references it.
    let mut config = Config::new();
    config.set("toolchain", "arm-none-eabi");
    config.set("cc", "%(toolchain)s-gcc");
    config.expand().unwrap();

    let mut target_layer = Config::new();
    target_layer.set("cflags", "-O2 -mcpu=cortex-m3");
    target_layer.set("compile", "%(cc)s %(cflags)s -c probe.c");
    config.merge(target_layer);
    config.expand().unwrap();

    assert_eq!(
        config.get("compile"),
        "arm-none-eabi-gcc -O2 -mcpu=cortex-m3 -c probe.c"
    );

    // Pre-populate the build directory to prove the open wipes it.
    let dir = build_dir(root, "cross", "arm/cortex-m3");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("stale.o"), "leftover").unwrap();

    let mut runner = Runner::new();
    let session = BuildSession::open(&mut runner, root, "cross", "arm/cortex-m3", false).unwrap();

    assert_eq!(session.dir(), root.join("build-cross-arm_cortex-m3"));
    assert!(!session.dir().join("stale.o").exists());

    // Record the expanded parameters for the log trail.
    runner.info(&config.dump());

    // Materialize the probe source into the session directory.
    let probe = session.dir().join("probe.c");
    write_probe_source(&probe).unwrap();
    assert!(runner.is_readable_file(&probe));

    let text = std::fs::read_to_string(&probe).unwrap();
    assert!(text.contains("'0'+sizeof(int), '\\n'"));
    assert!(text.contains("\"INFO __GNUC__ is defined\\n\""));
    assert!(text.contains("\"INFO __GNUC__ is not defined\\n\""));

    // A failed compiler spawn is logged, not raised.
    let out = runner.run(
        &["no-such-cross-compiler".to_string(), "-c".to_string()],
        None,
        true,
    );
    assert!(!out.stderr.is_empty());

    let log_file = session.log_file();
    let summary = session.close(&mut runner);
    assert_eq!(summary.errors, 2);
    assert_eq!(summary.warnings, 0);
    assert_eq!(summary.path, Some(log_file.clone()));

    // The log holds the whole trail: config dump, info lines, errors.
    let log_text = std::fs::read_to_string(&log_file).unwrap();
    assert!(log_text.contains("arm-none-eabi-gcc"));
    assert!(log_text.contains("# ERROR: Command: no-such-cross-compiler -c"));
}

#[cfg(unix)]
#[test]
fn captured_command_inside_session() {
    let tmp = tempfile::TempDir::new().unwrap();

    let mut runner = Runner::new();
    let session = BuildSession::open(&mut runner, tmp.path(), "cross", "echo-check", false).unwrap();

    let out = runner.run(
        &["echo".to_string(), "compiled ok".to_string()],
        None,
        true,
    );
    assert!(out.stdout.contains("compiled ok"));

    // Redirected form leaves the output in the session directory.
    let capture = session.dir().join("compile.out");
    let out = runner.run(
        &["echo".to_string(), "to file".to_string()],
        Some(&capture),
        true,
    );
    assert!(out.stdout.is_empty());
    assert!(std::fs::read_to_string(&capture).unwrap().contains("to file"));

    let summary = session.close(&mut runner);
    assert!(summary.is_clean());
}

#[test]
fn sessions_do_not_share_state() {
    let tmp = tempfile::TempDir::new().unwrap();

    // Two runners, two sessions, independent counters.
    let mut first = Runner::new();
    let mut second = Runner::new();

    let s1 = BuildSession::open(&mut first, tmp.path(), "cross", "arm", false).unwrap();
    let s2 = BuildSession::open(&mut second, tmp.path(), "cross", "mips", false).unwrap();

    first.error("arm went wrong");

    let arm = s1.close(&mut first);
    let mips = s2.close(&mut second);
    assert_eq!(arm.errors, 1);
    assert_eq!(mips.errors, 0);

    assert_ne!(
        build_dir(tmp.path(), "cross", "arm"),
        build_dir(tmp.path(), "cross", "mips")
    );
}

#[test]
fn build_dir_matches_documented_example() {
    assert_eq!(
        build_dir(Path::new("/r"), "cross compile", "arm/v7"),
        Path::new("/r/build-cross_compile-arm_v7")
    );
}
