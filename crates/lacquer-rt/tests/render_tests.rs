//! End-to-end render tests through the host's public entry points.

use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

use lacquer_rt::{
    Host, JobId, JobState, OutputStyle, RenderError, RenderOptions, RenderOutput,
};

type Captured = Rc<RefCell<Option<Result<RenderOutput, RenderError>>>>;

/// Submits an asynchronous render whose outcome lands in the returned
/// slot once the host goes idle.
fn capture(host: &mut Host, source: &str, options: RenderOptions) -> (JobId, Captured) {
    let _ = env_logger::builder().is_test(true).try_init();
    let slot: Captured = Rc::new(RefCell::new(None));
    let ok = Rc::clone(&slot);
    let err = Rc::clone(&slot);
    let id = host
        .render(
            source,
            options,
            move |output| *ok.borrow_mut() = Some(Ok(output)),
            move |error| *err.borrow_mut() = Some(Err(error)),
        )
        .expect("submit");
    (id, slot)
}

fn taken(slot: &Captured) -> Result<RenderOutput, RenderError> {
    slot.borrow_mut().take().expect("render did not complete")
}

#[test]
fn test_sync_and_async_renders_agree() {
    let source = "a { b: 1px; c { d: 2px; } }";
    let mut host = Host::new();

    let sync = host.render_sync(source, RenderOptions::default()).expect("sync render");

    let (_, slot) = capture(&mut host, source, RenderOptions::default());
    host.run_until_idle();
    let output = taken(&slot).expect("async render");

    assert_eq!(sync.css, output.css);
    assert_eq!(sync.css, "a {\n  b: 1px; }\n\n  a c {\n    d: 2px; }\n");
    assert_eq!(sync.included_files, output.included_files);
}

#[test]
fn test_job_states_progress_to_completion() {
    let mut host = Host::new();
    let (id, slot) = capture(&mut host, "a{b:1px}", RenderOptions::default());

    // Before the loop runs the job is somewhere between scheduling and
    // running; it cannot have completed.
    assert!(matches!(
        host.job_state(id),
        Some(JobState::Scheduled) | Some(JobState::Running)
    ));
    assert_eq!(host.active_jobs(), 1);

    host.run_until_idle();
    assert_eq!(host.active_jobs(), 0);
    assert_eq!(host.job_state(id), None, "completed jobs leave the table");
    assert!(taken(&slot).is_ok());
}

#[test]
fn test_file_entry_points_label_stats_with_the_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("entry.lac");
    fs::write(&path, "x { y: 4px; }").expect("write entry");

    let mut host = Host::new();
    let sync = host.render_file_sync(&path, RenderOptions::default()).expect("sync render");
    assert_eq!(sync.css, "x {\n  y: 4px; }\n");
    assert_eq!(sync.stats.entry, path.display().to_string());
    assert!(sync.included_files.is_empty(), "the entry file is not an import");

    let slot: Captured = Rc::new(RefCell::new(None));
    let ok = Rc::clone(&slot);
    host.render_file(
        &path,
        RenderOptions::default(),
        move |output| *ok.borrow_mut() = Some(Ok(output)),
        |error| panic!("render failed: {}", error),
    )
    .expect("submit");
    host.run_until_idle();
    let output = taken(&slot).expect("async render");
    assert_eq!(output.css, sync.css);
    assert_eq!(output.stats.entry, sync.stats.entry);
}

#[test]
fn test_missing_file_fails_both_ways() {
    let mut host = Host::new();
    let missing = "/nonexistent/lacquer/entry.lac";

    match host.render_file_sync(missing, RenderOptions::default()) {
        Err(RenderError::Engine(e)) => assert!(e.message.contains("cannot read"), "{}", e),
        other => panic!("expected an engine error, got {:?}", other),
    }

    let slot: Captured = Rc::new(RefCell::new(None));
    let err = Rc::clone(&slot);
    host.render_file(
        missing,
        RenderOptions::default(),
        |_| panic!("unexpected success"),
        move |error| *err.borrow_mut() = Some(Err(error)),
    )
    .expect("submit");
    host.run_until_idle();
    match taken(&slot) {
        Err(RenderError::Engine(e)) => assert!(e.message.contains("cannot read"), "{}", e),
        other => panic!("expected an engine error, got {:?}", other),
    }
}

#[test]
fn test_output_styles_apply_end_to_end() {
    let host = Host::new();
    let mut options = RenderOptions::default();
    let render = |host: &Host, options: &RenderOptions| {
        host.render_sync("a{b:1px;c:2px}", options.clone()).expect("render").css
    };

    options.style = OutputStyle::Nested;
    assert_eq!(render(&host, &options), "a {\n  b: 1px;\n  c: 2px; }\n");
    options.style = OutputStyle::Expanded;
    assert_eq!(render(&host, &options), "a {\n  b: 1px;\n  c: 2px;\n}\n");
    options.style = OutputStyle::Compact;
    assert_eq!(render(&host, &options), "a { b: 1px; c: 2px; }\n");
    options.style = OutputStyle::Compressed;
    assert_eq!(render(&host, &options), "a{b:1px;c:2px}\n");
}

#[test]
fn test_stats_and_label_overrides() {
    let host = Host::new();
    let mut options = RenderOptions::default();
    options.input_label = Some("themes/dark".to_string());
    let output = host.render_sync("a{b:1px}", options).expect("render");
    assert_eq!(output.stats.entry, "themes/dark");
    assert!(output.stats.end_ms >= output.stats.start_ms);
    assert!(output.stats.duration_ms < 60_000);
}

#[test]
fn test_parse_errors_carry_their_position() {
    let mut host = Host::new();
    let source = "a {\n  color red;\n}";

    match host.render_sync(source, RenderOptions::default()) {
        Err(RenderError::Engine(e)) => {
            assert_eq!(e.file, "data");
            assert_eq!(e.line, 2);
            assert!(e.message.contains("expected `:`"), "{}", e.message);
        }
        other => panic!("expected a parse error, got {:?}", other),
    }

    let (_, slot) = capture(&mut host, source, RenderOptions::default());
    host.run_until_idle();
    match taken(&slot) {
        Err(RenderError::Engine(e)) => assert_eq!((e.line, e.file.as_str()), (2, "data")),
        other => panic!("expected a parse error, got {:?}", other),
    }
}

#[test]
fn test_include_paths_feed_filesystem_imports() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("palette.lac"), "p { q: #fff; }").expect("write import");

    let mut options = RenderOptions::default();
    options.include_paths = vec![dir.path().to_path_buf()];

    let mut host = Host::new();
    let (_, slot) = capture(&mut host, "@import \"palette\";", options);
    host.run_until_idle();
    let output = taken(&slot).expect("render");
    assert_eq!(output.css, "p {\n  q: #fff; }\n");
    assert_eq!(output.included_files, vec![dir.path().join("palette.lac")]);
}

#[test]
fn test_precision_option_reaches_the_engine() {
    let host = Host::new();
    let mut options = RenderOptions::default();
    options.precision = 2;
    let output = host.render_sync("a { b: 1.23456px; }", options).expect("render");
    assert_eq!(output.css, "a {\n  b: 1.23px; }\n");
}

#[test]
fn test_source_comments_option_reaches_the_engine() {
    let host = Host::new();
    let mut options = RenderOptions::default();
    options.source_comments = true;
    let output = host.render_sync("a{b:1px}", options).expect("render");
    assert_eq!(output.css, "/* line 1, data */\na {\n  b: 1px; }\n");
}

#[test]
fn test_many_jobs_complete_independently() {
    let mut host = Host::new();
    let seen: Rc<RefCell<Vec<(usize, String)>>> = Rc::new(RefCell::new(Vec::new()));

    for i in 0..8 {
        let seen = Rc::clone(&seen);
        host.render(
            format!("a{} {{ b: {}px; }}", i, i),
            RenderOptions::default(),
            move |output| seen.borrow_mut().push((i, output.css)),
            move |error| panic!("job {} failed: {}", i, error),
        )
        .expect("submit");
    }
    assert_eq!(host.active_jobs(), 8);
    host.run_until_idle();
    assert_eq!(host.active_jobs(), 0);

    let mut seen = seen.borrow_mut();
    seen.sort_by_key(|(i, _)| *i);
    assert_eq!(seen.len(), 8);
    for (i, css) in seen.iter() {
        assert_eq!(css, &format!("a{} {{\n  b: {}px; }}\n", i, i));
    }
}

#[test]
fn test_turn_services_one_job_at_a_time() {
    let mut host = Host::new();
    let (_, first) = capture(&mut host, "a{b:1px}", RenderOptions::default());
    let (_, second) = capture(&mut host, "c{d:2px}", RenderOptions::default());

    // Each job produces exactly one notice; two turns settle both.
    let more = host.turn();
    assert!(more, "one job should remain after the first completion");
    let more = host.turn();
    assert!(!more, "no jobs should remain");
    assert!(taken(&first).is_ok());
    assert!(taken(&second).is_ok());
}
