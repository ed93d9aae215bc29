//! Bridged host callback tests: custom functions and importers, immediate
//! and deferred completion, and the fault paths that turn misbehaving
//! handlers into errors instead of hangs.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use lacquer_rt::{
    FunctionHandler, Host, ImportDone, ImportEntry, ImporterHandler, RenderError, RenderOptions,
    RenderOutput, Value,
};

type Captured = Rc<RefCell<Option<Result<RenderOutput, RenderError>>>>;

fn capture(host: &mut Host, source: &str, options: RenderOptions) -> Captured {
    let _ = env_logger::builder().is_test(true).try_init();
    let slot: Captured = Rc::new(RefCell::new(None));
    let ok = Rc::clone(&slot);
    let err = Rc::clone(&slot);
    host.render(
        source,
        options,
        move |output| *ok.borrow_mut() = Some(Ok(output)),
        move |error| *err.borrow_mut() = Some(Err(error)),
    )
    .expect("submit");
    slot
}

fn taken(slot: &Captured) -> Result<RenderOutput, RenderError> {
    slot.borrow_mut().take().expect("render did not complete")
}

fn doubling_options() -> RenderOptions {
    let mut options = RenderOptions::default();
    options.functions.push((
        "double($n)".to_string(),
        FunctionHandler::Immediate(Arc::new(|args| {
            let (value, unit) = args[0].as_number()?;
            Ok(Value::number(value * 2.0, unit))
        })),
    ));
    options
}

#[test]
fn test_functions_run_on_the_coordinator_thread() {
    let coordinator = thread::current().id();
    let mut options = RenderOptions::default();
    options.functions.push((
        "double($n)".to_string(),
        FunctionHandler::Immediate(Arc::new(move |args| {
            assert_eq!(thread::current().id(), coordinator, "handler left the coordinator");
            let (value, unit) = args[0].as_number()?;
            Ok(Value::number(value * 2.0, unit))
        })),
    ));

    let mut host = Host::new();
    let slot = capture(&mut host, "a { b: double(4px); }", options);
    host.run_until_idle();
    assert_eq!(taken(&slot).expect("render").css, "a {\n  b: 8px; }\n");
}

#[test]
fn test_sync_renders_call_functions_inline() {
    let host = Host::new();
    let output = host.render_sync("a { b: double(4px); }", doubling_options()).expect("render");
    assert_eq!(output.css, "a {\n  b: 8px; }\n");
}

#[test]
fn test_function_defaults_fill_missing_arguments() {
    let mut options = RenderOptions::default();
    options.functions.push((
        "scale($n, $factor: 3)".to_string(),
        FunctionHandler::Immediate(Arc::new(|args| {
            let (value, unit) = args[0].as_number()?;
            let (factor, _) = args[1].as_number()?;
            Ok(Value::number(value * factor, unit))
        })),
    ));
    let host = Host::new();
    let output = host.render_sync("a { b: scale(2px); }", options).expect("render");
    assert_eq!(output.css, "a {\n  b: 6px; }\n");
}

#[test]
fn test_arity_violations_surface_with_the_call_site() {
    let host = Host::new();
    match host.render_sync("a {\n  b: double(1, 2);\n}", doubling_options()) {
        Err(RenderError::Engine(e)) => {
            assert!(e.message.contains("takes 1 argument(s)"), "{}", e.message);
            assert_eq!((e.line, e.column), (2, 6));
        }
        other => panic!("expected an arity error, got {:?}", other),
    }
}

#[test]
fn test_deferred_function_settles_from_another_thread() {
    let mut options = RenderOptions::default();
    options.functions.push((
        "slow-double($n)".to_string(),
        FunctionHandler::Deferred(Arc::new(|args, done| {
            let args = args.to_vec();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                match args[0].as_number() {
                    Ok((value, unit)) => done.resolve(Value::number(value * 2.0, unit)),
                    Err(e) => done.reject(e.to_string()),
                }
            });
        })),
    ));

    let mut host = Host::new();
    let slot = capture(&mut host, "a { b: slow-double(4px); }", options);
    host.run_until_idle();
    assert_eq!(taken(&slot).expect("render").css, "a {\n  b: 8px; }\n");
}

#[test]
fn test_function_errors_become_located_engine_errors() {
    let mut options = RenderOptions::default();
    options.functions.push((
        "explode()".to_string(),
        FunctionHandler::Immediate(Arc::new(|_| Err("not today".into()))),
    ));
    let mut host = Host::new();
    let slot = capture(&mut host, "a {\n  b: explode();\n}", options);
    host.run_until_idle();
    match taken(&slot) {
        Err(RenderError::Engine(e)) => {
            assert_eq!(e.message, "not today");
            assert_eq!((e.line, e.column), (2, 6));
            assert_eq!(e.file, "data");
        }
        other => panic!("expected a host error, got {:?}", other),
    }
}

#[test]
fn test_function_panic_fails_the_render_but_not_the_host() {
    let mut options = RenderOptions::default();
    options.functions.push((
        "explode()".to_string(),
        FunctionHandler::Immediate(Arc::new(|_| panic!("function exploded"))),
    ));
    let mut host = Host::new();
    let slot = capture(&mut host, "a { b: explode(); }", options);
    host.run_until_idle();
    match taken(&slot) {
        Err(RenderError::Engine(e)) => {
            assert!(e.message.contains("panicked"), "{}", e.message);
            assert!(e.message.contains("function exploded"), "{}", e.message);
        }
        other => panic!("expected a panic fault, got {:?}", other),
    }

    // The host survives a panicking handler.
    let output = host.render_sync("a{b:1px}", RenderOptions::default()).expect("render");
    assert_eq!(output.css, "a {\n  b: 1px; }\n");
}

#[test]
fn test_importer_supplies_contents() {
    let mut options = RenderOptions::default();
    options.importer = Some(ImporterHandler::Immediate(Arc::new(|request| {
        assert_eq!(request.from, "data");
        match request.url.as_str() {
            "shared" => Ok(vec![ImportEntry::contents("s { t: 2px; }")]),
            other => Err(format!("no such module `{}`", other).into()),
        }
    })));

    let mut host = Host::new();
    let slot = capture(&mut host, "@import \"shared\";\na { b: 1; }", options);
    host.run_until_idle();
    let output = taken(&slot).expect("render");
    assert_eq!(output.css, "s {\n  t: 2px; }\n\na {\n  b: 1; }\n");
}

#[test]
fn test_importer_can_redirect_to_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let target = dir.path().join("redirected.lac");
    std::fs::write(&target, "r { s: 5px; }").expect("write import");

    let mut options = RenderOptions::default();
    let redirect = target.clone();
    options.importer = Some(ImporterHandler::Immediate(Arc::new(move |_| {
        Ok(vec![ImportEntry::file(redirect.clone())])
    })));

    let mut host = Host::new();
    let slot = capture(&mut host, "@import \"anything\";", options);
    host.run_until_idle();
    let output = taken(&slot).expect("render");
    assert_eq!(output.css, "r {\n  s: 5px; }\n");
    assert_eq!(output.included_files, vec![target]);
}

#[test]
fn test_deferred_importer_settles_from_another_thread() {
    let mut options = RenderOptions::default();
    options.importer = Some(ImporterHandler::Deferred(Arc::new(|request, done| {
        let url = request.url.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            done.resolve(vec![ImportEntry::contents(format!("{} {{ ok: 1; }}", url))]);
        });
    })));

    let mut host = Host::new();
    let slot = capture(&mut host, "@import \"mod\";", options);
    host.run_until_idle();
    assert_eq!(taken(&slot).expect("render").css, "mod {\n  ok: 1; }\n");
}

#[test]
fn test_second_import_panicking_fails_the_job_after_the_first_resolves() {
    let urls: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&urls);

    let mut options = RenderOptions::default();
    options.importer = Some(ImporterHandler::Deferred(Arc::new(move |request, done| {
        seen.lock().expect("urls").push(request.url.clone());
        match request.url.as_str() {
            "one" => {
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(5));
                    done.resolve(vec![ImportEntry::contents("o { p: 1; }")]);
                });
            }
            _ => panic!("second import exploded"),
        }
    })));

    let mut host = Host::new();
    let slot = capture(&mut host, "@import \"one\";\n@import \"two\";", options);
    host.run_until_idle();

    match taken(&slot) {
        Err(RenderError::Engine(e)) => {
            assert!(e.message.contains("panicked"), "{}", e.message);
            assert!(e.message.contains("second import exploded"), "{}", e.message);
            assert_eq!(e.line, 2, "the failing import is on line 2");
        }
        other => panic!("expected a panic fault, got {:?}", other),
    }
    // The first rendezvous settled; the engine moved on to the second.
    assert_eq!(urls.lock().expect("urls").as_slice(), &["one".to_string(), "two".to_string()]);
}

#[test]
fn test_abandoned_import_token_fails_the_render() {
    let mut options = RenderOptions::default();
    options.importer = Some(ImporterHandler::Deferred(Arc::new(|_, done| {
        // Dropping the token without settling it must not hang the job.
        drop(done);
    })));

    let mut host = Host::new();
    let slot = capture(&mut host, "@import \"lost\";", options);
    host.run_until_idle();
    match taken(&slot) {
        Err(RenderError::Engine(e)) => {
            assert!(e.message.contains("dropped without completing"), "{}", e.message);
        }
        other => panic!("expected an abandonment fault, got {:?}", other),
    }
}

#[test]
fn test_importer_rejections_keep_the_host_message() {
    let mut options = RenderOptions::default();
    options.importer = Some(ImporterHandler::Deferred(Arc::new(|request, done| {
        done.reject(format!("registry has no `{}`", request.url));
    })));
    let mut host = Host::new();
    let slot = capture(&mut host, "@import \"ghost\";", options);
    host.run_until_idle();
    match taken(&slot) {
        Err(RenderError::Engine(e)) => assert_eq!(e.message, "registry has no `ghost`"),
        other => panic!("expected a rejection, got {:?}", other),
    }
}

#[test]
fn test_callback_timeout_fails_stuck_renders() {
    let parked: Arc<Mutex<Vec<ImportDone>>> = Arc::new(Mutex::new(Vec::new()));
    let stash = Arc::clone(&parked);

    let mut options = RenderOptions::default();
    options.callback_timeout = Some(Duration::from_millis(50));
    options.importer = Some(ImporterHandler::Deferred(Arc::new(move |_, done| {
        // Keep the token alive but never settle it.
        stash.lock().expect("stash").push(done);
    })));

    let mut host = Host::new();
    let slot = capture(&mut host, "@import \"stuck\";", options);
    host.run_until_idle();
    match taken(&slot) {
        Err(RenderError::Engine(e)) => {
            assert!(e.message.contains("did not complete"), "{}", e.message);
        }
        other => panic!("expected a timeout, got {:?}", other),
    }

    // Settling the parked token afterwards is a stale no-op.
    for done in parked.lock().expect("stash").drain(..) {
        done.resolve(vec![ImportEntry::contents("late { l: 1; }")]);
    }
    let output = host.render_sync("a{b:1px}", RenderOptions::default()).expect("render");
    assert_eq!(output.css, "a {\n  b: 1px; }\n");
}

#[test]
fn test_deferral_is_rejected_during_synchronous_renders() {
    let parked: Arc<Mutex<Vec<ImportDone>>> = Arc::new(Mutex::new(Vec::new()));
    let stash = Arc::clone(&parked);

    let mut options = RenderOptions::default();
    options.importer = Some(ImporterHandler::Deferred(Arc::new(move |_, done| {
        stash.lock().expect("stash").push(done);
    })));

    let host = Host::new();
    match host.render_sync("@import \"stuck\";", options) {
        Err(RenderError::Engine(e)) => {
            assert!(e.message.contains("synchronous"), "{}", e.message);
        }
        other => panic!("expected a deferral fault, got {:?}", other),
    }
}

#[test]
fn test_functions_and_importer_cooperate_in_one_render() {
    let mut options = doubling_options();
    options.importer = Some(ImporterHandler::Immediate(Arc::new(|_| {
        Ok(vec![ImportEntry::contents("i { j: double(2px); }")])
    })));

    let mut host = Host::new();
    let slot = capture(&mut host, "@import \"mixin\";\na { b: double(1px); }", options);
    host.run_until_idle();
    let output = taken(&slot).expect("render");
    assert_eq!(output.css, "i {\n  j: 4px; }\n\na {\n  b: 2px; }\n");
}

#[test]
fn test_unregistered_calls_still_pass_through() {
    let host = Host::new();
    let output = host
        .render_sync("a { b: url(\"x.png\") double(2px); }", doubling_options())
        .expect("render");
    assert_eq!(output.css, "a {\n  b: url(\"x.png\") 4px; }\n");
}
