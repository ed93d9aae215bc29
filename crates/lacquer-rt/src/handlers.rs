//! Host-facing callback declarations and their bridge adapters.
//!
//! Hosts declare custom functions and importers as plain closures; this
//! module parses their signatures, wraps each one in a bridge handler and
//! adapts the bridges to the engine's hook traits. The engine never sees
//! host closures directly, only the bridged adapters.

use std::sync::{Arc, Weak};
use std::time::Duration;

use lacquer_engine::{FunctionHost, HookError, ImportEntry, ImportHook};
use lacquer_value::Value;

use crate::bridge::{BridgeMode, CallbackBridge, Handler, Poison, Responder};
use crate::error::RenderError;
use crate::event_loop::WakeHandle;
use crate::registry::{ImportDone, PendingCalls};

/// Error type host callbacks return. Only the message survives the trip
/// back into the engine.
pub type HostError = Box<dyn std::error::Error + Send + Sync>;

/// A custom function provided by the host.
#[derive(Clone)]
pub enum FunctionHandler {
    /// Returns its result from the call itself.
    Immediate(Arc<dyn Fn(&[Value]) -> Result<Value, HostError> + Send + Sync>),
    /// Receives a completion token and settles it later, possibly from
    /// another thread.
    Deferred(Arc<dyn Fn(&[Value], FunctionDone) + Send + Sync>),
}

/// An importer provided by the host, consulted for every `@import`.
#[derive(Clone)]
pub enum ImporterHandler {
    Immediate(Arc<dyn Fn(&ImportRequest) -> Result<Vec<ImportEntry>, HostError> + Send + Sync>),
    Deferred(Arc<dyn Fn(&ImportRequest, ImportDone) + Send + Sync>),
}

/// What an importer is asked to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    /// The url exactly as written in the stylesheet.
    pub url: String,
    /// Label of the file containing the `@import`.
    pub from: String,
}

/// Completion token for one deferred function call. Settle it exactly
/// once, from any thread; dropping it unsettled fails the call.
pub struct FunctionDone {
    responder: Responder<Value>,
}

impl FunctionDone {
    /// Settles the call with the function's value.
    pub fn resolve(self, value: Value) {
        self.responder.resolve(value);
    }

    /// Settles the call with a host-side error message.
    pub fn reject(self, message: impl Into<String>) {
        self.responder.reject(message);
    }
}

/// A parsed function signature: `name($a, $b: 10px)`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FunctionSpec {
    pub(crate) name: String,
    pub(crate) params: Vec<Param>,
    pub(crate) variadic: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Param {
    pub(crate) name: String,
    pub(crate) default: Option<Value>,
}

/// Parses a declaration signature. A bare `name` accepts any arguments,
/// as does `name(...)`; otherwise parameters are `$name` with an optional
/// literal default after `:`.
pub(crate) fn parse_signature(signature: &str) -> Result<FunctionSpec, RenderError> {
    let signature = signature.trim();
    let bad =
        |why: &str| RenderError::Signature(format!("`{}`: {}", signature, why));

    let (name, rest) = match signature.find('(') {
        None => {
            if signature.is_empty() || !is_function_name(signature) {
                return Err(bad("expected a function name"));
            }
            return Ok(FunctionSpec {
                name: signature.to_string(),
                params: Vec::new(),
                variadic: true,
            });
        }
        Some(open) => (signature[..open].trim_end(), &signature[open + 1..]),
    };
    if name.is_empty() || !is_function_name(name) {
        return Err(bad("expected a function name before `(`"));
    }
    let inner = rest.trim_end().strip_suffix(')').ok_or_else(|| bad("missing closing `)`"))?;

    let mut params = Vec::new();
    let mut variadic = false;
    for raw in inner.split(',').map(str::trim) {
        if raw.is_empty() {
            if inner.trim().is_empty() && params.is_empty() {
                break;
            }
            return Err(bad("empty parameter"));
        }
        if variadic {
            return Err(bad("no parameters may follow `...`"));
        }
        if raw == "..." || (raw.starts_with('$') && raw.ends_with("...")) {
            variadic = true;
            continue;
        }
        let raw = raw.strip_prefix('$').ok_or_else(|| bad("parameters must start with `$`"))?;
        match raw.split_once(':') {
            None => {
                if !is_function_name(raw) {
                    return Err(bad("invalid parameter name"));
                }
                params.push(Param { name: raw.to_string(), default: None });
            }
            Some((param, default)) => {
                let param = param.trim_end();
                if !is_function_name(param) {
                    return Err(bad("invalid parameter name"));
                }
                let default = lacquer_value::parse_literal(default.trim())
                    .ok_or_else(|| bad("default value is not a literal"))?;
                params.push(Param { name: param.to_string(), default: Some(default) });
            }
        }
    }
    Ok(FunctionSpec { name: name.to_string(), params, variadic })
}

fn is_function_name(text: &str) -> bool {
    !text.is_empty()
        && text.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        && !text.starts_with(|c: char| c.is_ascii_digit())
}

/// Fills in defaults and enforces arity for one call.
pub(crate) fn apply_arity(spec: &FunctionSpec, args: &[Value]) -> Result<Vec<Value>, String> {
    if args.len() > spec.params.len() && !spec.variadic {
        return Err(format!(
            "`{}` takes {} argument(s) but {} were passed",
            spec.name,
            spec.params.len(),
            args.len()
        ));
    }
    let mut full = args.to_vec();
    for param in spec.params.iter().skip(args.len()) {
        match &param.default {
            Some(default) => full.push(default.clone()),
            None => {
                return Err(format!(
                    "`{}` is missing required argument `${}`",
                    spec.name, param.name
                ))
            }
        }
    }
    Ok(full)
}

/// Builds the coordinator-side handler for one declared function.
fn function_handler(handler: FunctionHandler) -> Handler<Vec<Value>, Value> {
    match handler {
        FunctionHandler::Immediate(call) => Box::new(move |args: Vec<Value>, done| {
            match call(&args) {
                Ok(value) => done.resolve(value),
                Err(e) => done.reject(e.to_string()),
            }
        }),
        FunctionHandler::Deferred(call) => Box::new(move |args: Vec<Value>, done| {
            call(&args, FunctionDone { responder: done });
        }),
    }
}

/// Builds the coordinator-side handler for the importer. Deferred
/// importers get their token through the job's pending-call table.
///
/// The handler holds the table weakly: the table's slots hold responders
/// pointing back into the bridge, and a strong capture here would tie the
/// two into a cycle neither could ever leave.
fn importer_handler(
    handler: ImporterHandler,
    calls: Weak<PendingCalls>,
) -> Handler<ImportRequest, Vec<ImportEntry>> {
    match handler {
        ImporterHandler::Immediate(resolve) => Box::new(move |request: ImportRequest, done| {
            match resolve(&request) {
                Ok(entries) => done.resolve(entries),
                Err(e) => done.reject(e.to_string()),
            }
        }),
        ImporterHandler::Deferred(resolve) => Box::new(move |request: ImportRequest, done| {
            match calls.upgrade() {
                Some(calls) => {
                    let token = calls.register(done);
                    resolve(&request, token);
                }
                // Table gone: the job is tearing down. Dropping the
                // responder reports the call as abandoned.
                None => drop(done),
            }
        }),
    }
}

/// The engine-facing adapter for every declared function, one bridge per
/// function so concurrent jobs never share rendezvous state.
pub(crate) struct BridgedFunctions {
    bridges: Vec<(FunctionSpec, CallbackBridge<Vec<Value>, Value>)>,
}

impl BridgedFunctions {
    pub(crate) fn build(
        declared: &[(String, FunctionHandler)],
        mode: BridgeMode,
        waker: &WakeHandle,
        deadline: Option<Duration>,
    ) -> Result<Option<Arc<BridgedFunctions>>, RenderError> {
        if declared.is_empty() {
            return Ok(None);
        }
        let mut bridges = Vec::with_capacity(declared.len());
        for (signature, handler) in declared {
            let spec = parse_signature(signature)?;
            log::debug!("registering function `{}` ({} parameter(s))", spec.name, spec.params.len());
            let bridge = CallbackBridge::new(
                format!("function `{}`", spec.name),
                mode,
                waker.clone(),
                deadline,
                function_handler(handler.clone()),
            );
            bridges.push((spec, bridge));
        }
        Ok(Some(Arc::new(BridgedFunctions { bridges })))
    }

    pub(crate) fn poison_handles(&self) -> Vec<Arc<dyn Poison>> {
        self.bridges.iter().map(|(_, bridge)| bridge.poison_handle()).collect()
    }
}

impl FunctionHost for BridgedFunctions {
    fn recognizes(&self, name: &str) -> bool {
        self.bridges.iter().any(|(spec, _)| spec.name == name)
    }

    fn call(&self, name: &str, args: &[Value]) -> Result<Value, HookError> {
        let (spec, bridge) = self
            .bridges
            .iter()
            .find(|(spec, _)| spec.name == name)
            .ok_or_else(|| HookError::new(format!("no handler for function `{}`", name)))?;
        let full = apply_arity(spec, args).map_err(HookError::new)?;
        bridge.invoke(full).map_err(|fault| HookError::new(fault.to_string()))
    }
}

/// The engine-facing adapter for the importer. Owns the pending-call
/// table; when the adapter is dropped at the end of the compile, any
/// responders still parked in the table drop with it and settle their
/// calls as stale no-ops.
pub(crate) struct BridgedImporter {
    bridge: CallbackBridge<ImportRequest, Vec<ImportEntry>>,
    _calls: Arc<PendingCalls>,
}

impl BridgedImporter {
    pub(crate) fn build(
        handler: ImporterHandler,
        mode: BridgeMode,
        waker: &WakeHandle,
        deadline: Option<Duration>,
        calls: Arc<PendingCalls>,
    ) -> Arc<BridgedImporter> {
        let bridge = CallbackBridge::new(
            "importer",
            mode,
            waker.clone(),
            deadline,
            importer_handler(handler, Arc::downgrade(&calls)),
        );
        Arc::new(BridgedImporter { bridge, _calls: calls })
    }

    pub(crate) fn poison_handle(&self) -> Arc<dyn Poison> {
        self.bridge.poison_handle()
    }
}

impl ImportHook for BridgedImporter {
    fn resolve(&self, url: &str, from: &str) -> Result<Vec<ImportEntry>, HookError> {
        self.bridge
            .invoke(ImportRequest { url: url.to_string(), from: from.to_string() })
            .map_err(|fault| HookError::new(fault.to_string()))
    }
}
