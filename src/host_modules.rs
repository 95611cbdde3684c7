//! Stand-ins for the standard-library host modules named in §1 as external
//! collaborators (`fs`, `path`, `buffer`, `url`, `encoding`, `crypto`,
//! `fetch`-client, `http`, `websocket`, `sqlite`, `process`, `console`,
//! module-registry), plus the `Response` global named in §1/§4.4/§9. A full
//! edge runtime registers real implementations of the host modules before
//! the dispatcher runs; this crate's core does not depend on their
//! behavior, only on `require(name)` resolving to *something* so a worker's
//! module IIFE can evaluate without throwing. `console` gets a real (if
//! minimal) implementation, since nearly every worker calls it; the rest
//! are empty namespace objects.
//!
//! Per §4.7 step 1, host modules are registered once at `EdgeRuntime`
//! construction, not rebuilt per `require` call: `HostModuleRegistry::install`
//! builds every entry a single time and `require` hands back the same
//! persisted object on every subsequent call.

use std::collections::HashMap;

use rquickjs::{Ctx, Exception, Function, Object, Persistent, Result as JsResult, Value};

const HOST_MODULE_NAMES: &[&str] = &[
    "console", "process", "url", "buffer", "path", "fetch", "crypto", "encoding", "fs", "http",
    "websocket", "sqlite",
];

/// The global `Response` constructor named in §1/§4.4/§9: a framework-style
/// class that stores its body and headers in `_body`/`_headers` "private"
/// slots (and a public `status`), the shape `src/response.rs`'s extractor
/// already knows how to read. Evaluated once as plain global-mode source,
/// matching this crate's style of treating JS as text rather than reaching
/// for `rquickjs`'s class-derive machinery for a single three-field value.
const RESPONSE_CLASS_SOURCE: &str = r#"
function Response(body, init) {
  init = init || {};
  this.status = typeof init.status === "number" ? init.status : 200;
  this._headers = init.headers || {};
  this._body = body === undefined || body === null ? "" : String(body);
}
"#;

/// Builds the exports object for a host module by name.
fn build<'js>(ctx: &Ctx<'js>, name: &str) -> JsResult<Object<'js>> {
    match name {
        "console" => build_console(ctx),
        _ => Object::new(ctx.clone()),
    }
}

fn build_console<'js>(ctx: &Ctx<'js>) -> JsResult<Object<'js>> {
    let console = Object::new(ctx.clone())?;
    console.set("log", Function::new(ctx.clone(), log_info)?)?;
    console.set("info", Function::new(ctx.clone(), log_info)?)?;
    console.set("warn", Function::new(ctx.clone(), log_warn)?)?;
    console.set("error", Function::new(ctx.clone(), log_error)?)?;
    console.set("debug", Function::new(ctx.clone(), log_debug)?)?;
    Ok(console)
}

fn format_args(args: rquickjs::function::Rest<Value<'_>>) -> String {
    args.0
        .iter()
        .map(|v| {
            v.as_string()
                .and_then(|s| s.to_string().ok())
                .unwrap_or_else(|| format!("{v:?}"))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn log_info(args: rquickjs::function::Rest<Value<'_>>) {
    tracing::info!(target: "worker::console", "{}", format_args(args));
}

fn log_warn(args: rquickjs::function::Rest<Value<'_>>) {
    tracing::warn!(target: "worker::console", "{}", format_args(args));
}

fn log_error(args: rquickjs::function::Rest<Value<'_>>) {
    tracing::error!(target: "worker::console", "{}", format_args(args));
}

fn log_debug(args: rquickjs::function::Rest<Value<'_>>) {
    tracing::debug!(target: "worker::console", "{}", format_args(args));
}

/// Every host module, built exactly once and handed back by reference from
/// `require`. Holding `Persistent` values lets the registry outlive the
/// `ctx.with` scope it was built in and be shared by every later call.
pub struct HostModuleRegistry {
    modules: HashMap<&'static str, Persistent<Object<'static>>>,
}

impl HostModuleRegistry {
    pub fn install(ctx: &Ctx<'_>) -> JsResult<Self> {
        let mut modules = HashMap::with_capacity(HOST_MODULE_NAMES.len());
        for name in HOST_MODULE_NAMES {
            let module = build(ctx, name)?;
            modules.insert(*name, Persistent::save(ctx, module));
        }
        Ok(Self { modules })
    }

    fn get<'js>(&self, ctx: &Ctx<'js>, name: &str) -> Option<JsResult<Object<'js>>> {
        self.modules.get(name).map(|persisted| persisted.clone().restore(ctx))
    }
}

/// Installs the global `Response` constructor. Must run once per engine,
/// before any worker source is evaluated.
pub fn install_response_class(ctx: &Ctx<'_>) -> Result<(), String> {
    crate::engine::eval_global(ctx, RESPONSE_CLASS_SOURCE).map(|_| ())
}

/// Installs the global `require(specifier)` function against an
/// already-populated `registry`. `resolve_local` is called for any
/// specifier that is not a recognized host module name; it is responsible
/// for the relative-file resolution chain described in §4.7.
pub fn install_require<'js, F>(
    ctx: &Ctx<'js>,
    registry: std::rc::Rc<HostModuleRegistry>,
    resolve_local: F,
) -> JsResult<()>
where
    F: Fn(Ctx<'js>, String) -> JsResult<Value<'js>> + 'js,
{
    let require = Function::new(ctx.clone(), move |ctx: Ctx<'js>, specifier: String| {
        let normalized = specifier.strip_prefix("node:").unwrap_or(&specifier).to_string();
        match registry.get(&ctx, &normalized) {
            Some(module) => module.map(Object::into_value),
            None => resolve_local(ctx, specifier),
        }
    })?;
    ctx.globals().set("require", require)?;
    Ok(())
}

pub fn unknown_module_error<'js>(ctx: &Ctx<'js>, specifier: &str) -> rquickjs::Error {
    Exception::throw_message(ctx, &format!("Cannot find module '{specifier}'"))
}
