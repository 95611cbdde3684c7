//! A thin binding to the embedded JavaScript engine. §1 calls the engine
//! itself out of scope; this module is the adapter that satisfies the
//! host-module interface named in §6.5, using `rquickjs` synchronously
//! (never `AsyncRuntime`) to match the single-threaded, non-interleaved
//! model in §5. Every `rquickjs::Value`/`Object`/`Function` is already an
//! owning, lifetime-scoped handle whose `Drop` performs the release the
//! component design asks for, so a per-request `ctx.with(|ctx| { .. })`
//! closure is all the "release on scope exit" bookkeeping this crate needs.

use rquickjs::{context::EvalOptions, CatchResultExt, CaughtError, Context, Ctx, Runtime, Value};

/// One engine instance for the whole process: a single `Runtime` and a
/// single `Context`, shared read-only by every worker after startup.
pub struct Engine {
    runtime: Runtime,
    context: Context,
}

impl Engine {
    pub fn new() -> rquickjs::Result<Self> {
        let runtime = Runtime::new()?;
        let context = Context::full(&runtime)?;
        Ok(Self { runtime, context })
    }

    /// Runs `f` with access to the shared context. This is the "per-request
    /// scope" from the ownership invariants: values built inside `f` are
    /// dropped when `f` returns.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(Ctx<'_>) -> R,
    {
        self.context.with(f)
    }
}

/// Evaluates `source` as a classic script (global mode, never an ES
/// module) — the core's own transform already produced CommonJS, so the
/// engine must not try to parse it as a module.
pub fn eval_global<'js>(ctx: &Ctx<'js>, source: &str) -> Result<Value<'js>, String> {
    let options = EvalOptions {
        global: true,
        strict: false,
        backtrace_barrier: false,
    };
    ctx.eval_with_options::<Value, _>(source, options)
        .catch(ctx)
        .map_err(|err| describe_exception(ctx, &err))
}

/// Calls a `fetch`-shaped function value with `receiver` as `this` and a
/// single positional argument, returning a human-readable description of
/// any thrown exception instead of the engine's own error type, matching
/// the "uniform error dump" named in §6.5.
pub fn call_with_receiver<'js>(
    ctx: &Ctx<'js>,
    func: &rquickjs::Function<'js>,
    receiver: rquickjs::Value<'js>,
    arg: rquickjs::Value<'js>,
) -> Result<Value<'js>, String> {
    func.call_with_receiver::<_, Value>(receiver, (arg,))
        .catch(ctx)
        .map_err(|err| describe_exception(ctx, &err))
}

/// Renders an engine exception (message + stack trace, when present) to a
/// single string. This is the uniform error dump the hot path logs and the
/// startup path aborts with.
pub fn describe_exception(ctx: &Ctx<'_>, err: &CaughtError<'_>) -> String {
    match err {
        CaughtError::Error(err) => format!("{err:?}"),
        CaughtError::Exception(ex) => {
            let message = ex.message().unwrap_or_default();
            match ex.stack() {
                Some(stack) => format!("{message}\n{stack}"),
                None => message,
            }
        }
        CaughtError::Value(value) => {
            format!("{value:?}")
        }
    }
}
