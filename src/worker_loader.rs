//! The worker loader (C3): reads a worker's source file, runs it through the
//! ESM→CJS transform when needed, wraps it in the module IIFE, evaluates it
//! against the shared engine context, and pulls out the `fetch` handler.
//!
//! `fetch_callback` and `module_exports` have to outlive the single
//! `ctx.with` closure they were produced in — they are read again on every
//! request, long after loading finishes — so they are held as
//! `rquickjs::Persistent` values and restored into a fresh `Ctx` on each use,
//! which is exactly the problem `Persistent` exists to solve.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use rquickjs::{Ctx, Function, Object, Persistent};

use crate::edge_config::WorkerConfig;
use crate::engine;
use crate::error::EdgeError;
use crate::host_modules::{self, HostModuleRegistry};
use crate::route_index::RouteIndex;
use crate::transform;

/// A loaded worker: its `fetch` handler and the `module.exports` value that
/// serves as `this` when the handler is invoked.
pub struct Worker {
    pub name: String,
    fetch_callback: Persistent<Function<'static>>,
    module_exports: Persistent<Object<'static>>,
}

impl Worker {
    pub fn fetch_callback<'js>(&self, ctx: &Ctx<'js>) -> rquickjs::Result<Function<'js>> {
        self.fetch_callback.clone().restore(ctx)
    }

    pub fn module_exports<'js>(&self, ctx: &Ctx<'js>) -> rquickjs::Result<Object<'js>> {
        self.module_exports.clone().restore(ctx)
    }
}

/// Caches sibling-module `module.exports` objects by canonical path, and
/// tracks the directory a nested `require('./x')` should resolve against —
/// the directory of whichever file is currently being loaded.
#[derive(Default)]
struct ModuleCache {
    base_dirs: RefCell<Vec<PathBuf>>,
    exports: RefCell<HashMap<PathBuf, Persistent<Object<'static>>>>,
}

impl ModuleCache {
    fn current_base_dir(&self) -> PathBuf {
        self.base_dirs
            .borrow()
            .last()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn push_base_dir(&self, dir: PathBuf) {
        self.base_dirs.borrow_mut().push(dir);
    }

    fn pop_base_dir(&self) {
        self.base_dirs.borrow_mut().pop();
    }
}

fn wrap_module_iife(code: &str) -> String {
    format!(
        "(function(exports, require, module, __filename, __dirname) {{\n{code}\nreturn module.exports;\n}})({{}}, require, {{exports:{{}}}}, '', '')"
    )
}

/// Distinguishes a failure to open/read a module's source file from a
/// failure while evaluating it, so the two `WorkerLoadFailed` kinds in §7
/// stay distinct all the way up to `EdgeError`.
enum LoadError {
    Read(String),
    Eval(String),
}

impl LoadError {
    fn message(&self) -> &str {
        match self {
            LoadError::Read(message) | LoadError::Eval(message) => message,
        }
    }
}

/// Loads a single file through `isEsModule` → transform → module IIFE →
/// eval, returning the resulting `module.exports` object. Shared between
/// top-level worker loading and the `require('./sibling')` resolution path.
fn load_module<'js>(ctx: &Ctx<'js>, path: &Path, cache: &Rc<ModuleCache>) -> Result<Object<'js>, LoadError> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

    if let Some(persisted) = cache.exports.borrow().get(&canonical) {
        return persisted
            .clone()
            .restore(ctx)
            .map_err(|err| LoadError::Eval(format!("failed to restore cached module {}: {err}", canonical.display())));
    }

    let source = std::fs::read_to_string(&canonical)
        .map_err(|err| LoadError::Read(format!("failed to read {}: {err}", canonical.display())))?;
    let code = if transform::is_es_module(&source) {
        transform::transform(&source)
    } else {
        source
    };
    let wrapped = wrap_module_iife(&code);

    let parent = canonical.parent().map(Path::to_path_buf).unwrap_or_default();
    cache.push_base_dir(parent);
    let result = engine::eval_global(ctx, &wrapped);
    cache.pop_base_dir();

    let value = result.map_err(LoadError::Eval)?;
    let exports = value
        .into_object()
        .ok_or_else(|| LoadError::Eval(format!("module at {} did not evaluate to an object", canonical.display())))?;

    let persisted = Persistent::save(ctx, exports.clone());
    cache.exports.borrow_mut().insert(canonical, persisted);
    Ok(exports)
}

/// Installs the global `require` function used both by top-level worker
/// IIFEs and by any sibling file they require in turn, resolving host
/// module names against the already-built `registry` (per §4.7 step 1,
/// host modules are registered once, not rebuilt on every `require` call).
fn install_require(ctx: &Ctx<'_>, registry: Rc<HostModuleRegistry>, cache: Rc<ModuleCache>) -> rquickjs::Result<()> {
    let cache_for_closure = cache;
    host_modules::install_require(ctx, registry, move |ctx, specifier| {
        if !(specifier.starts_with("./") || specifier.starts_with("../")) {
            return Err(host_modules::unknown_module_error(&ctx, &specifier));
        }
        let resolved = cache_for_closure.current_base_dir().join(&specifier);
        match load_module(&ctx, &resolved, &cache_for_closure) {
            Ok(obj) => Ok(obj.into_value()),
            Err(err) => Err(rquickjs::Exception::throw_message(&ctx, err.message())),
        }
    })
}

fn resolve_fetch_handler<'js>(exports: &Object<'js>) -> Option<(Function<'js>, Object<'js>)> {
    if let Ok(fetch) = exports.get::<_, Function>("fetch") {
        return Some((fetch, exports.clone()));
    }
    if let Ok(default) = exports.get::<_, Object>("default") {
        if let Ok(fetch) = default.get::<_, Function>("fetch") {
            return Some((fetch, default));
        }
    }
    None
}

/// Loads every configured worker, registers its routes, and returns the
/// resulting worker sequence in configuration order (worker index == route
/// index registered against `routes`).
pub fn load_all(
    engine: &engine::Engine,
    workers: &[WorkerConfig],
    routes: &mut RouteIndex,
) -> Result<Vec<Worker>, EdgeError> {
    let cache = Rc::new(ModuleCache::default());
    let mut loaded = Vec::with_capacity(workers.len());

    engine.with(|ctx| -> Result<(), EdgeError> {
        let registry = Rc::new(HostModuleRegistry::install(&ctx).map_err(|err| EdgeError::WorkerEval {
            name: "<runtime>".to_string(),
            message: err.to_string(),
        })?);
        install_require(&ctx, registry, cache.clone()).map_err(|err| EdgeError::WorkerEval {
            name: "<runtime>".to_string(),
            message: err.to_string(),
        })?;
        host_modules::install_response_class(&ctx).map_err(|message| EdgeError::WorkerEval {
            name: "<runtime>".to_string(),
            message,
        })?;
        Ok(())
    })?;

    for config in workers {
        if config.path.as_os_str().is_empty() {
            tracing::warn!(worker = %config.name, "worker has empty path, skipping");
            continue;
        }

        let worker_index = loaded.len();
        let name = config.name.clone();
        let path = config.path.clone();

        let worker = engine.with(|ctx| -> Result<Worker, EdgeError> {
            let exports = load_module(&ctx, &path, &cache).map_err(|err| match err {
                LoadError::Read(message) => EdgeError::WorkerRead {
                    path: path.clone(),
                    source: message,
                },
                LoadError::Eval(message) => EdgeError::WorkerEval {
                    name: name.clone(),
                    message,
                },
            })?;

            let (fetch, receiver) =
                resolve_fetch_handler(&exports).ok_or_else(|| EdgeError::NoFetchHandler { name: name.clone() })?;

            Ok(Worker {
                name: name.clone(),
                fetch_callback: Persistent::save(&ctx, fetch),
                module_exports: Persistent::save(&ctx, receiver),
            })
        })?;

        for pattern in &config.routes {
            routes.add(pattern.clone(), worker_index);
        }

        loaded.push(worker);
    }

    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge_config::WorkerConfig;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::with_suffix(".js").expect("tempfile");
        file.write_all(contents.as_bytes()).expect("write");
        file
    }

    #[test]
    fn esm_and_cjs_default_exports_are_equivalent() {
        let engine = engine::Engine::new().expect("engine");

        let esm = write_temp("export default { fetch(req) { return 'x'; } };\n");
        let cjs = write_temp("module.exports = { fetch(req) { return 'x'; } };\n");

        let esm_config = WorkerConfig {
            name: "esm".into(),
            path: esm.path().to_path_buf(),
            routes: vec!["/esm".into()],
        };
        let cjs_config = WorkerConfig {
            name: "cjs".into(),
            path: cjs.path().to_path_buf(),
            routes: vec!["/cjs".into()],
        };

        let mut routes = RouteIndex::new();
        let workers = load_all(&engine, &[esm_config, cjs_config], &mut routes).expect("load");
        assert_eq!(workers.len(), 2);

        engine.with(|ctx| {
            for worker in &workers {
                let fetch = worker.fetch_callback(&ctx).expect("fetch");
                let receiver = worker.module_exports(&ctx).expect("exports");
                let result: rquickjs::Value =
                    fetch.call_with_receiver(receiver.into_value(), (rquickjs::Undefined,)).expect("call");
                assert_eq!(result.as_string().unwrap().to_string().unwrap(), "x");
            }
        });
    }

    #[test]
    fn missing_fetch_handler_is_rejected() {
        let engine = engine::Engine::new().expect("engine");
        let file = write_temp("module.exports = { ping() { return 1; } };\n");
        let config = WorkerConfig {
            name: "broken".into(),
            path: file.path().to_path_buf(),
            routes: vec![],
        };
        let mut routes = RouteIndex::new();
        let err = load_all(&engine, &[config], &mut routes).unwrap_err();
        assert!(matches!(err, EdgeError::NoFetchHandler { name } if name == "broken"));
    }
}
