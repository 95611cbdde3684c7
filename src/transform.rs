//! Single-pass, textual ESM→CJS transform. No parser: the transform walks the
//! source byte-by-byte, tracking only enough state (string/comment nesting)
//! to avoid rewriting keywords that appear inside string or comment text, and
//! only recognizes the module forms named in the component design. Anything
//! else is copied through unchanged.

fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// Scans a string literal starting at `bytes[start]` (which must be `"`, `'`
/// or `` ` ``) and returns the index just past its closing quote.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    i
}

/// Scans a `//` line comment starting at `bytes[start]` and returns the
/// index of the terminating newline (or end of input).
fn skip_line_comment(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() && bytes[i] != b'\n' {
        i += 1;
    }
    i
}

/// Scans a `/* ... */` block comment starting at `bytes[start]` and returns
/// the index just past the closing `*/`.
fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 2;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            return i + 2;
        }
        i += 1;
    }
    bytes.len()
}

/// True if the source contains `export ` or `import ` at an identifier
/// boundary, outside of string literals and comments.
pub fn is_es_module(source: &str) -> bool {
    let bytes = source.as_bytes();
    let mut i = 0;
    let mut prev_non_skipped: Option<u8> = None;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' | b'`' => {
                i = skip_string(bytes, i);
                prev_non_skipped = Some(b'"');
            }
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'/' => {
                i = skip_line_comment(bytes, i);
            }
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'*' => {
                i = skip_block_comment(bytes, i);
            }
            _ => {
                let boundary_ok = prev_non_skipped.map(|b| !is_identifier_byte(b)).unwrap_or(true);
                if boundary_ok
                    && (source[i..].starts_with("export ") || source[i..].starts_with("import "))
                {
                    return true;
                }
                prev_non_skipped = Some(bytes[i]);
                i += 1;
            }
        }
    }
    false
}

/// Basename without extension, per §4.2: drop through the last `/` or `\`,
/// then drop from the last `.` onward. Empty results become `"mod"`.
fn sanitize(path: &str) -> String {
    let after_slash = path
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(path);
    let stem = match after_slash.rfind('.') {
        Some(idx) => &after_slash[..idx],
        None => after_slash,
    };
    if stem.is_empty() {
        "mod".to_string()
    } else {
        stem.to_string()
    }
}

struct Binding {
    local: String,
    exported_or_original: String,
}

/// Parses a `{ a, b as c }` binding list. `start` must index the opening
/// `{`; returns the parsed bindings and the index just past the closing `}`.
fn parse_brace_bindings(bytes: &[u8], start: usize) -> (Vec<Binding>, usize) {
    debug_assert_eq!(bytes[start], b'{');
    let mut i = start + 1;
    let close = loop {
        if i >= bytes.len() {
            break bytes.len();
        }
        match bytes[i] {
            b'}' => break i,
            b'"' | b'\'' | b'`' => i = skip_string(bytes, i),
            _ => i += 1,
        }
    };
    let inner = std::str::from_utf8(&bytes[start + 1..close.min(bytes.len())]).unwrap_or("");
    let bindings = inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| match entry.split_once(" as ") {
            Some((local, exported)) => Binding {
                local: local.trim().to_string(),
                exported_or_original: exported.trim().to_string(),
            },
            None => Binding {
                local: entry.to_string(),
                exported_or_original: entry.to_string(),
            },
        })
        .collect();
    (bindings, (close + 1).min(bytes.len()))
}

/// Consumes a single optional `;` then any run of `\r`/`\n` bytes,
/// returning the index just past them.
fn consume_semicolon_and_newlines(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b';' {
        i += 1;
    }
    while i < bytes.len() && (bytes[i] == b'\r' || bytes[i] == b'\n') {
        i += 1;
    }
    i
}

/// Scans forward from `start` to the end of a statement: a `;` or a newline
/// at brace/paren depth 0 outside strings, where a newline does not
/// terminate the statement if the next non-space byte continues the
/// expression (one of `.+-*/?:`).
fn scan_statement_end(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    let mut brace_depth: i32 = 0;
    let mut paren_depth: i32 = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' | b'`' => i = skip_string(bytes, i),
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'/' => i = skip_line_comment(bytes, i),
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'*' => i = skip_block_comment(bytes, i),
            b'{' => {
                brace_depth += 1;
                i += 1;
            }
            b'}' => {
                brace_depth -= 1;
                i += 1;
            }
            b'(' => {
                paren_depth += 1;
                i += 1;
            }
            b')' => {
                paren_depth -= 1;
                i += 1;
            }
            b';' if brace_depth == 0 && paren_depth == 0 => return i + 1,
            b'\n' if brace_depth == 0 && paren_depth == 0 => {
                let mut j = i + 1;
                while j < bytes.len() && (bytes[j] == b' ' || bytes[j] == b'\t') {
                    j += 1;
                }
                if j < bytes.len() && b".+-*/?:".contains(&bytes[j]) {
                    i += 1;
                } else {
                    return i + 1;
                }
            }
            _ => i += 1,
        }
    }
    i
}

/// Scans a `{ ... }` block starting at the first `{` found from `start`,
/// returning the index just past the matching `}` (balanced, string-aware).
fn scan_block_end(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() && bytes[i] != b'{' {
        i += 1;
    }
    if i >= bytes.len() {
        return i;
    }
    let mut depth = 0i32;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' | b'`' => i = skip_string(bytes, i),
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'/' => i = skip_line_comment(bytes, i),
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'*' => i = skip_block_comment(bytes, i),
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                depth -= 1;
                i += 1;
                if depth == 0 {
                    return i;
                }
            }
            _ => i += 1,
        }
    }
    i
}

fn read_identifier(bytes: &[u8], start: usize) -> (String, usize) {
    let mut i = start;
    while i < bytes.len() && is_identifier_byte(bytes[i]) {
        i += 1;
    }
    (String::from_utf8_lossy(&bytes[start..i]).into_owned(), i)
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
        i += 1;
    }
    i
}

/// Reads a single-quoted string value (no surrounding quotes in the result),
/// used for `from '<path>'` clauses. `start` must index the opening quote.
fn read_quoted(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    let quote = *bytes.get(start)?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let end = skip_string(bytes, start);
    let inner = &bytes[start + 1..end.saturating_sub(1).max(start + 1)];
    Some((String::from_utf8_lossy(inner).into_owned(), end))
}

/// Applies the ESM→CJS transform described in §4.2. Non-module lines are
/// copied through byte-for-byte.
pub fn transform(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len() + 64);
    let mut i = 0;
    let mut at_line_start = true;

    while i < bytes.len() {
        if at_line_start {
            let line_start = skip_ws(bytes, i);
            if let Some(consumed) = try_transform_line(bytes, line_start, &mut out) {
                i = consumed;
                at_line_start = i == 0 || bytes.get(i - 1) == Some(&b'\n');
                continue;
            }
        }

        match bytes[i] {
            b'"' | b'\'' | b'`' => {
                let end = skip_string(bytes, i);
                out.push_str(&source[i..end.min(bytes.len())]);
                at_line_start = false;
                i = end;
            }
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'/' => {
                let end = skip_line_comment(bytes, i);
                out.push_str(&source[i..end]);
                at_line_start = false;
                i = end;
            }
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'*' => {
                let end = skip_block_comment(bytes, i);
                out.push_str(&source[i..end]);
                at_line_start = end > 0 && bytes.get(end - 1) == Some(&b'\n');
                i = end;
            }
            b'\n' => {
                out.push('\n');
                at_line_start = true;
                i += 1;
            }
            _ => {
                let ch = source[i..].chars().next().expect("valid utf-8 source");
                out.push(ch);
                at_line_start = false;
                i += ch.len_utf8();
            }
        }
    }

    out
}

/// Attempts to recognize and emit one of the five transform forms starting
/// at `line_start` (already past leading horizontal whitespace). Returns the
/// index past the consumed input on success, leaving the caller to resume
/// normal scanning from there.
fn try_transform_line(bytes: &[u8], line_start: usize, out: &mut String) -> Option<usize> {
    let rest = std::str::from_utf8(&bytes[line_start..]).ok()?;

    if rest.starts_with("export default")
        && !bytes
            .get(line_start + "export default".len())
            .copied()
            .map(is_identifier_byte)
            .unwrap_or(false)
    {
        out.push_str("module.exports =");
        return Some(line_start + "export default".len());
    }

    if rest.starts_with("export") && {
        let after = skip_ws(bytes, line_start + "export".len());
        bytes.get(after) == Some(&b'{')
    } {
        let brace_at = skip_ws(bytes, line_start + "export".len());
        let (bindings, after_brace) = parse_brace_bindings(bytes, brace_at);
        let end = consume_semicolon_and_newlines(bytes, after_brace);
        for b in &bindings {
            out.push_str("module.exports.");
            out.push_str(&b.exported_or_original);
            out.push_str(" = ");
            out.push_str(&b.local);
            out.push_str(";\n");
        }
        return Some(end);
    }

    if rest.starts_with("import ") {
        return try_transform_import(bytes, line_start, out);
    }

    if rest.starts_with("export const ") {
        let name_start = skip_ws(bytes, line_start + "export const ".len());
        let (name, _) = read_identifier(bytes, name_start);
        let stmt_start = line_start + "export ".len();
        let stmt_end = scan_statement_end(bytes, stmt_start);
        out.push_str(std::str::from_utf8(&bytes[stmt_start..stmt_end]).ok()?);
        out.push_str("\nmodule.exports.");
        out.push_str(&name);
        out.push_str(" = ");
        out.push_str(&name);
        out.push_str(";");
        return Some(stmt_end);
    }

    if rest.starts_with("export function ") || rest.starts_with("export class ") {
        let keyword_len = if rest.starts_with("export function ") {
            "export function ".len()
        } else {
            "export class ".len()
        };
        let name_start = line_start + keyword_len;
        let (name, _) = read_identifier(bytes, name_start);
        let decl_start = line_start + "export ".len();
        let block_end = scan_block_end(bytes, decl_start);
        out.push_str(std::str::from_utf8(&bytes[decl_start..block_end]).ok()?);
        out.push_str("\nmodule.exports.");
        out.push_str(&name);
        out.push_str(" = ");
        out.push_str(&name);
        out.push_str(";");
        return Some(block_end);
    }

    None
}

fn try_transform_import(bytes: &[u8], line_start: usize, out: &mut String) -> Option<usize> {
    let clause_start = skip_ws(bytes, line_start + "import ".len());

    let (bindings_text, clause_end): (ImportClause, usize) = if bytes.get(clause_start) == Some(&b'{') {
        let (bindings, after) = parse_brace_bindings(bytes, clause_start);
        (ImportClause::Named(bindings), after)
    } else if bytes[clause_start..].starts_with(b"* as ") {
        let name_start = clause_start + "* as ".len();
        let (name, after) = read_identifier(bytes, name_start);
        (ImportClause::Namespace(name), after)
    } else {
        let (name, after) = read_identifier(bytes, clause_start);
        (ImportClause::Default(name), after)
    };

    let from_at = skip_ws(bytes, clause_end);
    let from_at = if bytes[from_at..].starts_with(b"from") {
        from_at + 4
    } else {
        return None;
    };
    let quote_at = skip_ws(bytes, from_at);
    let (module_path, after_path) = read_quoted(bytes, quote_at)?;
    let end = consume_semicolon_and_newlines(bytes, after_path);

    match bindings_text {
        ImportClause::Named(bindings) => {
            let mod_var = format!("__mod_{}", sanitize(&module_path));
            out.push_str("const ");
            out.push_str(&mod_var);
            out.push_str(" = require('");
            out.push_str(&module_path);
            out.push_str("');\n");
            for b in &bindings {
                out.push_str("const ");
                out.push_str(&b.local);
                out.push_str(" = ");
                out.push_str(&mod_var);
                out.push('.');
                out.push_str(&b.exported_or_original);
                out.push_str(";\n");
            }
        }
        ImportClause::Namespace(name) => {
            out.push_str("const ");
            out.push_str(&name);
            out.push_str(" = require('");
            out.push_str(&module_path);
            out.push_str("');\n");
        }
        ImportClause::Default(name) => {
            out.push_str("const ");
            out.push_str(&name);
            out.push_str(" = (function() { const m = require('");
            out.push_str(&module_path);
            out.push_str("'); return m && m.default ? m.default : m; })();\n");
        }
    }

    Some(end)
}

enum ImportClause {
    Named(Vec<Binding>),
    Namespace(String),
    Default(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_export_and_import() {
        assert!(is_es_module("export const x = 1;"));
        assert!(is_es_module("import foo from 'bar';"));
        assert!(!is_es_module("module.exports = {};"));
    }

    #[test]
    fn string_literal_does_not_trigger_detection() {
        assert!(!is_es_module("const s = \"export default\";"));
        assert!(!is_es_module("const s = 'import x from y';"));
    }

    #[test]
    fn identity_law_for_non_module_source() {
        let src = "const x = 1;\nfunction f() { return x + 1; }\n";
        assert_eq!(transform(src), src);
    }

    #[test]
    fn export_default_becomes_module_exports_assignment() {
        let out = transform("export default { fetch(req) { return new Response('x'); } };\n");
        assert!(out.starts_with("module.exports = { fetch(req)"));
        assert!(!is_es_module(&out));
    }

    #[test]
    fn export_named_list_with_alias() {
        let out = transform("const a = 1;\nconst c = 2;\nexport { a, c as b };\n");
        assert!(out.contains("module.exports.a = a;\n"));
        assert!(out.contains("module.exports.b = c;\n"));
    }

    #[test]
    fn import_named_with_alias() {
        let out = transform("import { a, b as c } from './util.js';\n");
        assert!(out.contains("const __mod_util = require('./util.js');"));
        assert!(out.contains("const a = __mod_util.a;"));
        assert!(out.contains("const c = __mod_util.b;"));
    }

    #[test]
    fn import_namespace() {
        let out = transform("import * as ns from 'pkg';\n");
        assert_eq!(out.trim_end(), "const ns = require('pkg');");
    }

    #[test]
    fn import_default_uses_interop_shim() {
        let out = transform("import Foo from 'pkg';\n");
        assert!(out.contains("const Foo = (function() { const m = require('pkg'); return m && m.default ? m.default : m; })();"));
    }

    #[test]
    fn export_const_appends_module_exports_line() {
        let out = transform("export const NAME = 42;\nconst other = 1;\n");
        assert!(out.starts_with("const NAME = 42;\nmodule.exports.NAME = NAME;"));
        assert!(out.contains("const other = 1;"));
    }

    #[test]
    fn export_function_keeps_body_and_appends_export() {
        let out = transform("export function handler(req) {\n  return req;\n}\n");
        assert!(out.starts_with("function handler(req) {\n  return req;\n}"));
        assert!(out.contains("module.exports.handler = handler;"));
    }

    #[test]
    fn export_class_keeps_body_and_appends_export() {
        let out = transform("export class Thing {\n  go() { return 1; }\n}\n");
        assert!(out.starts_with("class Thing {\n  go() { return 1; }\n}"));
        assert!(out.contains("module.exports.Thing = Thing;"));
    }

    #[test]
    fn sanitize_strips_dir_and_extension() {
        assert_eq!(sanitize("./lib/util.js"), "util");
        assert_eq!(sanitize("pkg"), "pkg");
        assert_eq!(sanitize("./."), "mod");
    }
}
