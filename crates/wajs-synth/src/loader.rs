//! JavaScript loader generation.
//!
//! The loader is a single ES5 script: it defines the marshalling helpers and
//! memory views, one function per bridge snippet, and a shim that fetches,
//! verifies, links and starts the module. Everything hangs off the global
//! `WA` object, which the page may pre-populate with `module`, `print`,
//! `error`, `imports`, `started` and `abort`.

use wajs_types::metadata::{DISPATCH_SECTION, FILE_SECTION_PREFIX};
use wajs_types::SnippetRecord;

use crate::manifest::{libraries, Manifest};

/// Helpers shared by every loader. Lines that are only comments are dropped
/// when minifying.
const PRELUDE: &str = r#"var MEM, MEMBUF, RAW, MODULE, MU8, MU16, MI32, MU32, MF32, MF64;
var ASM = {};
var TD = new TextDecoder(), TE = new TextEncoder();
var print = WA.print || function (text) { console.log(text); };
var error = WA.error || function (code, text) { print("W" + code + ": " + text + "\n"); };
WA.print = print;
WA.error = error;
// rebind the views when the buffer changed since the last check
function MEMCHECK() {
    if (!MEM || MEMBUF === MEM.buffer) return;
    MEMBUF = MEM.buffer;
    MU8 = new Uint8Array(MEMBUF);
    MU16 = new Uint16Array(MEMBUF);
    MI32 = new Int32Array(MEMBUF);
    MU32 = new Uint32Array(MEMBUF);
    MF32 = new Float32Array(MEMBUF);
    MF64 = new Float64Array(MEMBUF);
}
function ALLOC(size) {
    if (!ALLOCATOR) throw new Error("module exports no allocator");
    var ptr = RAW[ALLOCATOR](size);
    MEMCHECK();
    return ptr;
}
function MStrGet(ptr, max) {
    if (!ptr) return "";
    MEMCHECK();
    var end = ptr, limit = max === undefined ? MU8.length : Math.min(MU8.length, ptr + max);
    while (end < limit && MU8[end]) end++;
    return TD.decode(MU8.subarray(ptr, end));
}
// MStrPut(str) allocates; MStrPut(str, ptr, cap) fills a buffer of cap bytes
function MStrPut(str, ptr, cap) {
    var bytes = TE.encode(str);
    if (ptr === undefined) {
        ptr = ALLOC(bytes.length + 1);
        MU8.set(bytes, ptr);
        MU8[ptr + bytes.length] = 0;
        return ptr;
    }
    if (!cap) return 0;
    var n = Math.min(bytes.length, cap - 1);
    MEMCHECK();
    MU8.set(bytes.subarray(0, n), ptr);
    MU8[ptr + n] = 0;
    return n;
}
function MArrPut(arr) {
    var ptr = ALLOC(arr.length);
    MU8.set(arr, ptr);
    return ptr;
}
var D = [];
// a snippet hitting a missing host feature is reported once, then returns zero
function SLOT(id) {
    var dead = false;
    return function () {
        if (dead) return 0;
        MEMCHECK();
        try {
            return D[id].apply(null, arguments);
        } catch (e) {
            if (!(e instanceof ReferenceError)) throw e;
            dead = true;
            error(401, NAMES[id] + " is unavailable: " + e.message);
            return 0;
        }
    };
}
function EXPORT(fn) {
    return function () {
        var result = fn.apply(null, arguments);
        MEMCHECK();
        return result;
    };
}
WA.hasExport = function (name) { return typeof ASM[name] === "function"; };
WA.file = function (name) {
    var sections = WebAssembly.Module.customSections(MODULE, FILE_PREFIX + name);
    return sections.length ? new Uint8Array(sections[0]) : null;
};"#;

const STARTUP: &str = r#"function fetchBytes(src) {
    if (typeof src !== "string") return Promise.resolve(src);
    return fetch(src).then(function (response) {
        if (!response.ok) throw new Error("failed to fetch " + src + ": " + response.status);
        return response.arrayBuffer();
    });
}
function verify(module) {
    var sections = WebAssembly.Module.customSections(module, DISPATCH_SECTION);
    if (!sections.length) throw new Error("W301: module has no dispatch section");
    var info = JSON.parse(TD.decode(new Uint8Array(sections[0])));
    if (info.slots !== SLOTS || info.checksum !== CHECKSUM) throw new Error("W302: module does not match this loader");
}
function link() {
    var imports = {}, extra = WA.imports || {}, name, id;
    for (name in extra) imports[name] = extra[name];
    imports.wajs = {};
    for (id = 0; id < SLOTS; id++) imports.wajs[id] = SLOT(id);
    return imports;
}
function start(instance) {
    var name, i;
    RAW = instance.exports;
    MEM = RAW.memory;
    MEMCHECK();
    for (name in RAW) if (typeof RAW[name] === "function") ASM[name] = EXPORT(RAW[name]);
    for (i = 0; i < DECLARED.length; i++) {
        if (!WA.hasExport(DECLARED[i])) throw new Error("W300: declared export " + DECLARED[i] + " is missing");
    }
    WA.asm = ASM;
    WA.memory = MEM;
    if (CTORS) ASM.__wasm_call_ctors();
    if (ENTRY) ASM[ENTRY](0, 0);
    if (WA.started) WA.started();
}
WA.ready = fetchBytes(WA.module || WASM_URL)
    .then(function (bytes) { return WebAssembly.compile(bytes); })
    .then(function (module) {
        MODULE = module;
        verify(module);
        return WebAssembly.instantiate(module, link());
    })
    .then(start, function (e) {
        if (WA.abort) WA.abort(e); else console.error(e);
        throw e;
    });"#;

/// Identifier of the generated function for `slot`.
pub fn function_name(slot: &SnippetRecord, minify: bool) -> String {
    if minify {
        format!("f{}", slot.id)
    } else {
        format!("f_{}", slot.name)
    }
}

fn js_string(text: &str) -> String {
    // serde_json escapes everything a JS string literal needs, except the
    // two line terminators JSON allows raw.
    serde_json::Value::from(text)
        .to_string()
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

struct JsWriter {
    out: String,
    minify: bool,
}

impl JsWriter {
    fn new(minify: bool) -> Self {
        Self {
            out: String::new(),
            minify,
        }
    }

    fn line(&mut self, text: &str) {
        self.out.push_str(if self.minify { text.trim() } else { text });
        self.out.push('\n');
    }

    fn comment(&mut self, text: &str) {
        if !self.minify {
            self.line(&format!("// {text}"));
        }
    }

    fn blank(&mut self) {
        if !self.minify {
            self.out.push('\n');
        }
    }

    /// Emit a block of fixed loader code.
    fn block(&mut self, code: &str) {
        for line in code.lines() {
            let trimmed = line.trim();
            if self.minify && (trimmed.is_empty() || trimmed.starts_with("//")) {
                continue;
            }
            self.line(line);
        }
    }

    /// Emit snippet text untouched.
    fn verbatim(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.out.push_str(text);
        if !text.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn snippet(&mut self, slot: &SnippetRecord) {
        let params: Vec<&str> = slot.signature.params.iter().map(|p| p.name.as_str()).collect();
        self.comment(&format!("{} {}: {}", slot.id, slot.name, slot.site));
        self.line(&format!(
            "D[{}] = function {}({}) {{",
            slot.id,
            function_name(slot, self.minify),
            params.join(", ")
        ));
        self.verbatim(&slot.source);
        self.line("};");
    }

    fn inits(&mut self, manifest: &Manifest, library: Option<&str>) {
        for block in manifest.inits.iter().filter(|b| b.library.as_deref() == library) {
            self.verbatim(&block.source);
        }
    }
}

/// Generate the loader for a synthesized module served at `wasm_url`.
pub fn generate(manifest: &Manifest, wasm_url: &str) -> String {
    let mut w = JsWriter::new(manifest.minified);

    w.comment(&format!(
        "wajs {} loader: {} bridge function(s), checksum {}",
        manifest.version,
        manifest.slots.len(),
        manifest.checksum
    ));
    w.line("var WA = typeof WA === \"object\" && WA ? WA : {};");
    w.line("(function (WA) {");

    let names: Vec<String> = manifest.slots.iter().map(|s| js_string(&s.name)).collect();
    let declared: Vec<String> = manifest.declared_exports().map(|e| js_string(&e.name)).collect();
    let entry = manifest
        .entry
        .as_deref()
        .map_or_else(|| "null".to_string(), js_string);
    let allocator = manifest
        .allocator
        .as_ref()
        .map_or_else(|| "null".to_string(), |a| js_string(&a.malloc));
    let constants = format!(
        "var SLOTS = {}, CHECKSUM = {};\n\
         var NAMES = [{}];\n\
         var DECLARED = [{}];\n\
         var ENTRY = {entry}, CTORS = {}, ALLOCATOR = {allocator};\n\
         var WASM_URL = {}, DISPATCH_SECTION = {}, FILE_PREFIX = {};",
        manifest.slots.len(),
        js_string(&manifest.checksum),
        names.join(", "),
        declared.join(", "),
        manifest.ctors,
        js_string(wasm_url),
        js_string(DISPATCH_SECTION),
        js_string(FILE_SECTION_PREFIX)
    );
    w.block(&constants);
    w.blank();
    w.block(PRELUDE);
    w.blank();

    w.inits(manifest, None);
    for slot in manifest.slots.iter().filter(|s| s.library.is_none()) {
        w.snippet(slot);
    }

    for library in libraries(&manifest.slots) {
        w.blank();
        w.comment(&format!("library {library}"));
        w.line("(function () {");
        w.inits(manifest, Some(library));
        for slot in manifest
            .slots
            .iter()
            .filter(|s| s.library.as_deref() == Some(library))
        {
            w.snippet(slot);
        }
        w.line("})();");
    }

    w.blank();
    w.block(STARTUP);
    w.line("})(WA);");
    w.out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{init_blocks, AllocatorExports};
    use wajs_types::{ArgKind, DeclSite, Param, ReturnKind, Signature};

    fn slot(id: u32, name: &str, library: Option<&str>, init: Option<&str>) -> SnippetRecord {
        SnippetRecord {
            id,
            name: name.into(),
            signature: Signature::new(
                vec![
                    Param::new("a", ArgKind::Int32).with_default("1"),
                    Param::new("b", ArgKind::Int32).with_default("2"),
                ],
                ReturnKind::Int32,
            ),
            source: "return a + b;".into(),
            library: library.map(str::to_string),
            init: init.map(str::to_string),
            site: DeclSite::new("src/main.rs", 10 + id),
        }
    }

    fn manifest(slots: Vec<SnippetRecord>, minified: bool) -> Manifest {
        Manifest {
            version: "0.1.1".into(),
            checksum: "abc".into(),
            inits: init_blocks(&slots),
            slots,
            exports: Vec::new(),
            entry: Some("main".into()),
            ctors: true,
            allocator: Some(AllocatorExports {
                malloc: "malloc".into(),
                free: None,
            }),
            files: Vec::new(),
            minified,
        }
    }

    #[test]
    fn test_snippet_functions_and_constants() {
        let js = generate(&manifest(vec![slot(0, "add", None, None)], false), "app.wasm");
        assert!(js.contains("D[0] = function f_add(a, b) {\nreturn a + b;\n};"));
        assert!(js.contains("var SLOTS = 1, CHECKSUM = \"abc\";"));
        assert!(js.contains("var ENTRY = \"main\", CTORS = true, ALLOCATOR = \"malloc\";"));
        assert!(js.contains("WASM_URL = \"app.wasm\""));
        assert!(js.contains("// 0 add: src/main.rs:10"));
        assert!(js.trim_end().ends_with("})(WA);"));
    }

    #[test]
    fn test_library_scope_and_single_init() {
        let slots = vec![
            slot(0, "open", Some("AUDIO"), Some("var ctx = null;")),
            slot(1, "close", Some("AUDIO"), Some("var ctx = null;")),
            slot(2, "plain", None, None),
        ];
        let js = generate(&manifest(slots, false), "a.wasm");
        assert_eq!(js.matches("var ctx = null;").count(), 1);
        let lib = js.find("// library AUDIO").unwrap();
        let init = js.find("var ctx = null;").unwrap();
        let close = js.find("function f_close").unwrap();
        assert!(lib < init && init < close);
        assert!(js.find("function f_plain").unwrap() < lib);
    }

    #[test]
    fn test_minified_names_and_no_comments() {
        let js = generate(&manifest(vec![slot(0, "add", None, None)], true), "a.wasm");
        assert!(js.contains("D[0] = function f0(a, b) {"));
        assert!(!js.contains("f_add"));
        assert!(!js.lines().any(|l| l.trim_start().starts_with("//")));
        assert!(!js.lines().any(|l| l.starts_with(' ')));
    }

    #[test]
    fn test_string_literals_escaped() {
        assert_eq!(js_string("a\"b\n"), r#""a\"b\n""#);
        assert_eq!(js_string("x\u{2028}"), r#""x\u2028""#);
    }
}
