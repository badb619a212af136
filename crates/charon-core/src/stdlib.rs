//! Fixed per-language standard-library membership sets. Built once
//! and treated as process-lifetime immutable caches.

use std::collections::HashSet;
use std::sync::OnceLock;

const PYTHON_STDLIB: &[&str] = &[
    "abc", "argparse", "array", "ast", "asyncio", "base64", "bisect", "builtins", "calendar",
    "collections", "contextlib", "copy", "csv", "ctypes", "dataclasses", "datetime", "decimal",
    "difflib", "dis", "email", "enum", "errno", "fcntl", "fnmatch", "functools", "gc", "getopt",
    "getpass", "gettext", "glob", "gzip", "hashlib", "heapq", "hmac", "html", "http", "importlib",
    "inspect", "io", "ipaddress", "itertools", "json", "keyword", "linecache", "locale", "logging",
    "math", "mimetypes", "multiprocessing", "numbers", "operator", "os", "pathlib", "pickle",
    "platform", "pprint", "queue", "random", "re", "sched", "secrets", "select", "shelve", "shlex",
    "shutil", "signal", "site", "socket", "socketserver", "sqlite3", "ssl", "stat", "string",
    "struct", "subprocess", "sys", "sysconfig", "tempfile", "textwrap", "threading", "time",
    "timeit", "token", "tokenize", "traceback", "types", "typing", "unicodedata", "unittest",
    "urllib", "uuid", "venv", "warnings", "weakref", "xml", "zipfile", "zlib", "zoneinfo",
    "__future__",
];

const NODE_BUILTINS: &[&str] = &[
    "assert", "async_hooks", "buffer", "child_process", "cluster", "console", "constants",
    "crypto", "dgram", "diagnostics_channel", "dns", "domain", "events", "fs", "http", "http2",
    "https", "inspector", "module", "net", "os", "path", "perf_hooks", "process", "punycode",
    "querystring", "readline", "repl", "stream", "string_decoder", "sys", "timers", "tls",
    "trace_events", "tty", "url", "util", "v8", "vm", "wasi", "worker_threads", "zlib",
];

const GO_STDLIB: &[&str] = &[
    "archive", "bufio", "builtin", "bytes", "compress", "container", "context", "crypto", "database",
    "debug", "encoding", "errors", "expvar", "flag", "fmt", "go", "hash", "html", "image", "index",
    "io", "log", "maps", "math", "mime", "net", "os", "path", "plugin", "reflect", "regexp", "runtime",
    "slices", "sort", "strconv", "strings", "sync", "syscall", "testing", "text", "time", "unicode",
    "unsafe",
];

const JAVA_STDLIB_ROOTS: &[&str] = &[
    "java", "javax", "sun", "com.sun", "jdk", "org.w3c", "org.xml", "org.omg", "org.ietf",
];

const RUST_STDLIB_ROOTS: &[&str] = &["std", "core", "alloc", "proc_macro", "test"];

fn as_set(slice: &'static [&'static str]) -> HashSet<&'static str> {
    slice.iter().copied().collect()
}

macro_rules! cached_set {
    ($name:ident, $source:expr) => {
        pub fn $name() -> &'static HashSet<&'static str> {
            static CACHE: OnceLock<HashSet<&'static str>> = OnceLock::new();
            CACHE.get_or_init(|| as_set($source))
        }
    };
}

cached_set!(python_stdlib, PYTHON_STDLIB);
cached_set!(node_builtins, NODE_BUILTINS);
cached_set!(go_stdlib, GO_STDLIB);
cached_set!(rust_stdlib_roots, RUST_STDLIB_ROOTS);

pub fn is_python_stdlib(top_level: &str) -> bool {
    python_stdlib().contains(top_level)
}

pub fn is_node_builtin(name: &str) -> bool {
    node_builtins().contains(name)
}

pub fn is_go_stdlib(first_segment: &str) -> bool {
    go_stdlib().contains(first_segment)
}

pub fn is_rust_stdlib_root(first_segment: &str) -> bool {
    rust_stdlib_roots().contains(first_segment)
}

pub fn java_stdlib_root(dotted: &str) -> bool {
    JAVA_STDLIB_ROOTS
        .iter()
        .any(|root| dotted == *root || dotted.starts_with(&format!("{root}.")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_stdlib_membership() {
        assert!(is_python_stdlib("os"));
        assert!(is_python_stdlib("typing"));
        assert!(!is_python_stdlib("requests"));
    }

    #[test]
    fn test_node_builtins() {
        assert!(is_node_builtin("fs"));
        assert!(!is_node_builtin("lodash"));
    }

    #[test]
    fn test_go_stdlib() {
        assert!(is_go_stdlib("fmt"));
        assert!(is_go_stdlib("net"));
        assert!(!is_go_stdlib("github.com"));
    }

    #[test]
    fn test_rust_stdlib_roots() {
        assert!(is_rust_stdlib_root("std"));
        assert!(is_rust_stdlib_root("core"));
        assert!(!is_rust_stdlib_root("serde"));
    }

    #[test]
    fn test_java_stdlib_root() {
        assert!(java_stdlib_root("java.util.List"));
        assert!(java_stdlib_root("javax.swing"));
        assert!(java_stdlib_root("com.sun.tools"));
        assert!(!java_stdlib_root("com.google.common"));
    }
}
