// Split across files; all share one module scope.
include!("http/core.rs");
include!("http/proxy.rs");
include!("http/keys.rs");
