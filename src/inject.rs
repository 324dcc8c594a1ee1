//! Version injection
//!
//! The origin server stamps the deployment version and timeouts into the
//! worker script, and prepends a cache-lock rescue check to the client
//! script, before serving either.

use crate::context::WorkerContext;

/// Headers served with the stamped worker so browsers never cache it
pub const WORKER_HEADERS: &[(&str, &str)] = &[
    ("Content-Type", "application/javascript"),
    ("Cache-Control", "no-cache, no-store, must-revalidate"),
    ("Pragma", "no-cache"),
    ("Expires", "0"),
];

/// Headers served with the stamped client script
pub const CLIENT_HEADERS: &[(&str, &str)] = &[
    ("Content-Type", "application/javascript"),
    ("Cache-Control", "no-cache"),
];

/// Values stamped into a deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionStamp {
    pub live_name: String,
    pub staging_name: String,
    pub version: String,
    pub first_time_timeout_ms: u128,
    pub returning_user_timeout_ms: u128,
    pub enable_logs: bool,
}

impl VersionStamp {
    /// Stamp for the deployment described by `ctx`
    pub fn from_context(ctx: &WorkerContext) -> Self {
        Self {
            live_name: ctx.names.live().to_string(),
            staging_name: ctx.names.staging().to_string(),
            version: ctx.version.clone(),
            first_time_timeout_ms: ctx.first_time_timeout.as_millis(),
            returning_user_timeout_ms: ctx.returning_user_timeout.as_millis(),
            enable_logs: ctx.enable_logs,
        }
    }

    /// Configuration prelude placed ahead of the worker source
    pub fn worker_prelude(&self) -> String {
        format!(
            "// Version injected by server\n\
             self.SW_CACHE_NAME = self.SW_CACHE_NAME || {live};\n\
             self.SW_TEMP_CACHE_NAME = self.SW_TEMP_CACHE_NAME || {staging};\n\
             self.SW_FIRST_TIME_TIMEOUT = '{first}';\n\
             self.SW_RETURNING_USER_TIMEOUT = '{returning}';\n\
             self.SW_ENABLE_LOGS = '{logs}';\n",
            live = js_string(&self.live_name),
            staging = js_string(&self.staging_name),
            first = self.first_time_timeout_ms,
            returning = self.returning_user_timeout_ms,
            logs = self.enable_logs,
        )
    }

    /// Rescue snippet placed ahead of the client script.
    ///
    /// Clients holding only caches from other versions unregister the old
    /// worker and reload; everyone else registers the worker normally.
    pub fn client_prelude(&self) -> String {
        let marker = js_string(&format!("-{}", self.version));
        format!(
            "// Cache lock rescue\n\
             if ('serviceWorker' in navigator) {{\n\
             \x20 caches.keys().then(cacheNames => {{\n\
             \x20   const hasCurrentVersion = cacheNames.some(name => name.includes({marker}));\n\
             \x20   if (!hasCurrentVersion && cacheNames.length > 0) {{\n\
             \x20     navigator.serviceWorker.getRegistration()\n\
             \x20       .then(reg => reg ? reg.unregister().then(() => location.reload()) : location.reload())\n\
             \x20       .catch(() => location.reload());\n\
             \x20   }}\n\
             \x20   navigator.serviceWorker.register('/service-worker.js', {{updateViaCache: 'none'}});\n\
             \x20 }});\n\
             }}\n"
        )
    }

    /// Worker source with the prelude prepended
    pub fn stamp_worker(&self, source: &str) -> String {
        format!("{}\n{}", self.worker_prelude(), source)
    }

    /// Client source with the rescue snippet prepended
    pub fn stamp_client(&self, source: &str) -> String {
        format!("{}\n\n{}", self.client_prelude(), source)
    }
}

/// Single-quoted JavaScript string literal
fn js_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '<' => out.push_str("\\x3c"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}
