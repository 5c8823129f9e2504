use serde_json::json;

use crate::browser::host::PageScript;

/// Scroll down by a fraction of the viewport height
pub fn scroll_by_viewport(fraction: f64) -> PageScript {
    PageScript {
        name: "scroll_by",
        source: "window.scrollBy(0, window.innerHeight * arguments[0]); return null;",
        args: vec![json!(fraction)],
    }
}

/// Jump back to the top of the page
pub fn scroll_to_top() -> PageScript {
    PageScript {
        name: "scroll_to_top",
        source: "window.scrollTo(0, 0); return null;",
        args: Vec::new(),
    }
}

/// Capture the live document so extraction can run over it
pub fn snapshot() -> PageScript {
    PageScript {
        name: "snapshot",
        source: "return { \
                    url: window.location.href, \
                    title: document.title, \
                    html: document.documentElement ? document.documentElement.outerHTML : '' \
                 };",
        args: Vec::new(),
    }
}

/// Readiness check used by hosts that have no native load status.
///
/// Returns `{href, readyState}`; a fresh tab still shows `about:blank`
/// until the navigation commits.
pub fn ready_state() -> PageScript {
    PageScript {
        name: "ready_state",
        source: "return { href: window.location.href, readyState: document.readyState };",
        args: Vec::new(),
    }
}

/// Navigate the current tab without waiting for the load to finish
pub fn navigate(url: &str) -> PageScript {
    PageScript {
        name: "navigate",
        source: "window.location.href = arguments[0]; return null;",
        args: vec![json!(url)],
    }
}
