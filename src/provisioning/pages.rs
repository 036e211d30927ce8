//! HTML served by the provisioning access point.
//!
//! Self-contained pages (no external fonts or scripts) because the client
//! has no internet access while joined to the AP.

use crate::http::html_escape;

const STYLE: &str = "body{font-family:sans-serif;background:#19c964;color:#fff;\
display:flex;justify-content:center;align-items:center;min-height:100vh;margin:0}\
.card{background:#139b4d;padding:2em;border-radius:1em;max-width:22em}\
select,input{width:100%;padding:.5em;margin:.4em 0 1em;box-sizing:border-box}\
input[type=submit]{background:#fff;color:#139b4d;border:0;font-weight:bold}";

fn page(title: &str, content: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
         <meta name=\"viewport\" content=\"width=device-width,initial-scale=1\">\
         <title>{title}</title><style>{STYLE}</style></head>\
         <body><div class=\"card\">{content}</div></body></html>"
    )
}

/// Credential-entry form listing the scanned networks.
pub fn form_page<S: AsRef<str>>(networks: &[S]) -> String {
    let mut options = String::new();
    for ssid in networks {
        let ssid = html_escape(ssid.as_ref());
        options.push_str(&format!("<option value=\"{ssid}\">{ssid}</option>"));
    }
    let picker = if options.is_empty() {
        String::from("<input type=\"text\" id=\"network\" name=\"network\" required>")
    } else {
        format!("<select id=\"network\" name=\"network\">{options}</select>")
    };
    page(
        "Greenhouse setup",
        &format!(
            "<h1>Connect the greenhouse</h1>\
             <form method=\"get\" action=\"/connect\">\
             <label for=\"network\">Network</label>{picker}\
             <label for=\"password\">Password</label>\
             <input type=\"password\" id=\"password\" name=\"password\">\
             <input type=\"submit\" value=\"Connect\"></form>"
        ),
    )
}

/// Shown after the credentials passed the live test and were stored.
pub fn success_page(ssid: &str) -> String {
    page(
        "Connected",
        &format!(
            "<h1>Connected</h1><p>The credentials for the network {} were saved \
             successfully. The greenhouse now joins it and this access point \
             shuts down.</p>",
            html_escape(ssid)
        ),
    )
}

/// Shown when the submission was rejected; the form stays reachable.
pub fn error_page(ssid: &str, reason: &str) -> String {
    page(
        "Connection failed",
        &format!(
            "<h1>Connection failed</h1><p>Could not connect to {}: {}.</p>\
             <p><a href=\"/\" style=\"color:#fff\">Try again</a></p>",
            html_escape(ssid),
            html_escape(reason)
        ),
    )
}
