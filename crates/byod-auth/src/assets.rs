//! The sign-in page served by the callback listener

use crate::allowlist;

const SIGNIN_TEMPLATE: &str = include_str!("../assets/signin.html");

/// Rendered sign-in page
#[derive(Debug, Clone)]
pub struct SigninPage {
    html: String,
}

impl SigninPage {
    /// Render the page for a public OAuth client id
    pub fn new(client_id: &str) -> Self {
        let html = SIGNIN_TEMPLATE
            .replace("{{CLIENT_ID}}", &js_string_literal(client_id))
            .replace(
                "{{ALLOWED_DOMAINS}}",
                &script_safe(&allowlist::allowed_domains_json()),
            );
        Self { html }
    }

    pub fn html(&self) -> &str {
        &self.html
    }
}

/// Quote a value as a JSON string that is safe inside a `<script>` block
fn js_string_literal(value: &str) -> String {
    let quoted = serde_json::to_string(value).unwrap_or_else(|_| String::from("\"\""));
    script_safe(&quoted)
}

fn script_safe(json: &str) -> String {
    json.replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}
