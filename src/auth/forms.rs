//! HTML scraping for the login flow: SSO links, login forms and error banners.
//!
//! Everything here works on `&str` and returns owned data, so parsed documents
//! never live across an `.await`.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

const SSO_MARKERS: [&str; 3] = ["keycloak", "sso", "auth"];

static ANCHORS: Lazy<Selector> = Lazy::new(|| selector("a[href]"));
static FORMS: Lazy<Selector> = Lazy::new(|| selector("form"));
static FIELDS: Lazy<Selector> = Lazy::new(|| selector("input, textarea"));
static USERNAME_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)user(name)?|login|email").expect("static regex"));

/// Tried in order; within a group the first match in document order wins.
static ERROR_CONTAINERS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        "div.error, div.alert-error, div.alert-danger",
        "span.error, span.kc-feedback-text",
        "p.error",
        "div[role=alert]",
        "div#input-error",
    ]
    .iter()
    .map(|css| selector(css))
    .collect()
});

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

// ---------- Form model ----------

#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub name: Option<String>,
    /// Lowercased `type` attribute; `text` when absent, `textarea` for textareas.
    pub kind: String,
    pub value: String,
    pub checked: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoginForm {
    pub action: Option<String>,
    pub fields: Vec<FormField>,
}

impl LoginForm {
    fn from_element(form: ElementRef<'_>) -> Self {
        let fields = form
            .select(&FIELDS)
            .map(|el| {
                let attrs = el.value();
                let is_textarea = attrs.name() == "textarea";
                FormField {
                    name: attrs.attr("name").map(String::from),
                    kind: if is_textarea {
                        "textarea".to_string()
                    } else {
                        attrs.attr("type").unwrap_or("text").to_ascii_lowercase()
                    },
                    value: if is_textarea {
                        el.text().collect()
                    } else {
                        attrs.attr("value").unwrap_or_default().to_string()
                    },
                    checked: attrs.attr("checked").is_some(),
                }
            })
            .collect();

        Self {
            action: form
                .value()
                .attr("action")
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(String::from),
            fields,
        }
    }

    /// A username-like field and a password field.
    pub fn looks_like_login(&self) -> bool {
        let has_user = self
            .fields
            .iter()
            .any(|f| f.name.as_deref().is_some_and(|n| USERNAME_NAME.is_match(n)));
        let has_password = self.fields.iter().any(|f| f.kind == "password");
        has_user && has_password
    }

    /// Hidden inputs with both a name and a non-empty value.
    pub fn hidden_fields(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .filter(|f| f.kind == "hidden" && !f.value.is_empty())
            .filter_map(|f| f.name.clone().map(|n| (n, f.value.clone())))
            .collect()
    }

    /// SSO submission: hidden state plus `username`/`password`.
    pub fn sso_submission(&self, username: &str, password: &str) -> Vec<(String, String)> {
        let mut data: Vec<(String, String)> = self
            .hidden_fields()
            .into_iter()
            .filter(|(n, _)| n != "username" && n != "password")
            .collect();
        data.push(("username".to_string(), username.to_string()));
        data.push(("password".to_string(), password.to_string()));
        data
    }

    /// Direct submission: every named field passes through except buttons and
    /// unchecked toggles; credentials go into their fields.
    pub fn direct_submission(&self, username: &str, password: &str) -> Vec<(String, String)> {
        let mut data = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let Some(name) = field.name.as_deref() else {
                continue;
            };
            match field.kind.as_str() {
                "submit" | "button" => continue,
                "password" => data.push((name.to_string(), password.to_string())),
                "checkbox" | "radio" => {
                    if field.checked {
                        data.push((name.to_string(), field.value.clone()));
                    }
                }
                _ => {
                    let lower = name.to_ascii_lowercase();
                    let value = if matches!(lower.as_str(), "username" | "email" | "login") {
                        username.to_string()
                    } else {
                        field.value.clone()
                    };
                    data.push((name.to_string(), value));
                }
            }
        }
        data
    }
}

// ---------- Page scanning ----------

/// First anchor whose target mentions an SSO provider.
pub fn find_sso_link(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let found = doc
        .select(&ANCHORS)
        .filter_map(|a| a.value().attr("href"))
        .find(|href| {
            let lower = href.to_ascii_lowercase();
            SSO_MARKERS.iter().any(|m| lower.contains(m))
        })
        .map(String::from);
    found
}

pub fn first_form(html: &str) -> Option<LoginForm> {
    let doc = Html::parse_document(html);
    let form = doc.select(&FORMS).next().map(LoginForm::from_element);
    form
}

/// First form carrying a username-like field and a password field.
pub fn find_login_form(html: &str) -> Option<LoginForm> {
    let doc = Html::parse_document(html);
    let form = doc
        .select(&FORMS)
        .map(LoginForm::from_element)
        .find(LoginForm::looks_like_login);
    form
}

/// Best-effort error text of a failed login response.
pub fn extract_error_message(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    for sel in ERROR_CONTAINERS.iter() {
        if let Some(el) = doc.select(sel).next() {
            let text = el
                .text()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            if !text.is_empty() {
                return Some(text);
            }
        }
    }

    let lower = html.to_lowercase();
    if lower.contains("invalid") {
        return Some("Invalid credentials".to_string());
    }
    if lower.contains("username") && lower.contains("password") {
        return Some("Invalid username or password".to_string());
    }
    None
}
