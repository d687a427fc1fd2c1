use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::{PortalError, Result};

/// Form id used by the stock Apereo CAS login template.
pub const CAS_FORM_ID: &str = "fm1";
pub const SUBMIT_FIELD: &str = "submit";
pub const DEFAULT_SUBMIT_VALUE: &str = "SE CONNECTER";

pub trait FormLocator: Send + Sync {
    fn name(&self) -> &str;
    fn locate<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>>;
}

#[derive(Debug, Clone)]
pub struct ById(pub String);

impl FormLocator for ById {
    fn name(&self) -> &str {
        "by-id"
    }

    fn locate<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        let forms = Selector::parse("form").ok()?;
        document
            .select(&forms)
            .find(|form| form.value().id() == Some(self.0.as_str()))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FirstForm;

impl FormLocator for FirstForm {
    fn name(&self) -> &str {
        "first-form"
    }

    fn locate<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        let forms = Selector::parse("form").ok()?;
        document.select(&forms).next()
    }
}

pub struct LocatorChain {
    locators: Vec<Box<dyn FormLocator>>,
}

impl LocatorChain {
    pub fn new(locators: Vec<Box<dyn FormLocator>>) -> Self {
        Self { locators }
    }

    pub fn cas_default() -> Self {
        Self::new(vec![
            Box::new(ById(CAS_FORM_ID.to_string())),
            Box::new(FirstForm),
        ])
    }
}

impl Default for LocatorChain {
    fn default() -> Self {
        Self::cas_default()
    }
}

impl FormLocator for LocatorChain {
    fn name(&self) -> &str {
        "chain"
    }

    fn locate<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        self.locators.iter().find_map(|locator| {
            let found = locator.locate(document);
            if found.is_some() {
                debug!("login form located with {}", locator.name());
            }
            found
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    fields: Vec<(String, String)>,
    pub action: Url,
}

impl LoginForm {
    pub fn extract(html: &str, page_url: &Url, locator: &dyn FormLocator) -> Result<Self> {
        let document = Html::parse_document(html);
        let form = locator
            .locate(&document)
            .ok_or_else(|| PortalError::NoLoginForm {
                url: page_url.to_string(),
            })?;

        let action = form.value().attr("action");
        let mut login_form = Self {
            fields: Vec::new(),
            action: resolve_action(page_url, action)
                .map_err(|e| PortalError::invalid_url(action.unwrap_or_default().trim(), e))?,
        };
        if let Ok(inputs) = Selector::parse("input") {
            for input in form.select(&inputs) {
                let Some(name) = input.value().attr("name").filter(|n| !n.is_empty()) else {
                    continue;
                };
                login_form.set_field(name, input.value().attr("value").unwrap_or(""));
            }
        }
        Ok(login_form)
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_field(&mut self, name: &str, value: &str) {
        match self.fields.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.fields.push((name.to_string(), value.to_string())),
        }
    }

    pub fn apply_credentials(&mut self, username: &str, password: &str) {
        self.set_field("username", username);
        self.set_field("password", password);
        // Some CAS templates refuse the POST without the button value.
        if self.field(SUBMIT_FIELD).is_none() {
            self.set_field(SUBMIT_FIELD, DEFAULT_SUBMIT_VALUE);
        }
    }
}

/// Resolves a form `action` against the page it was served from. Relative
/// actions are joined onto the page's origin and path; its query is dropped.
pub fn resolve_action(page_url: &Url, action: Option<&str>) -> std::result::Result<Url, url::ParseError> {
    match action.map(str::trim) {
        None | Some("") => Ok(page_url.clone()),
        Some(action) if action.starts_with("http") => Url::parse(action),
        Some(action) => {
            let mut base = page_url.clone();
            base.set_query(None);
            base.set_fragment(None);
            base.join(action)
        }
    }
}
