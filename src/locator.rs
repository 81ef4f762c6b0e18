//! Element locators and the ordered fallback sets used by each stage.
//!
//! Slack's sign-in markup shifts over time, so every field is described by a
//! [`LocatorSet`]: an ordered list of CSS or XPath expressions where earlier
//! entries are preferred. Affordances (links and buttons) are looked up by
//! their visible text instead.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single way of finding an element on the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "expression", rename_all = "lowercase")]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(expression: impl Into<String>) -> Self {
        Locator::Css(expression.into())
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Locator::XPath(expression.into())
    }

    pub fn expression(&self) -> &str {
        match self {
            Locator::Css(expr) | Locator::XPath(expr) => expr,
        }
    }

    pub fn mechanism(&self) -> &'static str {
        match self {
            Locator::Css(_) => "css",
            Locator::XPath(_) => "xpath",
        }
    }

    /// Any link, button, or span inside a link whose text contains `token`,
    /// ignoring case.
    pub fn text_link(token: &str) -> Self {
        let text = format!(
            "contains(translate(., '{UPPER}', '{LOWER}'), {})",
            xpath_literal(&token.to_lowercase())
        );
        Locator::XPath(format!(
            "//a[{text}] | //button[{text}] | //span[{text}]/ancestor::a[1]"
        ))
    }

    /// A `<button>` whose text contains `label` exactly as written.
    pub fn button_containing(label: &str) -> Self {
        Locator::XPath(format!(
            "//button[contains(., {})]",
            xpath_literal(label)
        ))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.mechanism(), self.expression())
    }
}

const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";

/// Quote `value` as an XPath 1.0 string literal.
fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    if !value.contains('"') {
        return format!("\"{value}\"");
    }
    let parts: Vec<String> = value.split('\'').map(|part| format!("'{part}'")).collect();
    format!("concat({})", parts.join(", \"'\", "))
}

/// Ordered, non-empty list of strategies for one logical field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorSet {
    field: &'static str,
    strategies: Vec<Locator>,
}

impl LocatorSet {
    /// The first strategy is mandatory, so a set can never be empty.
    pub fn new(
        field: &'static str,
        first: Locator,
        rest: impl IntoIterator<Item = Locator>,
    ) -> Self {
        let mut strategies = vec![first];
        strategies.extend(rest);
        LocatorSet { field, strategies }
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = &Locator> {
        self.strategies.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Locator> {
        self.strategies.get(index)
    }

    /// Email input on the sign-in form.
    pub fn email_field() -> Self {
        LocatorSet::new(
            "email",
            Locator::css(r#"input[type="email"]"#),
            [
                Locator::css(r#"input[name="email"]"#),
                Locator::css(r#"input[data-qa="signin_email_input"]"#),
                Locator::css("#email"),
                Locator::css(r#"input[placeholder*="email" i]"#),
            ],
        )
    }

    /// Password input, which may only appear after the email step.
    pub fn password_field() -> Self {
        LocatorSet::new(
            "password",
            Locator::css(r#"input[type="password"]"#),
            [
                Locator::css(r#"input[name="password"]"#),
                Locator::css(r#"input[data-qa="signin_password_input"]"#),
                Locator::css("#password"),
                Locator::css(r#"input[placeholder*="password" i]"#),
            ],
        )
    }

    /// One-time code input on the second-factor page.
    ///
    /// Text-anchored expressions come first because the generic attribute
    /// matches (`maxlength="6"` and friends) can hit unrelated inputs.
    pub fn two_factor_code_field() -> Self {
        LocatorSet::new(
            "2FA code",
            Locator::xpath(
                "//*[contains(., 'Enter your authentication code') or \
                 contains(., 'authentication code')]//input",
            ),
            [
                Locator::xpath("//*[contains(text(), 'authentication code')]/following::input[1]"),
                Locator::xpath("//*[contains(., 'Check your authentication app')]//input"),
                Locator::css(r#"input[autocomplete="one-time-code"]"#),
                Locator::css(r#"input[inputmode="numeric"]"#),
                Locator::css(r#"input[maxlength="6"]"#),
                Locator::css(
                    r#"input[data-qa="two_factor_input"], input[data-qa="two_factor_input_field"]"#,
                ),
                Locator::css(
                    r#"input[placeholder*="code" i], input[placeholder*="verification" i]"#,
                ),
            ],
        )
    }
}

impl<'a> IntoIterator for &'a LocatorSet {
    type Item = &'a Locator;
    type IntoIter = std::slice::Iter<'a, Locator>;

    fn into_iter(self) -> Self::IntoIter {
        self.strategies.iter()
    }
}

/// Tokens that identify the "sign in with a password instead" link.
pub const PASSWORD_LOGIN_TOKENS: [&str; 2] = ["password", "manually"];
/// Buttons that advance from the email step.
pub const CONTINUE_LABELS: [&str; 3] = ["Continue", "Next", "Continue with Email"];
/// Buttons that submit the credentials.
pub const SIGN_IN_LABELS: [&str; 4] = ["Sign in", "Log in", "Sign In", "Log In"];
/// Buttons that confirm a typed one-time code.
pub const CONFIRM_LABELS: [&str; 5] = ["Verify", "Submit", "Continue", "Sign in", "Log in"];

pub fn password_login_links() -> Vec<Locator> {
    PASSWORD_LOGIN_TOKENS
        .iter()
        .map(|token| Locator::text_link(token))
        .collect()
}

pub fn buttons(labels: &[&str]) -> Vec<Locator> {
    labels
        .iter()
        .map(|label| Locator::button_containing(label))
        .collect()
}
