use minijinja::{Environment, UndefinedBehavior};
use std::collections::HashMap;

/// Variables substituted into a template, keyed by placeholder name.
pub type TemplateVars = HashMap<String, String>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("No value supplied for template variable '{0}'")]
    MissingVariable(String),
    #[error("Invalid prompt template: {0}")]
    Invalid(String),
}

impl From<minijinja::Error> for TemplateError {
    fn from(e: minijinja::Error) -> Self {
        TemplateError::Invalid(e.to_string())
    }
}

/// A Jinja text template with `{{ name }}` placeholders.
///
/// Single braces are plain text, so JSON examples can be written as-is.
/// Rendering is strict: every referenced variable must be supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
}

impl PromptTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Checks the template syntax without rendering it.
    pub fn validate(&self) -> Result<(), TemplateError> {
        environment().template_from_str(&self.source)?;
        Ok(())
    }

    pub fn render(&self, vars: &TemplateVars) -> Result<String, TemplateError> {
        let env = environment();
        let template = env.template_from_str(&self.source)?;

        let mut undeclared: Vec<String> = template
            .undeclared_variables(false)
            .into_iter()
            .filter(|name| !vars.contains_key(name))
            .collect();
        undeclared.sort();
        if let Some(name) = undeclared.into_iter().next() {
            return Err(TemplateError::MissingVariable(name));
        }

        Ok(template.render(vars)?)
    }
}

fn environment<'source>() -> Environment<'source> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_keep_trailing_newline(true);
    env
}

/// Builds a `TemplateVars` map from `(name, value)` pairs.
pub fn vars<I, K, V>(pairs: I) -> TemplateVars
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_placeholders() {
        let template = PromptTemplate::new("Candidate {{ name }} at minute {{elapsed}}.");
        let rendered = template
            .render(&vars([("name", "Ada"), ("elapsed", "7")]))
            .unwrap();
        assert_eq!(rendered, "Candidate Ada at minute 7.");
    }

    #[test]
    fn test_single_braces_are_literal() {
        let template = PromptTemplate::new(r#"Return {"feedback": "<text>"} for {{ name }}"#);
        let rendered = template.render(&vars([("name", "Ada")])).unwrap();
        assert_eq!(rendered, r#"Return {"feedback": "<text>"} for Ada"#);
    }

    #[test]
    fn test_values_are_not_re_expanded() {
        let template = PromptTemplate::new("Code: {{ code }}");
        let rendered = template
            .render(&vars([("code", "fn main() { let x = {{ y }}; }")]))
            .unwrap();
        assert_eq!(rendered, "Code: fn main() { let x = {{ y }}; }");
    }

    #[test]
    fn test_values_are_not_html_escaped() {
        let template = PromptTemplate::new("{{ code }}\n");
        let rendered = template
            .render(&vars([("code", "if a < b && c > \"d\"")]))
            .unwrap();
        assert_eq!(rendered, "if a < b && c > \"d\"\n");
    }

    #[test]
    fn test_missing_variable_is_an_error() {
        let template = PromptTemplate::new("Hello {{ name }}, {{ question }}");
        let err = template.render(&vars([("name", "Ada")])).unwrap_err();
        assert_eq!(err, TemplateError::MissingVariable("question".to_string()));
    }

    #[test]
    fn test_malformed_template_is_an_error() {
        let template = PromptTemplate::new("Hello {{ name");
        assert!(template.validate().is_err());
        assert!(matches!(
            template.render(&vars([("name", "Ada")])),
            Err(TemplateError::Invalid(_))
        ));
    }
}
