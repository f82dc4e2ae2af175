use delver_core::error::{DelverError, Result};

/// A prompt with `{name}` placeholders. `{{` and `}}` render as literal braces.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    name: &'static str,
    template: &'static str,
}

impl PromptTemplate {
    pub const fn new(name: &'static str, template: &'static str) -> Self {
        Self { name, template }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// Substitute every placeholder. A placeholder without a matching
    /// variable is an error; unused variables are ignored.
    pub fn render(&self, vars: &[(&str, &str)]) -> Result<String> {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template;

        while let Some(pos) = rest.find(['{', '}']) {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];

            if tail.starts_with("{{") {
                out.push('{');
                rest = &tail[2..];
            } else if tail.starts_with("}}") {
                out.push('}');
                rest = &tail[2..];
            } else if tail.starts_with('{') {
                let end = tail.find('}').ok_or_else(|| {
                    DelverError::Prompt(format!("{}: unclosed placeholder", self.name))
                })?;
                let key = &tail[1..end];
                let value = vars
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| *v)
                    .ok_or_else(|| {
                        DelverError::Prompt(format!("{}: missing variable '{}'", self.name, key))
                    })?;
                out.push_str(value);
                rest = &tail[end + 1..];
            } else {
                // Lone closing brace
                out.push('}');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);

        Ok(out)
    }
}
