use std::fmt::Display;

/// Builds `-name=value` style arguments one option at a time, so every value
/// stays a single argv element regardless of its content.
#[derive(Debug, Default, Clone)]
pub struct ArgBuilder {
    args: Vec<String>,
}

impl ArgBuilder {
    #[must_use]
    pub fn new(subcommand: &str) -> Self {
        Self {
            args: vec![subcommand.to_owned()],
        }
    }

    #[must_use]
    pub fn opt(mut self, name: &str, value: impl Display) -> Self {
        self.args.push(format!("-{name}={value}"));
        self
    }

    #[must_use]
    pub fn opt_if<T: Display>(self, name: &str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.opt(name, value),
            None => self,
        }
    }

    #[must_use]
    pub fn switch(mut self, name: &str, on: bool) -> Self {
        if on {
            self.args.push(format!("-{name}"));
        }
        self
    }

    #[must_use]
    pub fn build(self) -> Vec<String> {
        self.args
    }
}
