//! The narrow logging contract modules depend on, backed by `tracing`.
//!
//! Modules never call `tracing::info!` directly against an
//! application-wide target; they go through [`Logger`], which lets tests
//! swap in a silent or recording implementation without pulling in a
//! subscriber.

/// A structured log line: a message plus an ordered list of key/value
/// details, at one of six levels (finest to most severe: `trace`, `debug`,
/// `info`, `warn`, `error`, `critical`).
pub trait Logger: Send + Sync {
    fn trace(&self, message: &str, fields: &[(&str, &str)]);
    fn debug(&self, message: &str, fields: &[(&str, &str)]);
    fn info(&self, message: &str, fields: &[(&str, &str)]);
    fn warn(&self, message: &str, fields: &[(&str, &str)]);
    fn error(&self, message: &str, fields: &[(&str, &str)]);
    fn critical(&self, message: &str, fields: &[(&str, &str)]);

    /// Returns a logger that prepends `fields` to every call's own field
    /// list, so a module can bind e.g. `request_id` once and log several
    /// lines without repeating it.
    #[must_use]
    fn with(&self, fields: &[(&str, &str)]) -> Box<dyn Logger>;
}

/// Forwards everything to the `tracing` macros under a fixed target,
/// rendering the detail list inline. `critical` is `tracing::error!` with an
/// extra `severity=critical` field, since `tracing` has no level above
/// `ERROR`.
#[derive(Clone)]
pub struct TracingLogger {
    target: &'static str,
    bound: Vec<(String, String)>,
}

impl TracingLogger {
    #[must_use]
    pub fn new(target: &'static str) -> Self {
        Self { target, bound: Vec::new() }
    }

    /// Returns a clone with `fields` appended to the bound-field list,
    /// shared by every implementation of [`Logger::with`] below.
    #[must_use]
    fn bind(&self, fields: &[(&str, &str)]) -> Self {
        let mut bound = self.bound.clone();
        bound.extend(fields.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())));
        Self { target: self.target, bound }
    }

    fn render(&self, message: &str, fields: &[(&str, &str)]) -> String {
        if self.bound.is_empty() && fields.is_empty() {
            return message.to_owned();
        }
        let rendered = self
            .bound
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .chain(fields.iter().map(|(k, v)| format!("{k}={v}")))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{message} ({rendered})")
    }
}

impl Logger for TracingLogger {
    fn trace(&self, message: &str, fields: &[(&str, &str)]) {
        tracing::trace!(target: self.target, "{}", self.render(message, fields));
    }

    fn debug(&self, message: &str, fields: &[(&str, &str)]) {
        tracing::debug!(target: self.target, "{}", self.render(message, fields));
    }

    fn info(&self, message: &str, fields: &[(&str, &str)]) {
        tracing::info!(target: self.target, "{}", self.render(message, fields));
    }

    fn warn(&self, message: &str, fields: &[(&str, &str)]) {
        tracing::warn!(target: self.target, "{}", self.render(message, fields));
    }

    fn error(&self, message: &str, fields: &[(&str, &str)]) {
        tracing::error!(target: self.target, "{}", self.render(message, fields));
    }

    fn critical(&self, message: &str, fields: &[(&str, &str)]) {
        tracing::error!(target: self.target, severity = "critical", "{}", self.render(message, fields));
    }

    fn with(&self, fields: &[(&str, &str)]) -> Box<dyn Logger> {
        Box::new(self.bind(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_fields_inline() {
        let logger = TracingLogger::new("test");
        assert_eq!(logger.render("starting", &[("module", "billing")]), "starting (module=billing)");
        assert_eq!(logger.render("starting", &[]), "starting");
    }

    #[test]
    fn with_binds_fields_ahead_of_call_site_fields() {
        let base = TracingLogger::new("test");
        let scoped = base.bind(&[("request_id", "abc")]);
        assert_eq!(scoped.bound, vec![("request_id".to_owned(), "abc".to_owned())]);
        assert_eq!(
            scoped.render("starting", &[("module", "billing")]),
            "starting (request_id=abc, module=billing)"
        );
    }

    #[test]
    fn binding_twice_accumulates_fields_in_order() {
        let scoped = TracingLogger::new("test").bind(&[("a", "1")]).bind(&[("b", "2")]);
        assert_eq!(scoped.render("x", &[]), "x (a=1, b=2)");
    }
}
