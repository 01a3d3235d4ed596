use regex::Regex;
use std::collections::HashMap;

use crate::config::Config;

/// Runtime variable store threaded through one run.
///
/// Seeded from configured credentials (`<name>.email`, `<name>.password`),
/// grown by step captures (`save:`), and consulted by `${var}` substitution
/// in paths, headers, and bodies.
#[derive(Debug, Clone)]
pub struct RunContext {
    vars: HashMap<String, String>,
}

impl RunContext {
    pub fn new(config: &Config) -> Self {
        let mut vars = HashMap::new();
        for (name, credential) in &config.credentials {
            vars.insert(format!("{name}.email"), credential.email.clone());
            vars.insert(format!("{name}.password"), credential.password.clone());
        }
        Self { vars }
    }

    pub fn get_var(&self, name: &str) -> Option<String> {
        self.vars
            .get(name)
            .cloned()
            .or_else(|| std::env::var(name).ok())
    }

    pub fn set_var(&mut self, name: &str, value: &str) {
        self.vars.insert(name.to_string(), value.to_string());
    }

    /// Substitute ${varname} patterns in a string. Unknown references are
    /// kept literally.
    pub fn substitute(&self, text: &str) -> String {
        let re = Regex::new(r"\$\{([a-zA-Z0-9_.-]+)\}").unwrap();
        re.replace_all(text, |caps: &regex::Captures| {
            let key = &caps[1];

            if let Some(value) = self.get_var(key) {
                return value;
            }

            // Dynamic variables
            match key {
                "uuid" => return uuid::Uuid::new_v4().to_string(),
                "timestamp" => return chrono::Utc::now().timestamp().to_string(),
                _ => {}
            }

            format!("${{{key}}}")
        })
        .to_string()
    }

    /// Prepare a YAML step body for the wire: substitute variables in every
    /// string leaf and convert to JSON
    pub fn substitute_body(&self, body: &serde_yaml::Value) -> anyhow::Result<serde_json::Value> {
        let json: serde_json::Value = serde_yaml::from_value(body.clone())
            .map_err(|e| anyhow::anyhow!("step body is not JSON-compatible: {e}"))?;
        Ok(self.substitute_json(json))
    }

    fn substitute_json(&self, value: serde_json::Value) -> serde_json::Value {
        match value {
            serde_json::Value::String(s) => serde_json::Value::String(self.substitute(&s)),
            serde_json::Value::Array(items) => serde_json::Value::Array(
                items.into_iter().map(|v| self.substitute_json(v)).collect(),
            ),
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, self.substitute_json(v)))
                    .collect(),
            ),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credential;

    fn context() -> RunContext {
        let mut config = Config::default();
        config.credentials.insert(
            "admin".to_string(),
            Credential {
                email: "root@example.com".to_string(),
                password: "hunter2".to_string(),
            },
        );
        RunContext::new(&config)
    }

    #[test]
    fn substitutes_credential_vars() {
        let ctx = context();
        assert_eq!(
            ctx.substitute("user=${admin.email} pass=${admin.password}"),
            "user=root@example.com pass=hunter2"
        );
    }

    #[test]
    fn unknown_references_are_kept_literally() {
        let ctx = context();
        assert_eq!(ctx.substitute("${no.such.var}"), "${no.such.var}");
    }

    #[test]
    fn captured_vars_win_over_nothing() {
        let mut ctx = context();
        ctx.set_var("userId", "u-7");
        assert_eq!(ctx.substitute("/api/users/${userId}"), "/api/users/u-7");
    }

    #[test]
    fn uuid_expansion_is_fresh_per_use() {
        let ctx = context();
        let a = ctx.substitute("${uuid}");
        let b = ctx.substitute("${uuid}");
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }

    #[test]
    fn body_substitution_walks_nested_values() {
        let ctx = context();
        let body: serde_yaml::Value = serde_yaml::from_str(
            "email: ${admin.email}\nnested:\n  who: ${admin.email}\ncount: 3\n",
        )
        .unwrap();
        let json = ctx.substitute_body(&body).unwrap();
        assert_eq!(json["email"], "root@example.com");
        assert_eq!(json["nested"]["who"], "root@example.com");
        assert_eq!(json["count"], 3);
    }
}
