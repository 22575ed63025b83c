use regex::Regex;
use std::collections::HashMap;

/// Context for variable interpolation.
#[derive(Debug, Clone, Default)]
pub struct InterpolationContext {
    /// Workflow and job environment variables
    pub env: HashMap<String, String>,
    /// Matrix values for the current job instance
    pub matrix: HashMap<String, String>,
}

impl InterpolationContext {
    /// Create a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interpolate variables in a string.
    ///
    /// Supports:
    /// - `${{ env.VAR }}` - environment variable
    /// - `${{ matrix.key }}` - matrix value
    /// - `${{ name }}` - direct variable lookup
    pub fn interpolate(&self, input: &str) -> String {
        let re = Regex::new(r"\$\{\{\s*([^}]+?)\s*\}\}").unwrap();

        re.replace_all(input, |caps: &regex::Captures| {
            let expr = caps.get(1).map_or("", |m| m.as_str()).trim();
            self.resolve_expression(expr)
        })
        .to_string()
    }

    fn resolve_expression(&self, expr: &str) -> String {
        if let Some(var_name) = expr.strip_prefix("env.") {
            return self
                .env
                .get(var_name)
                .cloned()
                .or_else(|| std::env::var(var_name).ok())
                .unwrap_or_default();
        }

        if let Some(key) = expr.strip_prefix("matrix.") {
            return self.matrix.get(key).cloned().unwrap_or_default();
        }

        self.env.get(expr).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> InterpolationContext {
        let mut ctx = InterpolationContext::new();
        ctx.env.insert("RUSTFLAGS".to_string(), "-D warnings".to_string());
        ctx.matrix.insert("os".to_string(), "windows-latest".to_string());
        ctx
    }

    #[test]
    fn test_interpolate_matrix_value() {
        assert_eq!(
            ctx().interpolate("cargo-${{ matrix.os }}"),
            "cargo-windows-latest"
        );
    }

    #[test]
    fn test_interpolate_env_value() {
        assert_eq!(ctx().interpolate("${{ env.RUSTFLAGS }}"), "-D warnings");
    }

    #[test]
    fn test_unknown_expression_resolves_empty() {
        assert_eq!(ctx().interpolate("x${{ matrix.arch }}y"), "xy");
    }

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(ctx().interpolate("cargo check"), "cargo check");
    }
}
