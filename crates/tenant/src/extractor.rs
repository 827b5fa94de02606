// Tenant identifier extraction
// Pulls the lookup key out of an HTTP Host header or raw console argv.

use serde::{Deserialize, Serialize};

/// Name of the console option selecting a tenant
pub const TENANT_OPTION: &str = "--tenant";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierSource {
    Host,
    Console,
}

/// Value of `--tenant`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantOption {
    /// `*` or `all`: run once per tenant
    All,
    /// id, uuid or domain
    Single(String),
}

impl TenantOption {
    pub fn parse(value: &str) -> Self {
        match value {
            "*" | "all" => Self::All,
            other => Self::Single(other.to_string()),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TenantExtractor;

impl TenantExtractor {
    /// Hostname from a Host header value: lower-cased, port removed.
    pub fn host_from_header(value: &str) -> String {
        let value = value.trim().to_lowercase();

        // IPv6 literal, e.g. [::1]:8080
        if let Some(rest) = value.strip_prefix('[') {
            if let Some(end) = rest.find(']') {
                return format!("[{}]", &rest[..end]);
            }
        }

        match value.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => {
                host.to_string()
            }
            _ => value,
        }
    }

    /// Read an option straight from raw argv, before any argument binding.
    ///
    /// Accepts `--name=value` and `--name value`. Scanning stops at `--`.
    /// A bare `--name` followed by another option, or by nothing, yields
    /// `None`, as does an empty value.
    pub fn parameter_option<S: AsRef<str>>(args: &[S], name: &str) -> Option<String> {
        let mut tokens = args.iter().map(|arg| arg.as_ref());

        while let Some(token) = tokens.next() {
            if token == "--" {
                return None;
            }

            if token == name {
                return tokens
                    .next()
                    .filter(|next| !next.starts_with('-'))
                    .filter(|next| !next.is_empty())
                    .map(str::to_string);
            }

            if let Some(value) = token.strip_prefix(name).and_then(|rest| rest.strip_prefix('=')) {
                return (!value.is_empty()).then(|| value.to_string());
            }
        }

        None
    }

    /// `--tenant` from raw argv
    pub fn tenant_option<S: AsRef<str>>(args: &[S]) -> Option<TenantOption> {
        Self::parameter_option(args, TENANT_OPTION).map(|value| TenantOption::parse(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_from_header() {
        assert_eq!(TenantExtractor::host_from_header("A.Example.com"), "a.example.com");
        assert_eq!(TenantExtractor::host_from_header("a.example.com:8080"), "a.example.com");
        assert_eq!(TenantExtractor::host_from_header("[::1]:8080"), "[::1]");
        assert_eq!(TenantExtractor::host_from_header(" localhost "), "localhost");
    }

    #[test]
    fn test_tenant_option_forms() {
        let args = ["tenantable", "migrate", "--tenant=ab12cd34"];
        assert_eq!(
            TenantExtractor::tenant_option(&args),
            Some(TenantOption::Single("ab12cd34".to_string()))
        );

        let args = ["tenantable", "--tenant", "a.example.com", "migrate"];
        assert_eq!(
            TenantExtractor::tenant_option(&args),
            Some(TenantOption::Single("a.example.com".to_string()))
        );

        let args = ["tenantable", "migrate", "--tenant=*"];
        assert_eq!(TenantExtractor::tenant_option(&args), Some(TenantOption::All));

        let args = ["tenantable", "migrate", "--tenant", "all"];
        assert_eq!(TenantExtractor::tenant_option(&args), Some(TenantOption::All));
    }

    #[test]
    fn test_tenant_option_absent() {
        let args = ["tenantable", "migrate"];
        assert_eq!(TenantExtractor::tenant_option(&args), None);

        let args = ["tenantable", "migrate", "--tenant"];
        assert_eq!(TenantExtractor::tenant_option(&args), None);

        let args = ["tenantable", "migrate", "--tenant", "--verbose"];
        assert_eq!(TenantExtractor::tenant_option(&args), None);

        let args = ["tenantable", "migrate", "--tenant="];
        assert_eq!(TenantExtractor::tenant_option(&args), None);

        let args = ["tenantable", "run", "--", "--tenant=1"];
        assert_eq!(TenantExtractor::tenant_option(&args), None);
    }

    #[test]
    fn test_similar_option_is_not_tenant() {
        let args = ["tenantable", "--tenants=1"];
        assert_eq!(TenantExtractor::tenant_option(&args), None);
    }
}
