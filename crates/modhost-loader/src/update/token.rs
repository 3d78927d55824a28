//! Access-token lookup for release providers.

use modhost_kernel::HostConfig;

use crate::descriptor::Provider;

/// Generic host configuration key, consulted last.
pub const GENERIC_TOKEN_KEY: &str = "git.token";

/// Environment variable holding a provider token.
pub fn env_var(provider: Provider) -> &'static str {
    match provider {
        Provider::GitHub => "USER_GITHUB_TOKEN",
        Provider::GitLab => "USER_GITLAB_TOKEN",
    }
}

/// Provider-specific host configuration key.
pub fn config_key(provider: Provider) -> &'static str {
    match provider {
        Provider::GitHub => "git.github.token",
        Provider::GitLab => "git.gitlab.token",
    }
}

/// Resolve a token: provider environment variable, then provider config key,
/// then the generic config key. Blank values are skipped.
pub fn resolve_token_with<E>(provider: Provider, config: &dyn HostConfig, env: E) -> Option<String>
where
    E: Fn(&str) -> Option<String>,
{
    env(env_var(provider))
        .filter(|t| !t.trim().is_empty())
        .or_else(|| config.get_non_blank(config_key(provider)))
        .or_else(|| config.get_non_blank(GENERIC_TOKEN_KEY))
        .map(|t| t.trim().to_string())
}

/// [`resolve_token_with`] over the process environment.
pub fn resolve_token(provider: Provider, config: &dyn HostConfig) -> Option<String> {
    resolve_token_with(provider, config, |key| std::env::var(key).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use modhost_kernel::MapConfig;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_env_wins() {
        let config = MapConfig::new()
            .with("git.github.token", "from-config")
            .with("git.token", "generic");
        let token = resolve_token_with(Provider::GitHub, &config, |key| {
            (key == "USER_GITHUB_TOKEN").then(|| "from-env".to_string())
        });
        assert_eq!(token.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_provider_key_then_generic() {
        let config = MapConfig::new()
            .with("git.gitlab.token", "lab")
            .with("git.token", "generic");
        assert_eq!(
            resolve_token_with(Provider::GitLab, &config, no_env).as_deref(),
            Some("lab")
        );
        assert_eq!(
            resolve_token_with(Provider::GitHub, &config, no_env).as_deref(),
            Some("generic")
        );
    }

    #[test]
    fn test_blank_values_are_skipped() {
        let config = MapConfig::new()
            .with("git.github.token", "  ")
            .with("git.token", "generic");
        let token = resolve_token_with(Provider::GitHub, &config, |_| Some(String::new()));
        assert_eq!(token.as_deref(), Some("generic"));

        let empty = MapConfig::new();
        assert_eq!(resolve_token_with(Provider::GitHub, &empty, no_env), None);
    }
}
