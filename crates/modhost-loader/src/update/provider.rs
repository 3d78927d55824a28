//! GitHub and GitLab release endpoints.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::config::ManagerConfig;
use crate::descriptor::{Provider, RemoteSource};

/// The latest published release of a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub tag: String,
    /// Download URL of the archive asset, when one was found.
    pub asset_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubRelease {
    tag_name: String,
    #[serde(default)]
    assets: Vec<GitHubAsset>,
}

#[derive(Debug, Deserialize)]
struct GitHubAsset {
    #[serde(default)]
    name: String,
    browser_download_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitLabRelease {
    tag_name: String,
    #[serde(default)]
    assets: GitLabAssets,
}

#[derive(Debug, Default, Deserialize)]
struct GitLabAssets {
    #[serde(default)]
    links: Vec<GitLabLink>,
}

#[derive(Debug, Deserialize)]
struct GitLabLink {
    #[serde(default)]
    name: String,
    url: Option<String>,
    direct_asset_url: Option<String>,
}

static TAG_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""tag_name"\s*:\s*"([^"]+)""#).expect("tag pattern is valid")
});

/// Release listing endpoint for a repository.
pub fn release_url(source: &RemoteSource, config: &ManagerConfig) -> String {
    match source.provider {
        Provider::GitHub => format!(
            "{}/repos/{}/{}/releases/latest",
            config.github_api_url.trim_end_matches('/'),
            source.owner,
            source.repository
        ),
        Provider::GitLab => {
            let project: String =
                url::form_urlencoded::byte_serialize(source.slug().as_bytes()).collect();
            format!(
                "{}/projects/{}/releases",
                config.gitlab_api_url.trim_end_matches('/'),
                project
            )
        }
    }
}

/// Authentication header for a provider token.
pub fn auth_header(provider: Provider, token: &str) -> (&'static str, String) {
    match provider {
        Provider::GitHub => ("Authorization", format!("Bearer {}", token)),
        Provider::GitLab => ("PRIVATE-TOKEN", token.to_string()),
    }
}

/// Extract the latest release from a listing response.
///
/// Returns `None` when the body names no release at all.
pub fn parse_release(
    source: &RemoteSource,
    body: &str,
    extension: &str,
    config: &ManagerConfig,
) -> Option<Release> {
    let suffix = format!(".{}", extension.to_ascii_lowercase());
    let parsed = match source.provider {
        Provider::GitHub => parse_github(source, body, &suffix, &config.github_web_url),
        Provider::GitLab => parse_gitlab(body, &suffix),
    };

    let mut release = match parsed {
        Some(release) => release,
        None => Release {
            tag: TAG_NAME.captures(body)?.get(1)?.as_str().to_string(),
            asset_url: None,
        },
    };
    if release.asset_url.is_none() {
        release.asset_url = scan_for_asset(body, &suffix);
    }
    Some(release)
}

fn parse_github(source: &RemoteSource, body: &str, suffix: &str, web_url: &str) -> Option<Release> {
    let release: GitHubRelease = serde_json::from_str(body).ok()?;

    let direct = release.assets.iter().find_map(|a| {
        a.browser_download_url
            .as_ref()
            .filter(|u| ends_with_ci(u, suffix) || ends_with_ci(&a.name, suffix))
            .cloned()
    });
    let asset_url = direct.or_else(|| {
        release
            .assets
            .iter()
            .find(|a| ends_with_ci(&a.name, suffix))
            .map(|a| {
                format!(
                    "{}/{}/{}/releases/download/{}/{}",
                    web_url.trim_end_matches('/'),
                    source.owner,
                    source.repository,
                    release.tag_name,
                    a.name
                )
            })
    });

    Some(Release {
        tag: release.tag_name,
        asset_url,
    })
}

fn parse_gitlab(body: &str, suffix: &str) -> Option<Release> {
    let releases: Vec<GitLabRelease> = serde_json::from_str(body).ok()?;
    let latest = releases.into_iter().next()?;

    let links = &latest.assets.links;
    let wanted = |u: &str, l: &GitLabLink| ends_with_ci(u, suffix) || ends_with_ci(&l.name, suffix);
    let asset_url = links
        .iter()
        .find_map(|l| l.direct_asset_url.clone().filter(|u| wanted(u, l)))
        .or_else(|| {
            links
                .iter()
                .find_map(|l| l.url.clone().filter(|u| wanted(u, l)))
        });

    Some(Release {
        tag: latest.tag_name,
        asset_url,
    })
}

/// Last resort: any absolute URL in the body ending with the suffix.
fn scan_for_asset(body: &str, suffix: &str) -> Option<String> {
    let unescaped = body.replace("\\/", "/");
    unescaped
        .split(|c: char| c == '"' || c == '\'' || c.is_whitespace())
        .find(|token| {
            (token.starts_with("http://") || token.starts_with("https://"))
                && ends_with_ci(token, suffix)
        })
        .map(str::to_string)
}

fn ends_with_ci(value: &str, suffix: &str) -> bool {
    value.len() > suffix.len() && value.to_ascii_lowercase().ends_with(suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(provider: Provider) -> RemoteSource {
        RemoteSource {
            provider,
            owner: "acme".to_string(),
            repository: "shop".to_string(),
        }
    }

    #[test]
    fn test_release_urls() {
        let config = ManagerConfig::default().with_gitlab_api_url("https://git.example.com/api/v4/");
        assert_eq!(
            release_url(&source(Provider::GitHub), &config),
            "https://api.github.com/repos/acme/shop/releases/latest"
        );
        assert_eq!(
            release_url(&source(Provider::GitLab), &config),
            "https://git.example.com/api/v4/projects/acme%2Fshop/releases"
        );
    }

    #[test]
    fn test_auth_headers() {
        assert_eq!(
            auth_header(Provider::GitHub, "t"),
            ("Authorization", "Bearer t".to_string())
        );
        assert_eq!(
            auth_header(Provider::GitLab, "t"),
            ("PRIVATE-TOKEN", "t".to_string())
        );
    }

    #[test]
    fn test_github_browser_download_url() {
        let body = r#"{
            "tag_name": "v1.2.0",
            "assets": [
                {"name": "shop-1.2.0.sha256", "browser_download_url": "https://dl/shop-1.2.0.sha256"},
                {"name": "shop-1.2.0.zip", "browser_download_url": "https://dl/shop-1.2.0.zip"}
            ]
        }"#;
        let release =
            parse_release(&source(Provider::GitHub), body, "zip", &ManagerConfig::default())
                .unwrap();
        assert_eq!(release.tag, "v1.2.0");
        assert_eq!(release.asset_url.as_deref(), Some("https://dl/shop-1.2.0.zip"));
    }

    #[test]
    fn test_github_url_built_from_tag() {
        let body = r#"{"tag_name": "v2.0.0", "assets": [{"name": "shop.zip"}]}"#;
        let release =
            parse_release(&source(Provider::GitHub), body, "zip", &ManagerConfig::default())
                .unwrap();
        assert_eq!(
            release.asset_url.as_deref(),
            Some("https://github.com/acme/shop/releases/download/v2.0.0/shop.zip")
        );
    }

    #[test]
    fn test_github_raw_scan_fallback() {
        let body = r#"{"tag_name": "v3", "assets": [], "body": "get it at https:\/\/mirror.example.com\/shop.zip"}"#;
        let release =
            parse_release(&source(Provider::GitHub), body, "zip", &ManagerConfig::default())
                .unwrap();
        assert_eq!(
            release.asset_url.as_deref(),
            Some("https://mirror.example.com/shop.zip")
        );
    }

    #[test]
    fn test_gitlab_links() {
        let body = r#"[
            {"tag_name": "1.4.0", "assets": {"links": [
                {"name": "notes", "url": "https://gl/notes.txt"},
                {"name": "shop.zip", "url": "https://gl/raw/shop.zip", "direct_asset_url": "https://gl/direct/shop.zip"}
            ]}},
            {"tag_name": "1.3.0", "assets": {"links": []}}
        ]"#;
        let release =
            parse_release(&source(Provider::GitLab), body, "zip", &ManagerConfig::default())
                .unwrap();
        assert_eq!(release.tag, "1.4.0");
        assert_eq!(release.asset_url.as_deref(), Some("https://gl/direct/shop.zip"));
    }

    #[test]
    fn test_gitlab_url_fallback_and_empty_listing() {
        let body = r#"[{"tag_name": "1.4.0", "assets": {"links": [{"name": "shop.zip", "url": "https://gl/raw/shop.zip"}]}}]"#;
        let release =
            parse_release(&source(Provider::GitLab), body, "zip", &ManagerConfig::default())
                .unwrap();
        assert_eq!(release.asset_url.as_deref(), Some("https://gl/raw/shop.zip"));

        assert!(
            parse_release(&source(Provider::GitLab), "[]", "zip", &ManagerConfig::default())
                .is_none()
        );
    }

    #[test]
    fn test_unexpected_shape_uses_tag_scan() {
        let body = r#"{"release": {"tag_name": "v9.0.0"}, "download": "https://x.example.com/a.zip"}"#;
        let release =
            parse_release(&source(Provider::GitHub), body, "zip", &ManagerConfig::default())
                .unwrap();
        assert_eq!(release.tag, "v9.0.0");
        assert_eq!(release.asset_url.as_deref(), Some("https://x.example.com/a.zip"));
    }
}
