use serde::{Deserialize, Serialize};

/// The closed set of HubSpot content types this system handles.
///
/// Every per-type decision (endpoint path, publish support, PATCH support)
/// lives in [`Capabilities`] so dispatch is an exhaustive match instead of
/// string comparisons scattered across handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentType {
    LandingPages,
    SitePages,
    BlogPosts,
    Blogs,
    Tags,
    Authors,
    UrlRedirects,
    HubdbTables,
}

/// What the HubSpot API lets us do with a content type.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    /// Path of the v3 listing endpoint, relative to the API base.
    pub endpoint_path: &'static str,
    /// Whether push-live/unpublish publish actions exist for this type.
    pub supports_publish: bool,
    /// Whether ordinary field edits can be PATCHed back.
    pub supports_patch: bool,
}

pub const ALL_CONTENT_TYPES: [ContentType; 8] = [
    ContentType::LandingPages,
    ContentType::SitePages,
    ContentType::BlogPosts,
    ContentType::Blogs,
    ContentType::Tags,
    ContentType::Authors,
    ContentType::UrlRedirects,
    ContentType::HubdbTables,
];

impl ContentType {
    pub fn capabilities(self) -> Capabilities {
        match self {
            ContentType::LandingPages => Capabilities {
                endpoint_path: "cms/v3/pages/landing-pages",
                supports_publish: true,
                supports_patch: true,
            },
            ContentType::SitePages => Capabilities {
                endpoint_path: "cms/v3/pages/site-pages",
                supports_publish: true,
                supports_patch: true,
            },
            ContentType::BlogPosts => Capabilities {
                endpoint_path: "cms/v3/blogs/posts",
                supports_publish: true,
                supports_patch: true,
            },
            ContentType::Blogs => Capabilities {
                // Blog containers have no publish concept, only settings.
                endpoint_path: "cms/v3/blog-settings/settings",
                supports_publish: false,
                supports_patch: true,
            },
            ContentType::Tags => Capabilities {
                endpoint_path: "cms/v3/blogs/tags",
                supports_publish: false,
                supports_patch: true,
            },
            ContentType::Authors => Capabilities {
                endpoint_path: "cms/v3/blogs/authors",
                supports_publish: false,
                supports_patch: true,
            },
            ContentType::UrlRedirects => Capabilities {
                endpoint_path: "cms/v3/url-redirects",
                supports_publish: false,
                supports_patch: true,
            },
            ContentType::HubdbTables => Capabilities {
                // Table schemas are exported/discovered only; row edits go
                // through a separate surface this system does not expose.
                endpoint_path: "cms/v3/hubdb/tables",
                supports_publish: false,
                supports_patch: false,
            },
        }
    }

    /// The kebab-case slug used in API requests and persisted rows.
    pub fn as_slug(self) -> &'static str {
        match self {
            ContentType::LandingPages => "landing-pages",
            ContentType::SitePages => "site-pages",
            ContentType::BlogPosts => "blog-posts",
            ContentType::Blogs => "blogs",
            ContentType::Tags => "tags",
            ContentType::Authors => "authors",
            ContentType::UrlRedirects => "url-redirects",
            ContentType::HubdbTables => "hubdb-tables",
        }
    }

    /// Human label shown in the dashboard and stored by older exports.
    pub fn label(self) -> &'static str {
        match self {
            ContentType::LandingPages => "Landing Page",
            ContentType::SitePages => "Site Page",
            ContentType::BlogPosts => "Blog Post",
            ContentType::Blogs => "Blog",
            ContentType::Tags => "Tag",
            ContentType::Authors => "Author",
            ContentType::UrlRedirects => "URL Redirect",
            ContentType::HubdbTables => "HubDB Table",
        }
    }

    /// Parses either the kebab-case slug or the human label.
    /// Snapshot rows written by earlier exports store the label form.
    pub fn parse(input: &str) -> Option<ContentType> {
        let trimmed = input.trim();
        ALL_CONTENT_TYPES
            .iter()
            .copied()
            .find(|ct| ct.as_slug() == trimmed || ct.label().eq_ignore_ascii_case(trimmed))
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_slug())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_slug_and_label() {
        assert_eq!(ContentType::parse("site-pages"), Some(ContentType::SitePages));
        assert_eq!(ContentType::parse("Site Page"), Some(ContentType::SitePages));
        assert_eq!(ContentType::parse("site page"), Some(ContentType::SitePages));
        assert_eq!(ContentType::parse("unknown"), None);
    }

    #[test]
    fn test_every_type_has_an_endpoint() {
        for ct in ALL_CONTENT_TYPES {
            assert!(ct.capabilities().endpoint_path.starts_with("cms/v3/"));
        }
    }

    #[test]
    fn test_publish_implies_patch() {
        for ct in ALL_CONTENT_TYPES {
            let caps = ct.capabilities();
            if caps.supports_publish {
                assert!(caps.supports_patch, "{ct} publishes but cannot patch");
            }
        }
    }
}
