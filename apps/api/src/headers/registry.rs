//! Static field registry: every field the dashboard knows about, its data
//! type, category, presence per content type, and whether it may be edited.
//! Discovery can surface fields beyond this table; those arrive as
//! Additional/editable until configured otherwise.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::content::ContentType;
use crate::value::to_title_case;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    DateTime,
}

impl DataType {
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Number => "number",
            DataType::Boolean => "boolean",
            DataType::Array => "array",
            DataType::Object => "object",
            DataType::DateTime => "date-time",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Required,
    Recommended,
    Additional,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Required => "Required",
            Category::Recommended => "Recommended",
            Category::Additional => "Additional",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// camelCase name as returned by the vendor API.
    pub api_name: &'static str,
    pub data_type: DataType,
    pub category: Category,
    pub read_only: bool,
    /// Editable directly in the dashboard UI, distinct from bulk sheet edits.
    pub in_app_edit: bool,
    /// Usable in UI filtering.
    pub filters: bool,
    pub present_in: &'static [ContentType],
}

use ContentType::*;

const PAGES: &[ContentType] = &[LandingPages, SitePages, BlogPosts];
const PAGES_AND_BLOGS: &[ContentType] = &[LandingPages, SitePages, BlogPosts, Blogs];
const ALL: &[ContentType] = &[
    LandingPages,
    SitePages,
    BlogPosts,
    Blogs,
    Tags,
    Authors,
    UrlRedirects,
    HubdbTables,
];

pub const REGISTRY: &[FieldSpec] = &[
    FieldSpec {
        api_name: "id",
        data_type: DataType::String,
        category: Category::Required,
        read_only: true,
        in_app_edit: false,
        filters: true,
        present_in: ALL,
    },
    FieldSpec {
        api_name: "name",
        data_type: DataType::String,
        category: Category::Required,
        read_only: false,
        in_app_edit: true,
        filters: true,
        present_in: ALL,
    },
    FieldSpec {
        api_name: "slug",
        data_type: DataType::String,
        category: Category::Required,
        read_only: false,
        in_app_edit: true,
        filters: true,
        present_in: &[LandingPages, SitePages, BlogPosts, Blogs, Tags, Authors],
    },
    FieldSpec {
        api_name: "htmlTitle",
        data_type: DataType::String,
        category: Category::Required,
        read_only: false,
        in_app_edit: true,
        filters: false,
        present_in: PAGES_AND_BLOGS,
    },
    FieldSpec {
        api_name: "metaDescription",
        data_type: DataType::String,
        category: Category::Recommended,
        read_only: false,
        in_app_edit: true,
        filters: false,
        present_in: PAGES,
    },
    FieldSpec {
        api_name: "state",
        data_type: DataType::String,
        category: Category::Recommended,
        read_only: false,
        in_app_edit: true,
        filters: true,
        present_in: PAGES,
    },
    FieldSpec {
        api_name: "currentState",
        data_type: DataType::String,
        category: Category::Additional,
        read_only: true,
        in_app_edit: false,
        filters: true,
        present_in: PAGES,
    },
    FieldSpec {
        api_name: "url",
        data_type: DataType::String,
        category: Category::Recommended,
        read_only: true,
        in_app_edit: false,
        filters: true,
        present_in: PAGES_AND_BLOGS,
    },
    FieldSpec {
        api_name: "domain",
        data_type: DataType::String,
        category: Category::Additional,
        read_only: false,
        in_app_edit: false,
        filters: true,
        present_in: PAGES,
    },
    FieldSpec {
        api_name: "language",
        data_type: DataType::String,
        category: Category::Additional,
        read_only: false,
        in_app_edit: true,
        filters: true,
        present_in: PAGES_AND_BLOGS,
    },
    FieldSpec {
        api_name: "authorName",
        data_type: DataType::String,
        category: Category::Recommended,
        read_only: false,
        in_app_edit: true,
        filters: true,
        present_in: &[BlogPosts],
    },
    FieldSpec {
        api_name: "blogAuthorId",
        data_type: DataType::String,
        category: Category::Additional,
        read_only: false,
        in_app_edit: false,
        filters: false,
        present_in: &[BlogPosts],
    },
    FieldSpec {
        api_name: "tagIds",
        data_type: DataType::Array,
        category: Category::Additional,
        read_only: false,
        in_app_edit: false,
        filters: true,
        present_in: &[BlogPosts],
    },
    FieldSpec {
        api_name: "postBody",
        data_type: DataType::String,
        category: Category::Recommended,
        read_only: false,
        in_app_edit: false,
        filters: false,
        present_in: &[BlogPosts],
    },
    FieldSpec {
        api_name: "postSummary",
        data_type: DataType::String,
        category: Category::Additional,
        read_only: false,
        in_app_edit: false,
        filters: false,
        present_in: &[BlogPosts],
    },
    FieldSpec {
        api_name: "publishDate",
        data_type: DataType::DateTime,
        category: Category::Recommended,
        read_only: false,
        in_app_edit: true,
        filters: true,
        present_in: PAGES,
    },
    FieldSpec {
        api_name: "createdAt",
        data_type: DataType::DateTime,
        category: Category::Additional,
        read_only: true,
        in_app_edit: false,
        filters: true,
        present_in: ALL,
    },
    FieldSpec {
        api_name: "updatedAt",
        data_type: DataType::DateTime,
        category: Category::Additional,
        read_only: true,
        in_app_edit: false,
        filters: true,
        present_in: ALL,
    },
    FieldSpec {
        api_name: "archivedAt",
        data_type: DataType::DateTime,
        category: Category::Additional,
        read_only: true,
        in_app_edit: false,
        filters: false,
        present_in: PAGES_AND_BLOGS,
    },
    FieldSpec {
        api_name: "fullName",
        data_type: DataType::String,
        category: Category::Required,
        read_only: false,
        in_app_edit: true,
        filters: true,
        present_in: &[Authors],
    },
    FieldSpec {
        api_name: "email",
        data_type: DataType::String,
        category: Category::Recommended,
        read_only: false,
        in_app_edit: true,
        filters: false,
        present_in: &[Authors],
    },
    FieldSpec {
        api_name: "bio",
        data_type: DataType::String,
        category: Category::Additional,
        read_only: false,
        in_app_edit: false,
        filters: false,
        present_in: &[Authors],
    },
    FieldSpec {
        api_name: "routePrefix",
        data_type: DataType::String,
        category: Category::Required,
        read_only: false,
        in_app_edit: true,
        filters: true,
        present_in: &[UrlRedirects],
    },
    FieldSpec {
        api_name: "destination",
        data_type: DataType::String,
        category: Category::Required,
        read_only: false,
        in_app_edit: true,
        filters: false,
        present_in: &[UrlRedirects],
    },
    FieldSpec {
        api_name: "redirectStyle",
        data_type: DataType::Number,
        category: Category::Recommended,
        read_only: false,
        in_app_edit: true,
        filters: true,
        present_in: &[UrlRedirects],
    },
    FieldSpec {
        api_name: "isTrailingSlashOptional",
        data_type: DataType::Boolean,
        category: Category::Additional,
        read_only: false,
        in_app_edit: false,
        filters: false,
        present_in: &[UrlRedirects],
    },
    FieldSpec {
        api_name: "translatedContent",
        data_type: DataType::Object,
        category: Category::Additional,
        read_only: true,
        in_app_edit: false,
        filters: false,
        present_in: PAGES,
    },
    FieldSpec {
        api_name: "columns",
        data_type: DataType::Array,
        category: Category::Recommended,
        read_only: true,
        in_app_edit: false,
        filters: false,
        present_in: &[HubdbTables],
    },
    FieldSpec {
        api_name: "rowCount",
        data_type: DataType::Number,
        category: Category::Additional,
        read_only: true,
        in_app_edit: false,
        filters: true,
        present_in: &[HubdbTables],
    },
];

/// Fields known for a content type, in registry (export column) order.
pub fn fields_for(content_type: ContentType) -> Vec<&'static FieldSpec> {
    REGISTRY
        .iter()
        .filter(|spec| spec.present_in.contains(&content_type))
        .collect()
}

/// The set of field names (camelCase) the diff and sync engines may touch.
pub fn editable_fields(content_type: ContentType) -> HashSet<String> {
    fields_for(content_type)
        .into_iter()
        .filter(|spec| !spec.read_only)
        .map(|spec| spec.api_name.to_string())
        .collect()
}

pub fn lookup(api_name: &str) -> Option<&'static FieldSpec> {
    REGISTRY.iter().find(|spec| spec.api_name == api_name)
}

/// Human label for a field, derived from its API name.
pub fn display_name(api_name: &str) -> String {
    to_title_case(api_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_names_are_unique() {
        let mut seen = HashSet::new();
        for spec in REGISTRY {
            assert!(seen.insert(spec.api_name), "duplicate field {}", spec.api_name);
        }
    }

    #[test]
    fn test_id_is_never_editable() {
        for ct in crate::content::ALL_CONTENT_TYPES {
            assert!(!editable_fields(ct).contains("id"));
        }
    }

    #[test]
    fn test_site_pages_editable_set() {
        let editable = editable_fields(ContentType::SitePages);
        assert!(editable.contains("name"));
        assert!(editable.contains("htmlTitle"));
        assert!(editable.contains("state"));
        assert!(!editable.contains("url"));
        assert!(!editable.contains("createdAt"));
    }

    #[test]
    fn test_every_type_has_required_fields() {
        for ct in crate::content::ALL_CONTENT_TYPES {
            let has_required = fields_for(ct)
                .iter()
                .any(|s| s.category == Category::Required);
            assert!(has_required, "{ct} has no required fields");
        }
    }
}
