use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    /// user uploaded
    Upload,
    /// full page image screenshot
    Screenshot,
    /// primary image from page or small screenshot
    Thumbnail,
    /// small partial page screenshot
    Preview,
    /// full HTML page
    Page,
    /// full page PDF
    Document,
    /// extracted formatted readable content
    ReadableDoc,
    /// extracted text content only
    ReadableText,
    /// task created
    Generated
}

impl ResourceType {
    /// Resources produced for a newly saved link
    pub fn link_baseline() -> BTreeSet<ResourceType> {
        BTreeSet::from([
            ResourceType::Screenshot,
            ResourceType::Thumbnail,
            ResourceType::Preview,
            ResourceType::Page,
            ResourceType::Document,
            ResourceType::ReadableDoc,
            ResourceType::ReadableText
        ])
    }

    /// Resources needed to render a suggestion
    pub fn suggestion() -> BTreeSet<ResourceType> {
        BTreeSet::from([ResourceType::Preview, ResourceType::Thumbnail, ResourceType::ReadableText])
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Upload => "upload",
            ResourceType::Screenshot => "screenshot",
            ResourceType::Thumbnail => "thumbnail",
            ResourceType::Preview => "preview",
            ResourceType::Page => "page",
            ResourceType::Document => "document",
            ResourceType::ReadableDoc => "readable_doc",
            ResourceType::ReadableText => "readable_text",
            ResourceType::Generated => "generated"
        }
    }
}

/// A scrape artifact staged in temporary storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedResource {
    pub resource_type: ResourceType,
    pub target_path:   String,
    pub extension:     String
}

/// A resource migrated to permanent storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id:            String,
    pub parent_id:     String,
    pub entry_id:      String,
    pub version:       u32,
    pub name:          String,
    pub extension:     String,
    pub resource_type: ResourceType,
    pub size:          u64,
    pub date_created:  i64
}

/// Page details extracted by a light scrape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkDetails {
    pub url:      String,
    pub title:    Option<String>,
    pub keywords: Vec<String>
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuggestResponse {
    pub details:   LinkDetails,
    pub resources: Vec<GeneratedResource>
}
