use serde::{Deserialize, Serialize};

/// Role of an image on the product page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    /// Gallery / thumbnail image
    Primary,
    /// Image from the long-form product description
    Detail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedImage {
    pub kind: ImageKind,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedProduct {
    pub title: Option<String>,
    /// In page order, primary images first
    pub images: Vec<ExtractedImage>,
}

impl ExtractedProduct {
    pub fn count(&self, kind: ImageKind) -> usize {
        self.images.iter().filter(|img| img.kind == kind).count()
    }
}

/// Raw shape returned by the Compuzone extraction script
#[derive(Debug, Deserialize)]
pub(crate) struct CompuzonePage {
    pub title: Option<String>,
    #[serde(default)]
    pub main: Vec<String>,
    #[serde(default)]
    pub detail: Vec<String>,
}
