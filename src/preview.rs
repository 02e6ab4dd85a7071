//! Render-time rewrite of image preview placeholders.
//!
//! Each `UPL-IMAGE-PREVIEW` node is rewritten from the file it references:
//!
//! | Attribute | Source |
//! |---|---|
//! | `url` | current public URL of the file |
//! | `alt` | blanked when still the `{TEXT?}` placeholder |
//! | `title` | file display name |
//! | `aspectRatio` | `"<width>/<height>"` from cached image metadata |
//!
//! Rendering must not fail because of one bad node. A placeholder that
//! references nothing is passed through, and a file whose metadata cannot be
//! derived keeps the attributes rewritten so far without `aspectRatio`.

use crate::deriver::MetadataDeriver;
use crate::files::{FileRepository, UploadedFile};
use crate::markup::{self, Attributes, MarkupError};

/// Tag name of the image preview placeholder.
pub const TAG_NAME: &str = "UPL-IMAGE-PREVIEW";

/// `alt` value left behind by an editor that never filled in alt text.
pub const ALT_PLACEHOLDER: &str = "{TEXT?}";

#[derive(Clone, Copy)]
pub struct PreviewRewriter<'a> {
    files: &'a dyn FileRepository,
    deriver: MetadataDeriver<'a>,
}

impl<'a> PreviewRewriter<'a> {
    pub fn new(files: &'a dyn FileRepository, deriver: MetadataDeriver<'a>) -> Self {
        Self { files, deriver }
    }

    /// Rewrite one placeholder's attributes. Keys it does not own pass through.
    pub fn rewrite(&self, mut attrs: Attributes) -> Attributes {
        let Some(file) = self.resolve(&attrs) else {
            tracing::debug!(
                uuid = attrs.get("uuid").map(String::as_str),
                url = attrs.get("url").map(String::as_str),
                "preview placeholder references no known file"
            );
            return attrs;
        };

        if let Some(url) = self.files.url_for_file(&file) {
            attrs.insert("url".to_string(), url);
        }
        if attrs.get("alt").is_some_and(|alt| alt == ALT_PLACEHOLDER) {
            attrs.insert("alt".to_string(), String::new());
        }
        attrs.insert("title".to_string(), file.base_name.clone());

        match self.deriver.get_or_derive(&file) {
            Ok(meta) => {
                attrs.insert("aspectRatio".to_string(), meta.aspect_ratio());
            }
            Err(e) => tracing::warn!(
                upload_id = file.id,
                uuid = %file.uuid,
                error = %e,
                "cannot derive image metadata, preview rendered without aspect ratio"
            ),
        }

        attrs
    }

    /// Rewrite every placeholder in a rendered document.
    pub fn render(&self, xml: &str) -> Result<String, MarkupError> {
        markup::replace_attributes(xml, TAG_NAME, |attrs| self.rewrite(attrs))
    }

    fn resolve(&self, attrs: &Attributes) -> Option<UploadedFile> {
        match attrs.get("uuid").filter(|uuid| !uuid.is_empty()) {
            Some(uuid) => self.files.find_by_uuid(uuid),
            None => attrs
                .get("url")
                .and_then(|url| self.files.find_by_url(url)),
        }
    }
}
