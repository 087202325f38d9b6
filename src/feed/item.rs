use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a shared item carries.
///
/// Wire values are uppercase (`"TEXT"`, `"IMAGE"`, `"FILE"`) to match the
/// browser client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ItemKind {
    Text,
    Image,
    File,
}

/// One shared piece of content on the board.
///
/// `id` is assigned by the submitting client and never changes. For non-text
/// kinds `content` holds the original filename and `locator` points at the
/// uploaded bytes (`/api/files/<key>`); both are absent for plain text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub kind: ItemKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

impl Item {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: ItemKind::Text,
            content: content.into(),
            locator: None,
            media_type: None,
        }
    }

    pub fn file(
        name: impl Into<String>,
        locator: impl Into<String>,
        media_type: Option<String>,
    ) -> Self {
        let media_type = media_type.filter(|m| !m.is_empty());
        let kind = match &media_type {
            Some(m) if m.starts_with("image/") => ItemKind::Image,
            _ => ItemKind::File,
        };

        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            content: name.into(),
            locator: Some(locator.into()),
            media_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_item_has_no_locator() {
        let item = Item::text("hello");
        assert_eq!(item.kind, ItemKind::Text);
        assert_eq!(item.content, "hello");
        assert!(item.locator.is_none());
        assert!(item.media_type.is_none());
    }

    #[test]
    fn image_kind_follows_media_type() {
        let img = Item::file("cat.png", "/api/files/abc", Some("image/png".into()));
        assert_eq!(img.kind, ItemKind::Image);

        let pdf = Item::file("doc.pdf", "/api/files/def", Some("application/pdf".into()));
        assert_eq!(pdf.kind, ItemKind::File);

        let unknown = Item::file("blob.bin", "/api/files/0ff", None);
        assert_eq!(unknown.kind, ItemKind::File);
    }

    #[test]
    fn wire_shape_matches_browser_client() {
        let item = Item {
            id: "42".into(),
            kind: ItemKind::Image,
            content: "cat.png".into(),
            locator: Some("/api/files/abc".into()),
            media_type: Some("image/png".into()),
        };

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "42",
                "kind": "IMAGE",
                "content": "cat.png",
                "locator": "/api/files/abc",
                "mediaType": "image/png"
            })
        );

        // Text items serialize without the optional fields entirely.
        let text = serde_json::to_value(Item {
            id: "7".into(),
            kind: ItemKind::Text,
            content: "hi".into(),
            locator: None,
            media_type: None,
        })
        .unwrap();
        assert_eq!(
            text,
            serde_json::json!({ "id": "7", "kind": "TEXT", "content": "hi" })
        );
    }
}
