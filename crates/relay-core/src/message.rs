use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    #[default]
    User,
    Assistant,
}

/// Image attachment. `url` is either a remote URL or a `data:` URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageRef {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl ImageRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioRef {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentRef {
    pub url: String,
    pub filename: String,
}

/// Image produced by the model during a response, base64 encoded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedImage {
    pub mime_type: String,
    pub data: String,
}

/// Provenance for search-grounded answers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GroundingMetadata {
    #[serde(default)]
    pub queries: Vec<String>,
    #[serde(default)]
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image { image: ImageRef },
    Audio { audio: AudioRef },
}

/// A message as handed to the LLM client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        let text = text.into();
        let content = if text.is_empty() {
            Vec::new()
        } else {
            vec![ContentPart::Text { text }]
        };
        Self {
            role,
            content,
            name: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_images(mut self, images: impl IntoIterator<Item = ImageRef>) -> Self {
        self.content
            .extend(images.into_iter().map(|image| ContentPart::Image { image }));
        self
    }

    pub fn with_audio(mut self, audio: impl IntoIterator<Item = AudioRef>) -> Self {
        self.content
            .extend(audio.into_iter().map(|audio| ContentPart::Audio { audio }));
        self
    }

    /// All text parts joined in order.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Replace every text part with a single leading text part.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.content
            .retain(|part| !matches!(part, ContentPart::Text { .. }));
        let text = text.into();
        if !text.is_empty() {
            self.content.insert(0, ContentPart::Text { text });
        }
    }

    pub fn image_count(&self) -> usize {
        self.content
            .iter()
            .filter(|part| matches!(part, ContentPart::Image { .. }))
            .count()
    }

    pub fn has_visible_content(&self) -> bool {
        self.content.iter().any(|part| match part {
            ContentPart::Text { text } => !text.is_empty(),
            ContentPart::Image { .. } | ContentPart::Audio { .. } => true,
        })
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }
}
