use crate::core::error::ClientError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;

/// Encoded image bytes as exchanged with the remote model.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAsset {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ImageAsset {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Builds an asset from base64 text, sniffing the MIME type when the
    /// caller does not know it.
    pub fn from_base64(mime_type: Option<&str>, payload: &str) -> Result<Self, ClientError> {
        let data = STANDARD
            .decode(payload.trim())
            .map_err(|e| ClientError::ImagePayload(e.to_string()))?;
        let mime_type = match mime_type {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => sniff_mime(&data),
        };
        Ok(Self { mime_type, data })
    }

    /// Accepts `data:<mime>;base64,<payload>` or a bare base64 payload.
    pub fn from_data_url(url: &str) -> Result<Self, ClientError> {
        match url.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest.split_once(',').ok_or_else(|| {
                    ClientError::ImagePayload("data URL has no payload".to_string())
                })?;
                let mime = header.strip_suffix(";base64").ok_or_else(|| {
                    ClientError::ImagePayload(format!("unsupported data URL encoding: {}", header))
                })?;
                Self::from_base64(Some(mime), payload)
            }
            None => Self::from_base64(None, url),
        }
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    /// File extension matching the MIME type.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/png" => "png",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "jpg",
        }
    }

    pub fn decode(&self) -> Result<DynamicImage, image::ImageError> {
        image::load_from_memory(&self.data)
    }
}

fn sniff_mime(data: &[u8]) -> String {
    match image::guess_format(data) {
        Ok(format) => format.to_mime_type().to_string(),
        Err(_) => "image/jpeg".to_string(),
    }
}

/// What a generated raster was produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    Panel { page_number: u32, panel_id: i64 },
    Page { page_number: u32 },
}

impl ImageSource {
    pub fn page_number(&self) -> u32 {
        match self {
            ImageSource::Panel { page_number, .. } | ImageSource::Page { page_number } => *page_number,
        }
    }
}

/// Decoded raster plus provenance.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub source: ImageSource,
    pub image: DynamicImage,
}

impl GeneratedImage {
    pub fn new(source: ImageSource, image: DynamicImage) -> Self {
        Self { source, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

#[derive(Debug, Clone)]
pub struct CharacterReference {
    pub name: String,
    pub image: ImageAsset,
}

/// Character sheets generated for this run, in plan order. Built once by
/// the character designer and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct CharacterReferenceSet {
    entries: Vec<CharacterReference>,
}

impl CharacterReferenceSet {
    pub fn new(entries: Vec<CharacterReference>) -> Self {
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&ImageAsset> {
        self.entries
            .iter()
            .find(|r| r.name == name)
            .map(|r| &r.image)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|r| r.name.as_str())
    }

    /// All reference images, unfiltered.
    pub fn images(&self) -> Vec<ImageAsset> {
        self.entries.iter().map(|r| r.image.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CharacterReference> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
