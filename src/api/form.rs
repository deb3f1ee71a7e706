use std::collections::HashMap;

use axum::extract::multipart::{Multipart, MultipartError};
use bytes::Bytes;

/// One field of a multipart form, fully buffered.
#[derive(Debug, Clone)]
pub struct FormPart {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl FormPart {
    /// File parts carry a filename; plain text fields do not.
    pub fn is_file(&self) -> bool {
        self.file_name.is_some()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// A buffered multipart form. When a field name repeats, the first value wins.
#[derive(Debug, Default)]
pub struct Form {
    parts: HashMap<String, FormPart>,
}

impl Form {
    pub async fn read(mut multipart: Multipart) -> Result<Self, MultipartError> {
        let mut parts = HashMap::new();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            let file_name = field.file_name().map(str::to_owned);
            let content_type = field.content_type().map(str::to_owned);
            let data = field.bytes().await?;

            parts.entry(name).or_insert(FormPart {
                file_name,
                content_type,
                data,
            });
        }

        Ok(Form { parts })
    }

    pub fn get(&self, name: &str) -> Option<&FormPart> {
        self.parts.get(name)
    }

    pub fn take(&mut self, name: &str) -> Option<FormPart> {
        self.parts.remove(name)
    }
}
