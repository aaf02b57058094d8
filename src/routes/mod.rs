pub mod blog;
pub mod comment;
pub mod token;
pub mod user;

use std::{collections::HashMap, io::Write, path::{Path, PathBuf}};

use actix_multipart::Multipart;
use actix_web::web;
use futures::{stream::StreamExt as _, TryStreamExt};
use uuid::Uuid;

use crate::app::AppError;

/// Text fields plus at most one uploaded file, already written to the temp
/// upload directory. The caller owns the temp file and must hand it to the
/// media store (which removes it) or clean it up itself.
pub struct UploadForm {
    pub fields: HashMap<String, String>,
    pub file: Option<PathBuf>,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Streams a multipart payload: fields named in `file_fields` are written to
/// `temp_dir` under a fresh uuid name (original extension kept), everything
/// else is collected as UTF-8 text.
pub async fn parse_multipart(
    payload: &mut Multipart,
    temp_dir: &Path,
    file_fields: &[&str],
) -> Result<UploadForm, AppError> {
    let mut form = UploadForm {
        fields: HashMap::new(),
        file: None,
    };

    while let Ok(Some(mut field)) = payload.try_next().await {
        let disposition = field.content_disposition();
        let name = match disposition.get_name() {
            Some(name) => name.to_string(),
            None => continue,
        };

        if file_fields.contains(&name.as_str()) {
            let extension = disposition
                .get_filename()
                .and_then(|filename| Path::new(filename).extension())
                .map(|ext| ext.to_string_lossy().to_lowercase());

            std::fs::create_dir_all(temp_dir)?;

            let mut file_name = Uuid::new_v4().to_string();
            if let Some(ext) = extension {
                file_name.push('.');
                file_name.push_str(&ext);
            }
            let path = temp_dir.join(file_name);

            let create_path = path.clone();
            let mut file = web::block(move || std::fs::File::create(create_path)).await??;

            let mut written = 0usize;
            while let Some(chunk) = field.next().await {
                let data =
                    chunk.map_err(|_| AppError::validation("Malformed multipart payload"))?;
                written += data.len();
                file = web::block(move || file.write_all(&data).map(|_| file)).await??;
            }

            // An empty part means the client sent the field without a file.
            if written == 0 {
                let _ = std::fs::remove_file(&path);
                continue;
            }

            if let Some(previous) = form.file.replace(path) {
                let _ = std::fs::remove_file(previous);
            }
        } else {
            let mut bytes = Vec::new();
            while let Some(chunk) = field.next().await {
                let data =
                    chunk.map_err(|_| AppError::validation("Malformed multipart payload"))?;
                bytes.extend_from_slice(&data);
            }

            let value = String::from_utf8(bytes)
                .map_err(|_| AppError::validation("Malformed multipart payload"))?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}
