//! Homework photo flow

use super::image::{prepare_image_for_upload, ImageError};
use super::SendError;
use crate::api::{ApiClient, ApiError, ImageGuidanceResponse, ImageUpload, Role};
use crate::store::SharedStore;

/// Transcript entry standing in for the photo
pub const PHOTO_PLACEHOLDER: &str = "[上传了一张图片]";

pub const UPLOAD_FAILED_MESSAGE: &str = "上传图片失败，请重试";

/// Assistant reply added when the photo could not be read
pub const UPLOAD_FAILED_REPLY: &str = "哎呀，小芽没看清这张图片，能再拍一次吗？📷";

/// Prepare and upload a homework photo for the session's student
///
/// Preparation failures are reported before anything is added to the
/// transcript.
pub async fn send_photo(
    api: &ApiClient,
    store: &SharedStore,
    image: &ImageUpload,
) -> Result<ImageGuidanceResponse, SendError> {
    let original = image.clone();
    let prepared = tokio::task::spawn_blocking(move || prepare_image_for_upload(&original))
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Image preparation task failed: {}", e);
            Err(ImageError::CompressionFailed)
        });

    let (image, student) = {
        let mut store = store.lock();
        let image = match prepared {
            Ok(image) => image,
            Err(e) => {
                store.set_error(Some(e.to_string()));
                return Err(SendError::Invalid(e.to_string()));
            }
        };

        store.set_error(None);
        store.set_loading(true);
        store.add_message(Role::User, PHOTO_PLACEHOLDER);
        (image, store.session().clone())
    };

    let result = api
        .upload_image_for_guidance(
            &image,
            &student.student_id,
            student.student_age,
            &student.subject,
        )
        .await
        .and_then(|response| {
            if response.success {
                Ok(response)
            } else {
                Err(ApiError::Parse("guidance response reported failure".to_string()))
            }
        });

    let mut store = store.lock();
    store.set_loading(false);
    match result {
        Ok(response) => {
            tracing::info!("Image guidance received ({} bytes uploaded)", response.data.image_size);
            store.add_message(Role::Assistant, response.data.response.clone());
            Ok(response)
        }
        Err(source) => {
            tracing::error!("Failed to upload image: {}", source);
            store.set_error(Some(UPLOAD_FAILED_MESSAGE.to_string()));
            store.add_message(Role::Assistant, UPLOAD_FAILED_REPLY);
            Err(SendError::Failed {
                attempts: 1,
                friendly: source.friendly(),
                source,
            })
        }
    }
}
