use std::fs;
use std::path::Path;

use image::ImageFormat;
use thiserror::Error;
use uuid::Uuid;

/// Stored images are shrunk to fit within this bounding box
pub const MAX_IMAGE_DIMENSION: u32 = 800;

#[derive(Debug, Error)]
pub enum ImageError {
    /// The uploaded bytes are not in a supported image format
    #[error("Unsupported image format")]
    UnsupportedFormat,
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Writes uploaded image bytes below `root`, downscaling in place when the
/// image exceeds the bounding box in either dimension.
///
/// Returns the stored path relative to `root`, which is what the entity's
/// image column records.
pub fn store_constrained(root: &Path, subdir: &str, bytes: &[u8]) -> Result<String, ImageError> {
    let extension = sniff_extension(bytes)?;
    let file_name = format!("{}.{}", Uuid::new_v4(), extension);

    let dir = root.join(subdir);
    fs::create_dir_all(&dir)?;

    let path = dir.join(&file_name);
    fs::write(&path, bytes)?;
    constrain(&path)?;

    Ok(format!("{}/{}", subdir, file_name))
}

/// Shrinks the image at `path` in place so it fits within the
/// [MAX_IMAGE_DIMENSION] bounding box, preserving aspect ratio.
/// Images already within bounds are left untouched.
pub fn constrain(path: &Path) -> Result<(), ImageError> {
    let image = image::open(path)?;

    if image.width() <= MAX_IMAGE_DIMENSION && image.height() <= MAX_IMAGE_DIMENSION {
        return Ok(());
    }

    image
        .thumbnail(MAX_IMAGE_DIMENSION, MAX_IMAGE_DIMENSION)
        .save(path)?;

    Ok(())
}

fn sniff_extension(bytes: &[u8]) -> Result<&'static str, ImageError> {
    let format = image::guess_format(bytes).map_err(|_| ImageError::UnsupportedFormat)?;

    match format {
        ImageFormat::Png => Ok("png"),
        ImageFormat::Jpeg => Ok("jpg"),
        _ => Err(ImageError::UnsupportedFormat),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::random_string;
    use image::RgbImage;
    use std::path::PathBuf;

    fn temp_png(width: u32, height: u32) -> PathBuf {
        let path = std::env::temp_dir().join(format!("loci-image-{}.png", random_string(8)));

        RgbImage::new(width, height)
            .save(&path)
            .expect("test image saves");

        path
    }

    #[test]
    fn oversized_images_are_shrunk_to_fit() {
        let path = temp_png(1600, 1200);

        constrain(&path).expect("constrains");

        let (width, height) = image::image_dimensions(&path).expect("reads dimensions");
        assert_eq!((width, height), (800, 600));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn small_images_are_left_untouched() {
        let path = temp_png(400, 300);

        constrain(&path).expect("constrains");

        let (width, height) = image::image_dimensions(&path).expect("reads dimensions");
        assert_eq!((width, height), (400, 300));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn stored_uploads_record_a_relative_path() {
        let root = std::env::temp_dir().join(format!("loci-media-{}", random_string(8)));

        let mut bytes = Vec::new();
        RgbImage::new(1000, 500)
            .write_to(
                &mut std::io::Cursor::new(&mut bytes),
                image::ImageFormat::Png,
            )
            .expect("encodes");

        let relative = store_constrained(&root, "palace_images", &bytes).expect("stores");
        assert!(relative.starts_with("palace_images/"));
        assert!(relative.ends_with(".png"));

        let (width, height) = image::image_dimensions(root.join(&relative)).expect("dimensions");
        assert_eq!((width, height), (800, 400));

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn unsupported_bytes_are_rejected() {
        let root = std::env::temp_dir();
        let result = store_constrained(&root, "palace_images", b"not an image");

        assert!(matches!(result, Err(ImageError::UnsupportedFormat)));
    }
}
