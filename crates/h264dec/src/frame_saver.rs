//! Contains [FrameSaver], for writing decoded frames to image files.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use h264decoder::Frame;
use image::RgbImage;
use thiserror::Error;

use crate::args::SaveFormat;

#[derive(Error, Debug)]
pub enum SaveError {
    #[error("Failed to write `{}`: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("Failed to encode `{}`: {source}", path.display())]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Saves the first few frames it's given as `frame_NNNN.<ext>` files.
#[derive(Debug)]
pub struct FrameSaver {
    out_dir: PathBuf,
    format: SaveFormat,
    limit: usize,
    frame_idx: usize,
}

impl FrameSaver {
    /// Prepare `out_dir`, removing frames saved there by an earlier run. Nothing
    /// is touched if `limit` is `0`.
    pub fn with_fresh_out_dir(
        out_dir: impl Into<PathBuf>,
        format: SaveFormat,
        limit: usize,
    ) -> Result<Self, SaveError> {
        let out_dir = out_dir.into();

        if limit > 0 {
            clear_old_frames(&out_dir).map_err(|source| SaveError::Io {
                path: out_dir.clone(),
                source,
            })?;
        }

        Ok(Self {
            out_dir,
            format,
            limit,
            frame_idx: 0,
        })
    }

    /// Save `frame` unless the limit was reached already. Returns whether it
    /// was saved.
    pub fn save(&mut self, frame: &Frame) -> Result<bool, SaveError> {
        if self.frame_idx >= self.limit {
            return Ok(false);
        }

        let path = self.out_dir.join(format!(
            "frame_{:04}.{}",
            self.frame_idx,
            self.format.extension()
        ));

        match self.format {
            SaveFormat::Ppm => write_ppm(&path, frame).map_err(|source| SaveError::Io {
                path: path.clone(),
                source,
            })?,
            SaveFormat::Png => write_png(&path, frame)?,
        }

        util::debug_log_info!("Saved frame {} to `{}`.", self.frame_idx, path.display());
        self.frame_idx += 1;
        Ok(true)
    }

    pub fn saved(&self) -> usize {
        self.frame_idx
    }
}

fn clear_old_frames(out_dir: &Path) -> io::Result<()> {
    if !out_dir.exists() {
        return fs::create_dir_all(out_dir);
    }

    for entry in fs::read_dir(out_dir)? {
        let path = entry?.path();
        let is_old_frame = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("frame_"))
            && matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("ppm" | "png")
            );

        if is_old_frame {
            fs::remove_file(path)?;
        }
    }

    Ok(())
}

/// Binary PPM, written row by row so row padding is left out.
fn write_ppm(path: &Path, frame: &Frame) -> io::Result<()> {
    let mut out_file = BufWriter::new(File::create(path)?);

    write!(out_file, "P6\n{} {}\n255\n", frame.width(), frame.height())?;
    for y in 0..frame.height() {
        if let Some(row) = frame.row(y) {
            out_file.write_all(row)?;
        }
    }

    out_file.flush()
}

fn write_png(path: &Path, frame: &Frame) -> Result<(), SaveError> {
    let image = RgbImage::from_raw(frame.width(), frame.height(), frame.to_packed())
        .ok_or_else(|| SaveError::Image {
            path: path.to_owned(),
            source: image::ImageError::Parameter(image::error::ParameterError::from_kind(
                image::error::ParameterErrorKind::DimensionMismatch,
            )),
        })?;

    image
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|source| SaveError::Image {
            path: path.to_owned(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A unique, empty directory for one test.
    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("h264dec-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    /// A 2x2 frame with one byte of padding per row.
    fn padded_frame() -> Frame {
        #[rustfmt::skip]
        let data = vec![
            255, 0, 0,   0, 255, 0,   0xaa,
            0, 0, 255,   9, 9, 9,     0xaa,
        ];
        Frame::new(data, 2, 2, 7).unwrap()
    }

    #[test]
    fn ppm_files_leave_out_padding() {
        let dir = scratch_dir("ppm");
        let mut saver = FrameSaver::with_fresh_out_dir(&dir, SaveFormat::Ppm, 1).unwrap();

        assert!(saver.save(&padded_frame()).unwrap());
        assert!(!saver.save(&padded_frame()).unwrap());
        assert_eq!(saver.saved(), 1);

        let written = fs::read(dir.join("frame_0000.ppm")).unwrap();
        let mut expected = b"P6\n2 2\n255\n".to_vec();
        expected.extend(padded_frame().to_packed());
        assert_eq!(written, expected);

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn png_files_decode_back_to_the_frame() {
        let dir = scratch_dir("png");
        let mut saver = FrameSaver::with_fresh_out_dir(&dir, SaveFormat::Png, 5).unwrap();
        saver.save(&padded_frame()).unwrap();

        let image = image::open(dir.join("frame_0000.png")).unwrap().to_rgb8();
        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.into_raw(), padded_frame().to_packed());

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn only_old_frames_are_cleared() {
        let dir = scratch_dir("clear");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("frame_0003.ppm"), b"old").unwrap();
        fs::write(dir.join("notes.txt"), b"keep").unwrap();

        FrameSaver::with_fresh_out_dir(&dir, SaveFormat::Ppm, 1).unwrap();

        assert!(!dir.join("frame_0003.ppm").exists());
        assert!(dir.join("notes.txt").exists());

        fs::remove_dir_all(dir).unwrap();
    }
}
