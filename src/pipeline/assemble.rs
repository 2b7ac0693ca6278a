//! PDF assembly: one page per captured image, in step order.
//!
//! Every page is exactly the size of its image, with 1 px mapped to 1 pt,
//! so nothing is scaled, cropped or letterboxed. Pages may differ in size.
//!
//! PNG snapshots are decoded to 8-bit RGB and stored Flate-compressed. JPEG
//! snapshots are already in a PDF-native encoding and are embedded
//! verbatim under `DCTDecode`.
//!
//! Building the document is CPU-bound, so the async entry point runs it on
//! the blocking pool.

use crate::error::Slides2PdfError;
use crate::presentation::{CaptureArtifact, CaptureFormat};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::ImageReader;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::io::{Cursor, Write};
use tracing::debug;

/// Build a PDF from `artifacts`.
///
/// Returns the serialized document and each page's size in pixels.
pub async fn assemble(
    artifacts: Vec<CaptureArtifact>,
    title: Option<String>,
) -> Result<(Vec<u8>, Vec<(u32, u32)>), Slides2PdfError> {
    tokio::task::spawn_blocking(move || assemble_pdf(&artifacts, title.as_deref()))
        .await
        .map_err(|e| Slides2PdfError::Internal(format!("assembly task failed: {e}")))?
}

/// Synchronous core of [`assemble`].
pub fn assemble_pdf(
    artifacts: &[CaptureArtifact],
    title: Option<&str>,
) -> Result<(Vec<u8>, Vec<(u32, u32)>), Slides2PdfError> {
    if artifacts.is_empty() {
        return Err(Slides2PdfError::EmptyOutput {
            detail: "no captured pages to assemble".into(),
        });
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut page_ids: Vec<ObjectId> = Vec::with_capacity(artifacts.len());
    let mut sizes = Vec::with_capacity(artifacts.len());

    for (i, artifact) in artifacts.iter().enumerate() {
        let page = i + 1;
        let fail = |detail: String| Slides2PdfError::AssemblyFailed { page, detail };

        let (image, width, height) = image_xobject(artifact).map_err(fail)?;
        let image_id = doc.add_object(image);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        (width as i64).into(),
                        0i64.into(),
                        0i64.into(),
                        (height as i64).into(),
                        0i64.into(),
                        0i64.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content.encode().map_err(|e| fail(e.to_string()))?;
        let compressed = deflate(&encoded).map_err(|e| fail(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(
            dictionary! { "Filter" => "FlateDecode" },
            compressed,
        ));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0i64.into(), 0i64.into(), (width as i64).into(), (height as i64).into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        page_ids.push(page_id);
        sizes.push((width, height));
        debug!("Page {}: {}x{} px", page, width, height);
    }

    let kids: Vec<Object> = page_ids.iter().map(|id| Object::from(*id)).collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_ids.len() as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let mut info = dictionary! {
        "Producer" => Object::string_literal(concat!("webslides2pdf ", env!("CARGO_PKG_VERSION"))),
    };
    if let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) {
        info.set("Title", text_string(title));
    }
    let info_id = doc.add_object(info);
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).map_err(|e| Slides2PdfError::AssemblyFailed {
        page: artifacts.len(),
        detail: format!("cannot serialize document: {e}"),
    })?;

    Ok((bytes, sizes))
}

/// Turn one artifact into an image XObject stream.
fn image_xobject(artifact: &CaptureArtifact) -> Result<(Stream, u32, u32), String> {
    match artifact.format {
        CaptureFormat::Png => {
            let img = image::load_from_memory(&artifact.bytes)
                .map_err(|e| format!("cannot decode PNG snapshot: {e}"))?
                .to_rgb8();
            let (width, height) = img.dimensions();
            let data = deflate(img.as_raw()).map_err(|e| e.to_string())?;
            let stream = Stream::new(
                image_dict(width, height, "FlateDecode"),
                data,
            );
            Ok((stream, width, height))
        }
        CaptureFormat::Jpeg { .. } => {
            let (width, height) = ImageReader::new(Cursor::new(&artifact.bytes))
                .with_guessed_format()
                .map_err(|e| e.to_string())?
                .into_dimensions()
                .map_err(|e| format!("cannot read JPEG snapshot: {e}"))?;
            let stream = Stream::new(image_dict(width, height, "DCTDecode"), artifact.bytes.clone());
            Ok((stream, width, height))
        }
    }
}

fn image_dict(width: u32, height: u32, filter: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
        "Filter" => filter,
    }
}

fn deflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// PDF text string: UTF-16BE with a byte-order mark.
fn text_string(s: &str) -> Object {
    let mut bytes = vec![0xFE, 0xFF];
    bytes.extend(s.encode_utf16().flat_map(|u| u.to_be_bytes()));
    Object::String(bytes, StringFormat::Hexadecimal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::session::testing::solid_png;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

    fn png(step_index: usize, w: u32, h: u32) -> CaptureArtifact {
        CaptureArtifact {
            step_index,
            format: CaptureFormat::Png,
            bytes: solid_png(w, h),
        }
    }

    fn jpeg(step_index: usize, w: u32, h: u32) -> CaptureArtifact {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([200, 10, 10])));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
            .unwrap();
        CaptureArtifact {
            step_index,
            format: CaptureFormat::Jpeg { quality: 90 },
            bytes,
        }
    }

    fn media_boxes(pdf: &[u8]) -> Vec<(i64, i64)> {
        let doc = Document::load_mem(pdf).unwrap();
        doc.get_pages()
            .values()
            .map(|id| {
                let page = doc.get_dictionary(*id).unwrap();
                let mb = page.get(b"MediaBox").unwrap().as_array().unwrap();
                (mb[2].as_i64().unwrap(), mb[3].as_i64().unwrap())
            })
            .collect()
    }

    #[test]
    fn one_page_per_artifact_sized_to_image() {
        let artifacts = vec![png(1, 16, 12), png(2, 16, 12), png(3, 16, 12)];
        let (pdf, sizes) = assemble_pdf(&artifacts, None).unwrap();

        assert!(pdf.starts_with(b"%PDF-1.5"));
        assert_eq!(sizes, vec![(16, 12); 3]);
        assert_eq!(media_boxes(&pdf), vec![(16, 12); 3]);
    }

    #[test]
    fn mixed_dimensions_are_preserved_in_order() {
        let artifacts = vec![png(1, 10, 10), png(2, 30, 20), png(3, 7, 40)];
        let (pdf, sizes) = assemble_pdf(&artifacts, None).unwrap();

        assert_eq!(sizes, vec![(10, 10), (30, 20), (7, 40)]);
        assert_eq!(media_boxes(&pdf), vec![(10, 10), (30, 20), (7, 40)]);
    }

    #[test]
    fn jpeg_is_embedded_verbatim() {
        let artifact = jpeg(1, 24, 16);
        let original = artifact.bytes.clone();
        let (pdf, sizes) = assemble_pdf(&[artifact], None).unwrap();
        assert_eq!(sizes, vec![(24, 16)]);

        let doc = Document::load_mem(&pdf).unwrap();
        let found = doc.objects.values().any(|obj| match obj {
            Object::Stream(s) => {
                s.dict.get(b"Filter").and_then(|f| f.as_name()).ok() == Some(b"DCTDecode".as_slice())
                    && s.content == original
            }
            _ => false,
        });
        assert!(found, "JPEG stream not found unchanged");
    }

    #[test]
    fn title_is_written_to_info() {
        let (pdf, _) = assemble_pdf(&[png(1, 4, 4)], Some("Café talk")).unwrap();
        let doc = Document::load_mem(&pdf).unwrap();
        let info_ref = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        let info = doc.get_dictionary(info_ref).unwrap();
        let title = info.get(b"Title").unwrap().as_str().unwrap();
        assert_eq!(&title[..2], &[0xFE, 0xFF]);
    }

    #[test]
    fn zero_artifacts_is_empty_output() {
        let err = assemble_pdf(&[], None).unwrap_err();
        assert!(matches!(err, Slides2PdfError::EmptyOutput { .. }));
    }

    #[test]
    fn undecodable_png_names_the_page() {
        let mut bad = png(2, 4, 4);
        bad.bytes = b"not an image".to_vec();
        let err = assemble_pdf(&[png(1, 4, 4), bad], None).unwrap_err();
        assert!(matches!(err, Slides2PdfError::AssemblyFailed { page: 2, .. }));
    }

    #[tokio::test]
    async fn async_wrapper_matches_sync() {
        let (pdf, sizes) = assemble(vec![png(1, 5, 5)], Some("t".into())).await.unwrap();
        assert_eq!(sizes, vec![(5, 5)]);
        assert_eq!(media_boxes(&pdf).len(), 1);
    }
}
