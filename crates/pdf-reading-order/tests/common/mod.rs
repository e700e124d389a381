use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream, dictionary};

pub enum Item<'a> {
    /// One `BT ... ET` object starting at (x, y) in PDF user space, 12pt Courier, 16pt leading.
    Text { x: i64, y: i64, lines: &'a [&'a str] },
    /// Image XObject painted with its lower-left corner at (x, y), one point per pixel.
    Image { x: i64, y: i64, width: i64, height: i64 },
    /// Form XObject translated to (x, y) whose text uses the form's own 12pt
    /// Helvetica-Bold resource. A `recursive` form paints itself again from
    /// inside its own content.
    Form {
        x: i64,
        y: i64,
        lines: &'a [&'a str],
        recursive: bool,
    },
}

fn text_operations(font: &str, x: i64, y: i64, lines: &[&str]) -> Vec<Operation> {
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![font.into(), 12.into()]),
        Operation::new("TL", vec![16.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
    ];
    for (index, line) in lines.iter().enumerate() {
        if index > 0 {
            operations.push(Operation::new("T*", vec![]));
        }
        operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
    }
    operations.push(Operation::new("ET", vec![]));
    operations
}

pub fn build_test_pdf(
    pages: &[Vec<Item<'_>>],
    title: Option<&str>,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let bold_font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });

    let mut xobjects = Dictionary::new();
    let mut page_ids = Vec::new();

    for items in pages {
        let mut operations = Vec::new();
        for item in items {
            match item {
                Item::Text { x, y, lines } => {
                    operations.extend(text_operations("F1", *x, *y, lines));
                }
                Item::Form {
                    x,
                    y,
                    lines,
                    recursive,
                } => {
                    let name = format!("Fm{}", xobjects.len() + 1);
                    let form_id = doc.new_object_id();

                    let mut form_operations = text_operations("FB", 0, 0, lines);
                    let mut form_xobjects = Dictionary::new();
                    if *recursive {
                        form_operations.push(Operation::new(
                            "Do",
                            vec![Object::Name(b"Nested".to_vec())],
                        ));
                        form_xobjects.set("Nested", form_id);
                    }

                    let form = Stream::new(
                        dictionary! {
                            "Type" => "XObject",
                            "Subtype" => "Form",
                            "BBox" => vec![0.into(), 0.into(), 300.into(), 100.into()],
                            "Matrix" => vec![
                                1.into(),
                                0.into(),
                                0.into(),
                                1.into(),
                                (*x).into(),
                                (*y).into(),
                            ],
                            "Resources" => dictionary! {
                                "Font" => dictionary! {
                                    "FB" => bold_font_id,
                                },
                                "XObject" => form_xobjects,
                            },
                        },
                        Content {
                            operations: form_operations,
                        }
                        .encode()?,
                    );
                    doc.objects.insert(form_id, Object::Stream(form));
                    xobjects.set(name.clone(), form_id);
                    operations.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
                }
                Item::Image {
                    x,
                    y,
                    width,
                    height,
                } => {
                    let name = format!("Im{}", xobjects.len() + 1);
                    let pixels = usize::try_from(width * height)?;
                    let image_id = doc.add_object(Stream::new(
                        dictionary! {
                            "Type" => "XObject",
                            "Subtype" => "Image",
                            "Width" => *width,
                            "Height" => *height,
                            "ColorSpace" => "DeviceGray",
                            "BitsPerComponent" => 8,
                        },
                        vec![0; pixels],
                    ));
                    xobjects.set(name.clone(), image_id);
                    operations.extend([
                        Operation::new("q", vec![]),
                        Operation::new(
                            "cm",
                            vec![
                                (*width).into(),
                                0.into(),
                                0.into(),
                                (*height).into(),
                                (*x).into(),
                                (*y).into(),
                            ],
                        ),
                        Operation::new("Do", vec![Object::Name(name.into_bytes())]),
                        Operation::new("Q", vec![]),
                    ]);
                }
            }
        }

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id);
    }

    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
        "XObject" => xobjects,
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|id| (*id).into()).collect::<Vec<_>>(),
            "Count" => i64::try_from(page_ids.len())?,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    if let Some(title) = title {
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal(title),
            "Producer" => Object::string_literal("fixture"),
        });
        doc.trailer.set("Info", info_id);
    }
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

pub fn create_test_pdf(
    path: &Path,
    pages: &[Vec<Item<'_>>],
) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::write(path, build_test_pdf(pages, None)?)?;
    Ok(())
}
