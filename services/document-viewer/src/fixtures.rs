//! PDF builders for unit tests.

use lopdf::{dictionary, Document, Object, ObjectId, Stream};

pub const LETTER: [i64; 4] = [0, 0, 612, 792];

pub enum FixtureFont {
    /// Helvetica with no width table.
    Standard,
    Widths { first_char: i64, widths: Vec<i64> },
    Composite { default_width: i64 },
}

/// Content of one fixture page; `Broken` pages point /Contents at an integer.
pub enum FixturePage<'a> {
    Content(&'a str),
    /// /Contents is a reference to an array holding the stream.
    IndirectArray(&'a str),
    /// The page draws form XObject `/Fm0`.
    WithForm {
        content: &'a str,
        form: &'a str,
        matrix: [i64; 6],
    },
    /// `/Fm0` draws itself after showing its text.
    SelfDrawingForm(&'a str),
    Broken,
}

fn content_stream(doc: &mut Document, content: &str) -> ObjectId {
    doc.add_object(Object::Stream(Stream::new(lopdf::Dictionary::new(), content.as_bytes().to_vec())))
}

fn form_stream(content: &str, matrix: [i64; 6], font_id: ObjectId, xobjects: lopdf::Dictionary) -> Object {
    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Form",
        "BBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Matrix" => matrix.iter().map(|v| Object::Integer(*v)).collect::<Vec<_>>(),
        "Resources" => Object::Dictionary(dictionary! {
            "Font" => Object::Dictionary(dictionary! { "F1" => font_id }),
            "XObject" => Object::Dictionary(xobjects),
        }),
    };
    Object::Stream(Stream::new(dict, content.as_bytes().to_vec()))
}

fn add_font(doc: &mut Document, font: FixtureFont) -> ObjectId {
    match font {
        FixtureFont::Standard => doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        }),
        FixtureFont::Widths { first_char, widths } => doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "FirstChar" => first_char,
            "Widths" => widths.into_iter().map(Object::Integer).collect::<Vec<_>>(),
        }),
        FixtureFont::Composite { default_width } => {
            let descendant = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "CIDFontType2",
                "BaseFont" => "Arial",
                "DW" => default_width,
            });
            doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type0",
                "BaseFont" => "Arial",
                "Encoding" => "Identity-H",
                "DescendantFonts" => vec![Object::from(descendant)],
            })
        }
    }
}

fn build(pages: Vec<FixturePage<'_>>, font: FixtureFont, media_box: [i64; 4]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id: ObjectId = doc.new_object_id();
    let font_id = add_font(&mut doc, font);

    let mut kids = Vec::new();
    for page in pages {
        let mut xobjects = lopdf::Dictionary::new();
        let contents = match page {
            FixturePage::Content(content) => Object::from(content_stream(&mut doc, content)),
            FixturePage::IndirectArray(content) => {
                let stream_id = content_stream(&mut doc, content);
                Object::from(doc.add_object(vec![Object::from(stream_id)]))
            }
            FixturePage::WithForm { content, form, matrix } => {
                let form_id = doc.add_object(form_stream(form, matrix, font_id, lopdf::Dictionary::new()));
                xobjects.set("Fm0", form_id);
                Object::from(content_stream(&mut doc, content))
            }
            FixturePage::SelfDrawingForm(form) => {
                let form_id = doc.new_object_id();
                let own = dictionary! { "Fm0" => form_id };
                doc.objects.insert(form_id, form_stream(form, [1, 0, 0, 1, 0, 0], font_id, own));
                xobjects.set("Fm0", form_id);
                Object::from(content_stream(&mut doc, "/Fm0 Do"))
            }
            FixturePage::Broken => Object::Integer(42),
        };
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => media_box.iter().map(|v| Object::Integer(*v)).collect::<Vec<_>>(),
            "Contents" => contents,
            "Resources" => Object::Dictionary(dictionary! {
                "Font" => Object::Dictionary(dictionary! {
                    "F1" => font_id,
                }),
                "XObject" => Object::Dictionary(xobjects),
            }),
        });
        kids.push(Object::from(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("failed to save test PDF");
    buf
}

pub fn single_page(content: &str, font: FixtureFont, media_box: [i64; 4]) -> Vec<u8> {
    build(vec![FixturePage::Content(content)], font, media_box)
}

pub fn page_with(page: FixturePage<'_>) -> Vec<u8> {
    build(vec![page], FixtureFont::Standard, LETTER)
}

pub fn multi_page(pages: Vec<FixturePage<'_>>) -> Vec<u8> {
    build(pages, FixtureFont::Standard, LETTER)
}
