//! HTML → [`ElementBody`] with `scraper`.
//!
//! Walks the `<body>` tree in document order. Block containers (`div`,
//! `section`, …) are descended into; recognised blocks become elements.
//! `Html` is not `Send`, so parsing stays inside this synchronous function.

use crate::model::{Element, ElementBody, TableGrid};
use scraper::{ElementRef, Html, Selector};

pub fn parse(html: &str) -> ElementBody {
    let document = Html::parse_document(html);
    let mut elements = Vec::new();

    let body = Selector::parse("body")
        .ok()
        .and_then(|sel| document.select(&sel).next());
    match body {
        Some(body) => walk(body, &mut elements),
        None => walk(document.root_element(), &mut elements),
    }
    ElementBody::new(elements)
}

fn walk(parent: ElementRef<'_>, out: &mut Vec<Element>) {
    for child in parent.children() {
        let Some(el) = ElementRef::wrap(child) else {
            if let Some(text) = child.value().as_text() {
                let text = collapse(text);
                if !text.is_empty() {
                    out.push(Element::paragraph(text));
                }
            }
            continue;
        };

        match el.value().name() {
            "script" | "style" | "noscript" | "template" | "head" | "nav" => {}
            name @ ("h1" | "h2" | "h3" | "h4" | "h5" | "h6") => {
                let level = name[1..].parse::<u8>().unwrap_or(1);
                let text = text_of(el);
                if !text.is_empty() {
                    out.push(Element::heading(level, text));
                }
            }
            "p" | "blockquote" | "pre" | "address" => {
                let text = text_of(el);
                if !text.is_empty() {
                    out.push(Element::paragraph(text));
                }
                for img in descendants_named(el, "img") {
                    out.push(figure_from_img(img, None));
                }
            }
            "ul" | "ol" => list(el, 0, out),
            "table" => out.push(Element::Table(table(el))),
            "img" => out.push(figure_from_img(el, None)),
            "figure" => {
                let caption = descendants_named(el, "figcaption")
                    .next()
                    .map(text_of)
                    .filter(|c| !c.is_empty());
                match descendants_named(el, "img").next() {
                    Some(img) => out.push(figure_from_img(img, caption)),
                    None => {
                        if let Some(c) = caption {
                            out.push(Element::paragraph(c));
                        }
                    }
                }
            }
            _ => walk(el, out),
        }
    }
}

fn list(list_el: ElementRef<'_>, depth: usize, out: &mut Vec<Element>) {
    for item in list_el.children().filter_map(ElementRef::wrap) {
        if item.value().name() != "li" {
            continue;
        }
        let own_text: String = item
            .children()
            .filter(|n| {
                ElementRef::wrap(*n)
                    .map(|e| !matches!(e.value().name(), "ul" | "ol"))
                    .unwrap_or(true)
            })
            .map(|n| match ElementRef::wrap(n) {
                Some(e) => e.text().collect::<String>(),
                None => n.value().as_text().map(|t| t.to_string()).unwrap_or_default(),
            })
            .collect();
        let own_text = collapse(&own_text);
        if !own_text.is_empty() {
            out.push(Element::list_item(own_text, depth));
        }
        for nested in item.children().filter_map(ElementRef::wrap) {
            if matches!(nested.value().name(), "ul" | "ol") {
                list(nested, depth + 1, out);
            }
        }
    }
}

/// Header row when the table has a `<thead>` or its first row is all `<th>`.
/// Without header markup the answer is left to the table analyzer.
fn table(table_el: ElementRef<'_>) -> TableGrid {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut first_row_all_th = false;
    for tr in descendants_named(table_el, "tr") {
        let cells: Vec<ElementRef<'_>> = tr
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|c| matches!(c.value().name(), "th" | "td"))
            .collect();
        if cells.is_empty() {
            continue;
        }
        if rows.is_empty() {
            first_row_all_th = cells.iter().all(|c| c.value().name() == "th");
        }
        rows.push(cells.into_iter().map(text_of).collect());
    }
    let has_thead = descendants_named(table_el, "thead").next().is_some();
    let grid = TableGrid::new(rows);
    if has_thead || first_row_all_th {
        grid.with_headers(true)
    } else {
        grid
    }
}

fn figure_from_img(img: ElementRef<'_>, caption: Option<String>) -> Element {
    let src = img.value().attr("src").unwrap_or_default();
    let caption = caption.or_else(|| {
        img.value()
            .attr("alt")
            .map(collapse)
            .filter(|a| !a.is_empty())
    });
    Element::figure(src, caption)
}

fn descendants_named<'a>(
    el: ElementRef<'a>,
    name: &'static str,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    el.descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .filter(move |e| e.value().name() == name)
}

fn text_of(el: ElementRef<'_>) -> String {
    collapse(&el.text().collect::<String>())
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
