use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};

const E: &str = "Invalid selector";
lazy_static! {
    static ref UL: Selector = Selector::parse("ul").expect(E);
    static ref LI: Selector = Selector::parse("li").expect(E);
}

/// Where to find one field: an anchor located by attribute equality, then
/// a descent through descendant tag names. The anchor attribute is the
/// stable part of the markup; the wrapper tags between it and the text are
/// not, so the path stays short.
#[derive(Debug, Clone, Copy)]
pub struct Locator {
    pub attrs: &'static [(&'static str, &'static str)],
    pub path: &'static [&'static str],
}

impl Locator {
    fn anchor(&self) -> Option<Selector> {
        let css: String = self
            .attrs
            .iter()
            .map(|(name, value)| format!(r#"[{name}="{value}"]"#))
            .collect();
        Selector::parse(&css).ok()
    }
}

pub fn extract(doc: &Html, locator: &Locator) -> Option<String> {
    let anchor = locator.anchor()?;
    let mut element = doc.select(&anchor).next()?;
    for tag in locator.path {
        let step = Selector::parse(tag).ok()?;
        element = element.select(&step).next()?;
    }
    Some(text_of(element))
}

/// Anchor, then its first `ul`, then the text of every `li`. `None` when
/// the anchor or the list cannot be located; a located list with zero
/// items is `Some(vec![])`, which is not the same thing.
pub fn extract_list(doc: &Html, locator: &Locator) -> Option<Vec<String>> {
    let anchor = locator.anchor()?;
    let element = doc.select(&anchor).next()?;
    let list = element.select(&UL).next()?;
    Some(list.select(&LI).map(text_of).collect())
}

/// For every element matching the anchor constraints, the given attribute
/// of its first nested `tag`. Zero collected values is `None`.
pub fn extract_attr_list(
    doc: &Html,
    locator: &Locator,
    tag: &str,
    attr: &str,
) -> Option<Vec<String>> {
    let anchor = locator.anchor()?;
    let inner = Selector::parse(tag).ok()?;
    let values: Vec<String> = doc
        .select(&anchor)
        .filter_map(|element| element.select(&inner).next())
        .filter_map(|element| element.value().attr(attr))
        .map(ToString::to_string)
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

fn text_of(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}
