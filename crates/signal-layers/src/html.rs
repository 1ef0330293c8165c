//! Small helpers over `scraper` shared by the layers.

use scraper::{ElementRef, Html, Selector};

use crate::errors::{LayerError, Result};

pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|err| LayerError::InvalidSelector {
        selector: css.to_string(),
        reason: err.to_string(),
    })
}

pub fn select_all<'a>(document: &'a Html, css: &str) -> Result<Vec<ElementRef<'a>>> {
    let selector = selector(css)?;
    Ok(document.select(&selector).collect())
}

/// Visible text with surrounding whitespace stripped and inner runs collapsed.
pub fn text_of(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Raw text content, whitespace untouched (script bodies).
pub fn raw_text_of(element: &ElementRef<'_>) -> String {
    element.text().collect()
}

pub fn has_class_containing(element: &ElementRef<'_>, marker: &str) -> bool {
    element
        .value()
        .classes()
        .any(|class| class.contains(marker))
}

pub fn starts_with_any(text: &str, prefixes: &[String]) -> bool {
    let lower = text.to_lowercase();
    prefixes
        .iter()
        .any(|prefix| lower.starts_with(&prefix.to_lowercase()))
}

pub fn contains_any(text: &str, phrases: &[String]) -> bool {
    let lower = text.to_lowercase();
    phrases
        .iter()
        .any(|phrase| lower.contains(&phrase.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_is_collapsed() {
        let doc = Html::parse_fragment("<span>  0   no\n results </span>");
        let spans = select_all(&doc, "span").unwrap();
        assert_eq!(text_of(&spans[0]), "0 no results");
    }

    #[test]
    fn bad_selector_is_reported() {
        let err = selector("span[").unwrap_err();
        assert!(matches!(err, LayerError::InvalidSelector { .. }));
    }
}
