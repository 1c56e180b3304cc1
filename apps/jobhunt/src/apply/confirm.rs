//! Success detection after SUBMIT.
//!
//! A submission counts as confirmed when the page shows a known thank-you
//! phrase. Without one, the browser must have left the form's URL for a page
//! that has no fillable controls and no error text. A new step of a
//! multi-step form still has controls, and an error page has error text, so
//! neither passes.

use scraper::Html;

use super::fields;
use super::selectors::{CONFIRMATION_PHRASES, ERROR_PAGE_PHRASES, VALIDATION_ERRORS};
use crate::browser::dom;

#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    ConfirmationText(&'static str),
    /// Navigated away to a page without any form.
    LeftForm,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Confirmed(Signal),
    /// Invalid fields or an error page.
    Rejected,
    Pending,
}

/// Classifies one snapshot taken after SUBMIT. `left_form_url` is whether
/// the browser is on a different URL than the one the form was submitted from.
pub fn observe(html: &str, left_form_url: bool) -> Observation {
    let (text, validation_errors) = {
        let doc = Html::parse_document(html);
        (dom::page_text_lower(&doc), has_validation_errors(&doc))
    };

    if let Some(phrase) = CONFIRMATION_PHRASES
        .iter()
        .copied()
        .find(|p| text.contains(p))
    {
        return Observation::Confirmed(Signal::ConfirmationText(phrase));
    }
    if validation_errors || ERROR_PAGE_PHRASES.iter().any(|p| text.contains(p)) {
        return Observation::Rejected;
    }
    if left_form_url && !text.trim().is_empty() && fields::discover(html).is_empty() {
        return Observation::Confirmed(Signal::LeftForm);
    }
    Observation::Pending
}

fn has_validation_errors(doc: &Html) -> bool {
    VALIDATION_ERRORS.iter().any(|css| {
        dom::select_all(doc, css)
            .into_iter()
            .any(|el| {
                !dom::is_hidden(el)
                    && (el.value().name() == "input" || !dom::text_of(el).is_empty())
            })
    })
}
