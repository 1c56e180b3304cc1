//! Form discovery over a page snapshot. Fields live only as long as the
//! snapshot they were read from; after any navigation the engine re-scans.

use scraper::{ElementRef, Html};
use serde::Serialize;

use super::classifier::{classify, Classification, FieldMeta, InputType, SemanticRole};
use crate::browser::dom;

const CONTROLS: &str = "input, select, textarea";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectOption {
    pub value: String,
    pub text: String,
}

/// One fillable control of the current page.
#[derive(Debug, Clone, Serialize)]
pub struct FormField {
    /// CSS selector addressing the control in the live page.
    pub selector: String,
    pub label: String,
    pub name: String,
    pub input_type: InputType,
    pub required: bool,
    pub options: Vec<SelectOption>,
    classification: Classification,
}

impl FormField {
    pub fn role(&self) -> SemanticRole {
        self.classification.role
    }

    pub fn confidence(&self) -> f32 {
        self.classification.confidence
    }

    /// Label for log lines and skip reasons.
    pub fn describe(&self) -> String {
        if !self.label.is_empty() {
            self.label.clone()
        } else if !self.name.is_empty() {
            self.name.clone()
        } else {
            self.selector.clone()
        }
    }
}

/// Every enabled, visible control the engine knows how to fill, in document
/// order. File inputs are kept even when hidden; upload widgets usually hide
/// the real input behind a styled drop zone.
pub fn discover(html: &str) -> Vec<FormField> {
    let doc = Html::parse_document(html);
    dom::select_all(&doc, CONTROLS)
        .into_iter()
        .filter_map(|el| read_field(&doc, el))
        .collect()
}

/// True when the page already shows an application form.
pub fn has_application_form(html: &str) -> bool {
    discover(html).iter().any(|f| {
        matches!(
            f.role(),
            SemanticRole::Email | SemanticRole::ResumeUpload | SemanticRole::OtherUpload
        )
    })
}

fn read_field(doc: &Html, el: ElementRef<'_>) -> Option<FormField> {
    let v = el.value();
    let input_type = InputType::from_element(v.name(), v.attr("type"))?;
    if v.attr("disabled").is_some() || v.attr("readonly").is_some() {
        return None;
    }
    if input_type != InputType::File && dom::is_hidden(el) {
        return None;
    }

    let raw_label = label_text(doc, el, input_type);
    let meta = FieldMeta {
        input_type: Some(input_type),
        label: clean_label(&raw_label),
        name: v.attr("name").unwrap_or_default().to_string(),
        id: v.id().unwrap_or_default().to_string(),
        placeholder: v.attr("placeholder").unwrap_or_default().to_string(),
        aria_label: v.attr("aria-label").unwrap_or_default().to_string(),
    };
    let required = v.attr("required").is_some()
        || v.attr("aria-required") == Some("true")
        || raw_label.contains('*')
        || label_sibling_marks_required(doc, el);
    let options = if input_type == InputType::Select {
        read_options(el)
    } else {
        Vec::new()
    };

    Some(FormField {
        selector: dom::element_selector(doc, el),
        classification: classify(&meta),
        label: meta.label,
        name: meta.name,
        input_type,
        required,
        options,
    })
}

/// Label lookup, most explicit first: `label[for]`, wrapping `label`,
/// `aria-labelledby`, `aria-label`, `placeholder`. File inputs fall back to
/// the text of their drop-zone container.
fn label_text(doc: &Html, el: ElementRef<'_>, input_type: InputType) -> String {
    let v = el.value();
    if let Some(label) = v.id().and_then(|id| label_for(doc, id)) {
        return dom::text_of(label);
    }
    if let Some(label) = el
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "label")
    {
        return own_label_text(label);
    }
    if let Some(ids) = v.attr("aria-labelledby") {
        let text: Vec<String> = ids
            .split_whitespace()
            .filter_map(|id| element_by_id(doc, id))
            .map(dom::text_of)
            .collect();
        if !text.is_empty() {
            return text.join(" ");
        }
    }
    if let Some(aria) = v.attr("aria-label").filter(|a| !a.trim().is_empty()) {
        return aria.to_string();
    }
    if let Some(placeholder) = v.attr("placeholder").filter(|p| !p.trim().is_empty()) {
        return placeholder.to_string();
    }
    if input_type == InputType::File {
        if let Some(zone) = el.parent().and_then(ElementRef::wrap) {
            if dom::select_within(zone, CONTROLS).is_some() && count_controls(zone) == 1 {
                return dom::text_of(zone);
            }
        }
    }
    String::new()
}

/// Text of a wrapping label without the option texts of a nested select.
fn own_label_text(label: ElementRef<'_>) -> String {
    let mut text = String::new();
    for node in label.descendants() {
        if let Some(t) = node.value().as_text() {
            let inside_select = node
                .ancestors()
                .filter_map(ElementRef::wrap)
                .take_while(|a| a.id() != label.id())
                .any(|a| matches!(a.value().name(), "select" | "option" | "textarea"));
            if !inside_select {
                text.push_str(t);
                text.push(' ');
            }
        }
    }
    dom::collapse_whitespace(&text)
}

fn label_for<'a>(doc: &'a Html, id: &str) -> Option<ElementRef<'a>> {
    dom::select_all(doc, "label")
        .into_iter()
        .find(|label| label.value().attr("for") == Some(id))
}

fn element_by_id<'a>(doc: &'a Html, id: &str) -> Option<ElementRef<'a>> {
    dom::select_all(doc, "[id]")
        .into_iter()
        .find(|el| el.value().id() == Some(id))
}

fn count_controls(el: ElementRef<'_>) -> usize {
    dom::selector(CONTROLS)
        .map(|sel| el.select(&sel).count())
        .unwrap_or(0)
}

/// `<label for=x>Name</label><span>*</span>` marks the field required.
fn label_sibling_marks_required(doc: &Html, el: ElementRef<'_>) -> bool {
    let Some(label) = el.value().id().and_then(|id| label_for(doc, id)) else {
        return false;
    };
    label
        .next_siblings()
        .find_map(ElementRef::wrap)
        .is_some_and(|sibling| sibling.value().name() == "span" && dom::text_of(sibling).contains('*'))
}

fn clean_label(raw: &str) -> String {
    dom::collapse_whitespace(&raw.replace('*', " "))
}

fn read_options(select: ElementRef<'_>) -> Vec<SelectOption> {
    dom::selector("option")
        .map(|sel| {
            select
                .select(&sel)
                .filter(|o| o.value().attr("disabled").is_none())
                .map(|o| {
                    let text = dom::text_of(o);
                    SelectOption {
                        value: o.value().attr("value").map(str::to_string).unwrap_or_else(|| text.clone()),
                        text,
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}
