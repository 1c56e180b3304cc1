//! Known selectors and button texts for career sites, most specific first.

/// Consent-manager accept buttons (OneTrust, Usercentrics, Cookiebot, ...).
pub const COOKIE_ACCEPT: &[&str] = &[
    "#onetrust-accept-btn-handler",
    "#accept-recommended-btn-handler",
    "button[data-testid='uc-accept-all-button']",
    "#CybotCookiebotDialogBodyLevelButtonLevelOptinAllowAll",
    "[data-cookiefirst-action='accept']",
    "a.cc-allow",
];

pub const COOKIE_TEXT: &[&str] = &[
    "alle akzeptieren",
    "alle cookies akzeptieren",
    "accept all",
    "akzeptieren",
    "zustimmen",
    "einverstanden",
    "accept",
];

pub const CLICKABLE: &str = "button, a, [role='button'], input[type='submit'], input[type='button']";

pub const APPLY_TEXT: &[&str] = &[
    "ich will den job",
    "jetzt bewerben",
    "apply now",
    "online bewerben",
    "bewerben",
    "apply",
];

pub const APPLY_ATTR: &[&str] = &[
    "a[itemprop='applyUrl']",
    "[data-testid*='apply-button']",
    "[id*='apply-button']",
    "button[class*='apply']",
    "a[class*='apply']",
    "button[data-testid*='apply']",
    "a[data-testid*='apply']",
    "input[type='submit'][value*='Apply']",
    "input[type='submit'][value*='Bewerben']",
];

pub const JOB_LINKS: &str = "a[href]";

pub const SUBMIT_TEXT: &[&str] = &[
    "bewerbung absenden",
    "bewerbung abschicken",
    "bewerbung senden",
    "submit application",
    "send application",
    "absenden",
    "abschicken",
    "submit",
    "senden",
    "jetzt bewerben",
    "apply",
];

pub const SUBMIT_ATTR: &[&str] = &["button[type='submit']", "input[type='submit']"];

/// Form validation feedback that means the submission was rejected.
pub const VALIDATION_ERRORS: &[&str] = &[
    "[aria-invalid='true']",
    ".invalid-feedback",
    ".field-error",
    ".error-message",
    ".form-error",
    "[role='alert']",
];

pub const CONFIRMATION_PHRASES: &[&str] = &[
    "vielen dank für ihre bewerbung",
    "vielen dank für deine bewerbung",
    "danke für ihre bewerbung",
    "danke für deine bewerbung",
    "bewerbung ist bei uns eingegangen",
    "bewerbung wurde erfolgreich",
    "erfolgreich übermittelt",
    "erfolgreich versendet",
    "thank you for your application",
    "thank you for applying",
    "thanks for applying",
    "application has been submitted",
    "application was submitted",
    "application has been received",
    "we have received your application",
];

/// Text that marks a failed submission or a broken page. Checked after the
/// confirmation phrases, in the lowercased page text.
pub const ERROR_PAGE_PHRASES: &[&str] = &[
    "ein fehler ist aufgetreten",
    "es ist ein fehler aufgetreten",
    "etwas ist schiefgelaufen",
    "bitte versuchen sie es später erneut",
    "seite nicht gefunden",
    "sitzung ist abgelaufen",
    "an error occurred",
    "an error has occurred",
    "something went wrong",
    "please try again",
    "page not found",
    "session has expired",
    "access denied",
];
