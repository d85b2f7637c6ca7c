//! Renderer command line.
//!
//! [`build_args`] is a pure function of the document, the page size and the
//! output path. Every token is its own argv entry, so values containing
//! whitespace reach the renderer intact without any shell quoting.

use crate::document::{DocumentSpec, STDIN_MARKER};
use std::ffi::OsString;
use std::path::Path;

const HEADER_FOOTER_MARGIN: &str = "25";
const HEADER_FOOTER_SPACING: &str = "5";

pub fn build_args(doc: &DocumentSpec, page_size: &str, output_path: &Path) -> Vec<OsString> {
    let mut args = ArgList::default();
    args.option("--page-size", page_size);

    if let Some(url) = non_empty(&doc.header_url) {
        args.option("--header-html", url);
        args.option("--margin-top", HEADER_FOOTER_MARGIN);
        args.option("--header-spacing", HEADER_FOOTER_SPACING);
    }

    if let Some(url) = non_empty(&doc.footer_url) {
        args.option("--footer-html", url);
        args.option("--margin-bottom", HEADER_FOOTER_MARGIN);
        args.option("--footer-spacing", HEADER_FOOTER_SPACING);
    }

    // Each slot is gated on its own value.
    let slots = [
        ("--header-left", &doc.header_left),
        ("--header-center", &doc.header_center),
        ("--header-right", &doc.header_right),
        ("--footer-left", &doc.footer_left),
        ("--footer-center", &doc.footer_center),
        ("--footer-right", &doc.footer_right),
    ];
    for (flag, value) in slots {
        if let Some(text) = non_empty(value) {
            args.option(flag, text);
        }
    }

    for (key, value) in &doc.extra_params {
        args.push(format!("--{key}"));
        if !value.is_empty() {
            args.push(value);
        }
    }

    for (key, value) in &doc.cookies {
        args.push("--cookie");
        args.push(key);
        args.push(encode_cookie_value(value));
    }

    if doc.reads_stdin() {
        args.push(STDIN_MARKER);
    } else {
        args.push(&doc.url);
    }
    args.push(output_path);

    args.0
}

/// Form-urlencodes a cookie value (space becomes `+`).
pub fn encode_cookie_value(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[derive(Default)]
struct ArgList(Vec<OsString>);

impl ArgList {
    fn push(&mut self, token: impl AsRef<std::ffi::OsStr>) {
        self.0.push(token.as_ref().to_os_string());
    }

    fn option(&mut self, flag: &str, value: &str) {
        self.push(flag);
        self.push(value);
    }
}
