#![no_main]
use libfuzzer_sys::fuzz_target;
use mdpdf::dispatch::Command;
use mdpdf::render::{first_heading, CommonMarkConverter, MarkdownToHtml};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Conversion must never panic, whatever the input.
        let _ = CommonMarkConverter::new().to_html(s);
        let _ = first_heading(s);
        let _ = Command::parse(s);
    }
});
