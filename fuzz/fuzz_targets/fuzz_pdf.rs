//! Fuzz target: PDF tokenizer over raw bytes
//!
//! The tokenizer must never panic, whatever the input and however it is
//! chunked; grammar violations must surface as ordinary errors.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pdftok::PdfTokenizer;

fuzz_target!(|data: &[u8]| {
    let mut out = Vec::new();

    // Whole input at once
    let mut tok = PdfTokenizer::new();
    if tok.feed(data, &mut out).is_ok() {
        let _ = tok.finish();
    }

    // Byte-at-a-time must behave identically
    let mut tok = PdfTokenizer::new();
    let mut chunked = Vec::new();
    let mut ok = true;
    for byte in data {
        if tok.feed(std::slice::from_ref(byte), &mut chunked).is_err() {
            ok = false;
            break;
        }
    }
    if ok {
        let _ = tok.finish();
        assert_eq!(out, chunked);
    }
});
