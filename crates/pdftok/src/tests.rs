use rstest::rstest;

use super::*;

/// Run a whole document through a fresh tokenizer.
fn tokenize(input: &[u8]) -> Result<Vec<u8>, PdfError> {
    let mut tok = PdfTokenizer::new();
    let mut out = Vec::new();
    tok.feed(input, &mut out)?;
    tok.finish()?;
    Ok(out)
}

/// Same document, cut into chunks of at most `chunk_size` bytes.
fn tokenize_chunked(input: &[u8], chunk_size: usize) -> Result<Vec<u8>, PdfError> {
    let mut tok = PdfTokenizer::new();
    let mut out = Vec::new();
    for chunk in input.chunks(chunk_size) {
        tok.feed(chunk, &mut out)?;
    }
    tok.finish()?;
    Ok(out)
}

/// The reference document: a dictionary marking object 4 as JavaScript,
/// then object 4 carrying the script in a stream.
const JS_STREAM_DOC: &[u8] = b"1 0 obj\n<< /OpenAction << /JS 4 0 R /S /JavaScript >> >>\nendobj\n4 0 obj\n<< /Length 5 >>\nstream\nalert\nendstream\nendobj\n";

// =========================================================================
// JavaScript extraction
// =========================================================================

#[test]
fn referenced_js_stream_is_extracted() {
    assert_eq!(tokenize(JS_STREAM_DOC).unwrap(), b"alert\n");
}

#[test]
fn referenced_js_literal_string_is_extracted() {
    let doc = b"2 0 obj << /JS 7 0 R >> endobj 7 0 obj (payload) endobj";
    assert_eq!(tokenize(doc).unwrap(), b"payload");
}

#[test]
fn direct_js_literal_string_in_dictionary() {
    let doc = b"1 0 obj << /JS (app.alert(42)) >> endobj";
    assert_eq!(tokenize(doc).unwrap(), b"app.alert(42)");
}

#[test]
fn direct_js_hex_string_in_dictionary() {
    // "alert" in hex, with embedded junk that must be skipped
    let doc = b"<< /JS <61 6c 65zz72 74> >>";
    assert_eq!(tokenize(doc).unwrap(), b"alert");
}

#[test]
fn js_sources_concatenate_in_document_order() {
    let mut doc = b"<< /JS (one;) >>\n".to_vec();
    doc.extend_from_slice(JS_STREAM_DOC);
    doc.extend_from_slice(b"<< /JS (two;) >>\n");
    assert_eq!(tokenize(&doc).unwrap(), b"one;alert\ntwo;");
}

#[test]
fn reference_after_object_is_not_extracted() {
    // Single pass: the object body was already consumed when the /JS
    // reference to it appears.
    let doc = b"4 0 obj (late) endobj 1 0 obj << /JS 4 0 R >> endobj";
    assert_eq!(tokenize(doc).unwrap(), b"");
}

#[test]
fn non_js_strings_and_streams_are_discarded() {
    let doc = b"5 0 obj << /Length 4 >> stream\nBODY\nendstream endobj 6 0 obj (text) endobj";
    assert_eq!(tokenize(doc).unwrap(), b"");
}

#[test]
fn zero_length_js_stream_emits_separator_only() {
    let doc = b"1 0 obj << /JS 2 0 R >> endobj 2 0 obj << /Length 0 >> stream\nendstream endobj";
    assert_eq!(tokenize(doc).unwrap(), b"\n");
}

#[test]
fn comments_are_skipped() {
    let doc = b"%PDF-1.7\n% << /JS (not me) >>\n<< /JS (yes) >>";
    assert_eq!(tokenize(doc).unwrap(), b"yes");
}

// =========================================================================
// Literal string decoding
// =========================================================================

#[test]
fn escape_table_is_decoded() {
    let doc = b"<< /JS (a\\nb\\tc\\rd\\be\\ff) >>";
    assert_eq!(tokenize(doc).unwrap(), b"a\nb\tc\rd\x08e\x0Cf");
}

#[test]
fn escaped_delimiters_pass_through() {
    let doc = b"<< /JS (a\\(b\\)c\\\\d) >>";
    assert_eq!(tokenize(doc).unwrap(), b"a(b)c\\d");
}

#[test]
fn unknown_escapes_pass_through_literally() {
    let doc = b"<< /JS (a\\zb) >>";
    assert_eq!(tokenize(doc).unwrap(), b"azb");
}

#[test]
fn octal_escapes_decode_to_single_bytes() {
    // \101 = 'A', \102 = 'B', \53 = '+'
    let doc = b"<< /JS (\\101\\102\\53.) >>";
    assert_eq!(tokenize(doc).unwrap(), b"AB+.");
}

#[test]
fn short_octal_escape_ends_at_non_octal_byte() {
    let doc = b"<< /JS (\\7X) >>";
    assert_eq!(tokenize(doc).unwrap(), b"\x07X");
}

#[test]
fn balanced_parentheses_are_content() {
    let doc = b"<< /JS (if (a) { f(b); }) >>";
    assert_eq!(tokenize(doc).unwrap(), b"if (a) { f(b); }");
}

// =========================================================================
// Hexadecimal string decoding
// =========================================================================

#[test]
fn hex_odd_trailing_nibble_is_left_shifted() {
    // 41 then lone 4 -> 'A', 0x40
    let doc = b"<< /JS <414> >>";
    assert_eq!(tokenize(doc).unwrap(), b"A\x40");
}

#[test]
fn empty_hex_string() {
    let doc = b"<< /JS <> >>";
    assert_eq!(tokenize(doc).unwrap(), b"");
}

// =========================================================================
// UTF-16BE text
// =========================================================================

#[test]
fn utf16_bmp_string_is_transcoded() {
    let doc = b"<< /JS (\xFE\xFF\x00a\x00l\x00e\x00r\x00t) >>";
    assert_eq!(tokenize(doc).unwrap(), b"alert");
}

#[test]
fn utf16_surrogate_pair_becomes_four_utf8_bytes() {
    let doc = b"<< /JS (\xFE\xFF\xD8\x34\xDD\x1E) >>";
    assert_eq!(tokenize(doc).unwrap(), [0xF0, 0x9D, 0x84, 0x9E]);
}

#[test]
fn utf16_in_hex_string() {
    // FEFF 0041 0042 as hex pairs
    let doc = b"<< /JS <FEFF00410042> >>";
    assert_eq!(tokenize(doc).unwrap(), b"AB");
}

#[test]
fn utf16_in_stream_body() {
    let mut doc = b"1 0 obj << /JS 2 0 R >> endobj 2 0 obj << /Length 6 >> stream\n".to_vec();
    doc.extend_from_slice(&[0xFE, 0xFF, 0x00, b'h', 0x00, b'i']);
    doc.extend_from_slice(b"\nendstream endobj");
    assert_eq!(tokenize(&doc).unwrap(), b"hi\n");
}

#[test]
fn bom_probe_miss_keeps_bytes_eight_bit() {
    let doc = b"<< /JS (\xFE\x41\x42) >>";
    assert_eq!(tokenize(doc).unwrap(), [0xFE, 0x41, 0x42]);
}

#[test]
fn lone_fe_at_string_end_is_flushed() {
    let doc = b"<< /JS (\xFE) >>";
    assert_eq!(tokenize(doc).unwrap(), [0xFE]);
}

#[test]
fn invalid_low_surrogate_halts_tokenization() {
    let doc = b"<< /JS (\xFE\xFF\xD8\x34\x00\x41) >>";
    let err = tokenize(doc).unwrap_err();
    assert_eq!(err.kind, PdfErrorKind::UnexpectedSymbol);
}

// =========================================================================
// Grammar violations
// =========================================================================

#[test]
fn stream_without_length_is_rejected() {
    let doc = b"1 0 obj << /Type /X >> stream\ndata";
    let err = tokenize(doc).unwrap_err();
    assert_eq!(err.kind, PdfErrorKind::StreamNoLength);
}

#[test]
fn indirect_length_leaves_stream_size_unknown() {
    let doc = b"1 0 obj << /Length 5 0 R >> stream\ndata";
    let err = tokenize(doc).unwrap_err();
    assert_eq!(err.kind, PdfErrorKind::StreamNoLength);
}

#[test]
fn negative_length_is_rejected() {
    let doc = b"1 0 obj << /Length -5 >> stream\ndata";
    let err = tokenize(doc).unwrap_err();
    assert_eq!(err.kind, PdfErrorKind::StreamNoLength);
}

#[test]
fn non_name_dictionary_key_is_rejected() {
    let err = tokenize(b"1 0 obj << 7 /X >> endobj").unwrap_err();
    assert_eq!(err.kind, PdfErrorKind::NotNameInDictionaryKey);

    let err = tokenize(b"<< (s) >>").unwrap_err();
    assert_eq!(err.kind, PdfErrorKind::NotNameInDictionaryKey);
}

#[test]
fn unbalanced_array_at_dictionary_close_is_rejected() {
    let err = tokenize(b"<< /Kids [ 1 2 >>").unwrap_err();
    assert_eq!(err.kind, PdfErrorKind::IncompleteArrayInDictionary);

    let err = tokenize(b"<< /Kids ] >>").unwrap_err();
    assert_eq!(err.kind, PdfErrorKind::IncompleteArrayInDictionary);
}

#[test]
fn condition_stack_overflow_is_rejected() {
    let mut doc = Vec::new();
    for _ in 0..40 {
        doc.extend_from_slice(b"<< /K ");
    }
    let err = tokenize(&doc).unwrap_err();
    assert_eq!(err.kind, PdfErrorKind::NestingTooDeep);
}

#[test]
fn error_reports_halt_offset() {
    let doc = b"<< /JS (\xFE\xFF\xD8\x34\x00\x41) >>";
    let err = tokenize(doc).unwrap_err();
    // offending byte is the second half of the bad low surrogate
    assert_eq!(err.offset, 13);
}

// =========================================================================
// Structure tracking
// =========================================================================

#[test]
fn balanced_arrays_inside_dictionaries_are_fine() {
    let doc = b"<< /Kids [ 1 0 R 2 0 R [ 3 ] ] /JS (ok) >>";
    assert_eq!(tokenize(doc).unwrap(), b"ok");
}

#[test]
fn nested_dictionary_is_one_value() {
    let doc = b"<< /A << /B (x) >> /JS (found) >>";
    assert_eq!(tokenize(doc).unwrap(), b"found");
}

#[test]
fn strings_in_arrays_are_not_js() {
    let doc = b"<< /JS [ (not-direct) ] >>";
    assert_eq!(tokenize(doc).unwrap(), b"");
}

#[test]
fn endobj_clears_js_marking() {
    let doc = b"1 0 obj << /JS 4 0 R >> endobj 4 0 obj (yes) endobj 5 0 obj (no) endobj";
    assert_eq!(tokenize(doc).unwrap(), b"yes");
}

#[test]
fn length_from_earlier_object_does_not_leak() {
    // /Length 99 belongs to object 1 and must not satisfy object 2's stream
    let doc = b"1 0 obj << /Length 99 >> endobj 2 0 obj << >> stream\nxx";
    let err = tokenize(doc).unwrap_err();
    assert_eq!(err.kind, PdfErrorKind::StreamNoLength);
}

#[test]
fn bytes_consumed_tracks_input() {
    let mut tok = PdfTokenizer::new();
    let mut out = Vec::new();
    tok.feed(b"1 0 obj", &mut out).unwrap();
    tok.feed(b" << >>", &mut out).unwrap();
    assert_eq!(tok.bytes_consumed(), 13);
}

// =========================================================================
// Chunked feeding
// =========================================================================

#[rstest]
#[case(1)]
#[case(2)]
#[case(3)]
#[case(7)]
#[case(16)]
fn chunking_never_changes_the_output(#[case] chunk_size: usize) {
    let whole = tokenize(JS_STREAM_DOC).unwrap();
    assert_eq!(tokenize_chunked(JS_STREAM_DOC, chunk_size).unwrap(), whole);

    // Escapes, BOM, and a surrogate pair split across every boundary
    let tricky = b"<< /JS (\\101\\n\xFE\xFF\xD8\x34\xDD\x1E) >> << /JS <FEFF0041> >>";
    let whole = tokenize(tricky).unwrap();
    assert_eq!(tokenize_chunked(tricky, chunk_size).unwrap(), whole);
}

#[rstest]
#[case(1)]
#[case(4)]
#[case(9)]
fn stream_bodies_survive_chunking(#[case] chunk_size: usize) {
    let mut doc = b"1 0 obj << /JS 2 0 R >> endobj 2 0 obj << /Length 26 >> stream\n".to_vec();
    doc.extend_from_slice(b"abcdefghijklmnopqrstuvwxyz");
    doc.extend_from_slice(b"\nendstream endobj");
    assert_eq!(
        tokenize_chunked(&doc, chunk_size).unwrap(),
        b"abcdefghijklmnopqrstuvwxyz\n"
    );
}
