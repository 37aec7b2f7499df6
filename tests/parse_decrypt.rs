//! End-to-end tests: parsing documents from raw bytes and running the
//! encryption machinery over the resulting object graph.

use std::io::Cursor;

use proptest::prelude::*;

use cosparse::encryption::{
    decrypt_document, encrypt_document, DocumentCrypt, Permissions, StandardSecurityHandler,
};
use cosparse::parser::{CosObject, CosParser, ObjectKey};
use cosparse::PdfError;

fn parser_for(bytes: &[u8]) -> CosParser<Cursor<Vec<u8>>> {
    CosParser::new(Cursor::new(bytes.to_vec())).unwrap()
}

#[test]
fn minimal_catalog_document() {
    let mut parser = parser_for(b"1 0 obj << /Type /Catalog >> endobj\n");
    let key = parser.parse_indirect_object(ObjectKey::new(1, 0)).unwrap();
    assert_eq!(key, ObjectKey::new(1, 0));

    let pool = parser.into_pool();
    let dict = pool.get(key).unwrap().as_dict().unwrap();
    assert_eq!(dict.get_type(), Some("Catalog"));
    assert_eq!(dict.len(), 1);
}

#[test]
fn repeated_references_share_one_pool_slot() {
    let src = b"1 0 obj << /First 4 0 R /Second 4 0 R /Kids [ 4 0 R 5 0 R ] >> endobj\n";
    let mut parser = parser_for(src);
    parser.parse_indirect_object(ObjectKey::new(1, 0)).unwrap();

    let pool = parser.into_pool();
    // 1 0 itself, plus one slot each for 4 0 and 5 0
    assert_eq!(pool.len(), 3);

    let dict = pool.get(ObjectKey::new(1, 0)).unwrap().as_dict().unwrap();
    let first = dict.get("First").unwrap().as_reference().unwrap();
    let second = dict.get("Second").unwrap().as_reference().unwrap();
    let kids = dict.get("Kids").unwrap().as_array().unwrap();
    assert_eq!(first, second);
    assert_eq!(kids.get(0).unwrap().as_reference().unwrap(), first);
}

#[test]
fn forward_reference_resolves_after_target_parses() {
    let src = b"1 0 obj << /Next 2 0 R >> endobj\n2 0 obj (payload) endobj\n";
    let mut parser = parser_for(src);
    parser.parse_indirect_object(ObjectKey::new(1, 0)).unwrap();

    // referenced but not yet parsed
    assert!(parser.pool().contains(ObjectKey::new(2, 0)));
    assert!(parser.pool().get(ObjectKey::new(2, 0)).is_none());

    parser.parse_indirect_object(ObjectKey::new(2, 0)).unwrap();
    let pool = parser.into_pool();
    let target = pool.get(ObjectKey::new(2, 0)).unwrap();
    assert_eq!(target.as_string().unwrap().as_bytes(), b"payload");
}

#[test]
fn string_forms_round_trip() {
    let mut parser = parser_for(b"1 0 obj [ (abc\n) <4142> <414> ] endobj\n");
    let key = parser.parse_indirect_object(ObjectKey::new(1, 0)).unwrap();
    let pool = parser.into_pool();
    let array = pool.get(key).unwrap().as_array().unwrap();
    assert_eq!(
        array.get(0).unwrap().as_string().unwrap().as_bytes(),
        &[b'a', b'b', b'c', 0x0A]
    );
    assert_eq!(
        array.get(1).unwrap().as_string().unwrap().as_bytes(),
        &[0x41, 0x42]
    );
    assert_eq!(
        array.get(2).unwrap().as_string().unwrap().as_bytes(),
        &[0x41, 0x40]
    );
}

#[test]
fn stream_boundary_comes_from_the_scan_not_the_length() {
    let src = b"7 0 obj << /Length 3 >> stream\n0123456789endstream endobj\n";
    let mut parser = parser_for(src);
    let key = parser.parse_indirect_object(ObjectKey::new(7, 0)).unwrap();
    let pool = parser.into_pool();
    let stream = pool.get(key).unwrap().as_stream().unwrap();
    assert_eq!(stream.raw_data().unwrap(), b"0123456789");
}

#[test]
fn parsed_document_encrypts_and_decrypts_in_place() {
    let src = b"1 0 obj << /Type /Catalog /Title (Top Secret) /Pages 2 0 R >> endobj\n\
                2 0 obj << /Length 5 >> stream\nhello\nendstream endobj\n";
    let mut parser = parser_for(src);
    parser.parse_indirect_object(ObjectKey::new(1, 0)).unwrap();
    parser.parse_indirect_object(ObjectKey::new(2, 0)).unwrap();
    let mut pool = parser.into_pool();

    let (encrypt_dict, id) =
        encrypt_document(&mut pool, b"owner", b"user", Permissions::all(), None).unwrap();

    let title = pool
        .get(ObjectKey::new(1, 0))
        .unwrap()
        .as_dict()
        .unwrap()
        .get("Title")
        .unwrap()
        .as_string()
        .unwrap()
        .as_bytes()
        .to_vec();
    assert_ne!(title, b"Top Secret".to_vec());
    let payload = pool
        .get(ObjectKey::new(2, 0))
        .unwrap()
        .as_stream()
        .unwrap()
        .raw_data()
        .unwrap();
    assert_ne!(payload, b"hello".to_vec());

    // hand the encryption dictionary back through a trailer, as a loader
    // would, and decrypt with the user password
    let mut trailer = cosparse::CosDictionary::new();
    trailer.insert(
        cosparse::CosName::new("Encrypt"),
        CosObject::Dictionary(encrypt_dict),
    );
    let mut ids = cosparse::CosArray::new();
    ids.push(CosObject::String(cosparse::CosString::new(id.clone())));
    ids.push(CosObject::String(cosparse::CosString::new(id)));
    trailer.insert(cosparse::CosName::new("ID"), CosObject::Array(ids));

    decrypt_document(&mut pool, &trailer, b"user").unwrap();

    let dict = pool.get(ObjectKey::new(1, 0)).unwrap().as_dict().unwrap();
    assert_eq!(
        dict.get("Title").unwrap().as_string().unwrap().as_bytes(),
        b"Top Secret"
    );
    let stream = pool.get(ObjectKey::new(2, 0)).unwrap().as_stream().unwrap();
    assert_eq!(stream.raw_data().unwrap(), b"hello");
}

#[test]
fn empty_password_forty_bit_document_authenticates() {
    let src = b"1 0 obj << /Kind (plain) >> endobj\n";
    let mut parser = parser_for(src);
    parser.parse_indirect_object(ObjectKey::new(1, 0)).unwrap();
    let mut pool = parser.into_pool();

    let (encrypt_dict, id) =
        encrypt_document(&mut pool, b"", b"", Permissions::none(), None).unwrap();
    assert_eq!(encrypt_dict.get("R").unwrap().as_integer(), Some(2));

    let mut trailer = cosparse::CosDictionary::new();
    trailer.insert(
        cosparse::CosName::new("Encrypt"),
        CosObject::Dictionary(encrypt_dict),
    );
    let mut ids = cosparse::CosArray::new();
    ids.push(CosObject::String(cosparse::CosString::new(id)));
    trailer.insert(cosparse::CosName::new("ID"), CosObject::Array(ids));

    // empty password succeeds on the user path; a wrong one is rejected
    assert!(DocumentCrypt::for_decryption(&trailer, &pool, b"").is_ok());
    assert!(matches!(
        DocumentCrypt::for_decryption(&trailer, &pool, b"nope"),
        Err(PdfError::InvalidPassword)
    ));
}

proptest! {
    #[test]
    fn per_object_keys_are_distinct_for_distinct_objects(
        n1 in 0u32..100_000, g1 in 0u16..500,
        n2 in 0u32..100_000, g2 in 0u16..500,
    ) {
        prop_assume!((n1, g1) != (n2, g2));
        let handler = StandardSecurityHandler::rc4_40bit();
        let file_key = [0x13, 0x57, 0x9b, 0xdf, 0x24];
        let a = handler.object_key(&file_key, ObjectKey::new(n1, g1));
        let b = handler.object_key(&file_key, ObjectKey::new(n2, g2));
        prop_assert_ne!(a, b);
    }
}
