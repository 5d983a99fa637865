//! Vocabulary construction, persistence and encoding tests.

use std::fs;

use nmt_core::engine::{BOS_ID, EOS_ID, PAD_ID, RESERVED_TOKENS, UNK_ID};
use nmt_core::vocab::{VocabBuilder, VocabError, Vocabulary, RESERVED_COUNT};
use tempfile::TempDir;

const CORPUS: &str = "Le chat dort.\nLe chien dort aussi!\nl'oiseau chante 42 fois\n";

#[test]
fn test_build_from_corpus_file() {
    let dir = TempDir::new().unwrap();
    let corpus = dir.path().join("train.fr");
    fs::write(&corpus, CORPUS).unwrap();

    let builder = VocabBuilder::from_file(&corpus).unwrap();
    assert_eq!(builder.count("Le"), 2);
    assert_eq!(builder.count("dort"), 2);
    assert_eq!(builder.count("42"), 0);
    assert_eq!(builder.count("l'oiseau"), 1);

    let vocab = builder.build().unwrap();
    assert_eq!(vocab.len(), RESERVED_TOKENS.len() + builder.distinct_words());
    assert_eq!(vocab.id("Le"), Some(4));
    assert_eq!(vocab.id("dort"), Some(5));
    assert_eq!(vocab.id("chat"), Some(6));
}

#[test]
fn test_save_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fr.vocab");
    let vocab = VocabBuilder::from_text(CORPUS).build().unwrap();
    vocab.save(&path).unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    let first: Vec<&str> = contents.lines().take(5).collect();
    assert_eq!(first[0], format!("<PAD>\t{}", RESERVED_COUNT));
    assert_eq!(first[3], format!("</S>\t{}", RESERVED_COUNT));
    assert_eq!(first[4], "Le\t2");

    let reloaded = Vocabulary::from_file(&path).unwrap();
    assert_eq!(reloaded, vocab);
}

#[test]
fn test_reload_without_counts() {
    let vocab = Vocabulary::parse("<PAD>\n<UNK>\n<S>\n</S>\nhello\nworld\n").unwrap();
    assert_eq!(vocab.len(), 6);
    assert_eq!(vocab.id("world"), Some(5));
    assert_eq!(vocab.count(5), Some(0));
}

#[test]
fn test_missing_reserved_tokens_rejected() {
    let err = Vocabulary::parse("<PAD>\n<UNK>\nhello\n</S>\n").unwrap_err();
    assert!(matches!(err, VocabError::MissingReserved { id: 2, .. }));

    let err = Vocabulary::parse("<PAD>\t1\n<UNK>\tmany\n").unwrap_err();
    assert!(matches!(err, VocabError::Parse { line: 2, .. }));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = Vocabulary::from_file(dir.path().join("absent.vocab")).unwrap_err();
    assert!(matches!(err, VocabError::Io(_)));
}

#[test]
fn test_encode_decode_sentence() {
    let vocab = VocabBuilder::from_text(CORPUS).build().unwrap();
    let ids = vocab.encode_sentence("Le chat chante ici");
    assert_eq!(ids.len(), 5);
    assert_eq!(ids[3], UNK_ID);
    assert_eq!(*ids.last().unwrap(), EOS_ID);

    let mut decoded_ids = vec![BOS_ID];
    decoded_ids.extend(&ids);
    decoded_ids.push(PAD_ID);
    assert_eq!(vocab.decode(&decoded_ids), "Le chat chante <UNK>");
}

#[test]
fn test_truncated_maps_tail_to_unknown() {
    let vocab = VocabBuilder::from_text(CORPUS).build().unwrap().truncated(6);
    assert_eq!(vocab.len(), 6);
    assert_eq!(vocab.id("dort"), Some(5));
    assert_eq!(vocab.id("chat"), None);
    assert_eq!(vocab.encode("chat dort"), vec![UNK_ID, 5]);
}
