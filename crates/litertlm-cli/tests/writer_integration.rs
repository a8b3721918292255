use litertlm_reader::ContainerReader;

#[test]
fn writes_an_archive_from_a_tflite_and_a_spiece_input() {
    let dir = tempfile::tempdir().unwrap();
    let tflite_path = dir.path().join("model.tflite");
    let spiece_path = dir.path().join("vocab.spiece");
    let out_path = dir.path().join("out.litertlm");
    std::fs::write(&tflite_path, [0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
    std::fs::write(&spiece_path, [1, 2, 3]).unwrap();

    litertlm_cli::run_with([
        "litertlm-writer".to_string(),
        "-o".to_string(),
        out_path.to_str().unwrap().to_string(),
        "--section_metadata".to_string(),
        "tflite:name=tf_lite_embedder;tokenizer:".to_string(),
        tflite_path.to_str().unwrap().to_string(),
        spiece_path.to_str().unwrap().to_string(),
    ])
    .unwrap();

    let reader = ContainerReader::open(&out_path).unwrap();
    let header = reader.header();
    assert_eq!(header.sections.len(), 2);
    assert_eq!(header.sections[0].data_type, litertlm_format::DataType::TFLiteModel);
    assert_eq!(header.sections[0].model_kind, litertlm_format::ModelKind::Embedder);
    assert_eq!(header.sections[1].data_type, litertlm_format::DataType::SentencePieceTokenizer);
}

#[test]
fn rejects_a_section_metadata_count_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("model.tflite");
    std::fs::write(&input, [1]).unwrap();

    let err = litertlm_cli::run_with([
        "litertlm-writer".to_string(),
        "--section_metadata".to_string(),
        "tflite:a=1;tokenizer:".to_string(),
        input.to_str().unwrap().to_string(),
    ])
    .unwrap_err();

    assert!(err.to_string().contains("section_spec"));
}

#[test]
fn rejects_a_label_that_does_not_match_the_dispatched_extension() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("model.tflite");
    std::fs::write(&input, [1]).unwrap();

    let err = litertlm_cli::run_with([
        "litertlm-writer".to_string(),
        "--section_metadata".to_string(),
        "tokenizer:".to_string(),
        input.to_str().unwrap().to_string(),
    ])
    .unwrap_err();

    assert!(err.to_string().contains("does not match"));
}

#[test]
fn writes_an_empty_archive_when_no_inputs_are_given() {
    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("empty.litertlm");

    let err = litertlm_cli::run_with(["litertlm-writer".to_string(), "-o".to_string(), out_path.to_str().unwrap().to_string()]).unwrap_err();

    // clap rejects zero INPUT args since it's marked `required = true`.
    assert!(err.to_string().to_lowercase().contains("input") || err.to_string().to_lowercase().contains("required"));
}
