//! End-to-end pipeline without network access

use std::io::Cursor;

use tts_demo_pipeline::{
    encode_wav, synthesize, FixedSpeakerFetcher, ModelProvider, SpeakerEmbeddingProvider,
    StubModelFetcher,
};

#[test]
fn test_stub_providers_produce_playable_wav() {
    let models = ModelProvider::new(StubModelFetcher);
    let speakers = SpeakerEmbeddingProvider::new(FixedSpeakerFetcher::zeros());

    let synthesizer = models.get().unwrap();
    let speaker = speakers.get().unwrap();
    let audio = synthesize("Hello, my dog is cute.", synthesizer.as_ref(), &speaker).unwrap();

    let bytes = encode_wav(&audio).unwrap();
    let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
    assert_eq!(reader.spec().sample_rate, 16000);
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.len() as usize, audio.len());
    assert!(models.is_loaded());
    assert!(speakers.is_loaded());
}

#[test]
fn test_repeated_requests_reuse_loaded_state() {
    let models = ModelProvider::new(StubModelFetcher);
    let speakers = SpeakerEmbeddingProvider::new(FixedSpeakerFetcher::zeros());

    let lengths: Vec<usize> = ["one", "three"]
        .iter()
        .map(|text| {
            let synthesizer = models.get().unwrap();
            let speaker = speakers.get().unwrap();
            synthesize(text, synthesizer.as_ref(), &speaker).unwrap().len()
        })
        .collect();
    assert!(lengths[1] > lengths[0]);
}
