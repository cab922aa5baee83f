pub mod admission;
pub mod ledger;
pub mod speech_recognition;
pub mod transcription;
