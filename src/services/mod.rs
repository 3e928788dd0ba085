pub mod data_generator;
pub mod document_filler;
pub mod email_sender;
pub mod field_classifier;

pub use data_generator::DataGenerator;
pub use document_filler::DocumentFiller;
pub use email_sender::EmailSender;
pub use field_classifier::FieldClassifier;
