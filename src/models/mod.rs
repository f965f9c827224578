pub mod internal;

pub use internal::{
    CandidateFile, Category, FileUpload, ImportOutcome, ImportRequest, ImportedRecord, Owner,
    ParsedAddress, ResolutionOutcome, UNKNOWN_OWNER,
};
