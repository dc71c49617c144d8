use botwire_core::UpdateKind;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum RouterError {
    #[error("no handler registered: kind={kind}")]
    NoHandler { kind: UpdateKind },

    #[error("handler failed: kind={kind}, index={index}: {reason}")]
    Handler {
        kind: UpdateKind,
        index: usize,
        reason: String,
    },
}
